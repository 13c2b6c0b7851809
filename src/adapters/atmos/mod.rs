//! EMC Atmos Online: a path-addressed object namespace exposed as a blob store.

pub mod blobstore;
pub mod client;
pub mod domain;
pub mod signer;
pub mod xml;

pub use blobstore::AtmosBlobStore;
pub use client::AtmosClient;
pub use signer::AtmosSigner;
