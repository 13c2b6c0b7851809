//! SoftLayer virtual guests, ordered from a product package.

pub mod client;
pub mod compute;
pub mod domain;
pub mod product_items;

pub use client::SoftLayerClient;
pub use compute::SoftLayerComputeServiceAdapter;
