pub mod blob_utils;
pub mod cache;
pub mod compute_service;
pub mod context;
pub mod create_nodes;
pub mod http;
pub mod listing;
pub mod naming;
pub mod retry;

pub use crate::domain::ports::{BlobStore, ComputeService, ComputeServiceAdapter};
pub use crate::utils::error::Result;
pub use compute_service::AdapterComputeService;
pub use context::{ContextBuilder, ProviderKind, ProviderMetadata};
