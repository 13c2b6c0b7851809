pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::Cli;
pub use config::ProviderConfig;
pub use core::{AdapterComputeService, ContextBuilder};
pub use domain::ports::{BlobStore, ComputeService, ComputeServiceAdapter};
pub use utils::error::{CloudError, NodeFailure, Result};
