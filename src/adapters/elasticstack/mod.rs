//! ElasticHosts and CloudSigma, which share one plain-text API.

pub mod client;
pub mod compute;
pub mod domain;
pub mod wire;

pub use client::ElasticStackClient;
pub use compute::ElasticStackComputeServiceAdapter;
