//! OpenStack Nova compute behind Keystone v2.0 authentication.

pub mod compute;
pub mod domain;
pub mod keystone;
pub mod nova;

pub use compute::NovaComputeServiceAdapter;
pub use keystone::KeystoneClient;
pub use nova::NovaClient;
