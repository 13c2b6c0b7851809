// Adapters layer: one module per provider API, each implementing a domain port.

pub mod atmos;
pub mod elasticstack;
pub mod filesystem;
pub mod openstack;
pub mod softlayer;
pub mod stub_compute;
pub mod transient;

pub use filesystem::FilesystemBlobStore;
pub use stub_compute::StubComputeServiceAdapter;
pub use transient::TransientBlobStore;
