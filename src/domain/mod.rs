// Domain layer: portable models and the ports adapters implement.

pub mod blob;
pub mod compute;
pub mod credentials;
pub mod location;
pub mod ports;
pub mod template;
