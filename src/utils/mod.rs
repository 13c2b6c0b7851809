pub mod error;
pub mod logger;
pub mod render;
pub mod validation;
