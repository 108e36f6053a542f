pub mod config;
pub mod detection;
pub mod image;
pub mod models;
pub mod samples;
pub mod utils;
pub mod web;

pub use config::Config;
pub use detection::{DetectionPipeline, DetectionResult};
pub use utils::error::GatewayError;

pub type Result<T> = std::result::Result<T, GatewayError>;
