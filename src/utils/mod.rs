//! Utility modules for common operations
//!
//! Small, dependency-free helpers shared by the HTTP layer, the CLI and the
//! segmentation pipeline.

pub mod color;
pub mod preprocessing;
pub mod providers;
pub mod validation;

// Re-export commonly used items for convenience
pub use color::ColorParser;
pub use preprocessing::ImagePreprocessor;
pub use providers::{ExecutionProviderManager, ProviderInfo};
pub use validation::UploadValidator;
