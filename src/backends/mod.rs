//! Backend implementations for different inference engines
//!
//! - ONNX Runtime backend (GPU acceleration, `onnx` feature)
//! - Tract backend (pure Rust, `tract` feature)

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "tract")]
pub mod tract;

// Test utilities for backend testing
#[cfg(test)]
pub mod test_utils;

// Re-export backends based on enabled features
#[cfg(feature = "onnx")]
pub use self::onnx::OnnxBackend;

#[cfg(feature = "tract")]
pub use self::tract::TractBackend;
