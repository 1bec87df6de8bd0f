//! Service layer
//!
//! Keeps image decoding and encoding out of the pipeline logic.

pub mod io;

pub use io::ImageIOService;
