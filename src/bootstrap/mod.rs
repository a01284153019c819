//! Bootstrap layer: modules that run before the pipeline is built.
//!
//! - **logger**: tracing-subscriber initialisation.

pub mod logger;
