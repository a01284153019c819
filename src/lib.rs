//! Lending Bot: a lending Q&A assistant over a hosted Assistants API.
//!
//! The binary entry point is src/main.rs; the library exposes the pieces for
//! integration tests and embedding.

pub mod assistants;
pub mod bootstrap;
pub mod console;
pub mod core;
pub mod indexing;
pub mod pipeline;
pub mod preprocess;
pub mod runner;
pub mod tools;

pub use bootstrap::logger;
pub use core::{config, error};
