//! Scholar Scout: classify Google Scholar alert emails by research topic.

pub mod app;
pub mod config;
pub mod error;
pub mod llm;
pub mod mail;
pub mod notify;
pub mod pipeline;
pub mod topics;

pub use error::{Error, Result};
