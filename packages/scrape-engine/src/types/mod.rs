//! Data types shared across the engine.

pub mod config;
pub mod job;
pub mod message;
pub mod progress;
pub mod request;
pub mod result;
pub mod site;
