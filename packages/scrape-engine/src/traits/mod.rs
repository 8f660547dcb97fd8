//! Capability traits supplied by the application.

pub mod extractor;
