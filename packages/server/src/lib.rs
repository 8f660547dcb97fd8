// Job Scrape Server - HTTP surface
//
// Exposes the scrape engine over HTTP: start/stop/status for sessions,
// live progress over SSE, and downloads of finished sessions.
//
// All session state lives in scrape_engine::SessionManager.

pub mod config;
pub mod server;

pub use config::*;
