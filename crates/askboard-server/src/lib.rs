// Library root: re-exports all modules so integration tests and the binary
// share one public API.

pub mod api;
pub mod app;
pub mod config;
pub mod ws_server;
