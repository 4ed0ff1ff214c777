//! Library crate for endpoint-scan-rs exposing reusable modules.
pub mod classify;
pub mod config;
pub mod controller;
pub mod error;
pub mod export;
pub mod http_probe;
pub mod http_scan;
pub mod port_probe;
pub mod port_scan;
pub mod ports;
pub mod probe;
pub mod server;
pub mod session;
pub mod sink;
pub mod store;
pub mod types;
pub mod worklist;
