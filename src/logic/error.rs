//! Error Types
//!
//! Only I/O, serialization and collaborator failures are errors. Policy
//! rejections (throttled, already blocked, invalid config value) are plain
//! `bool` results on the controller operations.

use std::net::IpAddr;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("notification via {sink} failed: {message}")]
    Notify { sink: &'static str, message: String },

    #[error("firewall enforcement for {ip} failed: {message}")]
    Enforcement { ip: IpAddr, message: String },

    #[error("{0}")]
    Tick(String),
}
