// src/error.rs - Error types for the firmware transport and path generation
use std::path::PathBuf;
use thiserror::Error;

/// Failures talking to the firmware socket.
///
/// A receive timeout is not represented here: it is the ordinary
/// "nothing arrived yet" outcome and surfaces as `Ok(None)`.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("timed out connecting to {path}")]
    ConnectTimeout { path: PathBuf },
    #[error("socket write failed: {0}")]
    Write(#[source] std::io::Error),
    #[error("socket read failed: {0}")]
    Read(#[source] std::io::Error),
    #[error("firmware closed the connection")]
    PeerClosed,
    #[error("failed to encode command envelope: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error, PartialEq)]
pub enum PathError {
    #[error("point count must be greater than zero")]
    NoPoints,
    #[error("radius must be a positive finite number, got {0}")]
    InvalidRadius(f64),
}
