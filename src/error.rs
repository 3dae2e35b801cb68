// ABOUTME: Typed error enums for configuration, startup, and per-client session failures
// ABOUTME: Keeps the three failure domains from mixing so a reviewer can see what is process-fatal

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Failures while turning parsed CLI arguments into a validated [`crate::Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("-c credentials must be \"user:pass:realm\", got \"{0}\"")]
    InvalidCredentials(String),

    #[error("-a basic requires -c user:pass:realm")]
    MissingCredentials,

    #[error("-s separator must not be empty")]
    EmptySeparator,

    #[error("-p port out of range: {0}")]
    InvalidPort(u32),
}

/// Failures that abort the process before or while it is starting up.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("failed to set listener to non-blocking mode: {0}")]
    Nonblocking(#[source] io::Error),

    #[error("failed to read from standard input: {0}")]
    StdinRead(#[source] io::Error),

    #[error("failed to install signal handlers: {0}")]
    Signals(#[source] io::Error),
}

/// Failures local to a single client session. Never escapes the worker
/// thread that produced it; the producer and other sessions are unaffected.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("request header too large")]
    HeaderTooLarge,

    #[error("timeout reading from client")]
    Timeout,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("invalid request line")]
    InvalidRequestLine,

    #[error(transparent)]
    Io(#[from] io::Error),
}
