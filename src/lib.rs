//! An MJPEG-over-HTTP fan-out relay.
//!
//! One producer feeds a continuous stream of concatenated JPEG frames on
//! standard input; this crate carves that stream into discrete frames and
//! serves the most recent one to every connected HTTP client as a
//! `multipart/x-mixed-replace` stream, with optional HTTP Basic auth gating
//! access.
//!
//! ## Architecture
//!
//! * [`frame`] — carves an unbounded byte stream into discrete JPEG frames.
//! * [`hub`] — the single shared frame slot and per-client readiness flags
//!   that connect the producer to every worker thread.
//! * [`auth`] — the Basic-auth predicate.
//! * [`session`] — the per-connection state machine: parse request, auth
//!   challenge, write the response header, stream multipart parts.
//! * [`producer`] — reads stdin, carves frames, publishes them, paces
//!   itself against the slowest client, accepts new connections, and
//!   drives shutdown.
//! * [`config`] — CLI parsing and validation.
//! * [`signals`] — `SIGINT`/`SIGTERM` → graceful shutdown, `SIGPIPE` ignore.
//! * [`clock`] — monotonic time and the EWMA smoothing helper shared by the
//!   producer and every client session.
//!
//! None of this runs on an async executor: the concurrency model is one OS
//! thread per accepted client plus the producer on the thread that started
//! it, matching the blocking-socket, condvar-based design the relay was
//! built around.

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod frame;
pub mod hub;
pub mod producer;
pub mod session;
pub mod signals;

pub use config::Config;
pub use error::{ConfigError, SessionError, StartupError};
pub use hub::FrameHub;

/// Server identification string sent in the `Server:` response header.
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The multipart boundary token advertised in `Content-Type` and used as
/// the literal separator between parts.
pub const BOUNDARY: &str = "--FrameBoundary";
