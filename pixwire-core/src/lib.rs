//! # pixwire-core
//!
//! Core library for the pixwire network image-processing service.
//!
//! This crate contains:
//! - **Framing**: `read_frame` / `write_frame` and `FrameCodec` for the
//!   4-byte big-endian length-prefixed wire format
//! - **Commands**: `Command` and its `"action:params"` text syntax
//! - **Pixels**: `ImageBuffer` (16-bit RGBA) and the `ImageCodec` PNG/JPEG collaborator
//! - **Transforms**: box blur, bilinear resize, contrast
//! - **Handler**: the one-request-per-connection state machine
//! - **Pool / Server**: fixed worker pool behind a TCP accept loop
//! - **Client**: `ImageClient` for sending a request and reading the reply
//! - **Error**: `PixwireError`, a typed, `thiserror`-based error hierarchy

pub mod buffer;
pub mod client;
pub mod codec;
pub mod command;
pub mod error;
pub mod format;
pub mod frame;
pub mod handler;
pub mod pool;
pub mod server;
pub mod state;
pub mod transform;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use buffer::{ImageBuffer, Pixel};
pub use client::ImageClient;
pub use codec::FrameCodec;
pub use command::{Command, MAX_PIXELS};
pub use error::{ErrorCategory, PixwireError};
pub use format::{Encoding, ImageCodec, ImageFormat, PixelLayout, RasterCodec};
pub use frame::{MAX_FRAME_SIZE, PROTOCOL_VERSION, read_frame, write_frame};
pub use handler::{ConnectionHandler, HandlerConfig, RequestSummary};
pub use pool::{PoolStats, WORKER_COUNT, WorkerPool};
pub use server::{DEFAULT_PORT, Server, run_server};
pub use state::ConnectionStage;
