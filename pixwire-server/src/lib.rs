//! # pixwire-server: Image Processing Service
//!
//! Listens on TCP (port 8080 by default), accepts one request per
//! connection and hands each connection to a fixed pool of workers that
//! decode the image, apply blur / resize / contrast, and stream the
//! re-encoded result back.
//!
//! Settings come from a TOML file; see [`config::ServerConfig`].

pub mod config;
pub mod service;
