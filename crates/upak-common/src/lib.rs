//! Common utilities for upak.
//!
//! This crate provides the foundational pieces used by the archive reader:
//!
//! - [`BinaryReader`] - Positioned little-endian reader over any `Read + Seek` source
//! - [`latin1`] - Single-byte text decoding used for entry names and text payloads

mod error;
mod reader;

pub mod latin1;

pub use error::{Error, Result};
pub use reader::BinaryReader;
