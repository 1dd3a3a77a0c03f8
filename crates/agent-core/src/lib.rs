//! Core types shared across agent-rs
//!
//! Tools, the tool registry and the chat runtime all report failures through
//! the [`Error`] type defined here.

pub mod error;

pub use error::{Error, Result};
