//! Shared utilities for agent-rs
//!
//! This crate provides common functionality used across the agent-rs workspace,
//! including logging setup, configuration management, and the depth-colored
//! tree renderer used to inspect messages and tool payloads in a terminal.

pub mod config;
pub mod logging;
pub mod tree;

pub use config::Config;
pub use logging::{init_tracing, init_tracing_with_level};
pub use tree::{Node, TreeRenderer, display_tree, render_lines};
