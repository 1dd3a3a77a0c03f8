//! Tool management and execution framework for agent-rs
//!
//! This crate provides a framework for defining and executing tools (functions)
//! that chat models can call, plus the built-in time lookup tool.

pub mod clock;
pub mod registry;
pub mod tool;

pub use clock::CurrentTimeTool;
pub use registry::ToolRegistry;
pub use tool::Tool;
