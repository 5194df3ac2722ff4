//! The deployment orchestrator, project/env-var services, and slug
//! allocator: the layer that holds a global store handle and passes it
//! into handlers and workers, split here into a small set of modules
//! rather than one god-object.

#![forbid(unsafe_code)]

pub mod context;
pub mod deployment;
pub mod env_var;
pub mod project;
pub mod slug;

pub use context::Context;
