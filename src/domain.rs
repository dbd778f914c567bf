//! The entry model and the contracts of the collaborators the [`Logger`](crate::Logger) talks to.
//!
//! Implementations live in the [`infra`](crate::infra) module.

pub mod cloud;
pub mod entry;
pub mod local;
pub mod metadata;
