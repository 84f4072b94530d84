//! Collaborator implementations that live in-process.

pub mod in_memory;
