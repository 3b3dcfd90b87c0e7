//! Core data model: the canonical message record, its output shapes, and
//! folder references.

pub mod folder;
pub mod message;
