//! Core knotnet modules.

pub mod architectures;
pub mod settings;
