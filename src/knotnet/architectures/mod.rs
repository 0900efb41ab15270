//! Model architectures and the shared training contract.

pub mod base;
