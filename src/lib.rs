//! knotnet: neural architectures for predicting integer-valued knot invariants.
//!
//! Five model variants (MLP, CNN, transformer encoder, long-sequence
//! "reformer" transformer, graph attention network) share one training
//! contract: a forward pass, regression/classification loss computation,
//! validation/test error metrics, and Adam + learning-rate-schedule
//! configuration. See [`knotnet::architectures::base::train`].

pub mod knotnet;

pub use knotnet::settings::{settings, Settings};

/// Backend-agnostic tensor constructors shared by tests and demos.
pub mod test_utils;
