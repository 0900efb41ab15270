//! Base architecture modules

pub mod cnn;
pub mod config;
pub mod gat;
pub mod labels;
pub mod loss_utils;
pub mod mlp;
pub mod positional;
pub mod reformer;
pub mod schedule;
pub mod train;
pub mod transformer;
