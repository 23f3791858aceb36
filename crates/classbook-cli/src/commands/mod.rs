//! Command handlers

pub mod config;
pub mod migrate;
pub mod status;
pub mod transfer;
pub mod tree;
