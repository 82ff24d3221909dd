//! CLI command implementations

pub mod attributes;
pub mod config;
pub mod provision;
pub mod relocate;
pub mod resolve;
pub mod select;
