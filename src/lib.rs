//! Cloudscript: a small command language for cloud infrastructure.
//!
//! Scripts are parsed into templates, filled, validated against the command
//! registry, dry-run through the service drivers, then run live in order.

pub mod binder;
pub mod cli;
pub mod core;
pub mod driver;
pub mod graph;
pub mod provider;
