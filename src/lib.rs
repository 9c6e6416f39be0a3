//! Starport: galaxy station index with shell-expansion outfitting search,
//! kept current by a live market feed and bulk snapshots.

pub mod catalog;
pub mod config;
pub mod error;
pub mod feed;
pub mod index;
pub mod metrics;
pub mod refresh;
pub mod server;
pub mod startup;
pub mod types;
