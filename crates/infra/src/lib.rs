//! Infrastructure layer: persistence, the results cache, the analysis service
//! client, polling, configuration and the tool workflows built on them.

pub mod cache;
pub mod config;
pub mod oracle;
pub mod polling;
pub mod store;
pub mod tracker;
pub mod workflows;
