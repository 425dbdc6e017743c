//! HTTP API: exposes the analysis tools over JSON.

pub mod app;
