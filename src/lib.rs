pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod rut;
pub mod xml;

// Document and envelope data model
pub mod domain;

// Submission use case and its ports, and the adapters behind them
pub mod app;
pub mod infra;
