//! surveylens - deterministic natural-language analytics over survey responses
//!
//! question → `intent` → `planner` → `emitter` → executor → `estimator`,
//! with `adaptive` choosing the next field to ask.

pub mod adaptive;
pub mod cli;
pub mod config;
pub mod emitter;
pub mod estimator;
pub mod executor;
pub mod intent;
pub mod observability;
pub mod pipeline;
pub mod planner;
pub mod response;
pub mod schema;
