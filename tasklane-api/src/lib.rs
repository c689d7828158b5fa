//! # Tasklane API Server Library
//!
//! HTTP and WebSocket surface of Tasklane: collaborative task lists with
//! personal queues, reminders and live updates.
//!
//! ## Modules
//!
//! - `app`: Application state, router builder and periodic maintenance
//! - `config`: Configuration from environment variables
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Client info, rate limiting and security headers
//! - `audit`: Security event log
//! - `services`: Side effects that follow committed writes
//! - `routes`: API route handlers

pub mod app;
pub mod audit;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;
