//! Domain models and utilities for the feed server.
//!
//! This module groups the in-memory state the server works on:
//! - `price_store`: last-known quote per symbol and its bounded history.
//! - `mock_generator`: synthetic quotes used when providers cannot answer.
//! - `ping_monitor`: in-memory keep-alive tracker for client timeouts.

pub mod mock_generator;
pub mod ping_monitor;
pub mod price_store;
