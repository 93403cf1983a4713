//! Library surface of the gateway.
//!
//! The binary is a thin wrapper around these modules; exposing them as a lib
//! lets integration tests drive the real router and service directly.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
