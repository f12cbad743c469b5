//! defi-flow HTTP server.
//!
//! Exposes workflow storage and execution over a JSON API. Workflows are
//! kept in PostgreSQL when `DATABASE_URL` is set, in memory otherwise.

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod routes;
