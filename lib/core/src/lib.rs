//! Core domain types and utilities for defi-flow.
//!
//! This crate provides the identifiers and the error handling foundation
//! shared by the workflow engine and the server.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ParseIdError, WorkflowId, WorkflowRunId};
