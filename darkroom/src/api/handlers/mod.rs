//! HTTP request handlers for all API endpoints.
//!
//! # Handler Modules
//!
//! - [`images`]: image upload, developing, and storage
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`] which automatically converts to
//! appropriate HTTP status codes and JSON error responses.

pub mod images;
