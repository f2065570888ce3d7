//! API request and response data models.
//!
//! This module contains the data structures used for HTTP response
//! serialization, all annotated for OpenAPI schema generation.
//!
//! - [`images`]: image upload responses

pub mod images;
