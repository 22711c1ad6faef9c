//! # TextSense Common Library
//!
//! Shared code for TextSense services:
//! - Error type and result alias
//! - Bootstrap configuration loading (TOML + environment)
//! - Bearer token authentication primitives

pub mod auth;
pub mod config;
pub mod error;

pub use error::{Error, Result};
