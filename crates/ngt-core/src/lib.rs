//! # NGT Core
//!
//! Foundation types for the NGT plugin framework.
//!
//! This crate provides the pieces every other NGT crate builds on:
//! - [`InterfaceId`]: the stable per-type token interfaces are keyed by
//! - Home/executable root resolution (`NGT_HOME`)
//! - The shared [`Error`] type

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod env;
pub mod error;
pub mod id;

pub use env::{home_root, prepend_search_path, HOME_ENV};
pub use error::{Error, Result};
pub use id::InterfaceId;
