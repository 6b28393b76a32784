//! Core domain + application logic for askbot.
//!
//! This crate is framework-agnostic. Telegram and the Gemini endpoint live
//! behind ports (traits) implemented in adapter crates.

pub mod access;
pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod ports;
pub mod utils;

pub use errors::{Error, Result};
