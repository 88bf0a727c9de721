//! # fmrds-common
//!
//! Shared code used by the FM/RDS receiver binary:
//! - root error taxonomy
//! - wall-clock helpers

pub mod error;
pub mod time;

pub use error::{Error, Result};
