//! Huntroom Shared Types and Utilities
//!
//! This crate contains room addressing, identity and payload types, the clock
//! abstraction, and database helpers shared by the Huntroom crates.

pub mod clock;
pub mod db;
pub mod error;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use db::*;
pub use error::*;
pub use types::*;
