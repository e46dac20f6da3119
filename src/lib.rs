//! Console time tracker for task based work. Tracking is suspended once the user walks away and
//! every finished period of work lands in an append-only log ready for booking.
//!

pub mod cli;
pub mod idle_api;
pub mod tracker;
pub mod utils;
