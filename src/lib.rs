//! # Joydrive Library
//!
//! Drive a robot's command link from a game controller while watching the
//! controller's live state.
//!
//! This library provides the pieces of a manual test harness: a diagnostics
//! printer, a per-tick controller snapshot reader, a Bluetooth RFCOMM
//! command link and the fixed-rate loop that connects them.

pub mod config;
pub mod control;
pub mod display;
pub mod error;
pub mod input;
pub mod transport;
