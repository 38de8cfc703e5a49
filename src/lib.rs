//! dumon: dual monitor manager
//!
//! Discovers the connected video outputs via `xrandr`, switches between
//! single, mirrored and sequenced layouts, and keeps named layout profiles.
//! A front end (tray menu, command line) drives everything through
//! [`AppContext`].

#![forbid(unsafe_code)]

pub mod app;
pub mod backend;
pub mod config;
pub mod constants;
pub mod error;
pub mod layout;
pub mod options;
pub mod request;
pub mod reset;
pub mod runner;
pub mod topology;

pub use app::{AppContext, SelectionState};
pub use error::{DumonError, Result};
pub use request::{SwitchRequest, ValidatedRequest};
pub use topology::{OutputDevice, Topology};
