//! hps-cli
//!
//! Command dispatch, controller-file bridge, and rendering for the HPS
//! client binary. Kept as a library so sibling tooling (and the integration
//! tests) can drive a running instance through the controller protocol.

pub mod commands;
pub mod controller;
pub mod display;

pub use commands::{CommandOutput, Dispatcher, ExecContext};
pub use controller::{send_command, Controller, ControllerPaths};
pub use display::Display;
