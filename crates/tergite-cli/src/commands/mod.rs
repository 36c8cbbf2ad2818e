//! CLI command implementations.

pub mod account;
pub mod backends;
pub mod calibration;
pub mod cancel;
pub mod common;
pub mod logfile;
pub mod result;
pub mod run;
pub mod status;
pub mod wait;
