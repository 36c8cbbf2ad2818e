//! Tergite pulse-schedule model
//!
//! Backends of the Tergite control service execute pulse schedules, not gates.
//! This crate holds the vocabulary those schedules are written in:
//!
//! - [`Channel`] and [`MemorySlot`] address drive, readout, acquisition and
//!   coupler lines
//! - [`ParameterExpr`] keeps angles and durations symbolic until binding
//! - [`PulseShape`] / [`Pulse`] describe envelopes before and after binding
//! - [`ScheduleBlock`] is a parameterized template, [`Schedule`] its timed,
//!   concrete form
//!
//! # Example
//!
//! ```rust
//! use tergite_pulse::{BlockInstruction, Bindings, Channel, ParameterExpr, ScheduleBlock};
//!
//! let block = ScheduleBlock::new("rz").with(BlockInstruction::ShiftPhase {
//!     phase: ParameterExpr::param("lambda_param"),
//!     channel: Channel::Drive(0),
//! });
//!
//! let mut bindings = Bindings::default();
//! bindings.insert("lambda_param".into(), 0.5);
//! let schedule = block.bind(&bindings).unwrap();
//! assert_eq!(schedule.duration(), 0);
//! ```

pub mod channel;
pub mod error;
pub mod parameter;
pub mod pulse;
pub mod schedule;

pub use channel::{Channel, MemorySlot};
pub use error::{PulseError, PulseResult};
pub use parameter::{Bindings, ParameterExpr, to_samples};
pub use pulse::{CZ_PULSE_SHAPE, Pulse, PulseShape, Waveform};
pub use schedule::{BlockInstruction, Instruction, Schedule, ScheduleBlock, TimedInstruction};
