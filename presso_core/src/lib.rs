#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Pressure-profile compiler and dispatch policy (transport-agnostic).
//!
//! An operator describes an espresso shot as a pressure-vs-time curve. This
//! crate turns that curve into the stepper-motor commands the machine's
//! pressure actuator executes, and delivers them over a publish/subscribe
//! channel. The channel itself is a `presso_traits::MessageChannel`; nothing
//! here knows about a concrete broker.
//!
//! ## Architecture
//!
//! - **Profiles**: ordered `(time, pressure)` points (`profile` module)
//! - **Compiler**: segment → `MotionCommand`, whole profile → `CommandSequence`
//!   (`compile` module)
//! - **Dispatch**: authorization, size guard, connect/publish/ack with a
//!   bounded wait (`dispatch` module)
//! - **Storage**: named profiles behind `ProfileStore` (`store` module)
//! - **Status**: dispatch state machine (`status` module)
//!
//! ## Rounding
//!
//! Segment times are truncated to whole seconds; steps, velocity and
//! acceleration are rounded half-to-even. See `fixed_point`.

pub mod channel_error;
pub mod compile;
pub mod config;
pub mod conversions;
pub mod dispatch;
pub mod error;
pub mod fixed_point;
pub mod mocks;
pub mod profile;
pub mod status;
pub mod store;

pub use compile::{
    CommandSequence, CompileReport, Direction, MotionCommand, SegmentOutcome, SkipReason, compile,
    compile_report, compile_segment, preset_steps,
};
pub use config::{ActuatorConstants, DispatchCfg, PRESSURE_MAX_BAR, PRESSURE_MIN_BAR};
pub use dispatch::{Authorizer, DispatchReport, Dispatcher, SharedSecret};
pub use error::{DispatchError, ProfileError, Report, Result, StoreError};
pub use profile::{Profile, ProfilePoint};
pub use status::DispatchState;
pub use store::{CsvProfileStore, ProfileStore};
