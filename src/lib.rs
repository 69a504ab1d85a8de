//! Control core of a battery-powered Bluetooth audio receiver with an OLED display
//!
//! Interrupt handlers post [`event::Event`]s into a small critical-section guarded
//! queue. The [`orchestrate::PlayerStateMachine`] drains it from the main loop and
//! drives the Bluetooth module, power rails, sensors and the display, whose
//! [`animation::AnimationEngine`] runs up to two timed sprite animations.
//!
//! Hardware sits behind traits ([`bt_module::BtModule`], [`power::PowerControl`],
//! [`sensors::Sensors`], [`display::Panel`], [`canvas::SpriteSheet`]) so the whole core
//! runs unchanged in host tests.
#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod animation;
pub mod brightness;
pub mod bt_module;
pub mod canvas;
pub mod display;
pub mod error;
pub mod event;
pub mod input;
pub mod orchestrate;
pub mod power;
pub mod sensors;
pub mod system_state;

pub use error::Error;
pub use event::{Event, EventKind, EventQueue, SharedEventQueue};
pub use orchestrate::PlayerStateMachine;
pub use system_state::{ClockField, EnvData, ModuleState, TimeData, UiState};
