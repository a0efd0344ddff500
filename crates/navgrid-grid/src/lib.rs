//! `navgrid-grid` – the occupancy grid seam.
//!
//! The controller only ever talks to the [`GridEngine`][engine::GridEngine]
//! trait, so grid implementations can be swapped without touching sensing or
//! scheduling logic.
//!
//! # Modules
//!
//! - [`engine`] – [`GridEngine`][engine::GridEngine]: the mutation and
//!   snapshot surface every grid must provide, plus the
//!   [`GridSeed`][engine::GridSeed] it is built from.
//! - [`sim`] – [`SimGrid`][sim::SimGrid]: a flat-array engine with
//!   simplified marking, raytracing and inflation, good enough for headless
//!   tests and development.

pub mod engine;
pub mod sim;
