//! `navgrid-perception` – sensing layer for the costmap controller.
//!
//! Everything the grid needs to know about the world outside it: where the
//! robot's frames are relative to each other, what the sensors have seen
//! recently, and what shape the robot currently occupies.
//!
//! # Modules
//!
//! - [`transform`] – [`FrameGraph`][transform::FrameGraph]: directed graph of
//!   named reference frames with stamped rigid-body transforms, behind the
//!   [`TransformSource`][transform::TransformSource] seam the controller
//!   depends on.
//! - [`observation`] – [`ObservationBuffer`][observation::ObservationBuffer]:
//!   sliding window of sensor readings converted into the global frame.
//! - [`footprint`] – [`FootprintTracker`][footprint::FootprintTracker]:
//!   convex robot outline and the inscribed/circumscribed radii derived
//!   from it.

pub mod footprint;
pub mod observation;
pub mod transform;
