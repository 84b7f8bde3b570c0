//! Exact time-point model and integration histories for the Cadence
//! time-stepping engine.
//!
//! Everything a multistep stepper compares or subtracts is exact here: times
//! are rational fractions of a fixed [`Slab`], steps are signed fractions of a
//! slab's duration, and [`StepId`]s give the step sequence a total order that
//! respects the direction of integration. On top of that sit the two history
//! containers the steppers in `cadence-steppers` consume: [`History`] for
//! volume updates of one state variable, and [`BoundaryHistory`] for flux
//! coupling across a boundary whose two sides may step at different rates.
//!
//! This crate performs no integration itself and holds no global state; every
//! container is owned by its caller and mutated only through explicit inserts
//! and prunes, under a single-writer discipline.

pub mod boundary;
pub mod fraction;
pub mod history;
pub mod slab;
pub mod step_id;
pub mod time;

pub use boundary::{BoundaryEntry, BoundaryHistory, BoundarySide};
pub use fraction::Fraction;
pub use history::{History, Record};
pub use slab::Slab;
pub use step_id::StepId;
pub use time::{Time, TimeDelta};
