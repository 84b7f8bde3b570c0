//! Variable-step multistep time integration and local-time-stepping boundary
//! coupling.
//!
//! The [`AdamsBashforth`] stepper advances state through a [`TimeStepper`]
//! volume update and, for domain-decomposed simulations, advances flux
//! coupling terms through the [`LtsTimeStepper`] boundary update, where the
//! two sides of a boundary may step at different local rates. Update weights
//! come from the [`coefficients`] engine, which handles arbitrary non-uniform
//! step histories; all retained state lives in the caller-owned histories of
//! [`cadence_core`].

pub mod adams_bashforth;
pub mod coefficients;
pub mod stepper;

pub use adams_bashforth::{AdamsBashforth, OrderError};
pub use stepper::{LtsTimeStepper, TimeStepper};
