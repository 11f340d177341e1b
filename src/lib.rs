//! Individual-based simulation of vector-borne malaria transmission.
//!
//! Agents carry their own disease status, immunity and queue of pending
//! infections. A [`stepper`] advances the whole population by one time step
//! under a population-level entomological inoculation rate (EIR), and the
//! [`driver`] alternates that step with a [`vector`] step that turns the
//! human infectivity back into an EIR.

pub mod agent;
pub mod analysis;
pub mod clock;
pub mod config;
pub mod driver;
pub mod engine;
pub mod manager;
pub mod model;
pub mod population;
pub mod scheduler;
pub mod stats;
pub mod stepper;
pub mod vector;

#[cfg(test)]
pub(crate) mod testing;
