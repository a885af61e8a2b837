//! crew-planner core
//!
//! Assigns pilots, drivers and passengers to balloons and their support cars
//! for one flight leg, and groups cars under balloons for a flight series.

pub mod traits;
pub mod error;
pub mod groups;
pub mod solver;
pub mod scoring;
pub mod validate;
pub mod protocol;

mod candidate;
mod phases;
mod roster;
