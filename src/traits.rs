//! Core domain traits for the crew planner.
//!
//! These are intentionally minimal. Concrete apps should implement them for
//! their own roster and fleet models; the JSON wire records in
//! [`crate::protocol`] are one such implementation.

use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

/// Unique identifier for people and vehicles.
pub trait Id: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync {}

impl<T> Id for T where T: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync {}

/// A member of the flight series roster.
pub trait Person {
    type Id: Id;

    fn id(&self) -> &Self::Id;

    fn role(&self) -> Role;

    /// Number of legs flown before the one being planned.
    fn flights_so_far(&self) -> u32;

    /// Body weight. The solve's default weight applies when absent.
    fn weight(&self) -> Option<u32>;

    fn nationality(&self) -> Option<&str>;

    /// Spoken languages. `None` or an empty slice means the person speaks
    /// every language.
    fn languages(&self) -> Option<&[String]>;

    /// True when the person has never flown in any earlier series either.
    fn first_time(&self) -> bool;
}

/// A balloon or a support car.
pub trait Vehicle {
    type Id: Id;
    type PersonId: Id;

    fn id(&self) -> &Self::Id;

    /// Display name, used in diagnostics only.
    fn name(&self) -> &str;

    /// Seats including the operator's.
    fn max_capacity(&self) -> u32;

    /// People licensed to operate this vehicle.
    fn allowed_operators(&self) -> &[Self::PersonId];

    /// Total payload limit (balloons only).
    fn max_weight(&self) -> Option<u32> {
        None
    }

    /// Whether the car can tow a balloon trailer.
    fn has_trailer_clutch(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Participant,
    Counselor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleKind {
    Balloon,
    Car,
}

impl fmt::Display for VehicleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VehicleKind::Balloon => f.write_str("balloon"),
            VehicleKind::Car => f.write_str("car"),
        }
    }
}
