//! Typed solver failures.
//!
//! None of these are retried by the solver. The caller decides whether to try
//! again with relaxed constraints.

use thiserror::Error;

use crate::traits::Id;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolveError<I: Id> {
    #[error("not enough cars to cover balloon {balloon} ({missing} seats short)")]
    InsufficientVehicles { balloon: I, missing: u32 },

    #[error("no pilot available for balloon {balloon}")]
    NoPilotAvailable { balloon: I },

    #[error("no driver available for car {car}")]
    NoDriverAvailable { car: I },

    #[error("fleet capacity is too small: {} people left without a seat", .unseated.len())]
    InsufficientCapacity { unseated: Vec<I> },

    /// Every candidate broke a hard rule after construction.
    #[error("no candidate satisfies the hard constraints ({violations} violations on the first)")]
    NoFeasibleCandidate { violations: usize },

    #[error("invalid request: {0}")]
    InvalidRequest(RequestError<I>),
}

impl<I: Id> From<RequestError<I>> for SolveError<I> {
    fn from(err: RequestError<I>) -> Self {
        SolveError::InvalidRequest(err)
    }
}

impl<I: Id> SolveError<I> {
    /// Stable machine-readable name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            SolveError::InsufficientVehicles { .. } => "InsufficientVehicles",
            SolveError::NoPilotAvailable { .. } => "NoPilotAvailable",
            SolveError::NoDriverAvailable { .. } => "NoDriverAvailable",
            SolveError::InsufficientCapacity { .. } => "InsufficientCapacity",
            SolveError::NoFeasibleCandidate { .. } => "NoFeasibleCandidate",
            SolveError::InvalidRequest(_) => "InvalidRequest",
        }
    }

    /// The vehicle that triggered the failure, if there is one.
    pub fn vehicle(&self) -> Option<&I> {
        match self {
            SolveError::InsufficientVehicles { balloon, .. } => Some(balloon),
            SolveError::NoPilotAvailable { balloon } => Some(balloon),
            SolveError::NoDriverAvailable { car } => Some(car),
            SolveError::InvalidRequest(err) => err.vehicle(),
            _ => None,
        }
    }

    /// The person that triggered the failure, if there is one.
    pub fn person(&self) -> Option<&I> {
        match self {
            SolveError::InsufficientCapacity { unseated } => unseated.first(),
            SolveError::InvalidRequest(err) => err.person(),
            _ => None,
        }
    }
}

/// Malformed input, reported before any search starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError<I: Id> {
    #[error("id {id} is used more than once")]
    DuplicateId { id: I },

    #[error("unknown vehicle {vehicle}")]
    UnknownVehicle { vehicle: I },

    #[error("unknown person {person}")]
    UnknownPerson { person: I },

    #[error("vehicle {vehicle} has no seats")]
    ZeroCapacity { vehicle: I },

    #[error("{vehicle} is not a balloon")]
    NotABalloon { vehicle: I },

    #[error("{vehicle} is not a car")]
    NotACar { vehicle: I },

    #[error("balloon {balloon} appears in more than one vehicle group")]
    BalloonInSeveralGroups { balloon: I },

    #[error("car {car} appears in more than one vehicle group")]
    CarInSeveralGroups { car: I },

    #[error("no driver of car {car} shares a language with a pilot of balloon {balloon}")]
    IncompatibleGroup { balloon: I, car: I },

    #[error("person {person} is pre-assigned more than once")]
    PersonAssignedTwice { person: I },

    #[error("pre-assignment puts {aboard} people into {vehicle} which seats {capacity}")]
    OverCapacity { vehicle: I, aboard: u32, capacity: u32 },

    #[error("pre-assignment loads {load} onto {vehicle} which carries at most {max_weight}")]
    OverWeight { vehicle: I, load: u32, max_weight: u32 },

    #[error("{person} is not allowed to operate {vehicle}")]
    OperatorNotAllowed { vehicle: I, person: I },

    #[error("{person} shares no language with the pilot of {vehicle}")]
    LanguageMismatch { vehicle: I, person: I },

    #[error("{person} is pinned to the group of balloon {balloon}")]
    PinnedElsewhere { person: I, balloon: I },

    #[error("option {name} {reason}")]
    InvalidOption { name: &'static str, reason: &'static str },
}

impl<I: Id> RequestError<I> {
    pub fn vehicle(&self) -> Option<&I> {
        match self {
            RequestError::UnknownVehicle { vehicle }
            | RequestError::ZeroCapacity { vehicle }
            | RequestError::NotABalloon { vehicle }
            | RequestError::NotACar { vehicle }
            | RequestError::OverCapacity { vehicle, .. }
            | RequestError::OverWeight { vehicle, .. }
            | RequestError::OperatorNotAllowed { vehicle, .. }
            | RequestError::LanguageMismatch { vehicle, .. } => Some(vehicle),
            RequestError::BalloonInSeveralGroups { balloon }
            | RequestError::PinnedElsewhere { balloon, .. }
            | RequestError::IncompatibleGroup { balloon, .. } => Some(balloon),
            RequestError::CarInSeveralGroups { car } => Some(car),
            _ => None,
        }
    }

    pub fn person(&self) -> Option<&I> {
        match self {
            RequestError::UnknownPerson { person }
            | RequestError::PersonAssignedTwice { person }
            | RequestError::OperatorNotAllowed { person, .. }
            | RequestError::LanguageMismatch { person, .. }
            | RequestError::PinnedElsewhere { person, .. } => Some(person),
            _ => None,
        }
    }
}
