//! Constraint checks for complete legs and group partitions.
//!
//! The leg solver runs the same checks on every filled candidate before it is
//! scored; callers can use them on assignments edited by hand.

use std::collections::HashMap;

use crate::candidate::Candidate;
use crate::error::RequestError;
use crate::groups::{Layout, VehicleGroup};
use crate::roster::{self, Roster};
use crate::solver::{self, Assignment, LegConstraints};
use crate::traits::{Id, Person, Vehicle};

/// A hard rule broken by a leg assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation<I> {
    OverCapacity { vehicle: I, aboard: u32, capacity: u32 },
    OverWeight { vehicle: I, load: u32, max_weight: u32 },
    OperatorNotAllowed { vehicle: I, person: I },
    /// Passengers aboard but nobody to operate the vehicle.
    MissingOperator { vehicle: I },
    /// Balloon passenger without a common language with the pilot.
    LanguageMismatch { vehicle: I, person: I },
    /// Seated outside the group of their fixed balloon.
    PinnedElsewhere { person: I, vehicle: I },
    AssignedTwice { person: I },
    Unseated { person: I },
}

impl<T> Violation<T> {
    fn map<U>(self, vehicle: impl Fn(T) -> U, person: impl Fn(T) -> U) -> Violation<U> {
        match self {
            Violation::OverCapacity { vehicle: v, aboard, capacity } => {
                Violation::OverCapacity { vehicle: vehicle(v), aboard, capacity }
            }
            Violation::OverWeight { vehicle: v, load, max_weight } => {
                Violation::OverWeight { vehicle: vehicle(v), load, max_weight }
            }
            Violation::OperatorNotAllowed { vehicle: v, person: p } => {
                Violation::OperatorNotAllowed { vehicle: vehicle(v), person: person(p) }
            }
            Violation::MissingOperator { vehicle: v } => Violation::MissingOperator { vehicle: vehicle(v) },
            Violation::LanguageMismatch { vehicle: v, person: p } => {
                Violation::LanguageMismatch { vehicle: vehicle(v), person: person(p) }
            }
            Violation::PinnedElsewhere { person: p, vehicle: v } => {
                Violation::PinnedElsewhere { person: person(p), vehicle: vehicle(v) }
            }
            Violation::AssignedTwice { person: p } => Violation::AssignedTwice { person: person(p) },
            Violation::Unseated { person: p } => Violation::Unseated { person: person(p) },
        }
    }
}

/// A problem with a group partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupViolation<I> {
    /// The balloon is in no group.
    MissingGroup { balloon: I },
    /// The group's reserved car seats fall short of the balloon's capacity.
    Uncovered { balloon: I, missing: u32 },
}

/// List every hard rule `assignments` breaks for this leg.
///
/// Ids that do not resolve are request errors rather than violations.
pub fn check_assignment<I, P, B, C>(
    people: &[P],
    balloons: &[B],
    cars: &[C],
    constraints: &LegConstraints<I>,
    assignments: &HashMap<I, Assignment<I>>,
    default_person_weight: u32,
) -> Result<Vec<Violation<I>>, RequestError<I>>
where
    I: Id,
    P: Person<Id = I>,
    B: Vehicle<Id = I, PersonId = I>,
    C: Vehicle<Id = I, PersonId = I>,
{
    let prepared = solver::prepare(people, balloons, cars, constraints, default_person_weight)?;
    let ids = &prepared.ids;
    let roster = &prepared.roster;

    let mut ordered = assignments
        .iter()
        .map(|(vehicle_id, assignment)| Ok((ids.require_vehicle(vehicle_id)?, assignment)))
        .collect::<Result<Vec<_>, RequestError<I>>>()?;
    ordered.sort_by_key(|(vehicle, _)| *vehicle);

    let mut found = Vec::new();
    let mut candidate = Candidate::empty(roster.crafts.len(), roster.members.len());
    for (vehicle, assignment) in ordered {
        if let Some(operator_id) = &assignment.operator_id {
            let person = ids.require_person(operator_id)?;
            if candidate.is_available(person) {
                candidate.set_operator(vehicle, person, roster.members[person].weight);
            } else {
                found.push(Violation::AssignedTwice { person });
            }
        }
        for passenger_id in &assignment.passenger_ids {
            let person = ids.require_person(passenger_id)?;
            if candidate.is_available(person) {
                candidate.board(vehicle, person, roster.members[person].weight);
            } else {
                found.push(Violation::AssignedTwice { person });
            }
        }
    }

    found.extend(violations(roster, &prepared.layout, &prepared.pins, &candidate));
    Ok(found
        .into_iter()
        .map(|v| v.map(|vehicle| ids.vehicle_id(vehicle), |person| ids.person_id(person)))
        .collect())
}

/// List the balloons `groups` leaves uncovered.
pub fn check_groups<I, B, C>(
    balloons: &[B],
    cars: &[C],
    groups: &[VehicleGroup<I>],
) -> Result<Vec<GroupViolation<I>>, RequestError<I>>
where
    I: Id,
    B: Vehicle<Id = I>,
    C: Vehicle<Id = I>,
{
    let (ids, roster) = roster::index_fleet(balloons, cars)?;
    let layout = Layout::resolve(&ids, &roster, groups)?;

    let mut listed = vec![false; roster.crafts.len()];
    for group in groups {
        if let Some(balloon) = ids.vehicle(&group.balloon_id) {
            listed[balloon] = true;
        }
    }

    let mut found = Vec::new();
    for (g, group) in layout.groups.iter().enumerate() {
        if !listed[group.balloon] {
            found.push(GroupViolation::MissingGroup { balloon: ids.vehicle_id(group.balloon) });
        }
        let missing = layout.shortfall(&roster, g);
        if missing > 0 {
            found.push(GroupViolation::Uncovered {
                balloon: ids.vehicle_id(group.balloon),
                missing,
            });
        }
    }
    Ok(found)
}

/// Hard rule check on a candidate in roster positions.
pub(crate) fn violations(
    roster: &Roster,
    layout: &Layout,
    pins: &[Option<usize>],
    candidate: &Candidate,
) -> Vec<Violation<usize>> {
    let mut found = Vec::new();

    for (vehicle, slot) in candidate.slots() {
        let craft = &roster.crafts[vehicle];
        if slot.aboard() > craft.capacity {
            found.push(Violation::OverCapacity {
                vehicle,
                aboard: slot.aboard(),
                capacity: craft.capacity,
            });
        }
        if let Some(max_weight) = craft.max_weight.filter(|max| slot.load > *max) {
            found.push(Violation::OverWeight { vehicle, load: slot.load, max_weight });
        }

        match slot.operator {
            Some(person) if !craft.operators.contains(&person) => {
                found.push(Violation::OperatorNotAllowed { vehicle, person });
            }
            None if !slot.passengers.is_empty() => found.push(Violation::MissingOperator { vehicle }),
            _ => {}
        }
        if let (true, Some(pilot)) = (roster.is_balloon(vehicle), slot.operator) {
            for &person in &slot.passengers {
                if !roster.speak_together(pilot, person) {
                    found.push(Violation::LanguageMismatch { vehicle, person });
                }
            }
        }

        for person in slot.occupants() {
            if let Some(group) = pins[person] {
                if layout.group_of(vehicle) != Some(group) {
                    found.push(Violation::PinnedElsewhere { person, vehicle });
                }
            }
        }
    }

    for person in 0..roster.members.len() {
        if candidate.is_available(person) {
            found.push(Violation::Unseated { person });
        }
    }

    found
}
