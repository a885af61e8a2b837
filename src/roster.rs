//! Index-based view of the caller's roster and fleet.
//!
//! The search never touches caller ids. People and vehicles are addressed by
//! their position in the request (balloons first, then cars) and ids are
//! mapped back only when a result or an error leaves the crate.

use std::collections::HashMap;

use crate::error::RequestError;
use crate::traits::{Id, Person, Role, Vehicle, VehicleKind};

#[derive(Debug, Clone)]
pub(crate) struct Member {
    pub flights: u32,
    pub counselor: bool,
    pub first_time: bool,
    pub weight: u32,
    pub nationality: Option<String>,
    /// `None` speaks every language.
    pub languages: Option<Vec<String>>,
}

impl Member {
    pub fn is_first_timer(&self) -> bool {
        !self.counselor && self.flights == 0
    }

    pub fn is_supervisor(&self) -> bool {
        self.counselor && self.flights == 0
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Craft {
    pub kind: VehicleKind,
    pub capacity: u32,
    pub max_weight: Option<u32>,
    pub trailer: bool,
    /// Licensed operators in the caller's order, unknown ids dropped.
    pub operators: Vec<usize>,
}

impl Craft {
    /// Seats left for passengers once the operator sits down.
    pub fn reserve(&self) -> u32 {
        self.capacity.saturating_sub(1)
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Roster {
    pub members: Vec<Member>,
    pub crafts: Vec<Craft>,
    pub balloons: Vec<usize>,
    pub cars: Vec<usize>,
}

impl Roster {
    pub fn speak_together(&self, a: usize, b: usize) -> bool {
        match (&self.members[a].languages, &self.members[b].languages) {
            (Some(la), Some(lb)) => la.iter().any(|l| lb.contains(l)),
            _ => true,
        }
    }

    pub fn is_balloon(&self, vehicle: usize) -> bool {
        self.crafts[vehicle].kind == VehicleKind::Balloon
    }
}

/// Maps between caller ids and roster positions.
#[derive(Debug, Clone)]
pub(crate) struct Ids<'a, I: Id> {
    pub people: Vec<&'a I>,
    pub vehicles: Vec<&'a I>,
    person_index: HashMap<&'a I, usize>,
    vehicle_index: HashMap<&'a I, usize>,
}

impl<'a, I: Id> Ids<'a, I> {
    pub fn person(&self, id: &I) -> Option<usize> {
        self.person_index.get(id).copied()
    }

    pub fn vehicle(&self, id: &I) -> Option<usize> {
        self.vehicle_index.get(id).copied()
    }

    pub fn require_person(&self, id: &I) -> Result<usize, RequestError<I>> {
        self.person(id)
            .ok_or_else(|| RequestError::UnknownPerson { person: id.clone() })
    }

    pub fn require_vehicle(&self, id: &I) -> Result<usize, RequestError<I>> {
        self.vehicle(id)
            .ok_or_else(|| RequestError::UnknownVehicle { vehicle: id.clone() })
    }

    pub fn person_id(&self, index: usize) -> I {
        self.people[index].clone()
    }

    pub fn vehicle_id(&self, index: usize) -> I {
        self.vehicles[index].clone()
    }
}

/// Index the fleet only. Operators stay unresolved.
pub(crate) fn index_fleet<'a, I, B, C>(
    balloons: &'a [B],
    cars: &'a [C],
) -> Result<(Ids<'a, I>, Roster), RequestError<I>>
where
    I: Id,
    B: Vehicle<Id = I>,
    C: Vehicle<Id = I>,
{
    let mut ids = Ids {
        people: Vec::new(),
        vehicles: Vec::with_capacity(balloons.len() + cars.len()),
        person_index: HashMap::new(),
        vehicle_index: HashMap::with_capacity(balloons.len() + cars.len()),
    };
    let mut roster = Roster::default();

    for balloon in balloons {
        let index = push_vehicle(&mut ids, balloon.id(), balloon.max_capacity())?;
        roster.balloons.push(index);
        roster.crafts.push(Craft {
            kind: VehicleKind::Balloon,
            capacity: balloon.max_capacity(),
            max_weight: balloon.max_weight().filter(|w| *w > 0),
            trailer: false,
            operators: Vec::new(),
        });
    }

    for car in cars {
        let index = push_vehicle(&mut ids, car.id(), car.max_capacity())?;
        roster.cars.push(index);
        roster.crafts.push(Craft {
            kind: VehicleKind::Car,
            capacity: car.max_capacity(),
            max_weight: None,
            trailer: car.has_trailer_clutch(),
            operators: Vec::new(),
        });
    }

    Ok((ids, roster))
}

/// Index people and vehicles, resolving licensed operators.
pub(crate) fn index_all<'a, I, P, B, C>(
    people: &'a [P],
    balloons: &'a [B],
    cars: &'a [C],
    default_weight: u32,
) -> Result<(Ids<'a, I>, Roster), RequestError<I>>
where
    I: Id,
    P: Person<Id = I>,
    B: Vehicle<Id = I, PersonId = I>,
    C: Vehicle<Id = I, PersonId = I>,
{
    let (mut ids, mut roster) = index_fleet(balloons, cars)?;

    ids.people.reserve(people.len());
    for person in people {
        if ids.person_index.insert(person.id(), ids.people.len()).is_some() {
            return Err(RequestError::DuplicateId { id: person.id().clone() });
        }
        ids.people.push(person.id());
        roster.members.push(Member {
            flights: person.flights_so_far(),
            counselor: person.role() == Role::Counselor,
            first_time: person.first_time(),
            weight: person.weight().unwrap_or(default_weight),
            nationality: person.nationality().map(str::to_owned),
            languages: person
                .languages()
                .filter(|langs| !langs.is_empty())
                .map(|langs| langs.iter().map(|l| l.to_lowercase()).collect()),
        });
    }

    let allowed = balloons
        .iter()
        .map(|b| b.allowed_operators())
        .chain(cars.iter().map(|c| c.allowed_operators()));
    for (craft, operators) in roster.crafts.iter_mut().zip(allowed) {
        for operator in operators {
            match ids.person(operator) {
                Some(p) if !craft.operators.contains(&p) => craft.operators.push(p),
                Some(_) => {}
                None => tracing::debug!(%operator, "ignoring licence of unknown person"),
            }
        }
    }

    Ok((ids, roster))
}

fn push_vehicle<'a, I: Id>(
    ids: &mut Ids<'a, I>,
    id: &'a I,
    capacity: u32,
) -> Result<usize, RequestError<I>> {
    if capacity == 0 {
        return Err(RequestError::ZeroCapacity { vehicle: id.clone() });
    }
    let index = ids.vehicles.len();
    if ids.vehicle_index.insert(id, index).is_some() {
        return Err(RequestError::DuplicateId { id: id.clone() });
    }
    ids.vehicles.push(id);
    Ok(index)
}
