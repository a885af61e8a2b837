//! Vehicle group builder.
//!
//! Partitions cars among balloons so that every balloon's crew can be carried
//! by the cars of its group. A group covers its balloon when the reserved car
//! seats (one seat per car is kept for the driver) reach the balloon's
//! capacity.

use serde::{Deserialize, Serialize};

use crate::error::{RequestError, SolveError};
use crate::roster::{self, Ids, Roster};
use crate::traits::{Id, Person, Vehicle};

/// A balloon and the cars that ferry its crew.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleGroup<I> {
    pub balloon_id: I,
    pub car_ids: Vec<I>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupOptions {
    /// Every group needs at least one car able to tow the balloon trailer.
    pub require_trailer_clutch: bool,
}

/// Build one vehicle group per balloon.
///
/// Existing groups are kept verbatim and their cars are never handed to
/// another balloon, so feeding a complete partition back in returns it
/// unchanged. Balloons are topped up largest first. For each, the smallest
/// free car that covers the missing seats on its own is taken; failing that,
/// the first covering pair. Triples are not searched.
///
/// When `people_count` exceeds the seats usable during a leg (balloon seats
/// plus the car seats not kept free for the balloon crew), the remaining cars
/// are spread over the groups with the least usable seats.
pub fn build_vehicle_groups<I, B, C>(
    balloons: &[B],
    cars: &[C],
    existing: &[VehicleGroup<I>],
    people_count: usize,
    options: &GroupOptions,
) -> Result<Vec<VehicleGroup<I>>, SolveError<I>>
where
    I: Id,
    B: Vehicle<Id = I>,
    C: Vehicle<Id = I>,
{
    let (ids, roster) = roster::index_fleet(balloons, cars)?;
    let layout = Layout::resolve(&ids, &roster, existing)?;

    finish(&ids, &roster, layout, people_count, options, &Pairing::Open)
}

/// Like [`build_vehicle_groups`], but with the roster at hand.
///
/// Every vehicle needs at least one licensed operator, and a car only joins
/// a balloon when one of the balloon's pilots shares a language with one of
/// the car's drivers. Existing groups must already respect that.
pub fn build_crew_groups<I, P, B, C>(
    people: &[P],
    balloons: &[B],
    cars: &[C],
    existing: &[VehicleGroup<I>],
    options: &GroupOptions,
) -> Result<Vec<VehicleGroup<I>>, SolveError<I>>
where
    I: Id,
    P: Person<Id = I>,
    B: Vehicle<Id = I, PersonId = I>,
    C: Vehicle<Id = I, PersonId = I>,
{
    let (ids, roster) = roster::index_all(people, balloons, cars, 0)?;

    for &balloon in &roster.balloons {
        if roster.crafts[balloon].operators.is_empty() {
            return Err(SolveError::NoPilotAvailable { balloon: ids.vehicle_id(balloon) });
        }
    }
    for &car in &roster.cars {
        if roster.crafts[car].operators.is_empty() {
            return Err(SolveError::NoDriverAvailable { car: ids.vehicle_id(car) });
        }
    }

    let layout = Layout::resolve(&ids, &roster, existing)?;
    let pairing = Pairing::by_language(&roster);
    for group in &layout.groups {
        if let Some(&car) = group.cars.iter().find(|&&car| !pairing.allows(group.balloon, car)) {
            return Err(RequestError::IncompatibleGroup {
                balloon: ids.vehicle_id(group.balloon),
                car: ids.vehicle_id(car),
            }
            .into());
        }
    }

    finish(&ids, &roster, layout, people.len(), options, &pairing)
}

fn finish<I: Id>(
    ids: &Ids<'_, I>,
    roster: &Roster,
    mut layout: Layout,
    people_count: usize,
    options: &GroupOptions,
    pairing: &Pairing,
) -> Result<Vec<VehicleGroup<I>>, SolveError<I>> {
    layout
        .cover(roster, options.require_trailer_clutch, pairing)
        .map_err(|short| short.into_error(ids))?;
    layout
        .balance_headcount(roster, people_count, pairing)
        .map_err(|short| short.into_error(ids))?;

    tracing::info!(
        balloons = roster.balloons.len(),
        cars = roster.cars.len(),
        grouped = roster.cars.len() - layout.ungrouped_cars(roster).len(),
        "built vehicle groups"
    );

    Ok(layout.to_groups(ids))
}

/// Which cars may join which balloon's group.
#[derive(Debug, Clone)]
pub(crate) enum Pairing {
    Open,
    /// Balloon position -> car position -> allowed.
    Matrix(Vec<Vec<bool>>),
}

impl Pairing {
    /// A car fits a balloon when some licensed pilot and some licensed driver
    /// can talk to each other. Vehicles nobody may operate fit nothing.
    pub fn by_language(roster: &Roster) -> Self {
        let mut allowed = vec![Vec::new(); roster.crafts.len()];
        for &balloon in &roster.balloons {
            let pilots = &roster.crafts[balloon].operators;
            let mut row = vec![false; roster.crafts.len()];
            for &car in &roster.cars {
                row[car] = pilots.iter().any(|&p| {
                    roster.crafts[car]
                        .operators
                        .iter()
                        .any(|&q| roster.speak_together(p, q))
                });
            }
            allowed[balloon] = row;
        }
        Pairing::Matrix(allowed)
    }

    pub fn allows(&self, balloon: usize, car: usize) -> bool {
        match self {
            Pairing::Open => true,
            Pairing::Matrix(allowed) => allowed[balloon][car],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GroupLayout {
    pub balloon: usize,
    pub cars: Vec<usize>,
}

/// Groups in balloon order; `groups[k].balloon == roster.balloons[k]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Layout {
    pub groups: Vec<GroupLayout>,
    group_of: Vec<Option<usize>>,
}

/// A balloon whose group could not be covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Shortfall {
    pub balloon: usize,
    pub missing: u32,
}

impl Shortfall {
    pub fn into_error<I: Id>(self, ids: &Ids<'_, I>) -> SolveError<I> {
        SolveError::InsufficientVehicles {
            balloon: ids.vehicle_id(self.balloon),
            missing: self.missing,
        }
    }
}

impl Layout {
    /// One group per balloon, seeded from the caller's groups.
    pub fn resolve<I: Id>(
        ids: &Ids<'_, I>,
        roster: &Roster,
        existing: &[VehicleGroup<I>],
    ) -> Result<Self, RequestError<I>> {
        let mut layout = Layout::ungrouped(roster);
        let mut seen_balloons = vec![false; roster.crafts.len()];
        for group in existing {
            let balloon = ids.require_vehicle(&group.balloon_id)?;
            if !roster.is_balloon(balloon) {
                return Err(RequestError::NotABalloon { vehicle: group.balloon_id.clone() });
            }
            if std::mem::replace(&mut seen_balloons[balloon], true) {
                return Err(RequestError::BalloonInSeveralGroups {
                    balloon: group.balloon_id.clone(),
                });
            }
            let g = layout.group_of[balloon].unwrap_or_default();

            for car_id in &group.car_ids {
                let car = ids.require_vehicle(car_id)?;
                if roster.is_balloon(car) {
                    return Err(RequestError::NotACar { vehicle: car_id.clone() });
                }
                if layout.group_of[car].is_some() {
                    return Err(RequestError::CarInSeveralGroups { car: car_id.clone() });
                }
                layout.add_car(g, car);
            }
        }

        Ok(layout)
    }

    /// Every balloon in a group of its own, no cars.
    pub fn ungrouped(roster: &Roster) -> Self {
        let mut group_of = vec![None; roster.crafts.len()];
        let groups = roster
            .balloons
            .iter()
            .enumerate()
            .map(|(g, &balloon)| {
                group_of[balloon] = Some(g);
                GroupLayout { balloon, cars: Vec::new() }
            })
            .collect();
        Layout { groups, group_of }
    }

    pub fn group_of(&self, vehicle: usize) -> Option<usize> {
        self.group_of[vehicle]
    }

    pub fn balloons(&self) -> impl Iterator<Item = usize> + '_ {
        self.groups.iter().map(|g| g.balloon)
    }

    pub fn grouped_cars(&self) -> impl Iterator<Item = usize> + '_ {
        self.groups.iter().flat_map(|g| g.cars.iter().copied())
    }

    /// Cars in no group, in roster order.
    pub fn ungrouped_cars(&self, roster: &Roster) -> Vec<usize> {
        roster
            .cars
            .iter()
            .copied()
            .filter(|&car| self.group_of[car].is_none())
            .collect()
    }

    /// Car seats reserved for the balloon crew of group `g`.
    pub fn reserved(&self, roster: &Roster, g: usize) -> u32 {
        self.groups[g].cars.iter().map(|&car| roster.crafts[car].reserve()).sum()
    }

    pub fn shortfall(&self, roster: &Roster, g: usize) -> u32 {
        let balloon = &roster.crafts[self.groups[g].balloon];
        balloon.capacity.saturating_sub(self.reserved(roster, g))
    }

    pub fn is_covered(&self, roster: &Roster) -> bool {
        (0..self.groups.len()).all(|g| self.shortfall(roster, g) == 0)
    }

    fn has_trailer(&self, roster: &Roster, g: usize) -> bool {
        self.groups[g].cars.iter().any(|&car| roster.crafts[car].trailer)
    }

    /// Seats usable during a leg: the balloon plus its cars, minus the car
    /// seats kept free for the balloon crew.
    fn crew_capacity(&self, roster: &Roster, g: usize) -> u32 {
        let group = &self.groups[g];
        let balloon = roster.crafts[group.balloon].capacity;
        let cars: u32 = group.cars.iter().map(|&car| roster.crafts[car].capacity).sum();
        balloon + cars - balloon.min(self.reserved(roster, g))
    }

    /// Seats each vehicle may fill during a leg. Every group keeps as many car
    /// seats free as its balloon carries, so the balloon crew can ride back
    /// after landing. The seats are taken from the cars in group order and
    /// never include a driver's seat.
    pub fn seat_limits(&self, roster: &Roster) -> Vec<u32> {
        let mut limits: Vec<u32> = roster.crafts.iter().map(|craft| craft.capacity).collect();
        for group in &self.groups {
            let mut need = roster.crafts[group.balloon].capacity;
            for &car in &group.cars {
                let kept = need.min(roster.crafts[car].reserve());
                limits[car] -= kept;
                need -= kept;
            }
        }
        limits
    }

    pub fn add_car(&mut self, g: usize, car: usize) {
        self.groups[g].cars.push(car);
        self.group_of[car] = Some(g);
    }

    /// Top up every under-covered group from the free cars.
    pub fn cover(&mut self, roster: &Roster, require_trailer: bool, pairing: &Pairing) -> Result<(), Shortfall> {
        let mut order: Vec<usize> = (0..self.groups.len()).collect();
        order.sort_by_key(|&g| std::cmp::Reverse(roster.crafts[self.groups[g].balloon].capacity));

        let mut free = self.ungrouped_cars(roster);
        free.sort_by_key(|&car| roster.crafts[car].reserve());

        for g in order {
            let residual = self.shortfall(roster, g);
            let needs_trailer = require_trailer && !self.has_trailer(roster, g);
            if residual == 0 && !needs_trailer {
                continue;
            }

            let balloon = self.groups[g].balloon;
            let fitting: Vec<usize> = free.iter().copied().filter(|&car| pairing.allows(balloon, car)).collect();
            let Some(picked) = pick_cars(roster, &fitting, residual, needs_trailer) else {
                let best: u32 = fitting
                    .iter()
                    .rev()
                    .take(2)
                    .map(|&car| roster.crafts[car].reserve())
                    .sum();
                return Err(Shortfall {
                    balloon,
                    missing: residual.saturating_sub(best),
                });
            };

            for car in picked {
                free.retain(|&c| c != car);
                self.add_car(g, car);
            }
        }

        Ok(())
    }

    /// Hand out free cars until the fleet seats `people_count`. The group with
    /// the fewest usable seats gets the smallest car that fits it.
    pub fn balance_headcount(
        &mut self,
        roster: &Roster,
        people_count: usize,
        pairing: &Pairing,
    ) -> Result<(), Shortfall> {
        if self.groups.is_empty() {
            return Ok(());
        }
        let needed = people_count as u32;
        let mut free = self.ungrouped_cars(roster);
        free.sort_by_key(|&car| roster.crafts[car].capacity);

        loop {
            let seats: u32 = (0..self.groups.len()).map(|g| self.crew_capacity(roster, g)).sum();
            if seats >= needed {
                return Ok(());
            }
            let mut neediest: Vec<usize> = (0..self.groups.len()).collect();
            neediest.sort_by_key(|&g| self.crew_capacity(roster, g));

            let pick = neediest.iter().find_map(|&g| {
                let balloon = self.groups[g].balloon;
                free.iter()
                    .position(|&car| pairing.allows(balloon, car))
                    .map(|at| (g, at))
            });
            let Some((g, at)) = pick else {
                return Err(Shortfall {
                    balloon: self.groups[neediest[0]].balloon,
                    missing: needed - seats,
                });
            };
            let car = free.remove(at);
            self.add_car(g, car);
        }
    }

    pub fn to_groups<I: Id>(&self, ids: &Ids<'_, I>) -> Vec<VehicleGroup<I>> {
        self.groups
            .iter()
            .map(|group| VehicleGroup {
                balloon_id: ids.vehicle_id(group.balloon),
                car_ids: group.cars.iter().map(|&car| ids.vehicle_id(car)).collect(),
            })
            .collect()
    }
}

/// `free` must be sorted by ascending reserve.
fn pick_cars(roster: &Roster, free: &[usize], residual: u32, needs_trailer: bool) -> Option<Vec<usize>> {
    let reserve = |car: usize| roster.crafts[car].reserve();
    let trailer = |car: usize| roster.crafts[car].trailer;

    if let Some(&car) = free
        .iter()
        .find(|&&car| reserve(car) >= residual && (!needs_trailer || trailer(car)))
    {
        return Some(vec![car]);
    }

    for (i, &first) in free.iter().enumerate() {
        for &second in &free[i + 1..] {
            if reserve(first) + reserve(second) >= residual
                && (!needs_trailer || trailer(first) || trailer(second))
            {
                return Some(vec![first, second]);
            }
        }
    }

    None
}
