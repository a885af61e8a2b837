//! Search phases of the leg solver.
//!
//! Every phase works on one candidate at a time and returns its children; the
//! solver fans the frontier out over the arena. Hard rules are checked at the
//! moment a seat is taken, so no phase ever builds a candidate it would later
//! have to reject.

use std::time::Instant;

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

use crate::candidate::Candidate;
use crate::groups::Layout;
use crate::roster::Roster;

/// Hard seating rules for one leg.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Seating<'a> {
    pub roster: &'a Roster,
    pub layout: &'a Layout,
    /// Person -> group index of the balloon they are pinned to.
    pub pins: &'a [Option<usize>],
    /// Pre-assigned vehicles take no further passengers.
    pub closed: &'a [bool],
    /// Seats each vehicle may fill on this leg; see [`Layout::seat_limits`].
    pub limits: &'a [u32],
}

impl Seating<'_> {
    /// Whether the person's fixed group (if any) includes this vehicle.
    pub fn within_pin(&self, vehicle: usize, person: usize) -> bool {
        match self.pins[person] {
            Some(group) => self.layout.group_of(vehicle) == Some(group),
            None => true,
        }
    }

    fn has_room(&self, candidate: &Candidate, vehicle: usize, person: usize) -> bool {
        let craft = &self.roster.crafts[vehicle];
        let slot = candidate.slot(vehicle);
        if slot.aboard() >= self.limits[vehicle] {
            return false;
        }
        match craft.max_weight {
            Some(max) => slot.load + self.roster.members[person].weight <= max,
            None => true,
        }
    }

    pub fn can_board(&self, candidate: &Candidate, vehicle: usize, person: usize) -> bool {
        if self.closed[vehicle]
            || !candidate.is_available(person)
            || !self.within_pin(vehicle, person)
            || !self.has_room(candidate, vehicle, person)
        {
            return false;
        }
        if !self.roster.is_balloon(vehicle) {
            return true;
        }
        match candidate.slot(vehicle).operator {
            Some(pilot) => self.roster.speak_together(pilot, person),
            None => true,
        }
    }

    pub fn can_operate(&self, candidate: &Candidate, vehicle: usize, person: usize) -> bool {
        if !candidate.is_available(person)
            || !self.roster.crafts[vehicle].operators.contains(&person)
            || !self.within_pin(vehicle, person)
            || !self.has_room(candidate, vehicle, person)
        {
            return false;
        }
        !self.roster.is_balloon(vehicle)
            || candidate
                .slot(vehicle)
                .passengers
                .iter()
                .all(|&p| self.roster.speak_together(person, p))
    }

    pub fn free_seats(&self, candidate: &Candidate, vehicle: usize) -> u32 {
        self.limits[vehicle].saturating_sub(candidate.slot(vehicle).aboard())
    }

    fn weight(&self, person: usize) -> u32 {
        self.roster.members[person].weight
    }

    /// False when seating `person` as a passenger would leave some grouped car
    /// without a driver that could otherwise have had one.
    pub fn keeps_drivers(&self, candidate: &Candidate, person: usize) -> bool {
        !self.drivers_matched(candidate, None) || self.drivers_matched(candidate, Some(person))
    }

    /// Whether every grouped car still lacking a driver can get a distinct
    /// licensed, available one.
    fn drivers_matched(&self, candidate: &Candidate, excluded: Option<usize>) -> bool {
        let cars: Vec<usize> = self
            .layout
            .grouped_cars()
            .filter(|&car| candidate.slot(car).operator.is_none())
            .collect();
        let mut driving: Vec<Option<usize>> = vec![None; self.roster.members.len()];
        (0..cars.len()).all(|i| {
            let mut visited = vec![false; self.roster.members.len()];
            self.find_driver(candidate, &cars, i, excluded, &mut driving, &mut visited)
        })
    }

    /// One augmenting-path step of a car to driver matching.
    fn find_driver(
        &self,
        candidate: &Candidate,
        cars: &[usize],
        i: usize,
        excluded: Option<usize>,
        driving: &mut [Option<usize>],
        visited: &mut [bool],
    ) -> bool {
        let car = cars[i];
        for &p in &self.roster.crafts[car].operators {
            if Some(p) == excluded || visited[p] || !candidate.is_available(p) || !self.within_pin(car, p) {
                continue;
            }
            visited[p] = true;
            let free = match driving[p] {
                None => true,
                Some(other) => self.find_driver(candidate, cars, other, excluded, driving, visited),
            };
            if free {
                driving[p] = Some(i);
                return true;
            }
        }
        false
    }
}

/// Cooperative limits on branching.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SearchBudget {
    pub deadline: Instant,
    pub max_candidates: usize,
}

impl SearchBudget {
    pub fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Children one frontier candidate may produce.
    pub fn share(&self, frontier: usize) -> usize {
        (self.max_candidates / frontier.max(1)).max(1)
    }
}

/// Outcome of an operator search from one candidate.
#[derive(Debug, Default)]
pub(crate) struct OperatorSearch {
    pub complete: Vec<Candidate>,
    /// First vehicle, in search order, left without an eligible operator.
    pub dead_end: Option<usize>,
    pub truncated: bool,
}

/// Fill the operator seat of every vehicle in `vehicles`, branching over
/// each licensed and still available person in licence order.
///
/// Stops early once `limit` candidates are complete or the deadline passes,
/// whether or not anything is complete by then.
pub(crate) fn assign_operators(
    seating: &Seating<'_>,
    budget: &SearchBudget,
    base: &Candidate,
    vehicles: &[usize],
    limit: usize,
) -> OperatorSearch {
    let mut search = OperatorSearch::default();
    descend(seating, budget, base.clone(), vehicles, limit, &mut search);
    search
}

fn descend(
    seating: &Seating<'_>,
    budget: &SearchBudget,
    candidate: Candidate,
    vehicles: &[usize],
    limit: usize,
    search: &mut OperatorSearch,
) {
    let Some((&vehicle, rest)) = vehicles.split_first() else {
        search.complete.push(candidate);
        return;
    };
    if candidate.slot(vehicle).operator.is_some() {
        descend(seating, budget, candidate, rest, limit, search);
        return;
    }

    let mut branched = false;
    for &person in &seating.roster.crafts[vehicle].operators {
        if search.complete.len() >= limit || budget.expired() {
            search.truncated = true;
            return;
        }
        if !seating.can_operate(&candidate, vehicle, person) {
            continue;
        }
        branched = true;
        let mut child = candidate.clone();
        child.set_operator(vehicle, person, seating.weight(person));
        descend(seating, budget, child, rest, limit, search);
    }

    if !branched && search.dead_end.is_none() {
        search.dead_end = Some(vehicle);
    }
}

/// Seat zero-flight participants in the balloons, in shuffled order. Nobody
/// is seated whose seat would leave a grouped car without a possible driver.
pub(crate) fn seat_first_timers(seating: &Seating<'_>, base: &Candidate, rng: &mut ChaCha8Rng) -> Candidate {
    let roster = seating.roster;
    let mut candidate = base.clone();
    let mut pool: Vec<usize> = (0..roster.members.len())
        .filter(|&p| roster.members[p].is_first_timer() && candidate.is_available(p))
        .collect();
    pool.shuffle(rng);

    for balloon in seating.layout.balloons() {
        let mut skipped = Vec::new();
        while seating.free_seats(&candidate, balloon) > 0 {
            let Some(person) = pool.pop() else { break };
            if seating.can_board(&candidate, balloon, person) && seating.keeps_drivers(&candidate, person) {
                candidate.board(balloon, person, seating.weight(person));
            } else {
                skipped.push(person);
            }
        }
        pool.extend(skipped.into_iter().rev());
    }

    candidate
}

/// The candidate itself plus every way of folding zero-flight counselors
/// into balloon seats that are still free. Each combination of supervisors
/// appears once; supervisors are taken in roster order.
pub(crate) fn supervisor_family(
    seating: &Seating<'_>,
    budget: &SearchBudget,
    base: &Candidate,
    limit: usize,
) -> (Vec<Candidate>, bool) {
    let roster = seating.roster;
    let supervisors: Vec<usize> = (0..roster.members.len())
        .filter(|&p| roster.members[p].is_supervisor() && base.is_available(p))
        .collect();
    let balloons: Vec<usize> = seating.layout.balloons().collect();

    let mut family = vec![base.clone()];
    let mut truncated = false;
    add_supervisors(
        seating,
        budget,
        base,
        &supervisors,
        &balloons,
        limit,
        &mut family,
        &mut truncated,
    );
    (family, truncated)
}

#[allow(clippy::too_many_arguments)]
fn add_supervisors(
    seating: &Seating<'_>,
    budget: &SearchBudget,
    candidate: &Candidate,
    supervisors: &[usize],
    balloons: &[usize],
    limit: usize,
    family: &mut Vec<Candidate>,
    truncated: &mut bool,
) {
    for (k, &supervisor) in supervisors.iter().enumerate() {
        for &balloon in balloons {
            if family.len() >= limit || budget.expired() {
                *truncated = true;
                return;
            }
            if !seating.can_board(candidate, balloon, supervisor) || !seating.keeps_drivers(candidate, supervisor) {
                continue;
            }
            let mut child = candidate.clone();
            child.board(balloon, supervisor, seating.weight(supervisor));
            family.push(child.clone());
            add_supervisors(
                seating,
                budget,
                &child,
                &supervisors[k + 1..],
                balloons,
                limit,
                family,
                truncated,
            );
        }
    }
}

/// Seat everybody still standing: balloons first, then the cars of every
/// group in rounds of growing crew size so groups fill evenly.
///
/// `order` lists every person with the preferred ones first. Returns the
/// people left over when the fleet runs out of usable seats.
pub(crate) fn fill_remaining(
    seating: &Seating<'_>,
    base: &Candidate,
    order: &[usize],
) -> Result<Candidate, Vec<usize>> {
    let mut candidate = base.clone();
    let mut queue: Vec<usize> = order.iter().copied().filter(|&p| candidate.is_available(p)).collect();

    for balloon in seating.layout.balloons() {
        while seating.free_seats(&candidate, balloon) > 0 {
            let Some(at) = queue.iter().position(|&p| seating.can_board(&candidate, balloon, p)) else {
                break;
            };
            let person = queue.remove(at);
            candidate.board(balloon, person, seating.weight(person));
        }
    }

    let mut crew_size = 1;
    while !queue.is_empty() {
        let mut progress = false;
        for group in &seating.layout.groups {
            let airborne = candidate.slot(group.balloon).passengers.len();
            if airborne >= crew_size {
                progress = true;
                continue;
            }
            let quota = crew_size - airborne;
            for &car in &group.cars {
                if candidate.slot(car).passengers.len() >= quota {
                    continue;
                }
                let Some(at) = queue.iter().position(|&p| seating.can_board(&candidate, car, p)) else {
                    continue;
                };
                let person = queue.remove(at);
                candidate.board(car, person, seating.weight(person));
                progress = true;
                if queue.is_empty() {
                    return Ok(candidate);
                }
            }
        }
        if !progress {
            return Err(queue);
        }
        crew_size += 1;
    }

    Ok(candidate)
}
