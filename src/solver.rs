//! Flight leg solver.
//!
//! Builds candidates phase by phase (pilots, first-flight seeding, supervisor
//! backfill, car sizing, drivers), fills every candidate with the remaining
//! people, drops the ones that break a hard rule and returns the best scored.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::candidate::{Candidate, CandidateArena, CandidateId};
use crate::error::{RequestError, SolveError};
use crate::groups::{Layout, Pairing, VehicleGroup};
use crate::phases::{self, Seating, SearchBudget};
use crate::roster::{self, Ids, Roster};
use crate::scoring::{self, ScoreBreakdown, ScoreContext};
use crate::traits::{Id, Person, Vehicle};
use crate::validate;

const MAX_TIME_LIMIT_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PilotDispersion {
    /// Prefer pilots with similar flight counts.
    #[default]
    Minimize,
    /// Prefer pilots with spread-out flight counts.
    Legacy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SolveOptions {
    pub pilot_fairness: i32,
    pub passenger_fairness: i32,
    pub meeting_new_people: i32,
    pub tiebreak_fairness: i32,
    pub group_rotation: i32,
    pub diverse_nationalities: i32,
    pub no_solo_participant: i32,
    pub group_passenger_balance: i32,
    pub low_flights_lookahead: i32,
    pub supervisor_flights: i32,
    /// Flights subtracted from a counselor's passenger bonus.
    pub counselor_flight_discount: u32,
    /// Weight used for people who did not give one.
    pub default_person_weight: i32,
    /// Legs ahead the lookahead term plans for; 0 turns it off.
    pub planning_horizon_depth: u32,
    /// Wall-clock budget for one leg, in seconds.
    #[serde(rename = "timeLimit")]
    pub time_limit_secs: u64,
    pub pilot_dispersion: PilotDispersion,
    /// Upper bound on live candidates per phase.
    pub max_candidates: usize,
    /// Fixed seed; drawn from entropy when absent.
    pub seed: Option<u64>,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            pilot_fairness: 10,
            passenger_fairness: 10,
            meeting_new_people: 1,
            tiebreak_fairness: 1,
            group_rotation: 5,
            diverse_nationalities: 2,
            no_solo_participant: 5,
            group_passenger_balance: 3,
            low_flights_lookahead: 2,
            supervisor_flights: 20,
            counselor_flight_discount: 2,
            default_person_weight: 80,
            planning_horizon_depth: 0,
            time_limit_secs: 20,
            pilot_dispersion: PilotDispersion::Minimize,
            max_candidates: 10_000,
            seed: None,
        }
    }
}

impl SolveOptions {
    pub fn validate<I: Id>(&self) -> Result<(), RequestError<I>> {
        if self.default_person_weight < 0 {
            return Err(RequestError::InvalidOption {
                name: "defaultPersonWeight",
                reason: "must not be negative",
            });
        }
        if self.time_limit_secs == 0 || self.time_limit_secs > MAX_TIME_LIMIT_SECS {
            return Err(RequestError::InvalidOption {
                name: "timeLimit",
                reason: "must be between 1 and 86400 seconds",
            });
        }
        if self.max_candidates == 0 {
            return Err(RequestError::InvalidOption {
                name: "maxCandidates",
                reason: "must be positive",
            });
        }
        Ok(())
    }
}

/// Operator and passengers of one vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment<I> {
    pub operator_id: Option<I>,
    #[serde(default)]
    pub passenger_ids: Vec<I>,
}

impl<I> Default for Assignment<I> {
    fn default() -> Self {
        Self {
            operator_id: None,
            passenger_ids: Vec::new(),
        }
    }
}

/// Structure and history a leg is solved against.
#[derive(Debug, Clone)]
pub struct LegConstraints<I: Id> {
    pub vehicle_groups: Vec<VehicleGroup<I>>,
    /// Vehicle -> assignment kept exactly as given.
    pub pre_assignments: HashMap<I, Assignment<I>>,
    /// Person -> balloons whose group they were in on earlier legs.
    pub group_history: HashMap<I, Vec<I>>,
    /// Person -> person -> legs spent in the same vehicle.
    pub meet_history: HashMap<I, HashMap<I, u32>>,
    /// Person -> balloon whose group they must stay in.
    pub fixed_groups: HashMap<I, I>,
}

impl<I: Id> Default for LegConstraints<I> {
    fn default() -> Self {
        Self {
            vehicle_groups: Vec::new(),
            pre_assignments: HashMap::new(),
            group_history: HashMap::new(),
            meet_history: HashMap::new(),
            fixed_groups: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    GroupsReady,
    PilotsAssigned,
    Seeded,
    CarsSized,
    DriversAssigned,
    Scored,
    Filled,
    Done,
}

/// Live candidates after a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    pub candidates: usize,
}

#[derive(Debug, Clone)]
pub struct LegSolution<I> {
    /// One entry per vehicle in the request.
    pub assignments: HashMap<I, Assignment<I>>,
    /// Seed that reproduces this solution.
    pub seed: u64,
    pub score: ScoreBreakdown,
    pub stages: Vec<StageReport>,
}

/// Solve one flight leg.
///
/// Pre-assigned vehicles are returned exactly as given, except that a
/// pre-assignment without an operator still gets one. Cars leave as many
/// seats empty as their balloon carries, for the ride back after landing. With a fixed seed the
/// result only depends on the input, unless the time limit cuts a phase
/// short.
pub fn solve_leg<I, P, B, C>(
    people: &[P],
    balloons: &[B],
    cars: &[C],
    constraints: &LegConstraints<I>,
    options: SolveOptions,
) -> Result<LegSolution<I>, SolveError<I>>
where
    I: Id,
    P: Person<Id = I>,
    B: Vehicle<Id = I, PersonId = I>,
    C: Vehicle<Id = I, PersonId = I>,
{
    options.validate::<I>()?;
    let started = Instant::now();
    let budget = SearchBudget {
        deadline: started + Duration::from_secs(options.time_limit_secs),
        max_candidates: options.max_candidates,
    };

    let Prepared { ids, roster, mut layout, pins } = prepare(
        people,
        balloons,
        cars,
        constraints,
        options.default_person_weight as u32,
    )?;
    let (base, closed) = pre_assign(&ids, &roster, &layout, &pins, &constraints.pre_assignments)?;

    for balloon in layout.balloons() {
        if base.slot(balloon).operator.is_none() && roster.crafts[balloon].operators.is_empty() {
            return Err(SolveError::NoPilotAvailable { balloon: ids.vehicle_id(balloon) });
        }
    }

    let seed = options.seed.unwrap_or_else(rand::random);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let priority = tiebreak_priority(&roster, &mut rng);
    let fill_order = fill_order(&roster, &mut rng);

    tracing::info!(
        seed,
        people = roster.members.len(),
        balloons = roster.balloons.len(),
        cars = roster.cars.len(),
        groups = layout.groups.len(),
        "solving flight leg"
    );

    // Cars are sized before seeding so the driver reserve sees every grouped
    // car. A shortfall still surfaces after seeding.
    let sizing = if layout.is_covered(&roster) {
        Ok(())
    } else {
        layout.cover(&roster, false, &Pairing::by_language(&roster))
    };
    let limits = layout.seat_limits(&roster);
    let seating = Seating {
        roster: &roster,
        layout: &layout,
        pins: &pins,
        closed: &closed,
        limits: &limits,
    };

    let mut arena = CandidateArena::default();
    let mut stages = Vec::new();
    let mut frontier = vec![arena.insert(base)];
    report(&mut stages, Stage::GroupsReady, frontier.len());

    // ========================================================================
    // Pilots, first flights and supervisors
    // ========================================================================

    let pilot_seats: Vec<usize> = layout.balloons().collect();
    let share = budget.share(frontier.len());
    let (next, notes) = arena.expand(&frontier, |_, candidate| {
        let search = phases::assign_operators(&seating, &budget, candidate, &pilot_seats, share);
        (search.complete, (search.dead_end, search.truncated))
    });
    if next.is_empty() {
        let balloon = notes.iter().find_map(|(dead_end, _)| *dead_end).unwrap_or(pilot_seats[0]);
        return Err(SolveError::NoPilotAvailable { balloon: ids.vehicle_id(balloon) });
    }
    warn_truncated(Stage::PilotsAssigned, notes.iter().any(|(_, truncated)| *truncated));
    frontier = next;
    report(&mut stages, Stage::PilotsAssigned, frontier.len());

    let seeds: Vec<u64> = frontier.iter().map(|_| rng.next_u64()).collect();
    let share = budget.share(frontier.len());
    let (next, truncated) = arena.expand(&frontier, |position, candidate| {
        let mut branch_rng = ChaCha8Rng::seed_from_u64(seeds[position]);
        let seeded = phases::seat_first_timers(&seating, candidate, &mut branch_rng);
        phases::supervisor_family(&seating, &budget, &seeded, share)
    });
    warn_truncated(Stage::Seeded, truncated.into_iter().any(|t| t));
    frontier = next;
    report(&mut stages, Stage::Seeded, frontier.len());

    // ========================================================================
    // Car sizing and drivers
    // ========================================================================

    sizing.map_err(|short| short.into_error(&ids))?;
    tracing::debug!(grouped = layout.grouped_cars().count(), "cars sized");
    report(&mut stages, Stage::CarsSized, frontier.len());

    let driver_seats: Vec<usize> = layout.grouped_cars().collect();
    for &car in &driver_seats {
        let pending = arena.get(frontier[0]).slot(car).operator.is_none();
        if pending && roster.crafts[car].operators.is_empty() {
            return Err(SolveError::NoDriverAvailable { car: ids.vehicle_id(car) });
        }
    }

    let share = budget.share(frontier.len());
    let (next, notes) = arena.expand(&frontier, |_, candidate| {
        let search = phases::assign_operators(&seating, &budget, candidate, &driver_seats, share);
        (search.complete, (search.dead_end, search.truncated))
    });
    if next.is_empty() {
        let car = notes
            .iter()
            .find_map(|(dead_end, _)| *dead_end)
            .or_else(|| driver_seats.first().copied());
        return Err(match car {
            Some(car) => SolveError::NoDriverAvailable { car: ids.vehicle_id(car) },
            None => SolveError::NoFeasibleCandidate { violations: 0 },
        });
    }
    warn_truncated(Stage::DriversAssigned, notes.iter().any(|(_, truncated)| *truncated));
    frontier = next;
    report(&mut stages, Stage::DriversAssigned, frontier.len());

    // ========================================================================
    // Fill, filter and select
    // ========================================================================

    let rotation = rotation_counts(&ids, &constraints.group_history);
    let meetings = meeting_counts(&ids, &constraints.meet_history);
    let context = ScoreContext::new(&roster, &layout, &options, priority, rotation, meetings);
    let terms = scoring::terms(&options, pins.iter().any(Option::is_some));

    let (filled, verdicts) = arena.expand(&frontier, |_, candidate| {
        match phases::fill_remaining(&seating, candidate, &fill_order) {
            Ok(filled) => {
                let violations = validate::violations(&roster, &layout, &pins, &filled).len();
                if violations > 0 {
                    (Vec::new(), Verdict::Infeasible(violations))
                } else {
                    let score = scoring::score(&context, &terms, &filled);
                    (vec![filled], Verdict::Feasible(score))
                }
            }
            Err(unseated) => (Vec::new(), Verdict::Unseated(unseated)),
        }
    });
    report(&mut stages, Stage::Scored, filled.len());

    let scores = verdicts.iter().filter_map(|verdict| match verdict {
        Verdict::Feasible(score) => Some(*score),
        _ => None,
    });
    let Some(winner) = select_best(filled.iter().copied().zip(scores)) else {
        return Err(rejection(&ids, verdicts));
    };
    report(&mut stages, Stage::Filled, 1);

    let winner = arena.get(winner);
    let score = scoring::breakdown(&context, &terms, winner);
    let assignments = materialize(&ids, &roster, winner);
    report(&mut stages, Stage::Done, 1);

    tracing::info!(
        seed,
        score = score.total,
        explored = arena.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "solved flight leg"
    );

    Ok(LegSolution {
        assignments,
        seed,
        score,
        stages,
    })
}

enum Verdict {
    Feasible(f64),
    Unseated(Vec<usize>),
    Infeasible(usize),
}

/// Highest score wins; on equal scores the earlier candidate is kept.
fn select_best(scored: impl Iterator<Item = (CandidateId, f64)>) -> Option<CandidateId> {
    let mut best: Option<(CandidateId, f64)> = None;
    for (id, score) in scored {
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((id, score));
        }
    }
    best.map(|(id, _)| id)
}

fn rejection<I: Id>(ids: &Ids<'_, I>, verdicts: Vec<Verdict>) -> SolveError<I> {
    let mut violations = 0;
    for verdict in verdicts {
        match verdict {
            Verdict::Unseated(unseated) => {
                return SolveError::InsufficientCapacity {
                    unseated: unseated.into_iter().map(|p| ids.person_id(p)).collect(),
                };
            }
            Verdict::Infeasible(count) if violations == 0 => violations = count,
            _ => {}
        }
    }
    SolveError::NoFeasibleCandidate { violations }
}

fn report(stages: &mut Vec<StageReport>, stage: Stage, candidates: usize) {
    tracing::debug!(?stage, candidates, "stage complete");
    stages.push(StageReport { stage, candidates });
}

fn warn_truncated(stage: Stage, truncated: bool) {
    if truncated {
        tracing::warn!(?stage, "search budget exhausted, continuing with partial frontier");
    }
}

// ============================================================================
// Request preparation
// ============================================================================

pub(crate) struct Prepared<'a, I: Id> {
    pub ids: Ids<'a, I>,
    pub roster: Roster,
    pub layout: Layout,
    /// Person -> group index they are pinned to.
    pub pins: Vec<Option<usize>>,
}

/// Index the request and resolve groups and fixed-group pins.
pub(crate) fn prepare<'a, I, P, B, C>(
    people: &'a [P],
    balloons: &'a [B],
    cars: &'a [C],
    constraints: &LegConstraints<I>,
    default_weight: u32,
) -> Result<Prepared<'a, I>, RequestError<I>>
where
    I: Id,
    P: Person<Id = I>,
    B: Vehicle<Id = I, PersonId = I>,
    C: Vehicle<Id = I, PersonId = I>,
{
    let (ids, roster) = roster::index_all(people, balloons, cars, default_weight)?;
    let layout = Layout::resolve(&ids, &roster, &constraints.vehicle_groups)?;

    let mut pins = vec![None; roster.members.len()];
    for (person_id, balloon_id) in &constraints.fixed_groups {
        let person = ids.require_person(person_id)?;
        let balloon = ids.require_vehicle(balloon_id)?;
        if !roster.is_balloon(balloon) {
            return Err(RequestError::NotABalloon { vehicle: balloon_id.clone() });
        }
        pins[person] = layout.group_of(balloon);
    }

    Ok(Prepared { ids, roster, layout, pins })
}

/// Seat pre-assignments into the root candidate. Returns the candidate and
/// the vehicles closed to further passengers.
fn pre_assign<I: Id>(
    ids: &Ids<'_, I>,
    roster: &Roster,
    layout: &Layout,
    pins: &[Option<usize>],
    pre_assignments: &HashMap<I, Assignment<I>>,
) -> Result<(Candidate, Vec<bool>), RequestError<I>> {
    let mut ordered = pre_assignments
        .iter()
        .map(|(vehicle_id, assignment)| Ok((ids.require_vehicle(vehicle_id)?, assignment)))
        .collect::<Result<Vec<_>, RequestError<I>>>()?;
    ordered.sort_by_key(|(vehicle, _)| *vehicle);

    let mut candidate = Candidate::empty(roster.crafts.len(), roster.members.len());
    let mut closed = vec![false; roster.crafts.len()];
    let seat = |candidate: &Candidate, vehicle: usize, person_id: &I| -> Result<usize, RequestError<I>> {
        let person = ids.require_person(person_id)?;
        if !candidate.is_available(person) {
            return Err(RequestError::PersonAssignedTwice { person: person_id.clone() });
        }
        if let Some(group) = pins[person] {
            if layout.group_of(vehicle) != Some(group) {
                return Err(RequestError::PinnedElsewhere {
                    person: person_id.clone(),
                    balloon: ids.vehicle_id(layout.groups[group].balloon),
                });
            }
        }
        Ok(person)
    };

    for (vehicle, assignment) in ordered {
        let vehicle_id = ids.vehicle_id(vehicle);
        let craft = &roster.crafts[vehicle];
        closed[vehicle] = true;

        if let Some(operator_id) = &assignment.operator_id {
            let person = seat(&candidate, vehicle, operator_id)?;
            if !craft.operators.contains(&person) {
                return Err(RequestError::OperatorNotAllowed {
                    vehicle: vehicle_id,
                    person: operator_id.clone(),
                });
            }
            candidate.set_operator(vehicle, person, roster.members[person].weight);
        }
        for passenger_id in &assignment.passenger_ids {
            let person = seat(&candidate, vehicle, passenger_id)?;
            candidate.board(vehicle, person, roster.members[person].weight);
        }

        let slot = candidate.slot(vehicle);
        if slot.aboard() > craft.capacity {
            return Err(RequestError::OverCapacity {
                vehicle: vehicle_id,
                aboard: slot.aboard(),
                capacity: craft.capacity,
            });
        }
        if let Some(max_weight) = craft.max_weight.filter(|max| slot.load > *max) {
            return Err(RequestError::OverWeight {
                vehicle: vehicle_id,
                load: slot.load,
                max_weight,
            });
        }
        if let (true, Some(pilot)) = (roster.is_balloon(vehicle), slot.operator) {
            if let Some(&p) = slot.passengers.iter().find(|&&p| !roster.speak_together(pilot, p)) {
                return Err(RequestError::LanguageMismatch {
                    vehicle: vehicle_id,
                    person: ids.person_id(p),
                });
            }
        }
    }

    Ok((candidate, closed))
}

/// Seeded rank per person, fewest flights first with first-timers ahead of
/// people on the same count.
fn tiebreak_priority(roster: &Roster, rng: &mut ChaCha8Rng) -> Vec<u32> {
    let mut order: Vec<usize> = (0..roster.members.len()).collect();
    order.shuffle(rng);
    order.sort_by_key(|&p| {
        let member = &roster.members[p];
        i64::from(member.flights) - i64::from(member.first_time)
    });

    let mut priority = vec![0; order.len()];
    for (rank, p) in order.into_iter().enumerate() {
        priority[p] = rank as u32;
    }
    priority
}

/// Everybody in seeded order, fewest flights first.
fn fill_order(roster: &Roster, rng: &mut ChaCha8Rng) -> Vec<usize> {
    let mut order: Vec<usize> = (0..roster.members.len()).collect();
    order.shuffle(rng);
    order.sort_by_key(|&p| roster.members[p].flights);
    order
}

/// History entries for people or balloons outside this leg are ignored.
fn rotation_counts<I: Id>(ids: &Ids<'_, I>, history: &HashMap<I, Vec<I>>) -> HashMap<(usize, usize), u32> {
    let mut counts = HashMap::new();
    for (person_id, balloon_ids) in history {
        let Some(person) = ids.person(person_id) else { continue };
        for balloon in balloon_ids.iter().filter_map(|b| ids.vehicle(b)) {
            *counts.entry((person, balloon)).or_default() += 1;
        }
    }
    counts
}

/// Symmetric co-flight counts; when both directions are recorded the larger
/// one is used.
fn meeting_counts<I: Id>(
    ids: &Ids<'_, I>,
    history: &HashMap<I, HashMap<I, u32>>,
) -> HashMap<(usize, usize), u32> {
    let mut counts: HashMap<(usize, usize), u32> = HashMap::new();
    for (a_id, met) in history {
        let Some(a) = ids.person(a_id) else { continue };
        for (b_id, &times) in met {
            let Some(b) = ids.person(b_id) else { continue };
            if a == b || times == 0 {
                continue;
            }
            let entry = counts.entry((a.min(b), a.max(b))).or_default();
            *entry = (*entry).max(times);
        }
    }
    counts
}

fn materialize<I: Id>(ids: &Ids<'_, I>, roster: &Roster, winner: &Candidate) -> HashMap<I, Assignment<I>> {
    (0..roster.crafts.len())
        .map(|v| {
            let slot = winner.slot(v);
            let assignment = Assignment {
                operator_id: slot.operator.map(|p| ids.person_id(p)),
                passenger_ids: slot.passengers.iter().map(|&p| ids.person_id(p)).collect(),
            };
            (ids.vehicle_id(v), assignment)
        })
        .collect()
}
