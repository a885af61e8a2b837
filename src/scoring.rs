//! Soft objectives.
//!
//! The score of a candidate is a weighted sum over a flat list of named terms.
//! Higher is better. Terms read the fully seated candidate; hard rules are
//! never scored, they are filtered out beforehand.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::candidate::Candidate;
use crate::groups::Layout;
use crate::roster::Roster;
use crate::solver::{PilotDispersion, SolveOptions};

/// Per-term contribution to the score of the selected candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TermScore {
    pub name: String,
    pub weight: i32,
    /// Unweighted value of the term.
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub total: f64,
    pub terms: Vec<TermScore>,
}

/// Everything the terms need besides the candidate itself.
#[derive(Debug)]
pub(crate) struct ScoreContext<'a> {
    pub roster: &'a Roster,
    pub layout: &'a Layout,
    pub options: &'a SolveOptions,
    /// Seeded priority per person; 0 is the most deserving.
    pub priority: Vec<u32>,
    /// (person, balloon) -> legs flown in that balloon's group.
    pub rotation: HashMap<(usize, usize), u32>,
    /// (lower index, higher index) -> previous co-flights.
    pub meetings: HashMap<(usize, usize), u32>,
    /// Group -> which people count towards its lookahead target.
    lookahead: Vec<Vec<bool>>,
}

impl<'a> ScoreContext<'a> {
    pub fn new(
        roster: &'a Roster,
        layout: &'a Layout,
        options: &'a SolveOptions,
        priority: Vec<u32>,
        rotation: HashMap<(usize, usize), u32>,
        meetings: HashMap<(usize, usize), u32>,
    ) -> Self {
        let lookahead = lookahead_pools(roster, layout, options.planning_horizon_depth);
        Self {
            roster,
            layout,
            options,
            priority,
            rotation,
            meetings,
            lookahead,
        }
    }

    fn met(&self, a: usize, b: usize) -> u32 {
        let key = if a < b { (a, b) } else { (b, a) };
        self.meetings.get(&key).copied().unwrap_or_default()
    }
}

type Eval = fn(&ScoreContext<'_>, &Candidate) -> f64;

#[derive(Clone, Copy)]
pub(crate) struct Term {
    pub name: &'static str,
    pub weight: i32,
    eval: Eval,
}

impl std::fmt::Debug for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Term")
            .field("name", &self.name)
            .field("weight", &self.weight)
            .finish()
    }
}

/// Active terms for a leg. Terms with zero weight are left out, and the
/// group balance and rotation terms only apply when nobody is pinned.
pub(crate) fn terms(options: &SolveOptions, pinned: bool) -> Vec<Term> {
    let all: [(&'static str, i32, Eval); 10] = [
        ("supervisor_flights", options.supervisor_flights, supervisor_flights),
        ("pilot_fairness", options.pilot_fairness, pilot_fairness),
        ("passenger_fairness", options.passenger_fairness, passenger_fairness),
        ("tiebreak_fairness", options.tiebreak_fairness, tiebreak_fairness),
        ("no_solo_participant", options.no_solo_participant, no_solo_participant),
        ("diverse_nationalities", options.diverse_nationalities, diverse_nationalities),
        ("group_passenger_balance", options.group_passenger_balance, group_passenger_balance),
        ("group_rotation", options.group_rotation, group_rotation),
        ("meeting_new_people", options.meeting_new_people, meeting_new_people),
        ("low_flights_lookahead", options.low_flights_lookahead, low_flights_lookahead),
    ];

    all.into_iter()
        .filter(|&(name, weight, _)| {
            weight != 0
                && !(pinned && matches!(name, "group_passenger_balance" | "group_rotation"))
                && !(name == "low_flights_lookahead" && options.planning_horizon_depth == 0)
        })
        .map(|(name, weight, eval)| Term { name, weight, eval })
        .collect()
}

pub(crate) fn score(ctx: &ScoreContext<'_>, terms: &[Term], candidate: &Candidate) -> f64 {
    terms
        .iter()
        .map(|term| f64::from(term.weight) * (term.eval)(ctx, candidate))
        .sum()
}

pub(crate) fn breakdown(ctx: &ScoreContext<'_>, terms: &[Term], candidate: &Candidate) -> ScoreBreakdown {
    let terms: Vec<TermScore> = terms
        .iter()
        .map(|term| TermScore {
            name: term.name.to_owned(),
            weight: term.weight,
            value: (term.eval)(ctx, candidate),
        })
        .collect();
    ScoreBreakdown {
        total: terms.iter().map(|t| f64::from(t.weight) * t.value).sum(),
        terms,
    }
}

// ============================================================================
// Terms
// ============================================================================

fn balloon_passengers(ctx: &ScoreContext<'_>, candidate: &Candidate) -> Vec<usize> {
    ctx.layout
        .balloons()
        .flat_map(|b| candidate.slot(b).passengers.iter().copied())
        .collect()
}

fn supervisor_flights(ctx: &ScoreContext<'_>, candidate: &Candidate) -> f64 {
    balloon_passengers(ctx, candidate)
        .into_iter()
        .filter(|&p| ctx.roster.members[p].is_supervisor())
        .count() as f64
}

/// Mean absolute flight difference over all pairs of pilots.
fn pilot_fairness(ctx: &ScoreContext<'_>, candidate: &Candidate) -> f64 {
    let flights: Vec<i64> = ctx
        .layout
        .balloons()
        .filter_map(|b| candidate.slot(b).operator)
        .map(|p| i64::from(ctx.roster.members[p].flights))
        .collect();
    if flights.len() < 2 {
        return 0.0;
    }

    let mut total = 0;
    let mut pairs = 0;
    for (i, a) in flights.iter().enumerate() {
        for b in &flights[i + 1..] {
            total += (a - b).abs();
            pairs += 1;
        }
    }
    let dispersion = total as f64 / pairs as f64;

    match ctx.options.pilot_dispersion {
        PilotDispersion::Minimize => -dispersion,
        PilotDispersion::Legacy => dispersion,
    }
}

fn passenger_fairness(ctx: &ScoreContext<'_>, candidate: &Candidate) -> f64 {
    let members = &ctx.roster.members;
    let max_flights = members.iter().map(|m| m.flights).max().unwrap_or_default() + 1;
    let discount = ctx.options.counselor_flight_discount;

    balloon_passengers(ctx, candidate)
        .into_iter()
        .map(|p| {
            let member = &members[p];
            let mut bonus = i64::from(max_flights - member.flights);
            if member.flights == 0 && member.first_time {
                bonus += 1;
            }
            if member.counselor {
                bonus = (bonus - i64::from(discount)).max(0);
            }
            bonus as f64
        })
        .sum()
}

fn tiebreak_fairness(ctx: &ScoreContext<'_>, candidate: &Candidate) -> f64 {
    let roster_size = ctx.priority.len().max(1) as f64;
    let ranks: u64 = balloon_passengers(ctx, candidate)
        .into_iter()
        .map(|p| u64::from(ctx.priority[p]))
        .sum();
    -(ranks as f64) / roster_size
}

fn no_solo_participant(ctx: &ScoreContext<'_>, candidate: &Candidate) -> f64 {
    let solo = ctx
        .layout
        .grouped_cars()
        .filter(|&car| {
            candidate
                .slot(car)
                .occupants()
                .filter(|&p| !ctx.roster.members[p].counselor)
                .count()
                == 1
        })
        .count();
    -(solo as f64)
}

fn diverse_nationalities(ctx: &ScoreContext<'_>, candidate: &Candidate) -> f64 {
    let mut minority = 0;
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for (_, slot) in candidate.slots() {
        counts.clear();
        for p in slot.occupants() {
            if let Some(nationality) = ctx.roster.members[p].nationality.as_deref() {
                *counts.entry(nationality).or_default() += 1;
            }
        }
        let known: u32 = counts.values().sum();
        let majority = counts.values().copied().max().unwrap_or_default();
        minority += known - majority;
    }
    f64::from(minority)
}

/// Distance of every group's ground crew from the even split of everybody
/// who cannot fly.
fn group_passenger_balance(ctx: &ScoreContext<'_>, candidate: &Candidate) -> f64 {
    let groups = &ctx.layout.groups;
    if groups.is_empty() {
        return 0.0;
    }
    let airborne: i64 = groups
        .iter()
        .map(|g| i64::from(ctx.roster.crafts[g.balloon].capacity))
        .sum();
    let average = (ctx.roster.members.len() as i64 - airborne).div_euclid(groups.len() as i64);

    let deviation: i64 = groups
        .iter()
        .map(|g| {
            let ground: i64 = g.cars.iter().map(|&car| i64::from(candidate.slot(car).aboard())).sum();
            (ground - average).abs()
        })
        .sum();
    -(deviation as f64)
}

fn group_rotation(ctx: &ScoreContext<'_>, candidate: &Candidate) -> f64 {
    ctx.layout
        .groups
        .iter()
        .map(|group| {
            std::iter::once(group.balloon)
                .chain(group.cars.iter().copied())
                .flat_map(|v| candidate.slot(v).passengers.iter().copied())
                .map(|p| {
                    let times = ctx.rotation.get(&(p, group.balloon)).copied().unwrap_or_default();
                    1.0 / (1.0 + f64::from(times))
                })
                .sum::<f64>()
        })
        .sum()
}

fn meeting_new_people(ctx: &ScoreContext<'_>, candidate: &Candidate) -> f64 {
    if ctx.meetings.is_empty() {
        return 0.0;
    }
    let mut repeats = 0u64;
    for (_, slot) in candidate.slots() {
        let aboard: Vec<usize> = slot.occupants().collect();
        for (i, &a) in aboard.iter().enumerate() {
            for &b in &aboard[i + 1..] {
                repeats += u64::from(ctx.met(a, b));
            }
        }
    }
    -(repeats as f64)
}

/// Keeps enough low-flight people in each group's cars to fill its balloon
/// over the next legs.
fn low_flights_lookahead(ctx: &ScoreContext<'_>, candidate: &Candidate) -> f64 {
    let depth = ctx.options.planning_horizon_depth;
    let short: u64 = ctx
        .layout
        .groups
        .iter()
        .zip(&ctx.lookahead)
        .map(|(group, pool)| {
            let target = u64::from(depth) * u64::from(ctx.roster.crafts[group.balloon].capacity);
            let present = group
                .cars
                .iter()
                .flat_map(|&car| candidate.slot(car).occupants())
                .filter(|&p| pool[p])
                .count() as u64;
            target.saturating_sub(present)
        })
        .sum();
    -(short as f64)
}

/// People with few enough flights to fly within `depth` legs who can also
/// talk to at least one licensed pilot of the group's balloon.
fn lookahead_pools(roster: &Roster, layout: &Layout, depth: u32) -> Vec<Vec<bool>> {
    if depth == 0 || roster.members.is_empty() {
        return vec![Vec::new(); layout.groups.len()];
    }

    let seats: usize = layout
        .balloons()
        .map(|b| roster.crafts[b].capacity as usize)
        .sum::<usize>()
        * depth as usize;
    let mut flights: Vec<u32> = roster.members.iter().map(|m| m.flights).collect();
    flights.sort_unstable();
    let cutoff = match seats {
        0 => None,
        n if n >= flights.len() => flights.last().copied(),
        n => Some(flights[n - 1]),
    };

    layout
        .groups
        .iter()
        .map(|group| {
            let pilots = &roster.crafts[group.balloon].operators;
            (0..roster.members.len())
                .map(|p| {
                    let low = cutoff.is_some_and(|c| roster.members[p].flights <= c);
                    low && (roster.members[p].languages.is_none()
                        || pilots.iter().any(|&q| roster.speak_together(p, q)))
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::{Craft, Member};
    use crate::traits::VehicleKind;

    fn member(flights: u32, counselor: bool) -> Member {
        Member {
            flights,
            counselor,
            first_time: flights == 0,
            weight: 80,
            nationality: None,
            languages: None,
        }
    }

    fn two_balloons(members: Vec<Member>) -> (Roster, Layout) {
        let crafts = vec![
            Craft { kind: VehicleKind::Balloon, capacity: 3, max_weight: None, trailer: false, operators: vec![] },
            Craft { kind: VehicleKind::Balloon, capacity: 3, max_weight: None, trailer: false, operators: vec![] },
            Craft { kind: VehicleKind::Car, capacity: 4, max_weight: None, trailer: false, operators: vec![] },
        ];
        let roster = Roster { members, crafts, balloons: vec![0, 1], cars: vec![2] };
        let mut layout = Layout::ungrouped(&roster);
        layout.add_car(0, 2);
        (roster, layout)
    }

    fn context<'a>(roster: &'a Roster, layout: &'a Layout, options: &'a SolveOptions) -> ScoreContext<'a> {
        let priority = (0..roster.members.len() as u32).collect();
        ScoreContext::new(roster, layout, options, priority, HashMap::new(), HashMap::new())
    }

    #[test]
    fn pilot_dispersion_sign_follows_the_mode() {
        let (roster, layout) = two_balloons(vec![member(1, false), member(5, false)]);
        let mut candidate = Candidate::empty(3, 2);
        candidate.set_operator(0, 0, 80);
        candidate.set_operator(1, 1, 80);

        let minimize = SolveOptions::default();
        let legacy = SolveOptions { pilot_dispersion: PilotDispersion::Legacy, ..SolveOptions::default() };

        assert_eq!(pilot_fairness(&context(&roster, &layout, &minimize), &candidate), -4.0);
        assert_eq!(pilot_fairness(&context(&roster, &layout, &legacy), &candidate), 4.0);
    }

    #[test]
    fn counselors_get_a_smaller_passenger_bonus() {
        let (roster, layout) = two_balloons(vec![member(3, false), member(1, false), member(1, true)]);
        let options = SolveOptions::default();
        let ctx = context(&roster, &layout, &options);

        let mut participant = Candidate::empty(3, 3);
        participant.board(0, 1, 80);
        let mut counselor = Candidate::empty(3, 3);
        counselor.board(0, 2, 80);

        // max flights is 3 + 1; counselors lose the default discount of 2
        assert_eq!(passenger_fairness(&ctx, &participant), 3.0);
        assert_eq!(passenger_fairness(&ctx, &counselor), 1.0);
    }

    #[test]
    fn solo_participant_in_a_car_is_penalised() {
        let (roster, layout) = two_balloons(vec![member(0, true), member(0, false), member(0, false)]);
        let options = SolveOptions::default();
        let ctx = context(&roster, &layout, &options);

        let mut solo = Candidate::empty(3, 3);
        solo.set_operator(2, 0, 80);
        solo.board(2, 1, 80);
        let mut pair = solo.clone();
        pair.board(2, 2, 80);

        assert_eq!(no_solo_participant(&ctx, &solo), -1.0);
        assert_eq!(no_solo_participant(&ctx, &pair), 0.0);
    }

    #[test]
    fn minority_nationalities_are_counted_per_vehicle() {
        let mut members = vec![member(0, false), member(0, false), member(0, false), member(0, false)];
        members[0].nationality = Some("de".into());
        members[1].nationality = Some("de".into());
        members[2].nationality = Some("fr".into());
        let (roster, layout) = two_balloons(members);
        let options = SolveOptions::default();
        let ctx = context(&roster, &layout, &options);

        let mut candidate = Candidate::empty(3, 4);
        for p in 0..4 {
            candidate.board(2, p, 80);
        }

        assert_eq!(diverse_nationalities(&ctx, &candidate), 1.0);
    }

    #[test]
    fn repeat_meetings_cost_their_history() {
        let (roster, layout) = two_balloons(vec![member(0, false), member(0, false), member(0, false)]);
        let options = SolveOptions::default();
        let mut ctx = context(&roster, &layout, &options);
        ctx.meetings.insert((0, 2), 3);

        let mut candidate = Candidate::empty(3, 3);
        candidate.board(0, 2, 80);
        candidate.board(0, 0, 80);
        candidate.board(1, 1, 80);

        assert_eq!(meeting_new_people(&ctx, &candidate), -3.0);
    }

    #[test]
    fn pinned_legs_skip_group_terms() {
        let options = SolveOptions::default();

        let names: Vec<&str> = terms(&options, true).iter().map(|t| t.name).collect();

        assert!(!names.contains(&"group_passenger_balance"));
        assert!(!names.contains(&"group_rotation"));
        assert!(!names.contains(&"low_flights_lookahead"));
        assert!(names.contains(&"pilot_fairness"));
    }

    #[test]
    fn lookahead_counts_missing_low_flight_crew() {
        let (roster, layout) = two_balloons(vec![member(0, false), member(0, false), member(9, false), member(9, false)]);
        let options = SolveOptions { planning_horizon_depth: 1, ..SolveOptions::default() };
        let ctx = context(&roster, &layout, &options);

        let mut candidate = Candidate::empty(3, 4);
        candidate.board(2, 0, 80);
        candidate.board(2, 2, 80);

        // six future seats let everybody count as low-flight; group 0 has
        // two of three, group 1 has no cars at all
        assert_eq!(low_flights_lookahead(&ctx, &candidate), -4.0);
    }

    #[test]
    fn later_priorities_cost_more() {
        let (roster, layout) = two_balloons(vec![member(1, false), member(1, false), member(1, false)]);
        let options = SolveOptions::default();
        let ctx = context(&roster, &layout, &options);

        let mut first = Candidate::empty(3, 3);
        first.board(0, 0, 80);
        let mut last = Candidate::empty(3, 3);
        last.board(0, 1, 80);
        last.board(1, 2, 80);

        assert_eq!(tiebreak_fairness(&ctx, &first), 0.0);
        // ranks 1 + 2 over a roster of 3
        assert_eq!(tiebreak_fairness(&ctx, &last), -1.0);
    }

    #[test]
    fn ground_crews_are_measured_against_the_even_split() {
        let (roster, layout) = two_balloons((0..8).map(|_| member(1, false)).collect());
        let options = SolveOptions::default();
        let ctx = context(&roster, &layout, &options);

        let mut candidate = Candidate::empty(3, 8);
        candidate.set_operator(2, 0, 80);
        candidate.board(2, 1, 80);

        // (8 - 6 balloon seats) / 2 groups = 1 each; group 0 has 2, group 1 none
        assert_eq!(group_passenger_balance(&ctx, &candidate), -2.0);
    }

    #[test]
    fn rotation_favours_balloons_not_flown_with_before() {
        let (roster, layout) = two_balloons((0..4).map(|_| member(1, false)).collect());
        let options = SolveOptions::default();
        let mut ctx = context(&roster, &layout, &options);
        ctx.rotation.insert((0, 0), 1);

        let mut candidate = Candidate::empty(3, 4);
        candidate.board(0, 0, 80);
        candidate.board(2, 1, 80);
        candidate.board(1, 2, 80);
        candidate.set_operator(2, 3, 80);

        // person 0 already flew with balloon 0; the driver does not count
        assert_eq!(group_rotation(&ctx, &candidate), 2.5);
    }
}
