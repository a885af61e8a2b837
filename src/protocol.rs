//! JSON wire types.
//!
//! Requests and responses use camelCase field names and string ids. The
//! records implement [`Person`] and [`Vehicle`] so they can be fed to the
//! solvers directly.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::SolveError;
use crate::groups::{self, GroupOptions, VehicleGroup};
use crate::scoring::ScoreBreakdown;
use crate::solver::{self, Assignment, LegConstraints, SolveOptions, StageReport};
use crate::traits::{Person, Role, Vehicle};

/// Balloon id -> car ids.
pub type GroupMap = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonRecord {
    pub id: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub flights_so_far: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nationality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub languages: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_time: Option<bool>,
}

impl Person for PersonRecord {
    type Id = String;

    fn id(&self) -> &String {
        &self.id
    }

    fn role(&self) -> Role {
        self.role
    }

    fn flights_so_far(&self) -> u32 {
        self.flights_so_far
    }

    fn weight(&self) -> Option<u32> {
        self.weight
    }

    fn nationality(&self) -> Option<&str> {
        self.nationality.as_deref()
    }

    fn languages(&self) -> Option<&[String]> {
        self.languages.as_deref()
    }

    fn first_time(&self) -> bool {
        self.first_time.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalloonRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub max_capacity: u32,
    #[serde(default)]
    pub allowed_operator_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_weight: Option<u32>,
}

impl Vehicle for BalloonRecord {
    type Id = String;
    type PersonId = String;

    fn id(&self) -> &String {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn max_capacity(&self) -> u32 {
        self.max_capacity
    }

    fn allowed_operators(&self) -> &[String] {
        &self.allowed_operator_ids
    }

    fn max_weight(&self) -> Option<u32> {
        self.max_weight
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub max_capacity: u32,
    #[serde(default)]
    pub allowed_operator_ids: Vec<String>,
    #[serde(default)]
    pub has_trailer_clutch: bool,
}

impl Vehicle for CarRecord {
    type Id = String;
    type PersonId = String;

    fn id(&self) -> &String {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn max_capacity(&self) -> u32 {
        self.max_capacity
    }

    fn allowed_operators(&self) -> &[String] {
        &self.allowed_operator_ids
    }

    fn has_trailer_clutch(&self) -> bool {
        self.has_trailer_clutch
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildGroupsRequest {
    #[serde(default)]
    pub vehicle_groups: GroupMap,
    pub balloons: Vec<BalloonRecord>,
    pub cars: Vec<CarRecord>,
    #[serde(default)]
    pub people_count: usize,
    /// When given, groups are checked against licences and languages and
    /// `peopleCount` is replaced by the roster size.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub people: Vec<PersonRecord>,
    #[serde(default)]
    pub options: GroupOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildGroupsResponse {
    pub vehicle_groups: GroupMap,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegSolveRequest {
    pub balloons: Vec<BalloonRecord>,
    pub cars: Vec<CarRecord>,
    pub people: Vec<PersonRecord>,
    #[serde(default)]
    pub vehicle_groups: GroupMap,
    #[serde(default)]
    pub pre_assignments: HashMap<String, Assignment<String>>,
    #[serde(default)]
    pub group_history: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub people_meet_history: HashMap<String, HashMap<String, u32>>,
    #[serde(default)]
    pub fixed_groups: HashMap<String, String>,
    #[serde(default)]
    pub options: SolveOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegSolveResponse {
    /// Vehicle id -> assignment, for every vehicle in the request.
    pub assignments: BTreeMap<String, Assignment<String>>,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub score: ScoreBreakdown,
    #[serde(default)]
    pub stages: Vec<StageReport>,
}

/// Structured failure written to stderr by the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_id: Option<String>,
}

impl ErrorReport {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            kind: "MalformedInput".to_owned(),
            message: message.into(),
            vehicle_id: None,
            person_id: None,
        }
    }
}

impl From<&SolveError<String>> for ErrorReport {
    fn from(err: &SolveError<String>) -> Self {
        Self {
            kind: err.kind().to_owned(),
            message: err.to_string(),
            vehicle_id: err.vehicle().cloned(),
            person_id: err.person().cloned(),
        }
    }
}

pub fn groups_from_map(map: &GroupMap) -> Vec<VehicleGroup<String>> {
    map.iter()
        .map(|(balloon_id, car_ids)| VehicleGroup {
            balloon_id: balloon_id.clone(),
            car_ids: car_ids.clone(),
        })
        .collect()
}

pub fn groups_to_map(groups: Vec<VehicleGroup<String>>) -> GroupMap {
    groups
        .into_iter()
        .map(|group| (group.balloon_id, group.car_ids))
        .collect()
}

pub fn build_groups(request: &BuildGroupsRequest) -> Result<BuildGroupsResponse, SolveError<String>> {
    let existing = groups_from_map(&request.vehicle_groups);
    let groups = if request.people.is_empty() {
        groups::build_vehicle_groups(
            &request.balloons,
            &request.cars,
            &existing,
            request.people_count,
            &request.options,
        )?
    } else {
        groups::build_crew_groups(&request.people, &request.balloons, &request.cars, &existing, &request.options)?
    };
    Ok(BuildGroupsResponse {
        vehicle_groups: groups_to_map(groups),
    })
}

pub fn solve_leg(request: &LegSolveRequest) -> Result<LegSolveResponse, SolveError<String>> {
    let constraints = LegConstraints {
        vehicle_groups: groups_from_map(&request.vehicle_groups),
        pre_assignments: request.pre_assignments.clone(),
        group_history: request.group_history.clone(),
        meet_history: request.people_meet_history.clone(),
        fixed_groups: request.fixed_groups.clone(),
    };
    let solution = solver::solve_leg(
        &request.people,
        &request.balloons,
        &request.cars,
        &constraints,
        request.options.clone(),
    )?;

    Ok(LegSolveResponse {
        assignments: solution.assignments.into_iter().collect(),
        seed: solution.seed,
        score: solution.score,
        stages: solution.stages,
    })
}
