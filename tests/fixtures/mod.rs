//! Test fixtures for crew-planner.
//!
//! Builders for people, balloons and cars with sensible defaults, plus a
//! seeded random roster generator for property tests.

#![allow(dead_code)]

use std::fmt;

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crew_planner::traits::{Person, Role, Vehicle};

#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct TestId(pub String);

impl TestId {
    pub fn new(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn id(s: &str) -> TestId {
    TestId::new(s)
}

fn ids(list: &[&str]) -> Vec<TestId> {
    list.iter().map(|s| TestId::new(s)).collect()
}

// ============================================================================
// People
// ============================================================================

/// Builder for test people. Defaults to a participant with one flight.
#[derive(Clone, Debug)]
pub struct TestPerson {
    pub id: TestId,
    pub role: Role,
    pub flights: u32,
    pub weight: Option<u32>,
    pub nationality: Option<String>,
    pub languages: Option<Vec<String>>,
    pub first_time: bool,
}

impl TestPerson {
    pub fn new(id: &str) -> Self {
        Self {
            id: TestId::new(id),
            role: Role::Participant,
            flights: 1,
            weight: None,
            nationality: None,
            languages: None,
            first_time: false,
        }
    }

    pub fn counselor(mut self) -> Self {
        self.role = Role::Counselor;
        self
    }

    pub fn flights(mut self, flights: u32) -> Self {
        self.flights = flights;
        self
    }

    pub fn weight(mut self, weight: u32) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn nationality(mut self, nationality: &str) -> Self {
        self.nationality = Some(nationality.to_string());
        self
    }

    pub fn languages(mut self, languages: &[&str]) -> Self {
        self.languages = Some(languages.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn first_time(mut self) -> Self {
        self.flights = 0;
        self.first_time = true;
        self
    }
}

impl Person for TestPerson {
    type Id = TestId;

    fn id(&self) -> &TestId {
        &self.id
    }

    fn role(&self) -> Role {
        self.role
    }

    fn flights_so_far(&self) -> u32 {
        self.flights
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
        self.first_time
    }
}

// ============================================================================
// Vehicles
// ============================================================================

#[derive(Clone, Debug)]
pub struct TestBalloon {
    pub id: TestId,
    pub capacity: u32,
    pub operators: Vec<TestId>,
    pub max_weight: Option<u32>,
}

impl TestBalloon {
    pub fn new(id: &str) -> Self {
        Self {
            id: TestId::new(id),
            capacity: 4,
            operators: Vec::new(),
            max_weight: None,
        }
    }

    pub fn capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn operators(mut self, operators: &[&str]) -> Self {
        self.operators = ids(operators);
        self
    }

    pub fn max_weight(mut self, max_weight: u32) -> Self {
        self.max_weight = Some(max_weight);
        self
    }
}

impl Vehicle for TestBalloon {
    type Id = TestId;
    type PersonId = TestId;

    fn id(&self) -> &TestId {
        &self.id
    }

    fn name(&self) -> &str {
        &self.id.0
    }

    fn max_capacity(&self) -> u32 {
        self.capacity
    }

    fn allowed_operators(&self) -> &[TestId] {
        &self.operators
    }

    fn max_weight(&self) -> Option<u32> {
        self.max_weight
    }
}

#[derive(Clone, Debug)]
pub struct TestCar {
    pub id: TestId,
    pub capacity: u32,
    pub operators: Vec<TestId>,
    pub trailer: bool,
}

impl TestCar {
    pub fn new(id: &str) -> Self {
        Self {
            id: TestId::new(id),
            capacity: 5,
            operators: Vec::new(),
            trailer: false,
        }
    }

    pub fn capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn operators(mut self, operators: &[&str]) -> Self {
        self.operators = ids(operators);
        self
    }

    pub fn trailer(mut self) -> Self {
        self.trailer = true;
        self
    }
}

impl Vehicle for TestCar {
    type Id = TestId;
    type PersonId = TestId;

    fn id(&self) -> &TestId {
        &self.id
    }

    fn name(&self) -> &str {
        &self.id.0
    }

    fn max_capacity(&self) -> u32 {
        self.capacity
    }

    fn allowed_operators(&self) -> &[TestId] {
        &self.operators
    }

    fn has_trailer_clutch(&self) -> bool {
        self.trailer
    }
}

// ============================================================================
// Random rosters
// ============================================================================

/// A solvable random leg: every balloon and car has at least one licensed
/// operator of its own and the fleet seats everybody.
pub struct RandomLeg {
    pub people: Vec<TestPerson>,
    pub balloons: Vec<TestBalloon>,
    pub cars: Vec<TestCar>,
}

pub fn random_leg(rng: &mut ChaCha8Rng) -> RandomLeg {
    let balloon_count = rng.gen_range(1..=3);
    let mut people = Vec::new();
    let mut balloons = Vec::new();
    let mut cars = Vec::new();

    for b in 0..balloon_count {
        let pilot = format!("pilot{b}");
        people.push(TestPerson::new(&pilot).flights(rng.gen_range(0..6)));
        let capacity = rng.gen_range(2..=5);
        balloons.push(TestBalloon::new(&format!("b{b}")).capacity(capacity).operators(&[&pilot]));

        let driver = format!("driver{b}");
        people.push(TestPerson::new(&driver).counselor().flights(rng.gen_range(1..6)));
        cars.push(TestCar::new(&format!("c{b}")).capacity(capacity + 1 + rng.gen_range(0..4)).operators(&[&driver]));
    }

    // every car keeps its balloon's seats free, so the cars alone bound the roster
    let seats: u32 = cars.iter().map(|c| c.capacity).sum();
    let extra = rng.gen_range(0..=(seats as usize - people.len()));
    for p in 0..extra {
        let mut person = TestPerson::new(&format!("p{p}")).flights(rng.gen_range(0..4));
        if rng.gen_bool(0.2) {
            person = person.counselor();
        }
        if rng.gen_bool(0.3) {
            person = person.nationality(if rng.gen_bool(0.5) { "de" } else { "fr" });
        }
        people.push(person);
    }

    RandomLeg { people, balloons, cars }
}
