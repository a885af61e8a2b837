//! Solution candidates and the arena that owns them.
//!
//! A candidate is a full seat map for one leg. Branching clones a candidate
//! and mutates the clone. Per-vehicle slots sit behind `Arc` and are copied on
//! write, so a clone only pays for the vehicles it actually changes.

use std::sync::Arc;

use rayon::prelude::*;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Slot {
    pub operator: Option<usize>,
    pub passengers: Vec<usize>,
    /// Combined weight of everyone aboard.
    pub load: u32,
}

impl Slot {
    pub fn aboard(&self) -> u32 {
        self.passengers.len() as u32 + u32::from(self.operator.is_some())
    }

    pub fn occupants(&self) -> impl Iterator<Item = usize> + '_ {
        self.operator.into_iter().chain(self.passengers.iter().copied())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    slots: Vec<Arc<Slot>>,
    seat_of: Arc<Vec<Option<usize>>>,
}

impl Candidate {
    pub fn empty(vehicles: usize, people: usize) -> Self {
        let empty = Arc::new(Slot::default());
        Self {
            slots: vec![empty; vehicles],
            seat_of: Arc::new(vec![None; people]),
        }
    }

    pub fn slot(&self, vehicle: usize) -> &Slot {
        &self.slots[vehicle]
    }

    pub fn slots(&self) -> impl Iterator<Item = (usize, &Slot)> + '_ {
        self.slots.iter().map(|slot| slot.as_ref()).enumerate()
    }

    pub fn seat_of(&self, person: usize) -> Option<usize> {
        self.seat_of[person]
    }

    pub fn is_available(&self, person: usize) -> bool {
        self.seat_of[person].is_none()
    }

    pub fn set_operator(&mut self, vehicle: usize, person: usize, weight: u32) {
        let slot = Arc::make_mut(&mut self.slots[vehicle]);
        debug_assert!(slot.operator.is_none());
        slot.operator = Some(person);
        slot.load += weight;
        Arc::make_mut(&mut self.seat_of)[person] = Some(vehicle);
    }

    pub fn board(&mut self, vehicle: usize, person: usize, weight: u32) {
        let slot = Arc::make_mut(&mut self.slots[vehicle]);
        slot.passengers.push(person);
        slot.load += weight;
        Arc::make_mut(&mut self.seat_of)[person] = Some(vehicle);
    }
}

/// Handle into a [`CandidateArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct CandidateId(u32);

/// Append-only store of every snapshot produced while solving a leg.
#[derive(Debug, Default)]
pub(crate) struct CandidateArena {
    snapshots: Vec<Candidate>,
}

impl CandidateArena {
    pub fn insert(&mut self, candidate: Candidate) -> CandidateId {
        let id = CandidateId(self.snapshots.len() as u32);
        self.snapshots.push(candidate);
        id
    }

    pub fn get(&self, id: CandidateId) -> &Candidate {
        &self.snapshots[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Expand every frontier candidate in parallel.
    ///
    /// `expand` receives the frontier position and the candidate, and returns
    /// the children plus a per-branch note. Children are stored in frontier
    /// order regardless of how the work was scheduled.
    pub fn expand<T, F>(&mut self, frontier: &[CandidateId], expand: F) -> (Vec<CandidateId>, Vec<T>)
    where
        T: Send,
        F: Fn(usize, &Candidate) -> (Vec<Candidate>, T) + Sync,
    {
        let results: Vec<(Vec<Candidate>, T)> = {
            let arena = &*self;
            frontier
                .par_iter()
                .enumerate()
                .map(|(position, id)| expand(position, arena.get(*id)))
                .collect()
        };

        let mut next = Vec::new();
        let mut notes = Vec::with_capacity(results.len());
        for (children, note) in results {
            next.extend(children.into_iter().map(|child| self.insert(child)));
            notes.push(note);
        }
        (next, notes)
    }
}
