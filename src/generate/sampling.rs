//! Sampling strategies: how one configuration after another is produced

use std::collections::HashSet;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::{Configuration, FleetParams};

/// Consecutive duplicate draws after which a random sequence is considered exhausted
const MAX_CONSECUTIVE_DUPLICATES: usize = 1000;

/// How configurations are drawn from the space of valid deployments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Sampling {
    /// Every valid configuration, in odometer order (later periods vary fastest)
    Exhaustive,
    /// Uniformly random per-period deployments, without repeats
    Random { seed: u64 },
    /// A random period 0, with every later period reached from the previous one by
    /// moving single ambulances, never changing a zone by more than `max_shift`
    Drift { seed: u64, max_shift: u32 },
}
impl Default for Sampling {
    fn default() -> Self {
        Sampling::Random { seed: 0 }
    }
}

/// Steps through the compositions of `total` into `parts` ordered non-negative parts
#[derive(Debug, Clone)]
pub(crate) struct CompositionCounter {
    total: u32,
    current: Vec<u32>,
}
impl CompositionCounter {
    pub fn new(total: u32, parts: usize) -> Self {
        let mut current = vec![0; parts];
        current[0] = total;
        Self { total, current }
    }

    pub fn current(&self) -> &[u32] {
        &self.current
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.total, self.current.len());
    }

    /// Moves to the next composition, returning false once all have been visited
    pub fn advance(&mut self) -> bool {
        let parts = self.current.len();
        if self.current[parts - 1] == self.total {
            return false;
        }
        // UNWRAP: the last part is below the total, so an earlier part is non-zero
        let i = self.current.iter().position(|&c| c > 0).unwrap();
        let value = self.current[i];
        self.current[i] = 0;
        self.current[0] = value - 1;
        self.current[i + 1] += 1;
        true
    }
}

/// A uniformly random composition of `total` into `parts`, by stars and bars
fn random_composition(rng: &mut fastrand::Rng, total: u32, parts: usize) -> Vec<u32> {
    let slots = total as usize + parts - 1;
    let mut bars_needed = parts - 1;
    let mut composition = vec![0; parts];
    let mut part = 0;
    // Selection sampling picks which slots hold bars, in order
    for slot in 0..slots {
        if bars_needed > 0 && rng.usize(0..slots - slot) < bars_needed {
            bars_needed -= 1;
            part += 1;
        } else {
            composition[part] += 1;
        }
    }
    composition
}

/// The shared shape of every strategy's output
#[derive(Debug, Clone)]
struct Layout {
    zones: usize,
    origins: Vec<usize>,
    fleet: FleetParams,
}
impl Layout {
    /// Ambulances left to distribute freely over the origins in period 0
    fn free_at_origin(&self) -> u32 {
        self.fleet.ambulances - self.fleet.effective_min_per_base() * self.origins.len() as u32
    }

    fn place_origin(&self, counts: &mut Array2<u32>, composition: &[u32]) {
        for (&zone, &c) in self.origins.iter().zip(composition) {
            counts[[zone, 0]] = c + self.fleet.effective_min_per_base();
        }
    }

    fn finish(&self, counts: Array2<u32>) -> Configuration {
        // UNWRAP: every strategy distributes exactly the fleet in every period
        Configuration::new(counts, self.fleet.ambulances).unwrap()
    }

    fn random_origin(&self, rng: &mut fastrand::Rng, counts: &mut Array2<u32>) {
        let composition = random_composition(rng, self.free_at_origin(), self.origins.len());
        self.place_origin(counts, &composition);
    }
}

#[derive(Debug, Clone)]
enum State {
    Exhaustive { counters: Vec<CompositionCounter>, started: bool, done: bool },
    Random { rng: fastrand::Rng, seen: HashSet<Array2<u32>> },
    Drift { rng: fastrand::Rng, max_shift: u32, seen: HashSet<Array2<u32>> },
}

/// A lazy sequence of distinct configurations, see [`Sampling`]
#[derive(Debug, Clone)]
pub struct Configurations {
    layout: Layout,
    state: State,
}
impl Configurations {
    pub(crate) fn new(sampling: Sampling, zones: usize, origins: Vec<usize>, fleet: FleetParams) -> Self {
        let layout = Layout { zones, origins, fleet };
        let state = match sampling {
            Sampling::Exhaustive => {
                let mut counters = vec![CompositionCounter::new(layout.free_at_origin(), layout.origins.len())];
                counters.extend((1..fleet.periods).map(|_| CompositionCounter::new(fleet.ambulances, zones)));
                State::Exhaustive { counters, started: false, done: false }
            }
            Sampling::Random { seed } => State::Random { rng: fastrand::Rng::with_seed(seed), seen: HashSet::new() },
            Sampling::Drift { seed, max_shift } => State::Drift {
                rng: fastrand::Rng::with_seed(seed), max_shift, seen: HashSet::new(),
            },
        };
        Self { layout, state }
    }
}

impl Iterator for Configurations {
    type Item = Configuration;

    fn next(&mut self) -> Option<Self::Item> {
        let layout = &self.layout;
        let (zones, periods) = (layout.zones, layout.fleet.periods);
        match &mut self.state {
            State::Exhaustive { counters, started, done } => {
                if *done {return None};
                if *started {
                    // Odometer step: the last period varies fastest
                    let mut advanced = false;
                    for counter in counters.iter_mut().rev() {
                        if counter.advance() {
                            advanced = true;
                            break;
                        }
                        counter.reset();
                    }
                    if !advanced {
                        *done = true;
                        return None;
                    }
                }
                *started = true;
                let mut counts = Array2::zeros((zones, periods));
                layout.place_origin(&mut counts, counters[0].current());
                for (p, counter) in counters.iter().enumerate().skip(1) {
                    for (z, &c) in counter.current().iter().enumerate() {
                        counts[[z, p]] = c;
                    }
                }
                Some(layout.finish(counts))
            }
            State::Random { rng, seen } => {
                for _ in 0..MAX_CONSECUTIVE_DUPLICATES {
                    let mut counts = Array2::zeros((zones, periods));
                    layout.random_origin(rng, &mut counts);
                    for p in 1..periods {
                        let composition = random_composition(rng, layout.fleet.ambulances, zones);
                        for (z, c) in composition.into_iter().enumerate() {
                            counts[[z, p]] = c;
                        }
                    }
                    if seen.insert(counts.clone()) {
                        return Some(layout.finish(counts));
                    }
                }
                None
            }
            State::Drift { rng, max_shift, seen } => {
                for _ in 0..MAX_CONSECUTIVE_DUPLICATES {
                    let mut counts = Array2::zeros((zones, periods));
                    layout.random_origin(rng, &mut counts);
                    for p in 1..periods {
                        let previous = counts.column(p - 1).to_vec();
                        let mut current = previous.clone();
                        let transfers = rng.usize(0..=layout.fleet.ambulances as usize);
                        for _ in 0..transfers {
                            if zones < 2 {break};
                            let (from, to) = (rng.usize(0..zones), rng.usize(0..zones));
                            // A zone may drop or gain at most `max_shift` relative to the last period
                            let can_leave = current[from] > 0 && current[from].saturating_add(*max_shift) > previous[from];
                            let can_arrive = current[to] < previous[to].saturating_add(*max_shift);
                            if from == to || !can_leave || !can_arrive {continue};
                            current[from] -= 1;
                            current[to] += 1;
                        }
                        for (z, c) in current.into_iter().enumerate() {
                            counts[[z, p]] = c;
                        }
                    }
                    if seen.insert(counts.clone()) {
                        return Some(layout.finish(counts));
                    }
                }
                None
            }
        }
    }
}
