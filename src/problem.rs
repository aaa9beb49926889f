//! This module contains the static description of an instance: the `InstanceDescription`
//! read from disk, and the validated `ZoneGraph` every other component borrows immutably.

use std::collections::HashMap;

use itertools::Itertools;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::{error::InstanceError, evaluate::shortest_paths};

/// A zone as written in an instance file
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ZoneDescription {
    /// Unique name, used by edges to refer to this zone
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    /// Whether ambulances may start from this zone
    #[serde(default)]
    pub base: bool,
}

/// An undirected connection between two zones
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct EdgeDescription {
    pub from: String,
    pub to: String,
    /// Travel distance; defaults to the Euclidean distance between the endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

/// A description of an allocation instance, agnostic of how it was produced
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct InstanceDescription {
    /// An optional full distance matrix, overriding shortest paths over `edges`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distances: Option<Vec<Vec<f64>>>,
    pub zones: Vec<ZoneDescription>,
    #[serde(default)]
    pub edges: Vec<EdgeDescription>,
}

/// A zone of the validated graph
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Zone {
    pub name: String,
    pub position: Option<[f64; 2]>,
    pub is_base: bool,
}

/// The zones, their adjacency and the cached shortest-path distances between them.
/// Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneGraph {
    zones: Vec<Zone>,
    adjacency: Vec<Vec<usize>>,
    distances: Array2<f64>,
}
impl ZoneGraph {
    /// Validates a description and precomputes all-pairs distances
    pub fn new(description: InstanceDescription) -> Result<Self, InstanceError> {
        if description.zones.is_empty() {
            return Err(InstanceError::NoZones);
        }
        let mut index = HashMap::with_capacity(description.zones.len());
        for (i, zone) in description.zones.iter().enumerate() {
            if index.insert(zone.name.as_str(), i).is_some() {
                return Err(InstanceError::DuplicateZone(zone.name.clone()));
            }
        }
        let zones = description.zones.iter().map(|z| Zone {
            name: z.name.clone(),
            position: z.x.zip(z.y).map(|(x, y)| [x, y]),
            is_base: z.base,
        }).collect_vec();

        let n = zones.len();
        let mut adjacency = vec![vec![]; n];
        let mut weighted_edges = Vec::with_capacity(description.edges.len());
        for edge in &description.edges {
            let lookup = |name: &str| index.get(name).copied().ok_or_else(|| InstanceError::UnknownZone(name.to_string()));
            let (a, b) = (lookup(&edge.from)?, lookup(&edge.to)?);
            let weight = match edge.weight {
                Some(w) => w,
                None => match (zones[a].position, zones[b].position) {
                    (Some(p), Some(q)) => ((p[0] - q[0]).powi(2) + (p[1] - q[1]).powi(2)).sqrt(),
                    _ => return Err(InstanceError::MissingCoordinates { from: edge.from.clone(), to: edge.to.clone() }),
                }
            };
            if !weight.is_finite() || weight < 0.0 {
                return Err(InstanceError::InvalidWeight { from: edge.from.clone(), to: edge.to.clone(), weight });
            }
            if a == b {continue};
            adjacency[a].push(b);
            adjacency[b].push(a);
            weighted_edges.push((a, b, weight));
        }
        for neighbours in &mut adjacency {
            neighbours.sort_unstable();
            neighbours.dedup();
        }

        let distances = match description.distances {
            Some(rows) => {
                if rows.len() != n || rows.iter().any(|r| r.len() != n) {
                    let cols = rows.iter().map(|r| r.len()).find(|&l| l != n).unwrap_or(n);
                    return Err(InstanceError::DistanceShape { expected: n, rows: rows.len(), cols });
                }
                for (i, row) in rows.iter().enumerate() {
                    if let Some((j, &distance)) = row.iter().find_position(|&&d| d.is_nan() || d < 0.0) {
                        let (from, to) = (zones[i].name.clone(), zones[j].name.clone());
                        return Err(InstanceError::InvalidDistance { from, to, distance });
                    }
                }
                Array2::from_shape_fn((n, n), |(i, j)| rows[i][j])
            }
            None => shortest_paths(n, &weighted_edges),
        };

        Ok(Self { zones, adjacency, distances })
    }

    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    /// Zones sharing an edge with `zone`, in ascending order
    pub fn neighbours(&self, zone: usize) -> &[usize] {
        &self.adjacency[zone]
    }

    pub fn is_base(&self, zone: usize) -> bool {
        self.zones[zone].is_base
    }

    /// Indices of all base stations, in ascending order
    pub fn bases(&self) -> Vec<usize> {
        (0..self.zones.len()).filter(|&z| self.zones[z].is_base).collect_vec()
    }

    /// Shortest-path distance; infinite if `b` cannot be reached from `a`
    pub fn distance(&self, a: usize, b: usize) -> f64 {
        self.distances[[a, b]]
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.zones.iter().position(|z| z.name == name)
    }
}
