//! Distance gating: builds the per-frame bond graph between the last
//! particle of every active track and the particles of the new frame.
//!
//! # Gating criterion
//! d²(track, particle) = (x₁ − x₀)² + (y₁ − y₀)²
//!
//! Accept if d² ≤ max_displacement² (bonds exactly on the radius are kept).
//! Particles at or below the quality cutoff never receive a bond.

use crate::association::{Bond, BondGraph};
use crate::types::{FrameParticles, Particle};
use rayon::prelude::*;
use std::collections::HashMap;

/// Smallest grid cell; keeps the zero-radius gate from dividing by zero.
const MIN_CELL_SIZE: f64 = 1e-6;

/// A Uniform Grid spatial index for 2D points.
/// With `cell_size` ≥ the gate radius, every in-gate particle lies in the
/// query cell or one of its 8 neighbours.
pub struct SpatialGrid {
    cell_size: f64,
    /// Maps cell key (ix, iy) to a list of particle indices.
    cells: HashMap<(i64, i64), Vec<usize>>,
}

impl SpatialGrid {
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size: cell_size.max(MIN_CELL_SIZE),
            cells: HashMap::new(),
        }
    }

    fn key(&self, x: f64, y: f64) -> (i64, i64) {
        (
            (x / self.cell_size).floor() as i64,
            (y / self.cell_size).floor() as i64,
        )
    }

    /// Insert a particle into the grid at position (x, y).
    pub fn insert(&mut self, idx: usize, x: f64, y: f64) {
        let key = self.key(x, y);
        self.cells.entry(key).or_default().push(idx);
    }

    /// Query particle indices in the cell containing (x, y) and its 8
    /// direct neighbours, in ascending index order.
    pub fn query_nearby(&self, x: f64, y: f64) -> Vec<usize> {
        let (ix, iy) = self.key(x, y);

        let mut results = Vec::new();
        for dx in -1..=1i64 {
            for dy in -1..=1i64 {
                let cell = (ix.saturating_add(dx), iy.saturating_add(dy));
                if let Some(indices) = self.cells.get(&cell) {
                    results.extend_from_slice(indices);
                }
            }
        }
        results.sort_unstable();
        results
    }
}

/// Builds [`BondGraph`]s for one frame transition at a time.
#[derive(Clone, Debug)]
pub struct BondGraphBuilder {
    pub max_displacement: f64,
    pub quality_threshold: f64,
    /// When a track's cheapest bond is shorter than this, its other
    /// candidates are dropped before the backward lists are built.
    pub trivial_distance: Option<f64>,
    /// Gate tracks on the rayon pool
    pub parallel: bool,
}

impl BondGraphBuilder {
    pub fn new(max_displacement: f64, quality_threshold: f64) -> Self {
        Self {
            max_displacement,
            quality_threshold,
            trivial_distance: None,
            parallel: false,
        }
    }

    /// Gate every track end against `frame`.
    ///
    /// `track_ends[i]` is the last particle of active track slot `i`.
    /// Forward bonds carry squared distance, sorted ascending; ties keep
    /// particle order.
    pub fn build(&self, track_ends: &[Particle], frame: &FrameParticles) -> BondGraph {
        let particles = frame.particles();
        let mut grid = SpatialGrid::new(self.max_displacement);
        for (pi, p) in particles.iter().enumerate() {
            if p.quality > self.quality_threshold {
                grid.insert(pi, p.x, p.y);
            }
        }

        let gate = self.max_displacement * self.max_displacement;
        let gate_track = |(ti, end): (usize, &Particle)| -> Vec<Bond> {
            let mut bonds: Vec<Bond> = grid
                .query_nearby(end.x, end.y)
                .into_iter()
                .filter_map(|pi| {
                    let d2 = end.distance_squared(&particles[pi]);
                    (d2 <= gate).then_some(Bond {
                        track: ti,
                        particle: pi,
                        cost: d2,
                    })
                })
                .collect();
            if bonds.len() > 1 {
                bonds.sort_by(|a, b| a.cost.total_cmp(&b.cost));
                if let Some(bound) = self.trivial_distance {
                    if bonds[0].cost.sqrt() < bound {
                        bonds.truncate(1);
                    }
                }
            }
            bonds
        };

        let forward: Vec<Vec<Bond>> = if self.parallel {
            track_ends.par_iter().enumerate().map(gate_track).collect()
        } else {
            track_ends.iter().enumerate().map(gate_track).collect()
        };

        BondGraph::from_forward(forward, particles.len())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
