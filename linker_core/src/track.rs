//! Track: ordered particle list and lifecycle status.

use crate::types::{Particle, TrackId};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a track.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackStatus {
    /// Eligible for extension in the next frame transition
    Active,
    /// Closed and handed to the output list; never mutated again
    Retired,
    /// The single sentinel collecting quality-filtered particles
    Rejected,
}

/// A trajectory under construction or finished.
///
/// Outside the rejected sentinel, frames strictly increase along
/// `particles`. The sentinel may hold several particles of the same frame.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Track {
    /// Unique identifier
    pub id: TrackId,
    /// Lifecycle status
    pub status: TrackStatus,
    particles: Vec<Particle>,
}

/// A finished track, as returned by the linker.
pub type Trajectory = Track;

impl Track {
    /// Start a new active track seeded with one particle.
    pub fn new(id: TrackId, seed: Particle) -> Self {
        Self {
            id,
            status: TrackStatus::Active,
            particles: vec![seed],
        }
    }

    /// Create the (initially empty) rejected-particle sentinel.
    pub fn rejected(id: TrackId) -> Self {
        Self {
            id,
            status: TrackStatus::Rejected,
            particles: Vec::new(),
        }
    }

    /// Append a particle.
    pub fn extend(&mut self, particle: Particle) {
        debug_assert!(
            self.status == TrackStatus::Rejected
                || self.last_frame().map_or(true, |f| f < particle.frame()),
            "track {} extended out of frame order",
            self.id
        );
        self.particles.push(particle);
    }

    /// Most recently linked particle.
    pub fn last(&self) -> Option<&Particle> {
        self.particles.last()
    }

    pub fn last_frame(&self) -> Option<u32> {
        self.last().map(Particle::frame)
    }

    pub fn first_frame(&self) -> Option<u32> {
        self.particles.first().map(Particle::frame)
    }

    /// Frames elapsed since the last extension, as seen from `frame`.
    pub fn gap_at(&self, frame: u32) -> u32 {
        self.last_frame()
            .map_or(0, |last| frame.saturating_sub(last))
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn is_rejected(&self) -> bool {
        self.status == TrackStatus::Rejected
    }
}
