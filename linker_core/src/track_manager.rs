//! Track lifecycle management: extension, retirement, seeding and the
//! rejected-particle sentinel.
//!
//! # Track Management Policy
//! - **Extension**: a linked track takes the particle; its gap resets.
//! - **Retirement**: an unextended track retires the first time
//!   `frame − last_frame ≥ max_blinking`. Retired tracks never come back.
//! - **Seeding**: every particle no track claimed starts a new track if its
//!   quality is above the cutoff, and otherwise joins the sentinel.

use crate::{
    association::Link,
    track::{Track, TrackStatus, Trajectory},
    types::{FrameParticles, Particle, TrackId},
};

/// Id reserved for the rejected-particle sentinel.
pub const REJECTED_TRACK_ID: TrackId = TrackId(u64::MAX);

/// What one call to [`TrackManager::apply`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LifecycleCounts {
    pub extended: usize,
    pub retired: usize,
    pub born: usize,
    pub rejected: usize,
}

/// Owns the active tracks for the duration of a run.
pub struct TrackManager {
    max_blinking: u32,
    quality_threshold: f64,
    next_id: u64,
    active: Vec<Track>,
    retired: Vec<Track>,
    rejected: Track,
}

impl TrackManager {
    pub fn new(max_blinking: u32, quality_threshold: f64) -> Self {
        Self {
            max_blinking,
            quality_threshold,
            next_id: 0,
            active: Vec::new(),
            retired: Vec::new(),
            rejected: Track::rejected(REJECTED_TRACK_ID),
        }
    }

    fn next_track_id(&mut self) -> TrackId {
        let id = TrackId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Active tracks; slot `i` here is track slot `i` of the bond graph.
    pub fn active(&self) -> &[Track] {
        &self.active
    }

    pub fn retired(&self) -> &[Track] {
        &self.retired
    }

    pub fn rejected(&self) -> &Track {
        &self.rejected
    }

    /// Last particle of every active track, by slot.
    pub fn track_ends(&self) -> Vec<Particle> {
        self.active
            .iter()
            .filter_map(|t| t.last().copied())
            .collect()
    }

    /// Apply one frame's links, then retire, seed and reject.
    ///
    /// `links` must reference distinct tracks and distinct particles.
    pub fn apply(&mut self, frame: &FrameParticles, links: &[Link]) -> LifecycleCounts {
        let particles = frame.particles();
        let mut claimed = vec![false; particles.len()];
        let mut extended = vec![false; self.active.len()];
        let mut counts = LifecycleCounts::default();

        for link in links {
            debug_assert!(!claimed[link.particle], "particle claimed twice");
            debug_assert!(!extended[link.track], "track extended twice");
            self.active[link.track].extend(particles[link.particle]);
            claimed[link.particle] = true;
            extended[link.track] = true;
            counts.extended += 1;
        }

        let now = frame.frame();
        let mut kept = Vec::with_capacity(self.active.len());
        for (slot, mut track) in std::mem::take(&mut self.active).into_iter().enumerate() {
            if !extended[slot] && track.gap_at(now) >= self.max_blinking {
                track.status = TrackStatus::Retired;
                self.retired.push(track);
                counts.retired += 1;
            } else {
                kept.push(track);
            }
        }
        self.active = kept;

        for (particle, &was_claimed) in particles.iter().zip(&claimed) {
            if was_claimed {
                continue;
            }
            if particle.quality > self.quality_threshold {
                let id = self.next_track_id();
                self.active.push(Track::new(id, *particle));
                counts.born += 1;
            } else {
                self.rejected.extend(*particle);
                counts.rejected += 1;
            }
        }
        counts
    }

    /// Retire everything still active and hand over all trajectories:
    /// retired tracks in retirement order, then the remaining active ones,
    /// then the sentinel if it holds anything.
    pub fn finish(self) -> Vec<Trajectory> {
        let mut out = self.retired;
        out.extend(self.active.into_iter().map(|mut t| {
            t.status = TrackStatus::Retired;
            t
        }));
        if !self.rejected.is_empty() {
            out.push(self.rejected);
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Detection;

    fn frame(n: u32, points: &[(f64, f64, f64)]) -> FrameParticles {
        FrameParticles::new(n, points.iter().map(|&(x, y, q)| Detection::new(n, x, y, q))).unwrap()
    }

    #[test]
    fn unclaimed_particles_seed_tracks_or_get_rejected() {
        let mut mgr = TrackManager::new(1, 0.5);
        let counts = mgr.apply(
            &frame(1, &[(0.0, 0.0, 1.0), (5.0, 5.0, 0.5), (9.0, 9.0, 0.1)]),
            &[],
        );
        assert_eq!(counts.born, 1);
        assert_eq!(counts.rejected, 2, "quality at the cutoff is rejected too");
        assert_eq!(mgr.active().len(), 1);
        assert_eq!(mgr.rejected().len(), 2);
    }

    #[test]
    fn linked_track_is_extended_and_survives() {
        let mut mgr = TrackManager::new(0, 0.0);
        mgr.apply(&frame(1, &[(0.0, 0.0, 1.0)]), &[]);
        let counts = mgr.apply(
            &frame(2, &[(0.3, 0.1, 1.0)]),
            &[Link {
                track: 0,
                particle: 0,
            }],
        );
        assert_eq!(counts.extended, 1);
        assert_eq!(counts.retired, 0);
        assert_eq!(mgr.active()[0].len(), 2);
    }

    #[test]
    fn retirement_boundary_is_inclusive() {
        // max_blinking = 2: gap 1 survives, gap 2 retires.
        let mut mgr = TrackManager::new(2, 0.0);
        mgr.apply(&frame(3, &[(0.0, 0.0, 1.0)]), &[]);
        assert_eq!(mgr.apply(&frame(4, &[]), &[]).retired, 0);
        assert_eq!(mgr.active().len(), 1);
        assert_eq!(mgr.apply(&frame(5, &[]), &[]).retired, 1);
        assert!(mgr.active().is_empty());
        assert_eq!(mgr.retired()[0].status, TrackStatus::Retired);
    }

    #[test]
    fn zero_blinking_retires_after_one_missed_frame() {
        let mut mgr = TrackManager::new(0, 0.0);
        mgr.apply(&frame(1, &[(0.0, 0.0, 1.0)]), &[]);
        assert_eq!(mgr.apply(&frame(2, &[]), &[]).retired, 1);
    }

    #[test]
    fn finish_orders_retired_then_active_then_sentinel() {
        let mut mgr = TrackManager::new(1, 0.5);
        mgr.apply(&frame(1, &[(0.0, 0.0, 1.0), (1.0, 1.0, 0.0)]), &[]);
        mgr.apply(&frame(2, &[(10.0, 10.0, 1.0)]), &[]);
        let out = mgr.finish();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].id, TrackId(0));
        assert_eq!(out[1].id, TrackId(1));
        assert!(out[2].is_rejected());
        assert!(out[..2].iter().all(|t| t.status == TrackStatus::Retired));
    }

    #[test]
    fn empty_sentinel_is_not_emitted() {
        let mut mgr = TrackManager::new(1, 0.0);
        mgr.apply(&frame(1, &[(0.0, 0.0, 1.0)]), &[]);
        let out = mgr.finish();
        assert_eq!(out.len(), 1);
        assert!(!out[0].is_rejected());
    }
}
