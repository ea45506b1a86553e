//! Linking metrics: trajectory length statistics and link precision/recall
//! against a ground-truth emitter labelling.

use crate::track::Trajectory;
use crate::types::ParticleId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Ground truth: the emitter each particle came from. Spurious detections
/// are simply absent.
pub type GroundTruth = HashMap<ParticleId, u64>;

/// Summary of a set of trajectories.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryStats {
    /// Trajectories excluding the rejected sentinel
    pub n_trajectories: usize,
    /// Particles in those trajectories
    pub n_linked_particles: usize,
    /// Particles in the rejected sentinel
    pub n_rejected_particles: usize,
    pub mean_length: f64,
    pub longest: usize,
    /// length → number of trajectories with that length
    pub length_histogram: BTreeMap<usize, usize>,
}

impl TrajectoryStats {
    pub fn from_trajectories(trajectories: &[Trajectory]) -> Self {
        let mut stats = Self::default();
        for t in trajectories {
            if t.is_rejected() {
                stats.n_rejected_particles += t.len();
                continue;
            }
            stats.n_trajectories += 1;
            stats.n_linked_particles += t.len();
            stats.longest = stats.longest.max(t.len());
            *stats.length_histogram.entry(t.len()).or_default() += 1;
        }
        if stats.n_trajectories > 0 {
            stats.mean_length = stats.n_linked_particles as f64 / stats.n_trajectories as f64;
        }
        stats
    }
}

/// Accumulated link statistics against ground truth.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkingMetrics {
    /// Ground-truth links (consecutive detections of one emitter)
    pub gt_links: u64,
    /// Produced links that are ground-truth links
    pub true_links: u64,
    /// Produced links that are not
    pub false_links: u64,
    /// Ground-truth links never produced
    pub missed_links: u64,
}

impl LinkingMetrics {
    /// Compare the links in `trajectories` with the ground-truth links.
    ///
    /// A ground-truth link joins two consecutive detections of the same
    /// emitter at most `max_gap` frames apart. The rejected sentinel does
    /// not contribute links.
    pub fn evaluate(trajectories: &[Trajectory], truth: &GroundTruth, max_gap: u32) -> Self {
        let mut by_emitter: HashMap<u64, Vec<ParticleId>> = HashMap::new();
        for (&pid, &emitter) in truth {
            by_emitter.entry(emitter).or_default().push(pid);
        }
        let mut gt: HashSet<(ParticleId, ParticleId)> = HashSet::new();
        for ids in by_emitter.values_mut() {
            ids.sort_unstable();
            for pair in ids.windows(2) {
                if pair[1].frame > pair[0].frame && pair[1].frame - pair[0].frame <= max_gap {
                    gt.insert((pair[0], pair[1]));
                }
            }
        }

        let mut metrics = Self {
            gt_links: gt.len() as u64,
            ..Default::default()
        };
        for t in trajectories.iter().filter(|t| !t.is_rejected()) {
            for pair in t.particles().windows(2) {
                if gt.contains(&(pair[0].id, pair[1].id)) {
                    metrics.true_links += 1;
                } else {
                    metrics.false_links += 1;
                }
            }
        }
        metrics.missed_links = metrics.gt_links - metrics.true_links;
        metrics
    }

    /// Precision = TP / (TP + FP)
    pub fn precision(&self) -> f64 {
        let denom = (self.true_links + self.false_links) as f64;
        if denom == 0.0 {
            1.0
        } else {
            self.true_links as f64 / denom
        }
    }

    /// Recall = TP / ground-truth links
    pub fn recall(&self) -> f64 {
        if self.gt_links == 0 {
            1.0
        } else {
            self.true_links as f64 / self.gt_links as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::Track;
    use crate::track_manager::REJECTED_TRACK_ID;
    use crate::types::{Particle, TrackId};
    use approx::assert_abs_diff_eq;

    fn p(frame: u32, index: u32) -> Particle {
        Particle {
            id: ParticleId { frame, index },
            x: 0.0,
            y: 0.0,
            z: None,
            quality: 1.0,
        }
    }

    fn track(id: u64, particles: &[Particle]) -> Track {
        let mut t = Track::new(TrackId(id), particles[0]);
        for q in &particles[1..] {
            t.extend(*q);
        }
        t
    }

    #[test]
    fn stats_skip_the_sentinel() {
        let mut sentinel = Track::rejected(REJECTED_TRACK_ID);
        sentinel.extend(p(1, 5));
        let trajectories = vec![
            track(0, &[p(1, 0), p(2, 0), p(3, 0)]),
            track(1, &[p(1, 1)]),
            sentinel,
        ];
        let stats = TrajectoryStats::from_trajectories(&trajectories);
        assert_eq!(stats.n_trajectories, 2);
        assert_eq!(stats.n_linked_particles, 4);
        assert_eq!(stats.n_rejected_particles, 1);
        assert_eq!(stats.longest, 3);
        assert_abs_diff_eq!(stats.mean_length, 2.0);
        assert_eq!(stats.length_histogram.get(&1), Some(&1));
    }

    #[test]
    fn links_are_scored_against_truth() {
        // Emitter 7 seen at frames 1, 2, 4; emitter 8 at frames 1, 2.
        let truth: GroundTruth = [
            (ParticleId { frame: 1, index: 0 }, 7),
            (ParticleId { frame: 2, index: 0 }, 7),
            (ParticleId { frame: 4, index: 0 }, 7),
            (ParticleId { frame: 1, index: 1 }, 8),
            (ParticleId { frame: 2, index: 1 }, 8),
        ]
        .into_iter()
        .collect();
        // One correct link, one swap onto the other emitter.
        let trajectories = vec![
            track(0, &[p(1, 0), p(2, 0)]),
            track(1, &[p(1, 1), p(4, 0)]),
        ];
        let m = LinkingMetrics::evaluate(&trajectories, &truth, 2);
        assert_eq!(m.gt_links, 3);
        assert_eq!(m.true_links, 1);
        assert_eq!(m.false_links, 1);
        assert_eq!(m.missed_links, 2);
        assert_abs_diff_eq!(m.precision(), 0.5);
        assert_abs_diff_eq!(m.recall(), 1.0 / 3.0);
    }

    #[test]
    fn gaps_beyond_tolerance_are_not_truth_links() {
        let truth: GroundTruth = [
            (ParticleId { frame: 1, index: 0 }, 1),
            (ParticleId { frame: 5, index: 0 }, 1),
        ]
        .into_iter()
        .collect();
        let m = LinkingMetrics::evaluate(&[], &truth, 2);
        assert_eq!(m.gt_links, 0);
        assert_abs_diff_eq!(m.recall(), 1.0);
    }
}
