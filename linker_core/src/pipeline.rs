//! Linker orchestrator: the full linking cycle for one frame transition.
//!
//! # Processing steps per frame
//! 1. Check the frame follows the previous one
//! 2. Gate every active track end against the frame (bond graph)
//! 3. Commit trivial 1-to-1 bonds
//! 4. Split the remaining bonds into subnetworks
//! 5. Solve each subnetwork exactly (branch and bound, rayon when enabled)
//! 6. Extend linked tracks, retire expired ones, seed new tracks and
//!    route low-quality particles to the rejected sentinel
//! 7. Collect the frame report
//!
//! After the last frame, [`Linker::finish`] closes every track.

use crate::{
    association::{Link, Subnetwork},
    error::{LinkError, Result},
    gating::BondGraphBuilder,
    subnetwork::{self, SubnetworkSolution},
    track::{Track, Trajectory},
    track_manager::TrackManager,
    types::FrameParticles,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Configuration for the linker, supplied once per run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkerConfig {
    /// Gate radius, in position units. Also the price of leaving a track unlinked.
    pub max_displacement: f64,
    /// Frames a track may go unextended; retired once the gap reaches this.
    pub max_blinking: u32,
    /// Particles at or below this quality never seed or extend tracks.
    pub quality_threshold: f64,
    /// Drop a track's other candidates when its cheapest bond is shorter.
    pub trivial_distance: Option<f64>,
    /// Subnetwork size (tracks + particles) above which a warning is logged.
    pub large_cluster_threshold: usize,
    /// Gate and solve subnetworks on the rayon pool.
    pub parallel: bool,
    /// Keep every [`FrameReport`] in the [`LinkOutput`].
    pub collect_reports: bool,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            max_displacement: 2.0,
            max_blinking: 1,
            quality_threshold: 0.0,
            trivial_distance: None,
            large_cluster_threshold: 300,
            parallel: true,
            collect_reports: true,
        }
    }
}

impl LinkerConfig {
    /// Reject configurations that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<()> {
        if !self.max_displacement.is_finite() || self.max_displacement < 0.0 {
            return Err(LinkError::InvalidConfig(format!(
                "max_displacement must be finite and non-negative, got {}",
                self.max_displacement
            )));
        }
        if self.quality_threshold.is_nan() {
            return Err(LinkError::InvalidConfig(
                "quality_threshold must not be NaN".to_string(),
            ));
        }
        if let Some(d) = self.trivial_distance {
            if !d.is_finite() || d < 0.0 {
                return Err(LinkError::InvalidConfig(format!(
                    "trivial_distance must be finite and non-negative, got {d}"
                )));
            }
        }
        if self.large_cluster_threshold == 0 {
            return Err(LinkError::InvalidConfig(
                "large_cluster_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Largest frame gap a single link can span under `max_blinking`.
    pub fn max_link_gap(&self) -> u32 {
        self.max_blinking.max(1)
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Everything that happened in one frame transition.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    pub frame: u32,
    pub particles: usize,
    /// Bonds that passed the gate
    pub bonds: usize,
    /// Links committed without search
    pub trivial_links: usize,
    /// Links committed by the subnetwork optimizer
    pub optimized_links: usize,
    pub subnetworks: usize,
    /// Largest subnetwork size (tracks + particles)
    pub largest_subnetwork: usize,
    /// Subnetworks above `large_cluster_threshold`
    pub large_subnetworks: usize,
    /// Active tracks after this frame
    pub active: usize,
    /// Tracks retired in this frame
    pub retired: usize,
    /// Tracks seeded in this frame
    pub born: usize,
    /// Particles sent to the rejected sentinel in this frame
    pub rejected: usize,
    /// Timings in microseconds
    pub timing_bond_us: u64,
    pub timing_cluster_us: u64,
    pub timing_optimize_us: u64,
    pub timing_lifecycle_us: u64,
}

/// Outputs of a complete run.
#[derive(Clone, Debug)]
pub struct LinkOutput {
    /// All trajectories; the rejected sentinel, if any, is last
    pub trajectories: Vec<Trajectory>,
    /// Per-frame reports (empty unless `collect_reports` is set)
    pub reports: Vec<FrameReport>,
}

impl LinkOutput {
    /// Trajectories other than the rejected sentinel.
    pub fn linked(&self) -> impl Iterator<Item = &Trajectory> {
        self.trajectories.iter().filter(|t| !t.is_rejected())
    }

    /// The rejected sentinel, when any particle was filtered.
    pub fn rejected(&self) -> Option<&Trajectory> {
        self.trajectories.iter().find(|t| t.is_rejected())
    }
}

// ---------------------------------------------------------------------------
// Linker
// ---------------------------------------------------------------------------

/// The linking engine. Owns the track pool for the duration of a run.
pub struct Linker {
    config: LinkerConfig,
    builder: BondGraphBuilder,
    manager: TrackManager,
    last_frame: Option<u32>,
    reports: Vec<FrameReport>,
}

impl Linker {
    /// Create a new linker. Fails if the configuration is invalid.
    pub fn new(config: LinkerConfig) -> Result<Self> {
        config.validate()?;
        let builder = BondGraphBuilder {
            max_displacement: config.max_displacement,
            quality_threshold: config.quality_threshold,
            trivial_distance: config.trivial_distance,
            parallel: config.parallel,
        };
        let manager = TrackManager::new(config.max_blinking, config.quality_threshold);
        Ok(Self {
            config,
            builder,
            manager,
            last_frame: None,
            reports: Vec::new(),
        })
    }

    pub fn config(&self) -> &LinkerConfig {
        &self.config
    }

    /// Tracks still eligible for extension.
    pub fn active_tracks(&self) -> &[Track] {
        self.manager.active()
    }

    /// Tracks retired so far.
    pub fn retired_tracks(&self) -> &[Track] {
        self.manager.retired()
    }

    /// Link one frame against the current tracks.
    pub fn process_frame(&mut self, frame: &FrameParticles) -> Result<FrameReport> {
        let now = frame.frame();
        match self.last_frame {
            _ if now == 0 => {
                return Err(LinkError::MalformedInput(
                    "frame indices are 1-based; found frame 0".to_string(),
                ))
            }
            Some(last) if now != last + 1 => {
                return Err(LinkError::MalformedInput(format!(
                    "frame {now} follows frame {last}; frames must be contiguous"
                )))
            }
            _ => {}
        }
        self.last_frame = Some(now);

        let mut report = FrameReport {
            frame: now,
            particles: frame.len(),
            ..Default::default()
        };

        // ----------------------------------------------------------------
        // Step 2: Gating
        // ----------------------------------------------------------------
        let t0 = Instant::now();
        let track_ends = self.manager.track_ends();
        let mut graph = self.builder.build(&track_ends, frame);
        report.bonds = graph.bond_count();
        report.timing_bond_us = t0.elapsed().as_micros() as u64;

        // ----------------------------------------------------------------
        // Step 3-4: Trivial links + subnetworks
        // ----------------------------------------------------------------
        let t0 = Instant::now();
        let mut links: Vec<Link> = graph.resolve_trivial();
        report.trivial_links = links.len();
        let subnetworks = graph.extract_subnetworks();
        report.subnetworks = subnetworks.len();
        report.largest_subnetwork = subnetworks.iter().map(Subnetwork::size).max().unwrap_or(0);
        for net in &subnetworks {
            if net.size() > self.config.large_cluster_threshold {
                report.large_subnetworks += 1;
                warn!(
                    frame = now,
                    tracks = net.heads.len(),
                    particles = net.tails.len(),
                    "large subnetwork; exact linking may be slow"
                );
            }
        }
        report.timing_cluster_us = t0.elapsed().as_micros() as u64;

        // ----------------------------------------------------------------
        // Step 5: Exact optimization per subnetwork
        // ----------------------------------------------------------------
        let t0 = Instant::now();
        let no_link_cost = self.config.max_displacement;
        let solutions: Vec<SubnetworkSolution> = if self.config.parallel {
            subnetworks
                .par_iter()
                .map(|net| subnetwork::solve(net, &graph, no_link_cost))
                .collect()
        } else {
            subnetworks
                .iter()
                .map(|net| subnetwork::solve(net, &graph, no_link_cost))
                .collect()
        };
        for sol in solutions {
            report.optimized_links += sol.links.len();
            links.extend(sol.links);
        }
        report.timing_optimize_us = t0.elapsed().as_micros() as u64;

        // ----------------------------------------------------------------
        // Step 6: Lifecycle
        // ----------------------------------------------------------------
        let t0 = Instant::now();
        let counts = self.manager.apply(frame, &links);
        report.retired = counts.retired;
        report.born = counts.born;
        report.rejected = counts.rejected;
        report.active = self.manager.active().len();
        report.timing_lifecycle_us = t0.elapsed().as_micros() as u64;

        debug!(
            frame = now,
            active = report.active,
            retired = report.retired,
            born = report.born,
            rejected = report.rejected,
            trivial = report.trivial_links,
            optimized = report.optimized_links,
            "frame linked"
        );

        if self.config.collect_reports {
            self.reports.push(report.clone());
        }
        Ok(report)
    }

    /// Close every track and return the trajectories.
    pub fn finish(self) -> LinkOutput {
        let trajectories = self.manager.finish();
        info!(
            frames = self.reports.len(),
            trajectories = trajectories.len(),
            "linking finished"
        );
        LinkOutput {
            trajectories,
            reports: self.reports,
        }
    }

    /// Link a whole frame sequence.
    ///
    /// `cancel` is polled before each frame; once it reads `true` the run
    /// stops with [`LinkError::Cancelled`].
    pub fn run<'a>(
        config: LinkerConfig,
        frames: impl IntoIterator<Item = &'a FrameParticles>,
        cancel: Option<&AtomicBool>,
    ) -> Result<LinkOutput> {
        let mut linker = Linker::new(config)?;
        for frame in frames {
            if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
                return Err(LinkError::Cancelled {
                    frame: frame.frame(),
                });
            }
            linker.process_frame(frame)?;
        }
        Ok(linker.finish())
    }
}

/// Link `frames` with `config` and return only the trajectories.
pub fn link(config: LinkerConfig, frames: &[FrameParticles]) -> Result<Vec<Trajectory>> {
    Linker::run(config, frames, None).map(|out| out.trajectories)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
