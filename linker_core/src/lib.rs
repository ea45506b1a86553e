//! `linker_core` — frame-to-frame particle linking for single-molecule
//! localization microscopy.
//!
//! # Module layout
//! - [`types`]         — Particles, frame sets, identifiers
//! - [`error`]         — `LinkError` and the crate `Result`
//! - [`track`]         — Track struct and status
//! - [`gating`]        — Distance gating and bond graph construction
//! - [`association`]   — Bond graph, trivial links, subnetwork extraction
//! - [`subnetwork`]    — Exact branch-and-bound assignment per subnetwork
//! - [`track_manager`] — Extension / retirement / seeding / rejection
//! - [`pipeline`]      — Per-frame orchestrator and run driver
//! - [`metrics`]       — Trajectory statistics, link precision/recall

pub mod association;
pub mod error;
pub mod gating;
pub mod metrics;
pub mod pipeline;
pub mod subnetwork;
pub mod track;
pub mod track_manager;
pub mod types;

pub use error::{LinkError, Result};
pub use pipeline::{link, FrameReport, LinkOutput, Linker, LinkerConfig};
pub use track::{Track, TrackStatus, Trajectory};
pub use types::{Detection, FrameParticles, FrameSequence, Particle, ParticleId, TrackId};
