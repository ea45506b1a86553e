//! Fundamental types used across the entire workspace.

use crate::error::{LinkError, Result};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Lateral position [x, y]. z is carried alongside but never gated on.
pub type Position = Vector2<f64>;

/// Most frames a localization table may span, empty frames included.
pub const MAX_FRAME_SPAN: u32 = 1 << 22;

// ---------------------------------------------------------------------------
// Identifier types — newtype wrappers so IDs are never confused at compile time
// ---------------------------------------------------------------------------

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TrackId(pub u64);

/// A particle is addressed by its frame and its slot in that frame's set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticleId {
    pub frame: u32,
    pub index: u32,
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

impl fmt::Display for ParticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "F{}#{}", self.frame, self.index)
    }
}

// ---------------------------------------------------------------------------
// Detection / Particle
// ---------------------------------------------------------------------------

/// One row of a localization table, as produced by the upstream fitter.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// 1-based frame index
    pub frame: u32,
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    /// Fit quality; only compared against `quality_threshold`
    pub quality: f64,
}

impl Detection {
    pub fn new(frame: u32, x: f64, y: f64, quality: f64) -> Self {
        Self {
            frame,
            x,
            y,
            z: None,
            quality,
        }
    }

    pub fn with_z(mut self, z: f64) -> Self {
        self.z = Some(z);
        self
    }
}

/// An immutable, addressed localization inside a [`FrameParticles`] set.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub id: ParticleId,
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    pub quality: f64,
}

impl Particle {
    pub fn frame(&self) -> u32 {
        self.id.frame
    }

    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }

    /// Squared lateral distance; z does not take part.
    pub fn distance_squared(&self, other: &Particle) -> f64 {
        (self.position() - other.position()).norm_squared()
    }
}

// ---------------------------------------------------------------------------
// FrameParticles — the per-frame input contract
// ---------------------------------------------------------------------------

/// All particles localized in one frame. Immutable once built.
#[derive(Clone, Debug, Default)]
pub struct FrameParticles {
    frame: u32,
    particles: Vec<Particle>,
}

impl FrameParticles {
    /// Build a frame set, assigning particle ids in input order.
    ///
    /// Every detection must belong to `frame` and carry finite coordinates.
    pub fn new(frame: u32, detections: impl IntoIterator<Item = Detection>) -> Result<Self> {
        let mut particles = Vec::new();
        for (index, det) in detections.into_iter().enumerate() {
            if det.frame != frame {
                return Err(LinkError::MalformedInput(format!(
                    "detection {index} reports frame {} inside frame {frame}",
                    det.frame
                )));
            }
            if !det.x.is_finite() || !det.y.is_finite() {
                return Err(LinkError::MalformedInput(format!(
                    "detection {index} in frame {frame} has non-finite position ({}, {})",
                    det.x, det.y
                )));
            }
            particles.push(Particle {
                id: ParticleId {
                    frame,
                    index: index as u32,
                },
                x: det.x,
                y: det.y,
                z: det.z,
                quality: det.quality,
            });
        }
        Ok(Self { frame, particles })
    }

    pub fn empty(frame: u32) -> Self {
        Self {
            frame,
            particles: Vec::new(),
        }
    }

    pub fn frame(&self) -> u32 {
        self.frame
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
}

// ---------------------------------------------------------------------------
// FrameSequence — contiguous run of frames
// ---------------------------------------------------------------------------

/// A contiguous, increasing run of frames ready for linking.
#[derive(Clone, Debug, Default)]
pub struct FrameSequence {
    frames: Vec<FrameParticles>,
}

impl FrameSequence {
    /// Wrap frames that are already ordered. Indices must be contiguous.
    pub fn new(frames: Vec<FrameParticles>) -> Result<Self> {
        for pair in frames.windows(2) {
            if pair[1].frame() != pair[0].frame() + 1 {
                return Err(LinkError::MalformedInput(format!(
                    "frame {} follows frame {}; frames must be contiguous",
                    pair[1].frame(),
                    pair[0].frame()
                )));
            }
        }
        Ok(Self { frames })
    }

    /// Group a flat localization table by frame.
    ///
    /// Frames with no detections between the first and last frame are
    /// inserted as empty sets. Within a frame, table order is preserved.
    /// Tables spanning more than [`MAX_FRAME_SPAN`] frames are rejected.
    pub fn from_detections(detections: impl IntoIterator<Item = Detection>) -> Result<Self> {
        let mut grouped: BTreeMap<u32, Vec<Detection>> = BTreeMap::new();
        for det in detections {
            if det.frame == 0 {
                return Err(LinkError::MalformedInput(
                    "frame indices are 1-based; found frame 0".to_string(),
                ));
            }
            grouped.entry(det.frame).or_default().push(det);
        }

        let (first, last) = match (grouped.keys().next(), grouped.keys().next_back()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => return Ok(Self::default()),
        };

        let span = u64::from(last - first) + 1;
        if span > u64::from(MAX_FRAME_SPAN) {
            return Err(LinkError::MalformedInput(format!(
                "table spans frames {first}..={last} ({span} frames, limit {MAX_FRAME_SPAN})"
            )));
        }
        let mut frames = Vec::new();
        frames.try_reserve_exact(span as usize).map_err(|e| {
            LinkError::MalformedInput(format!("cannot hold {span} frames: {e}"))
        })?;
        for frame in first..=last {
            match grouped.remove(&frame) {
                Some(dets) => frames.push(FrameParticles::new(frame, dets)?),
                None => frames.push(FrameParticles::empty(frame)),
            }
        }
        Ok(Self { frames })
    }

    pub fn frames(&self) -> &[FrameParticles] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Total number of particles across all frames.
    pub fn particle_count(&self) -> usize {
        self.frames.iter().map(FrameParticles::len).sum()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
