//! Localization movie simulator.
//!
//! Generates one localization table per run with:
//! - Gaussian localization noise around each emitting fluorophore
//! - Fit quality drawn per detection
//! - Poisson-distributed spurious detections with low quality
//! - Ground truth: which emitter produced each particle

use crate::emitter::{Emitter, Photophysics};
use linker_core::metrics::GroundTruth;
use linker_core::{Detection, FrameParticles, FrameSequence, ParticleId};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Normal, Poisson};
use serde::{Deserialize, Serialize};

/// Detector / fitter characteristics.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImagingParams {
    /// Field of view side length (square, origin at 0)
    pub field_size: f64,
    /// Localization precision (1σ per axis)
    pub localization_noise: f64,
    /// Quality range of true detections
    pub quality_range: (f64, f64),
    /// Mean number of spurious detections per frame
    pub lambda_spurious: f64,
    /// Spurious detections draw quality from [0, this)
    pub spurious_quality_max: f64,
}

impl Default for ImagingParams {
    fn default() -> Self {
        Self {
            field_size: 100.0,
            localization_noise: 0.05,
            quality_range: (0.5, 1.0),
            lambda_spurious: 1.0,
            spurious_quality_max: 0.2,
        }
    }
}

/// A simulated acquisition: detections per frame plus ground truth.
#[derive(Clone, Debug, Default)]
pub struct SimulatedMovie {
    /// `frames[i]` holds the detections of frame `i + 1`
    pub frames: Vec<Vec<Detection>>,
    pub truth: GroundTruth,
}

impl SimulatedMovie {
    pub fn n_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn n_detections(&self) -> usize {
        self.frames.iter().map(Vec::len).sum()
    }

    /// Flat localization table in frame order.
    pub fn detections(&self) -> Vec<Detection> {
        self.frames.iter().flatten().copied().collect()
    }

    /// Frame sets for the linker, including empty frames.
    pub fn frame_sequence(&self) -> linker_core::Result<FrameSequence> {
        let frames = self
            .frames
            .iter()
            .enumerate()
            .map(|(i, dets)| FrameParticles::new(i as u32 + 1, dets.iter().copied()))
            .collect::<linker_core::Result<Vec<_>>>()?;
        FrameSequence::new(frames)
    }
}

/// Turns emitters into detections, frame by frame.
pub struct MovieSimulator {
    imaging: ImagingParams,
    photophysics: Photophysics,
    localization: Normal<f64>,
    /// `None` when no spurious detections are requested
    spurious: Option<Poisson<f64>>,
    rng: ChaCha8Rng,
}

impl MovieSimulator {
    /// Fails if the noise level or spurious rate cannot parameterize a
    /// distribution (negative or non-finite).
    pub fn new(
        imaging: ImagingParams,
        photophysics: Photophysics,
        seed: u64,
    ) -> anyhow::Result<Self> {
        let localization = Normal::new(0.0, imaging.localization_noise)?;
        let spurious = if imaging.lambda_spurious > 0.0 {
            Some(Poisson::new(imaging.lambda_spurious)?)
        } else {
            None
        };
        Ok(Self {
            imaging,
            photophysics,
            localization,
            spurious,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    /// Record `n_frames` frames, stepping `emitters` between frames.
    pub fn record(
        &mut self,
        emitters: &mut [Emitter],
        n_frames: u32,
    ) -> anyhow::Result<SimulatedMovie> {
        let brownian = emitters
            .iter()
            .map(Emitter::brownian)
            .collect::<Result<Vec<_>, _>>()?;
        let mut movie = SimulatedMovie::default();

        for frame in 1..=n_frames {
            let mut detections = Vec::new();

            for emitter in emitters.iter() {
                if !emitter.is_emitting(frame) {
                    continue;
                }
                let x = emitter.position.x + self.localization.sample(&mut self.rng);
                let y = emitter.position.y + self.localization.sample(&mut self.rng);
                let (q_lo, q_hi) = self.imaging.quality_range;
                let quality = q_lo + self.rng.gen::<f64>() * (q_hi - q_lo);

                movie.truth.insert(
                    ParticleId {
                        frame,
                        index: detections.len() as u32,
                    },
                    emitter.id,
                );
                detections.push(Detection::new(frame, x, y, quality));
            }

            let n_spurious = match &self.spurious {
                Some(poisson) => poisson.sample(&mut self.rng) as usize,
                None => 0,
            };
            for _ in 0..n_spurious {
                let x = self.rng.gen::<f64>() * self.imaging.field_size;
                let y = self.rng.gen::<f64>() * self.imaging.field_size;
                let quality = self.rng.gen::<f64>() * self.imaging.spurious_quality_max;
                detections.push(Detection::new(frame, x, y, quality));
            }

            movie.frames.push(detections);

            for (emitter, law) in emitters.iter_mut().zip(&brownian) {
                emitter.step(&mut self.rng, law, &self.photophysics);
            }
        }
        Ok(movie)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> ImagingParams {
        ImagingParams {
            lambda_spurious: 0.0,
            ..Default::default()
        }
    }

    fn never_blink() -> Photophysics {
        Photophysics {
            p_off: 0.0,
            p_on: 1.0,
            p_bleach: 0.0,
        }
    }

    #[test]
    fn same_seed_same_movie() {
        let run = |seed| {
            let mut emitters = vec![
                Emitter::new(0, 10.0, 10.0, 0.01),
                Emitter::new(1, 50.0, 50.0, 0.01),
            ];
            MovieSimulator::new(ImagingParams::default(), Photophysics::default(), seed)
                .unwrap()
                .record(&mut emitters, 20)
                .unwrap()
                .detections()
        };
        assert_eq!(run(5), run(5));
    }

    #[test]
    fn truth_covers_every_true_detection() {
        let mut emitters = vec![
            Emitter::new(3, 10.0, 10.0, 0.0),
            Emitter::new(4, 20.0, 10.0, 0.0),
        ];
        let movie = MovieSimulator::new(quiet(), never_blink(), 1)
            .unwrap()
            .record(&mut emitters, 5)
            .unwrap();
        assert_eq!(movie.n_frames(), 5);
        assert_eq!(movie.n_detections(), 10);
        assert_eq!(movie.truth.len(), 10);
        assert_eq!(movie.truth[&ParticleId { frame: 2, index: 1 }], 4);
    }

    #[test]
    fn spurious_detections_have_no_truth_and_low_quality() {
        let imaging = ImagingParams {
            lambda_spurious: 3.0,
            ..Default::default()
        };
        let movie = MovieSimulator::new(imaging.clone(), never_blink(), 9)
            .unwrap()
            .record(&mut [], 30)
            .unwrap();
        assert!(movie.n_detections() > 0);
        assert!(movie.truth.is_empty());
        assert!(movie
            .detections()
            .iter()
            .all(|d| d.quality < imaging.spurious_quality_max));
    }

    #[test]
    fn frame_sequence_keeps_empty_frames() {
        let mut emitters = vec![Emitter::new(0, 1.0, 1.0, 0.0).appearing_at(3)];
        let movie = MovieSimulator::new(quiet(), never_blink(), 1)
            .unwrap()
            .record(&mut emitters, 4)
            .unwrap();
        let seq = movie.frame_sequence().unwrap();
        assert_eq!(seq.len(), 4);
        assert!(seq.frames()[0].is_empty());
        assert_eq!(seq.particle_count(), 2);
    }

    #[test]
    fn spurious_counts_follow_the_requested_rate() {
        // Well above any small-count cutoff: the mean must still match.
        let imaging = ImagingParams {
            lambda_spurious: 300.0,
            ..Default::default()
        };
        let movie = MovieSimulator::new(imaging, never_blink(), 4)
            .unwrap()
            .record(&mut [], 200)
            .unwrap();
        let mean = movie.n_detections() as f64 / movie.n_frames() as f64;
        assert!((mean - 300.0).abs() < 10.0, "mean spurious count {mean}");
    }

    #[test]
    fn invalid_noise_is_rejected() {
        let imaging = ImagingParams {
            localization_noise: -1.0,
            ..Default::default()
        };
        assert!(MovieSimulator::new(imaging, never_blink(), 0).is_err());
    }

    #[test]
    fn invalid_diffusion_is_rejected() {
        let mut emitters = vec![Emitter::new(0, 0.0, 0.0, f64::NAN)];
        let mut sim = MovieSimulator::new(quiet(), never_blink(), 0).unwrap();
        assert!(sim.record(&mut emitters, 3).is_err());
    }
}
