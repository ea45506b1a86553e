//! Emitter models: Brownian motion plus on/off blinking and bleaching.
//!
//! Each emitter has a true lateral position and a photophysical state.
//! The movie simulator steps every emitter once per frame.

use nalgebra::Vector2;
use rand::Rng;
use rand_distr::{Distribution, Normal, NormalError};
use serde::{Deserialize, Serialize};

/// Per-frame transition probabilities of the blinking model.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Photophysics {
    /// P(on → off) per frame
    pub p_off: f64,
    /// P(off → on) per frame
    pub p_on: f64,
    /// P(bleach) per frame while on; a bleached emitter never returns
    pub p_bleach: f64,
}

impl Default for Photophysics {
    fn default() -> Self {
        Self {
            p_off: 0.05,
            p_on: 0.5,
            p_bleach: 0.01,
        }
    }
}

/// A simulated fluorophore with ground-truth state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Emitter {
    /// Unique emitter ID (used for metrics)
    pub id: u64,
    /// True position
    pub position: Vector2<f64>,
    /// Diffusion coefficient in position units² per frame
    pub diffusion: f64,
    /// Currently emitting
    pub on: bool,
    /// Permanently dark
    pub bleached: bool,
    /// No emission before this frame
    pub appear_at: u32,
}

impl Emitter {
    pub fn new(id: u64, x: f64, y: f64, diffusion: f64) -> Self {
        Self {
            id,
            position: Vector2::new(x, y),
            diffusion,
            on: true,
            bleached: false,
            appear_at: 1,
        }
    }

    pub fn appearing_at(mut self, frame: u32) -> Self {
        self.appear_at = frame;
        self
    }

    /// Per-axis displacement over one frame: N(0, √(2D)).
    pub fn brownian(&self) -> Result<Normal<f64>, NormalError> {
        Normal::new(0.0, (2.0 * self.diffusion).sqrt())
    }

    /// Advance by one frame: diffuse, then update the blinking state.
    ///
    /// `brownian` is this emitter's [`Emitter::brownian`] distribution.
    pub fn step<R: Rng>(
        &mut self,
        rng: &mut R,
        brownian: &Normal<f64>,
        photophysics: &Photophysics,
    ) {
        self.position.x += brownian.sample(rng);
        self.position.y += brownian.sample(rng);

        if self.bleached {
            return;
        }
        if self.on {
            if rng.gen::<f64>() < photophysics.p_bleach {
                self.bleached = true;
                self.on = false;
            } else if rng.gen::<f64>() < photophysics.p_off {
                self.on = false;
            }
        } else if rng.gen::<f64>() < photophysics.p_on {
            self.on = true;
        }
    }

    /// True if the emitter produces a spot in `frame`.
    pub fn is_emitting(&self, frame: u32) -> bool {
        frame >= self.appear_at && self.on && !self.bleached
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn immobile_emitter_stays_put() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut e = Emitter::new(0, 3.0, 4.0, 0.0);
        let brownian = e.brownian().unwrap();
        for _ in 0..10 {
            e.step(&mut rng, &brownian, &Photophysics::default());
        }
        assert_eq!(e.position, Vector2::new(3.0, 4.0));
    }

    #[test]
    fn bleached_emitter_never_returns() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let always_bleach = Photophysics {
            p_off: 0.0,
            p_on: 1.0,
            p_bleach: 1.0,
        };
        let mut e = Emitter::new(0, 0.0, 0.0, 0.0);
        let brownian = e.brownian().unwrap();
        e.step(&mut rng, &brownian, &always_bleach);
        assert!(e.bleached);
        for _ in 0..5 {
            e.step(&mut rng, &brownian, &always_bleach);
            assert!(!e.is_emitting(10));
        }
    }

    #[test]
    fn late_emitter_is_silent_before_appearing() {
        let e = Emitter::new(0, 0.0, 0.0, 0.0).appearing_at(5);
        assert!(!e.is_emitting(4));
        assert!(e.is_emitting(5));
    }

    #[test]
    fn brownian_step_has_expected_spread() {
        // D = 0.5 gives unit variance per axis and frame.
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut e = Emitter::new(0, 0.0, 0.0, 0.5);
        let brownian = e.brownian().unwrap();
        let n = 20_000;
        let mut steps = Vec::with_capacity(n);
        for _ in 0..n {
            let before = e.position.x;
            e.step(&mut rng, &brownian, &Photophysics::default());
            steps.push(e.position.x - before);
        }
        let mean = steps.iter().sum::<f64>() / n as f64;
        let var = steps.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.05);
        assert!((var - 1.0).abs() < 0.05);
    }

    #[test]
    fn negative_diffusion_has_no_brownian_law() {
        assert!(Emitter::new(0, 0.0, 0.0, -1.0).brownian().is_err());
    }
}
