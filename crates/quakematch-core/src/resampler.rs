//! # Fractional Resampler
//!
//! Arbitrary (non-rational) sample rate conversion using cubic 4-point
//! interpolation. Handles irrational ratios (e.g. 200 Hz → 62.5 Hz) and
//! keeps state across blocks so streams can be resampled record by record.
//!
//! [`ResamplerStore`] is the collaborator handle injected at detector
//! construction; it replaces any process-wide resampler registry and lives
//! as long as the detector does.
//!
//! ## Example
//!
//! ```rust
//! use quakematch_core::resampler::Resampler;
//!
//! // Downsample 200 Hz → 100 Hz
//! let mut resampler = Resampler::from_rates(200.0, 100.0);
//! let input = vec![1.0; 400];
//! let output = resampler.process_block(&input);
//! assert!((output.len() as f64 - 200.0).abs() <= 2.0);
//! ```

use crate::error::{DetectError, DetectResult};

/// Streaming fractional resampler with cubic interpolation.
#[derive(Debug, Clone)]
pub struct Resampler {
    /// Resampling ratio (output_rate / input_rate).
    ratio: f64,
    /// Fractional read position between the two middle history samples.
    mu: f64,
    /// Last four input samples; interpolation runs between history[1]
    /// and history[2].
    history: [f64; 4],
    input_count: u64,
    output_count: u64,
}

impl Resampler {
    /// Create with a fixed ratio (output_rate / input_rate).
    pub fn new(ratio: f64) -> Self {
        assert!(ratio > 0.0, "ratio must be positive");
        Self {
            ratio,
            mu: 0.0,
            history: [0.0; 4],
            input_count: 0,
            output_count: 0,
        }
    }

    /// Create for converting between two sample rates.
    pub fn from_rates(input_rate: f64, output_rate: f64) -> Self {
        assert!(input_rate > 0.0 && output_rate > 0.0, "rates must be positive");
        Self::new(output_rate / input_rate)
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Input samples consumed since creation or the last reset.
    pub fn input_count(&self) -> u64 {
        self.input_count
    }

    /// Output samples produced since creation or the last reset.
    pub fn output_count(&self) -> u64 {
        self.output_count
    }

    /// Resample a block of samples, advancing internal state.
    pub fn process_block(&mut self, input: &[f64]) -> Vec<f64> {
        let step = 1.0 / self.ratio;
        let mut output = Vec::with_capacity((input.len() as f64 * self.ratio) as usize + 2);

        for &x in input {
            self.history = [self.history[1], self.history[2], self.history[3], x];
            self.input_count += 1;

            while self.mu < 1.0 {
                output.push(cubic_interp(&self.history, self.mu));
                self.mu += step;
                self.output_count += 1;
            }
            self.mu -= 1.0;
        }

        output
    }

    /// Clear interpolation state.
    pub fn reset(&mut self) {
        self.mu = 0.0;
        self.history = [0.0; 4];
        self.input_count = 0;
        self.output_count = 0;
    }
}

/// 4-point cubic (Catmull-Rom) interpolation at fractional position `mu`
/// between `h[1]` and `h[2]`.
#[inline]
fn cubic_interp(h: &[f64; 4], mu: f64) -> f64 {
    let c0 = h[1];
    let c1 = 0.5 * (h[2] - h[0]);
    let c2 = h[0] - 2.5 * h[1] + 2.0 * h[2] - 0.5 * h[3];
    let c3 = 0.5 * (h[3] - h[0]) + 1.5 * (h[1] - h[2]);
    ((c3 * mu + c2) * mu + c1) * mu + c0
}

/// Factory handle for resamplers.
///
/// Injected at detector construction; stream states and template
/// preparation obtain their resamplers through it.
#[derive(Debug, Clone, Default)]
pub struct ResamplerStore;

impl ResamplerStore {
    pub fn new() -> Self {
        Self
    }

    /// A fresh resampler converting between the given rates.
    pub fn get(&self, input_rate: f64, output_rate: f64) -> DetectResult<Resampler> {
        if input_rate <= 0.0 || output_rate <= 0.0 {
            return Err(DetectError::Config(format!(
                "invalid resampling rates: {input_rate} -> {output_rate}"
            )));
        }
        Ok(Resampler::from_rates(input_rate, output_rate))
    }

    /// One-shot resampling of a whole block.
    pub fn resample(
        &self,
        samples: &[f64],
        input_rate: f64,
        output_rate: f64,
    ) -> DetectResult<Vec<f64>> {
        if (input_rate - output_rate).abs() < 1e-9 * input_rate.max(1.0) {
            return Ok(samples.to_vec());
        }
        let mut resampler = self.get(input_rate, output_rate)?;
        Ok(resampler.process_block(samples))
    }
}
