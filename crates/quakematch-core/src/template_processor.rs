//! # Template Cross-Correlation Processor
//!
//! Matches one template waveform against one prepared stream buffer. For
//! every candidate lag whose window lies fully inside the buffer, the
//! processor computes the normalized cross-correlation coefficient
//!
//! ```text
//!        Σ (x_k − x̄)(t_k − t̄)
//! c(i) = ─────────────────────────────
//!        √( Σ(x_k − x̄)² · Σ(t_k − t̄)² )
//! ```
//!
//! using rolling sums for the window mean and energy (the template sums
//! are precomputed once). Each processing pass scans the lags that became
//! admissible since the previous pass, records the argmax, and emits a
//! [`MatchResult`] once the peak exceeds the trigger threshold and the
//! scan has advanced a full template length past it. A re-trigger within
//! one template length of a prior emission is suppressed.
//!
//! If either window or template variance is below `1e-12`, the
//! coefficient at that lag is defined to be 0.

use tracing::{debug, warn};

use crate::config::{validate_xcorr_threshold, DetectorConfig};
use crate::error::{DetectError, DetectResult};
use crate::resampler::ResamplerStore;
use crate::stream_buffer::{FeedOutcome, StreamBuffer};
use crate::template::TemplateWaveform;
use crate::types::{Record, TimeWindow};

/// Variance floor below which a correlation coefficient is defined as 0.
const VARIANCE_EPSILON: f64 = 1e-12;

/// Extra seconds of history the stream buffer keeps beyond the template
/// window, bounding the largest reportable lag between passes.
const BUFFER_MARGIN_SECS: f64 = 10.0;

/// A reported template match.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    /// Time extent of the evaluated stream buffer.
    pub time_window: TimeWindow,
    /// Offset in seconds from `time_window.start` to the start of the
    /// matched segment. May be negative when the match precedes the
    /// currently buffered data.
    pub lag: f64,
    /// Peak correlation coefficient, in [-1, 1].
    pub coefficient: f64,
    /// Number of lags evaluated since the previous emission.
    pub num_samples_evaluated: usize,
}

/// What one `feed` call produced.
#[derive(Debug, Default)]
pub struct FeedReport {
    /// Buffer outcome; `None` when the processor is terminated.
    pub outcome: Option<FeedOutcome>,
    pub matches: Vec<MatchResult>,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    /// Global sample index of the matched segment start.
    index: u64,
    coefficient: f64,
}

/// Cross-correlation processor for one (template, stream) pair.
pub struct TemplateProcessor {
    id: String,
    template: TemplateWaveform,
    resamplers: ResamplerStore,
    trigger_threshold: f64,
    buffer: StreamBuffer,

    /// Template adapted to the buffer sampling frequency, mean removed.
    active: Vec<f64>,
    /// Σ (t − t̄)² of the adapted template.
    active_var_sum: f64,
    active_fs: f64,

    generation: u64,
    /// Global index of the next lag not yet scanned.
    next_index: u64,
    pending: Option<Candidate>,
    last_emission: Option<u64>,
    evaluated: usize,
    terminated: bool,
}

impl TemplateProcessor {
    pub fn new(
        id: impl Into<String>,
        template: TemplateWaveform,
        config: &DetectorConfig,
        resamplers: ResamplerStore,
    ) -> DetectResult<Self> {
        let id = id.into();
        if !validate_xcorr_threshold(config.trigger_threshold) {
            return Err(DetectError::Config(format!(
                "trigger threshold out of range [-1,1]: {}",
                config.trigger_threshold
            )));
        }
        if template.len() < 2 {
            return Err(DetectError::Config(format!(
                "processor {id}: template too short ({} samples)",
                template.len()
            )));
        }
        if !template.stream_id.is_valid() {
            return Err(DetectError::Config(format!(
                "processor {id}: invalid template stream id"
            )));
        }
        let filter_spec = match &config.filter {
            Some(f) => Some(crate::filters::parse_filter(f)?),
            None => None,
        };

        let capacity_secs = 2.0 * template.duration() + BUFFER_MARGIN_SECS;
        let buffer = StreamBuffer::new(
            template.stream_id.clone(),
            config.gap_tolerance,
            config.gap_interpolation,
            filter_spec,
            config.target_sampling_frequency,
            capacity_secs,
            resamplers.clone(),
        );

        let (active, active_var_sum) = center(&template.samples);
        if active_var_sum < VARIANCE_EPSILON {
            warn!(processor = %id, "template has near-zero variance, matches will not trigger");
        }
        let active_fs = template.sampling_frequency;

        Ok(Self {
            id,
            template,
            resamplers,
            trigger_threshold: config.trigger_threshold,
            buffer,
            active,
            active_var_sum,
            active_fs,
            generation: 0,
            next_index: 0,
            pending: None,
            last_emission: None,
            evaluated: 0,
            terminated: false,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn template(&self) -> &TemplateWaveform {
        &self.template
    }

    pub fn stream_id(&self) -> &crate::types::WaveformStreamId {
        &self.template.stream_id
    }

    /// Number of input samples received since the last stream restart.
    pub fn received_samples(&self) -> u64 {
        self.buffer.received_samples()
    }

    /// Feed one record; returns the buffer outcome and any emitted match.
    pub fn feed(&mut self, record: &Record) -> DetectResult<FeedReport> {
        if self.terminated {
            debug!(processor = %self.id, "record dropped, processor terminated");
            return Ok(FeedReport::default());
        }

        let outcome = self.buffer.feed(record)?;
        if self.buffer.generation() != self.generation {
            self.generation = self.buffer.generation();
            self.next_index = self.buffer.first_index();
            self.pending = None;
            self.last_emission = None;
            self.evaluated = 0;
            self.adapt_template()?;
        }

        let mut matches = Vec::new();
        if let Some(m) = self.scan() {
            matches.push(m);
        }
        self.buffer.enforce_capacity(self.next_index);

        Ok(FeedReport {
            outcome: Some(outcome),
            matches,
        })
    }

    /// Flush a pending peak that satisfies the trigger threshold and mark
    /// the processor read-only.
    pub fn terminate(&mut self) -> Option<MatchResult> {
        if self.terminated {
            return None;
        }
        self.terminated = true;
        let candidate = self.pending.take()?;
        self.emit(candidate)
    }

    /// Reset all stream and scan state. The processor accepts records
    /// again afterwards.
    pub fn reset(&mut self) {
        self.buffer.reset();
        self.next_index = 0;
        self.pending = None;
        self.last_emission = None;
        self.evaluated = 0;
        self.terminated = false;
    }

    /// Re-derive the matching kernel when the buffer sampling frequency
    /// changed (the stream may deliver a different rate than the template
    /// was built at).
    fn adapt_template(&mut self) -> DetectResult<()> {
        let fs = self.buffer.sampling_frequency();
        if (fs - self.active_fs).abs() <= 1e-9 * fs {
            return Ok(());
        }
        let samples = if (fs - self.template.sampling_frequency).abs()
            <= 1e-9 * self.template.sampling_frequency
        {
            self.template.samples.clone()
        } else {
            debug!(
                processor = %self.id,
                from = self.template.sampling_frequency,
                to = fs,
                "resampling template to stream frequency"
            );
            self.resamplers
                .resample(&self.template.samples, self.template.sampling_frequency, fs)?
        };
        if samples.len() < 2 {
            return Err(DetectError::Config(format!(
                "processor {}: template too short after resampling",
                self.id
            )));
        }
        let (active, var_sum) = center(&samples);
        self.active = active;
        self.active_var_sum = var_sum;
        self.active_fs = fs;
        Ok(())
    }

    /// Scan lags that became admissible since the previous pass and
    /// resolve the candidate peak.
    fn scan(&mut self) -> Option<MatchResult> {
        let m = self.active.len();
        if !self.buffer.initialized() || self.buffer.len() < m {
            return None;
        }
        let first = self.buffer.first_index();
        let last_admissible = self.buffer.end_index() - m as u64;
        if self.next_index < first {
            self.next_index = first;
        }

        let mut pass_best: Option<Candidate> = None;
        if self.next_index <= last_admissible {
            let mut win_sum = 0.0;
            let mut win_sum_sq = 0.0;
            for k in 0..m {
                let x = self.buffer.sample(self.next_index + k as u64);
                win_sum += x;
                win_sum_sq += x * x;
            }

            let mut idx = self.next_index;
            loop {
                let coefficient = self.coefficient_at(idx, win_sum, win_sum_sq);
                self.evaluated += 1;
                if pass_best.map_or(true, |b| coefficient > b.coefficient) {
                    pass_best = Some(Candidate { index: idx, coefficient });
                }
                if idx == last_admissible {
                    break;
                }
                let leaving = self.buffer.sample(idx);
                let entering = self.buffer.sample(idx + m as u64);
                win_sum += entering - leaving;
                win_sum_sq += entering * entering - leaving * leaving;
                idx += 1;
            }
            self.next_index = last_admissible + 1;
        }

        let candidate = match (self.pending.take(), pass_best) {
            (Some(p), Some(b)) => Some(if b.coefficient > p.coefficient { b } else { p }),
            (Some(p), None) => Some(p),
            (None, b) => b,
        }?;

        if candidate.coefficient < self.trigger_threshold {
            return None;
        }
        if let Some(last) = self.last_emission {
            if candidate.index < last + m as u64 {
                debug!(
                    processor = %self.id,
                    index = candidate.index,
                    "re-trigger within one template length suppressed"
                );
                return None;
            }
        }
        // Hold the peak while it could still grow with more data.
        if candidate.index + m as u64 > last_admissible {
            self.pending = Some(candidate);
            return None;
        }
        self.emit(candidate)
    }

    fn coefficient_at(&self, index: u64, win_sum: f64, win_sum_sq: f64) -> f64 {
        let m = self.active.len() as f64;
        let mean = win_sum / m;
        let var_sum = win_sum_sq - m * mean * mean;
        if var_sum < VARIANCE_EPSILON || self.active_var_sum < VARIANCE_EPSILON {
            return 0.0;
        }
        // The centered template sums to zero, so the plain dot product
        // equals Σ (x − x̄)(t − t̄).
        let mut dot = 0.0;
        for (k, &t) in self.active.iter().enumerate() {
            dot += self.buffer.sample(index + k as u64) * t;
        }
        (dot / (var_sum * self.active_var_sum).sqrt()).clamp(-1.0, 1.0)
    }

    fn emit(&mut self, candidate: Candidate) -> Option<MatchResult> {
        let time_window = self.buffer.window()?;
        let lag = (candidate.index as i64 - self.buffer.first_index() as i64) as f64
            / self.buffer.sampling_frequency();
        let result = MatchResult {
            time_window,
            lag,
            coefficient: candidate.coefficient,
            num_samples_evaluated: self.evaluated,
        };
        debug!(
            processor = %self.id,
            coefficient = candidate.coefficient,
            lag,
            "match emitted"
        );
        self.evaluated = 0;
        self.last_emission = Some(candidate.index);
        self.pending = None;
        Some(result)
    }
}

/// Remove the mean; returns the centered samples and Σ (t − t̄)².
fn center(samples: &[f64]) -> (Vec<f64>, f64) {
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    let centered: Vec<f64> = samples.iter().map(|s| s - mean).collect();
    let var_sum = centered.iter().map(|s| s * s).sum();
    (centered, var_sum)
}
