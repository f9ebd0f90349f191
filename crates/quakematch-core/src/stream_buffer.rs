//! # Stream Preprocessing and Buffering
//!
//! Per-stream state for one template processor: initialization on the
//! first record, reset on sampling-frequency changes and out-of-order
//! delivery, the three-way gap policy, in-place streaming filtering,
//! optional resampling to a target frequency, and a bounded FIFO sample
//! buffer addressed by global sample index.
//!
//! Gap policy, keyed on the configured tolerance:
//!
//! - gap below half a sampling interval: contiguous (numeric noise)
//! - gap within tolerance and interpolation enabled: synthesize
//!   `round(gap * fs)` samples by linear interpolation and feed them
//!   through the filter before the new record
//! - otherwise: flush and reset; the next samples start a fresh buffer

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::error::{DetectError, DetectResult};
use crate::filters::{FilterSpec, IirFilter, StreamFilter};
use crate::resampler::{Resampler, ResamplerStore};
use crate::time::Time;
use crate::types::{Record, TimeWindow, WaveformStreamId};

/// Why a stream state was flushed and re-initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    SamplingFrequencyChange,
    OutOfOrder,
    GapExceeded,
}

/// What feeding one record did to the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOutcome {
    /// First record for the stream.
    Initialized { appended: usize },
    /// Record appended; `interpolated` counts synthesized gap samples.
    Appended { appended: usize, interpolated: usize },
    /// Stream state was reset, then the record started a fresh buffer.
    Restarted { appended: usize, reason: RestartReason },
}

/// Preprocessing pipeline and bounded sample buffer for one stream.
///
/// Samples are addressed by a monotonically increasing global index; index
/// 0 is the first sample after the most recent (re)initialization. The
/// `generation` counter increments on every (re)initialization so
/// consumers can detect that their indices went stale.
#[derive(Debug)]
pub struct StreamBuffer {
    stream_id: WaveformStreamId,
    gap_tolerance: f64,
    gap_interpolation: bool,
    filter_spec: Option<FilterSpec>,
    target_frequency: Option<f64>,
    capacity_secs: f64,
    resamplers: ResamplerStore,

    initialized: bool,
    input_frequency: f64,
    output_frequency: f64,
    filter: Option<IirFilter>,
    resampler: Option<Resampler>,
    last_end_time: Time,
    last_raw_sample: f64,
    received_samples: u64,
    capacity_samples: usize,

    data: VecDeque<f64>,
    start_time: Time,
    first_index: u64,
    generation: u64,
}

impl StreamBuffer {
    pub fn new(
        stream_id: WaveformStreamId,
        gap_tolerance: f64,
        gap_interpolation: bool,
        filter_spec: Option<FilterSpec>,
        target_frequency: Option<f64>,
        capacity_secs: f64,
        resamplers: ResamplerStore,
    ) -> Self {
        Self {
            stream_id,
            gap_tolerance,
            gap_interpolation,
            filter_spec,
            target_frequency,
            capacity_secs,
            resamplers,
            initialized: false,
            input_frequency: 0.0,
            output_frequency: 0.0,
            filter: None,
            resampler: None,
            last_end_time: Time::default(),
            last_raw_sample: 0.0,
            received_samples: 0,
            capacity_samples: 0,
            data: VecDeque::new(),
            start_time: Time::default(),
            first_index: 0,
            generation: 0,
        }
    }

    /// Feed one record through the pipeline into the buffer.
    pub fn feed(&mut self, record: &Record) -> DetectResult<FeedOutcome> {
        debug_assert_eq!(record.stream_id, self.stream_id);
        if record.sampling_frequency <= 0.0 {
            return Err(DetectError::DataInconsistency {
                stream_id: self.stream_id.to_string(),
                reason: format!(
                    "invalid sampling frequency: {}",
                    record.sampling_frequency
                ),
            });
        }
        if record.is_empty() {
            return Ok(FeedOutcome::Appended {
                appended: 0,
                interpolated: 0,
            });
        }

        if !self.initialized {
            let appended = self.init_stream(record)?;
            return Ok(FeedOutcome::Initialized { appended });
        }

        if (record.sampling_frequency - self.input_frequency).abs()
            > 1e-9 * self.input_frequency
        {
            warn!(
                stream = %self.stream_id,
                old = self.input_frequency,
                new = record.sampling_frequency,
                "sampling frequency changed, resetting stream"
            );
            self.reset();
            let appended = self.init_stream(record)?;
            return Ok(FeedOutcome::Restarted {
                appended,
                reason: RestartReason::SamplingFrequencyChange,
            });
        }

        let dt = 1.0 / self.input_frequency;
        let gap = record.start_time - self.last_end_time;

        if gap.abs() < 0.5 * dt {
            let appended = self.append(&record.samples);
            self.note_record(record);
            return Ok(FeedOutcome::Appended {
                appended,
                interpolated: 0,
            });
        }

        if gap < 0.0 {
            warn!(
                stream = %self.stream_id,
                gap_secs = gap,
                "out-of-order record, resetting stream"
            );
            self.reset();
            let appended = self.init_stream(record)?;
            return Ok(FeedOutcome::Restarted {
                appended,
                reason: RestartReason::OutOfOrder,
            });
        }

        if gap <= self.gap_tolerance && self.gap_interpolation {
            let missing = (gap * self.input_frequency).round() as usize;
            let mut appended = 0;
            if missing > 0 {
                let synth = linear_fill(self.last_raw_sample, record.samples[0], missing);
                appended += self.append(&synth);
                debug!(
                    stream = %self.stream_id,
                    gap_secs = gap,
                    samples = missing,
                    "interpolated gap"
                );
            }
            appended += self.append(&record.samples);
            self.note_record(record);
            return Ok(FeedOutcome::Appended {
                appended,
                interpolated: missing,
            });
        }

        warn!(
            stream = %self.stream_id,
            gap_secs = gap,
            tolerance = self.gap_tolerance,
            interpolation = self.gap_interpolation,
            "gap exceeds tolerance, resetting stream"
        );
        self.reset();
        let appended = self.init_stream(record)?;
        Ok(FeedOutcome::Restarted {
            appended,
            reason: RestartReason::GapExceeded,
        })
    }

    fn init_stream(&mut self, record: &Record) -> DetectResult<usize> {
        let fs = record.sampling_frequency;
        self.input_frequency = fs;
        self.output_frequency = self.target_frequency.unwrap_or(fs);
        self.filter = match &self.filter_spec {
            Some(spec) => Some(spec.instantiate(fs)?),
            None => None,
        };
        self.resampler = if (self.output_frequency - fs).abs() > 1e-9 * fs {
            Some(self.resamplers.get(fs, self.output_frequency)?)
        } else {
            None
        };
        self.capacity_samples = (self.capacity_secs * self.output_frequency).ceil() as usize;
        self.capacity_samples = self.capacity_samples.max(1);
        self.data.clear();
        self.start_time = record.start_time;
        self.first_index = 0;
        self.generation += 1;
        self.initialized = true;
        self.received_samples = 0;

        let appended = self.append(&record.samples);
        self.note_record(record);
        debug!(
            stream = %self.stream_id,
            fs,
            output_fs = self.output_frequency,
            "stream initialized"
        );
        Ok(appended)
    }

    /// Filter, resample and push raw input-domain samples.
    fn append(&mut self, raw: &[f64]) -> usize {
        let mut work = raw.to_vec();
        if let Some(filter) = &mut self.filter {
            filter.apply(&mut work);
        }
        let out = match &mut self.resampler {
            Some(resampler) => resampler.process_block(&work),
            None => work,
        };
        let appended = out.len();
        self.data.extend(out);
        appended
    }

    fn note_record(&mut self, record: &Record) {
        self.last_end_time = record.end_time();
        if let Some(&last) = record.samples.last() {
            self.last_raw_sample = last;
        }
        self.received_samples += record.len() as u64;
    }

    /// Flush all state; the next record re-initializes the stream.
    pub fn reset(&mut self) {
        self.initialized = false;
        self.filter = None;
        self.resampler = None;
        self.data.clear();
        self.first_index = 0;
        self.received_samples = 0;
    }

    /// Evict samples beyond capacity, but never at or above
    /// `protect_from` (global index).
    pub fn enforce_capacity(&mut self, protect_from: u64) {
        while self.data.len() > self.capacity_samples && self.first_index < protect_from {
            self.data.pop_front();
            self.first_index += 1;
        }
    }

    pub fn initialized(&self) -> bool {
        self.initialized
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Buffer sampling frequency (the target frequency when resampling).
    pub fn sampling_frequency(&self) -> f64 {
        self.output_frequency
    }

    /// Global index of the oldest buffered sample.
    pub fn first_index(&self) -> u64 {
        self.first_index
    }

    /// One past the global index of the newest buffered sample.
    pub fn end_index(&self) -> u64 {
        self.first_index + self.data.len() as u64
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Sample at a global index. The index must be buffered.
    #[inline]
    pub fn sample(&self, global_index: u64) -> f64 {
        self.data[(global_index - self.first_index) as usize]
    }

    /// Absolute time of a global sample index.
    pub fn time_of(&self, global_index: u64) -> Time {
        self.start_time + global_index as f64 / self.output_frequency
    }

    /// Time extent of the currently buffered samples.
    pub fn window(&self) -> Option<TimeWindow> {
        if self.data.is_empty() {
            return None;
        }
        Some(TimeWindow::new(
            self.time_of(self.first_index),
            self.time_of(self.end_index()),
        ))
    }

    pub fn received_samples(&self) -> u64 {
        self.received_samples
    }

    pub fn stream_id(&self) -> &WaveformStreamId {
        &self.stream_id
    }
}

/// `count` samples linearly interpolated strictly between `from` and `to`.
fn linear_fill(from: f64, to: f64, count: usize) -> Vec<f64> {
    let step = (to - from) / (count + 1) as f64;
    (1..=count).map(|k| from + step * k as f64).collect()
}
