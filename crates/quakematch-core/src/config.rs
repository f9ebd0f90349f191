//! # Detector Configuration
//!
//! Flat, explicitly enumerated configuration records for the detection
//! engine, plus the validation rules applied when a detector is built.
//!
//! ## Example
//!
//! ```rust
//! use quakematch_core::config::DetectorConfig;
//!
//! let config = DetectorConfig {
//!     trigger_threshold: 0.7,
//!     min_arrivals: Some(2),
//!     filter: Some("BW(3,1.5,15)".into()),
//!     ..Default::default()
//! };
//! assert!(config.validate(3).is_ok());
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{DetectError, DetectResult};
use crate::filters::parse_filter;
use crate::types::{TimeWindow, WaveformStreamId};

/// Smallest accepted arrival-offset threshold, in seconds. Values in
/// `(0, MIN_ARRIVAL_OFFSET_THRESHOLD)` are rejected at configuration time;
/// negative values disable pick-offset validation altogether.
pub const MIN_ARRIVAL_OFFSET_THRESHOLD: f64 = 2.0e-6;

/// Per-detector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Cross-correlation coefficient required to emit a match, in [-1, 1].
    pub trigger_threshold: f64,
    /// Tolerance in seconds for pick-offset validation during linking.
    /// Negative disables validation.
    pub arrival_offset_threshold: f64,
    /// Minimum number of arrivals for a detection. Unset means all
    /// configured template streams must contribute.
    pub min_arrivals: Option<usize>,
    /// Time span in seconds a candidate event remains open for additional
    /// matches.
    pub on_hold: f64,
    /// Composite fit cutoff for emitted detections, in [-1, 1].
    pub result_threshold: Option<f64>,
    /// Maximum inter-record gap in seconds tolerated before the stream
    /// state is flushed.
    pub gap_tolerance: f64,
    /// Linearly interpolate missing samples for gaps within the tolerance.
    pub gap_interpolation: bool,
    /// Streaming filter applied to incoming records, e.g. `BW(3,1.5,15)`.
    pub filter: Option<String>,
    /// Resample incoming records to this frequency in Hz before matching.
    pub target_sampling_frequency: Option<f64>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            trigger_threshold: 0.85,
            arrival_offset_threshold: 0.2,
            min_arrivals: None,
            on_hold: 10.0,
            result_threshold: None,
            gap_tolerance: 4.5,
            gap_interpolation: false,
            filter: None,
            target_sampling_frequency: None,
        }
    }
}

impl DetectorConfig {
    /// Validate the configuration against the number of configured
    /// template streams. Errors here are fatal to the detector being
    /// built, never to the process.
    pub fn validate(&self, num_streams: usize) -> DetectResult<()> {
        if !validate_xcorr_threshold(self.trigger_threshold) {
            return Err(DetectError::Config(format!(
                "trigger threshold out of range [-1,1]: {}",
                self.trigger_threshold
            )));
        }
        if !validate_arrival_offset_threshold(self.arrival_offset_threshold) {
            return Err(DetectError::Config(format!(
                "arrival offset threshold below {MIN_ARRIVAL_OFFSET_THRESHOLD}: {}",
                self.arrival_offset_threshold
            )));
        }
        if let Some(n) = self.min_arrivals {
            if !validate_min_arrivals(n, num_streams) {
                return Err(DetectError::Config(format!(
                    "min arrivals {n} not in [1, {num_streams}]"
                )));
            }
        }
        if self.on_hold < 0.0 {
            return Err(DetectError::Config(format!(
                "negative on-hold duration: {}",
                self.on_hold
            )));
        }
        if let Some(t) = self.result_threshold {
            if !validate_xcorr_threshold(t) {
                return Err(DetectError::Config(format!(
                    "result threshold out of range [-1,1]: {t}"
                )));
            }
        }
        if self.gap_tolerance < 0.0 {
            return Err(DetectError::Config(format!(
                "negative gap tolerance: {}",
                self.gap_tolerance
            )));
        }
        if let Some(fs) = self.target_sampling_frequency {
            if fs <= 0.0 {
                return Err(DetectError::Config(format!(
                    "target sampling frequency must be positive: {fs}"
                )));
            }
        }
        if let Some(f) = &self.filter {
            parse_filter(f)?;
        }
        Ok(())
    }
}

/// Whether a cross-correlation threshold lies in [-1, 1].
pub fn validate_xcorr_threshold(thres: f64) -> bool {
    (-1.0..=1.0).contains(&thres)
}

/// Whether an arrival-offset threshold is acceptable: negative disables
/// validation, otherwise it must be at least
/// [`MIN_ARRIVAL_OFFSET_THRESHOLD`].
pub fn validate_arrival_offset_threshold(thres: f64) -> bool {
    thres < 0.0 || thres >= MIN_ARRIVAL_OFFSET_THRESHOLD
}

/// Whether a minimum-arrivals setting is consistent with the number of
/// configured template streams.
pub fn validate_min_arrivals(n: usize, num_streams: usize) -> bool {
    n >= 1 && (num_streams == 0 || n <= num_streams)
}

/// Waveform processing configuration used when template snippets are
/// prepared from raw records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Filter applied to the template waveform, e.g. `BW(3,1.5,15)`.
    pub filter: Option<String>,
    /// Extra seconds of data requested around the template window.
    pub margin: f64,
    /// Resample the template to this frequency in Hz.
    pub target_frequency: Option<f64>,
    /// Remove the mean before filtering.
    pub demean: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            filter: None,
            margin: 2.0,
            target_frequency: None,
            demean: true,
        }
    }
}

impl ProcessingConfig {
    pub fn validate(&self) -> DetectResult<()> {
        if self.margin < 0.0 {
            return Err(DetectError::Config(format!(
                "negative processing margin: {}",
                self.margin
            )));
        }
        if let Some(fs) = self.target_frequency {
            if fs <= 0.0 {
                return Err(DetectError::Config(format!(
                    "target frequency must be positive: {fs}"
                )));
            }
        }
        if let Some(f) = &self.filter {
            parse_filter(f)?;
        }
        Ok(())
    }

    /// Key identifying a processed waveform in an external cache.
    ///
    /// Every field influencing the processed samples is serialized
    /// explicitly so equal keys imply equal processing.
    pub fn cache_key(&self, stream_id: &WaveformStreamId, window: &TimeWindow) -> String {
        format!(
            "{}.{:.6}.{:.6}.filter={}.margin={}.target={}.demean={}",
            stream_id,
            window.start.epoch_secs(),
            window.end.epoch_secs(),
            self.filter.as_deref().unwrap_or(""),
            self.margin,
            self.target_frequency.unwrap_or(0.0),
            self.demean,
        )
    }
}
