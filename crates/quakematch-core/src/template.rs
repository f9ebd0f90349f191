//! # Template Waveforms
//!
//! A template is a short waveform snippet around a known arrival, used as
//! the matching kernel. Templates are produced once at build time by
//! demeaning, resampling, filtering and trimming a raw record, in that
//! order, and are read-only afterwards.

use tracing::debug;

use crate::config::ProcessingConfig;
use crate::error::{DetectError, DetectResult};
use crate::filters::{parse_filter, StreamFilter};
use crate::resampler::ResamplerStore;
use crate::time::Time;
use crate::types::{Record, Sample, TimeWindow, WaveformStreamId};

/// A processed template waveform snippet.
#[derive(Debug, Clone)]
pub struct TemplateWaveform {
    pub id: String,
    pub stream_id: WaveformStreamId,
    pub samples: Vec<Sample>,
    pub sampling_frequency: f64,
    /// Start time of the first template sample.
    pub start_time: Time,
    /// The reference pick the template was cut around.
    pub pick_time: Time,
}

impl TemplateWaveform {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Template duration in seconds.
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sampling_frequency
    }

    /// Offset of the reference pick from the template start, in seconds.
    pub fn pick_offset(&self) -> f64 {
        self.pick_time - self.start_time
    }
}

/// Build a template from a raw record.
///
/// Processing order: demean, resample to the target frequency, filter,
/// trim to the requested window. The record must cover the window; the
/// processing margin of [`ProcessingConfig`] exists so callers request
/// enough extra data for filter settling.
pub fn build_template(
    id: impl Into<String>,
    record: &Record,
    pick_time: Time,
    window: TimeWindow,
    config: &ProcessingConfig,
    resamplers: &ResamplerStore,
) -> DetectResult<TemplateWaveform> {
    let id = id.into();
    config.validate()?;
    if record.is_empty() {
        return Err(DetectError::Config(format!(
            "template {id}: empty source record"
        )));
    }

    let mut samples = record.samples.clone();
    let mut sampling_frequency = record.sampling_frequency;
    let start_time = record.start_time;

    if config.demean {
        demean(&mut samples);
    }
    if let Some(target) = config.target_frequency {
        if (target - sampling_frequency).abs() > 1e-9 * sampling_frequency {
            samples = resamplers.resample(&samples, sampling_frequency, target)?;
            sampling_frequency = target;
        }
    }
    if let Some(f) = &config.filter {
        let mut filter = parse_filter(f)?.instantiate(sampling_frequency)?;
        filter.apply(&mut samples);
    }

    let (samples, start_time) = trim(samples, start_time, sampling_frequency, window, &id)?;
    debug!(
        template = %id,
        stream = %record.stream_id,
        samples = samples.len(),
        fs = sampling_frequency,
        "template built"
    );

    Ok(TemplateWaveform {
        id,
        stream_id: record.stream_id.clone(),
        samples,
        sampling_frequency,
        start_time,
        pick_time,
    })
}

/// Subtract the mean in place.
pub fn demean(samples: &mut [f64]) {
    if samples.is_empty() {
        return;
    }
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    for s in samples.iter_mut() {
        *s -= mean;
    }
}

fn trim(
    samples: Vec<f64>,
    start_time: Time,
    sampling_frequency: f64,
    window: TimeWindow,
    id: &str,
) -> DetectResult<(Vec<f64>, Time)> {
    let offset = ((window.start - start_time) * sampling_frequency).round() as i64;
    let count = (window.length() * sampling_frequency).round() as usize;

    if offset < 0 {
        return Err(DetectError::Config(format!(
            "template {id}: need {} more samples in the past",
            -offset
        )));
    }
    let offset = offset as usize;
    if offset + count > samples.len() {
        return Err(DetectError::Config(format!(
            "template {id}: need {} more samples past the end",
            offset + count - samples.len()
        )));
    }
    if count == 0 {
        return Err(DetectError::Config(format!(
            "template {id}: empty template window"
        )));
    }

    let trimmed = samples[offset..offset + count].to_vec();
    let trimmed_start = start_time + offset as f64 / sampling_frequency;
    Ok((trimmed, trimmed_start))
}
