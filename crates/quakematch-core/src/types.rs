//! Core data types shared across the detection engine: waveform stream
//! identifiers, records, time windows, picks and arrivals.
//!
//! A stream is one continuous channel of samples identified by
//! `NET.STA.LOC.CHA` codes; the identifier is used as a dictionary key
//! throughout the engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DetectError;
use crate::time::Time;

/// A single real-valued waveform sample.
pub type Sample = f64;

/// Identifies one waveform stream by network, station, location and
/// channel codes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WaveformStreamId {
    /// Network code, e.g. `CH`.
    pub net: String,
    /// Station code, e.g. `SULZ`.
    pub sta: String,
    /// Location code, may be empty.
    pub loc: String,
    /// Channel code, e.g. `HHZ`.
    pub cha: String,
}

impl WaveformStreamId {
    /// Create a stream id from its four codes.
    pub fn new(
        net: impl Into<String>,
        sta: impl Into<String>,
        loc: impl Into<String>,
        cha: impl Into<String>,
    ) -> Self {
        Self {
            net: net.into(),
            sta: sta.into(),
            loc: loc.into(),
            cha: cha.into(),
        }
    }

    /// A stream id is valid if network, station and channel codes are
    /// non-empty. The location code may be empty.
    pub fn is_valid(&self) -> bool {
        !self.net.is_empty() && !self.sta.is_empty() && !self.cha.is_empty()
    }

    /// The `NET.STA` part identifying the station.
    pub fn station_id(&self) -> String {
        format!("{}.{}", self.net, self.sta)
    }
}

impl fmt::Display for WaveformStreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.net, self.sta, self.loc, self.cha)
    }
}

impl FromStr for WaveformStreamId {
    type Err = DetectError;

    /// Parse a `NET.STA.LOC.CHA` string. The location code may be empty
    /// (`CH.SULZ..HHZ`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 4 {
            return Err(DetectError::Config(format!(
                "invalid waveform stream id: {s}"
            )));
        }
        let id = Self::new(parts[0], parts[1], parts[2], parts[3]);
        if !id.is_valid() {
            return Err(DetectError::Config(format!(
                "invalid waveform stream id: {s}"
            )));
        }
        Ok(id)
    }
}

/// A half-open time window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TimeWindow {
    pub start: Time,
    pub end: Time,
}

impl TimeWindow {
    pub fn new(start: Time, end: Time) -> Self {
        Self { start, end }
    }

    /// Window length in seconds.
    pub fn length(&self) -> f64 {
        self.end - self.start
    }

    pub fn contains(&self, t: Time) -> bool {
        t >= self.start && t < self.end
    }
}

/// A block of contiguous samples for one stream.
///
/// Records are immutable once received. Consecutive records for a stream
/// may arrive with gaps or overlaps; the stream preprocessor decides how
/// to handle them.
#[derive(Debug, Clone)]
pub struct Record {
    pub stream_id: WaveformStreamId,
    pub start_time: Time,
    /// Sampling frequency in Hz.
    pub sampling_frequency: f64,
    pub samples: Vec<Sample>,
}

impl Record {
    pub fn new(
        stream_id: WaveformStreamId,
        start_time: Time,
        sampling_frequency: f64,
        samples: Vec<Sample>,
    ) -> Self {
        Self {
            stream_id,
            start_time,
            sampling_frequency,
            samples,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Record duration in seconds.
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sampling_frequency
    }

    /// End time of the record: one sampling interval past the last sample.
    pub fn end_time(&self) -> Time {
        self.start_time + self.duration()
    }

    pub fn time_window(&self) -> TimeWindow {
        TimeWindow::new(self.start_time, self.end_time())
    }
}

/// A phase pick: a timestamp identifying a phase arrival at a station.
#[derive(Debug, Clone, PartialEq)]
pub struct Pick {
    pub time: Time,
    pub stream_id: WaveformStreamId,
    /// Phase hint, e.g. `P` or `S`.
    pub phase_hint: Option<String>,
}

/// A phase pick associated with an origin, carried alongside a template.
#[derive(Debug, Clone, PartialEq)]
pub struct Arrival {
    pub pick: Pick,
    pub weight: f64,
    pub enabled: bool,
}

impl Arrival {
    pub fn new(pick: Pick) -> Self {
        Self {
            pick,
            weight: 1.0,
            enabled: true,
        }
    }
}
