//! # quakematch-core
//!
//! Real-time seismic event detection by template matching. The engine
//! scans continuous multi-channel waveform streams against a library of
//! pre-recorded template events and emits a detection whenever one or
//! more templates match with sufficient confidence.
//!
//! ## Pipeline
//!
//! ```text
//!                  records
//!                     │
//!           ┌─────────┴──────────┐
//!           ▼                    ▼
//!    StreamBuffer+Filter   StreamBuffer+Filter     (one per input stream)
//!           │                    │
//!           ▼                    ▼
//!    TemplateProcessor   TemplateProcessor ...     (one per (template,stream))
//!           │                    │
//!           └────────┬───────────┘
//!                    ▼
//!                  Linker            (one per detector/origin)
//!                    │
//!                    ▼
//!                Detection
//! ```
//!
//! Each [`TemplateProcessor`] cross-correlates incoming samples with its
//! template using rolling window statistics and reports a match when the
//! peak coefficient exceeds the trigger threshold. The [`Linker`]
//! associates coincident matches across channels, enforcing the
//! template's inter-arrival geometry through a pick-offset table, and the
//! [`Detector`] publishes scored multi-arrival [`Detection`]s.
//!
//! The engine is single-threaded and cooperative: an outer loop pulls
//! records and calls [`Detector::feed`]; all callbacks run synchronously
//! on the feeding thread. The only time-based policy, the on-hold expiry
//! of candidate events, is driven through the replaceable
//! [`time::Clock`] collaborator.
//!
//! ## Example
//!
//! ```rust,no_run
//! use quakematch_core::{
//!     Arrival, Detector, DetectorConfig, Origin, Pick, Record, TemplateWaveform, Time,
//!     WaveformStreamId,
//! };
//!
//! let stream: WaveformStreamId = "CH.SULZ..HHZ".parse().unwrap();
//! let t0 = Time::from_epoch(1_600_000_000.0);
//!
//! // A 2 s template snippet at 100 Hz around a known P pick.
//! let template = TemplateWaveform {
//!     id: "tpl-01".into(),
//!     stream_id: stream.clone(),
//!     samples: vec![0.0; 200],
//!     sampling_frequency: 100.0,
//!     start_time: t0,
//!     pick_time: t0 + 0.5,
//! };
//! let arrival = Arrival::new(Pick {
//!     time: t0 + 0.5,
//!     stream_id: stream.clone(),
//!     phase_hint: Some("P".into()),
//! });
//!
//! let origin = Origin {
//!     time: t0,
//!     latitude: 46.9,
//!     longitude: 8.6,
//!     depth: 5.0,
//!     magnitude: None,
//! };
//! let mut detector = Detector::builder("detector-01", origin)
//!     .config(DetectorConfig {
//!         trigger_threshold: 0.8,
//!         filter: Some("BW(3,1.5,15)".into()),
//!         ..Default::default()
//!     })
//!     .stream(template, arrival)
//!     .build()
//!     .unwrap();
//! detector.set_detection_callback(Box::new(|d| {
//!     println!("detection: fit={:.2} at {}", d.fit, d.time);
//! }));
//!
//! let record = Record::new(stream, t0 + 3600.0, 100.0, vec![0.0; 4096]);
//! detector.feed(&record).unwrap();
//! ```

pub mod config;
pub mod detector;
pub mod error;
pub mod filters;
pub mod linker;
pub mod observe;
pub mod pot;
pub mod resampler;
pub mod stream_buffer;
pub mod template;
pub mod template_processor;
pub mod time;
pub mod types;

pub use config::{DetectorConfig, ProcessingConfig};
pub use detector::{Detection, DetectionCallback, Detector, DetectorBuilder, Origin};
pub use error::{DetectError, DetectResult};
pub use linker::{Linker, LinkerResult, LinkerStatus, TemplateResult};
pub use pot::PickOffsetTable;
pub use resampler::{Resampler, ResamplerStore};
pub use template::{build_template, TemplateWaveform};
pub use template_processor::{MatchResult, TemplateProcessor};
pub use time::{Clock, ManualClock, SystemClock, Time};
pub use types::{Arrival, Pick, Record, Sample, TimeWindow, WaveformStreamId};
