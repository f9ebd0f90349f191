//! # Detector
//!
//! The orchestrator: owns one linker and N template processors (one per
//! (template, stream) pair), routes incoming records to every processor
//! subscribed to their stream id, and converts linked results into
//! [`Detection`]s published through a callback.
//!
//! Detectors are assembled through [`DetectorBuilder`], which validates
//! the configuration against the configured streams; a detector that
//! fails validation refuses to start.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::DetectorConfig;
use crate::error::{DetectError, DetectResult};
use crate::linker::{Linker, LinkerResult, TemplateResult};
use crate::observe::DetectorMetrics;
use crate::resampler::ResamplerStore;
use crate::stream_buffer::FeedOutcome;
use crate::template::TemplateWaveform;
use crate::template_processor::TemplateProcessor;
use crate::time::{Clock, Time};
use crate::types::{Arrival, Record, WaveformStreamId};

/// A hypothesized source event the templates were built from.
#[derive(Debug, Clone, PartialEq)]
pub struct Origin {
    pub time: Time,
    pub latitude: f64,
    pub longitude: f64,
    pub depth: f64,
    /// Magnitude of the template origin, carried as a placeholder into
    /// detections; magnitude estimation for detections happens elsewhere.
    pub magnitude: Option<f64>,
}

/// A scored multi-arrival match of a template event in the data stream.
#[derive(Debug, Clone)]
pub struct Detection {
    /// Composite fit over the contributing templates.
    pub fit: f64,
    /// Origin time: pick time of the reference arrival.
    pub time: Time,
    pub latitude: f64,
    pub longitude: f64,
    pub depth: f64,
    pub magnitude: Option<f64>,
    pub num_stations_associated: usize,
    pub num_stations_used: usize,
    pub num_channels_associated: usize,
    pub num_channels_used: usize,
    /// Per-template contributions, keyed by processor id.
    pub template_results: HashMap<String, TemplateResult>,
}

/// Callback receiving published detections.
pub type DetectionCallback = Box<dyn FnMut(Detection)>;

/// Real-time template-matching detector for one origin.
pub struct Detector {
    id: String,
    origin: Origin,
    processors: Vec<TemplateProcessor>,
    /// Processor indices subscribed to each stream id.
    routes: HashMap<WaveformStreamId, Vec<usize>>,
    /// Template arrivals, parallel to `processors`.
    template_arrivals: Vec<Arrival>,
    linker: Linker,
    /// Results the linker callback parked for conversion.
    pending: Rc<RefCell<Vec<LinkerResult>>>,
    callback: Option<DetectionCallback>,
    metrics: Arc<DetectorMetrics>,
    terminated: bool,
}

impl Detector {
    pub fn builder(id: impl Into<String>, origin: Origin) -> DetectorBuilder {
        DetectorBuilder {
            id: id.into(),
            origin,
            config: DetectorConfig::default(),
            clock: None,
            resamplers: ResamplerStore::new(),
            streams: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn metrics(&self) -> &DetectorMetrics {
        &self.metrics
    }

    /// Distinct stream ids the detector is subscribed to.
    pub fn stream_ids(&self) -> Vec<WaveformStreamId> {
        let mut ids: Vec<WaveformStreamId> = self.routes.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn set_detection_callback(&mut self, callback: DetectionCallback) {
        self.callback = Some(callback);
    }

    /// Feed one record into every processor subscribed to its stream.
    ///
    /// Match results and detections are delivered synchronously through
    /// the installed callbacks before this call returns.
    pub fn feed(&mut self, record: &Record) -> DetectResult<()> {
        if self.terminated {
            debug!(detector = %self.id, "record dropped, detector terminated");
            return Ok(());
        }
        let Some(indices) = self.routes.get(&record.stream_id).cloned() else {
            return Ok(());
        };
        self.metrics.records_received.inc();

        for index in indices {
            let report = self.processors[index].feed(record)?;
            match report.outcome {
                Some(FeedOutcome::Initialized { appended }) => {
                    self.metrics.samples_buffered.inc_by(appended as u64);
                }
                Some(FeedOutcome::Appended {
                    appended,
                    interpolated,
                }) => {
                    self.metrics.samples_buffered.inc_by(appended as u64);
                    self.metrics.gaps_interpolated.inc_by(interpolated as u64);
                }
                Some(FeedOutcome::Restarted { appended, .. }) => {
                    self.metrics.stream_resets.inc();
                    self.metrics.samples_buffered.inc_by(appended as u64);
                }
                None => {}
            }
            for m in report.matches {
                self.metrics.matches_emitted.inc();
                let proc_id = self.processors[index].id().to_string();
                self.linker.feed(&proc_id, m)?;
            }
        }

        self.metrics
            .linker_queue_depth
            .set(self.linker.queue_len() as i64);
        self.publish_pending();
        Ok(())
    }

    /// Reset all processors and the linker. The detector accepts records
    /// again afterwards.
    pub fn reset(&mut self) {
        for proc in &mut self.processors {
            proc.reset();
        }
        self.linker.reset();
        self.pending.borrow_mut().clear();
        self.metrics.linker_queue_depth.set(0);
        self.terminated = false;
        debug!(detector = %self.id, "detector reset");
    }

    /// Terminate all processors (flushing pending peaks into the linker),
    /// then the linker (flushing its queue).
    pub fn terminate(&mut self) -> DetectResult<()> {
        if self.terminated {
            return Ok(());
        }
        for index in 0..self.processors.len() {
            if let Some(m) = self.processors[index].terminate() {
                self.metrics.matches_emitted.inc();
                let proc_id = self.processors[index].id().to_string();
                self.linker.feed(&proc_id, m)?;
            }
        }
        self.linker.terminate();
        self.metrics.linker_queue_depth.set(0);
        self.publish_pending();
        self.terminated = true;
        Ok(())
    }

    /// Convert parked linker results into detections and publish them.
    fn publish_pending(&mut self) {
        let drained: Vec<LinkerResult> = self.pending.borrow_mut().drain(..).collect();
        for res in drained {
            let detection = self.prepare_detection(res);
            self.metrics.detections_emitted.inc();
            debug!(
                detector = %self.id,
                fit = detection.fit,
                time = %detection.time,
                stations = detection.num_stations_used,
                "detection published"
            );
            if let Some(callback) = self.callback.as_mut() {
                callback(detection);
            }
        }
    }

    fn prepare_detection(&self, res: LinkerResult) -> Detection {
        let time = res
            .results
            .get(&res.ref_proc_id)
            .map(|tr| tr.arrival.pick.time)
            .unwrap_or(self.origin.time);

        let num_channels_associated = self
            .template_arrivals
            .iter()
            .map(|a| &a.pick.stream_id)
            .collect::<HashSet<_>>()
            .len();
        let num_stations_associated = self
            .template_arrivals
            .iter()
            .map(|a| a.pick.stream_id.station_id())
            .collect::<HashSet<_>>()
            .len();
        let num_channels_used = res
            .results
            .values()
            .map(|tr| &tr.arrival.pick.stream_id)
            .collect::<HashSet<_>>()
            .len();
        let num_stations_used = res
            .results
            .values()
            .map(|tr| tr.arrival.pick.stream_id.station_id())
            .collect::<HashSet<_>>()
            .len();

        Detection {
            fit: res.fit,
            time,
            latitude: self.origin.latitude,
            longitude: self.origin.longitude,
            depth: self.origin.depth,
            magnitude: self.origin.magnitude,
            num_stations_associated,
            num_stations_used,
            num_channels_associated,
            num_channels_used,
            template_results: res.results,
        }
    }
}

/// Assembles and validates a [`Detector`].
pub struct DetectorBuilder {
    id: String,
    origin: Origin,
    config: DetectorConfig,
    clock: Option<Box<dyn Clock>>,
    resamplers: ResamplerStore,
    streams: Vec<(TemplateWaveform, Arrival)>,
}

impl DetectorBuilder {
    pub fn config(mut self, config: DetectorConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the time source driving on-hold expiry (playback).
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    /// Inject the resampler collaborator.
    pub fn resampler_store(mut self, resamplers: ResamplerStore) -> Self {
        self.resamplers = resamplers;
        self
    }

    /// Add one (template, arrival) stream. The template id doubles as the
    /// processor id and must be unique within the detector.
    pub fn stream(mut self, template: TemplateWaveform, arrival: Arrival) -> Self {
        self.streams.push((template, arrival));
        self
    }

    pub fn build(self) -> DetectResult<Detector> {
        if self.streams.is_empty() {
            return Err(DetectError::Config(format!(
                "detector {}: no template streams configured",
                self.id
            )));
        }
        self.config.validate(self.streams.len())?;

        let mut seen = HashSet::new();
        for (template, arrival) in &self.streams {
            if !seen.insert(template.id.clone()) {
                return Err(DetectError::Config(format!(
                    "detector {}: duplicate template id {}",
                    self.id, template.id
                )));
            }
            if !arrival.pick.stream_id.is_valid() {
                return Err(DetectError::Config(format!(
                    "detector {}: template {} has an invalid arrival stream id",
                    self.id, template.id
                )));
            }
            if !arrival.enabled {
                warn!(
                    detector = %self.id,
                    template = %template.id,
                    "configured arrival is disabled"
                );
            }
        }

        let offset_threshold = if self.config.arrival_offset_threshold < 0.0 {
            None
        } else {
            Some(self.config.arrival_offset_threshold)
        };
        let mut linker = Linker::new(self.config.on_hold, offset_threshold);
        if let Some(clock) = self.clock {
            linker.set_clock(clock);
        }
        linker.set_min_arrivals(self.config.min_arrivals);
        linker.set_result_threshold(self.config.result_threshold);

        let pending: Rc<RefCell<Vec<LinkerResult>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = pending.clone();
        linker.set_result_callback(Box::new(move |res| {
            sink.borrow_mut().push(res.clone());
        }));

        let mut processors = Vec::with_capacity(self.streams.len());
        let mut template_arrivals = Vec::with_capacity(self.streams.len());
        let mut routes: HashMap<WaveformStreamId, Vec<usize>> = HashMap::new();
        for (template, arrival) in self.streams {
            let proc_id = template.id.clone();
            let pick_offset = arrival.pick.time - template.start_time;
            let stream_id = template.stream_id.clone();
            let processor = TemplateProcessor::new(
                proc_id.clone(),
                template,
                &self.config,
                self.resamplers.clone(),
            )?;

            linker.add(proc_id, arrival.clone(), pick_offset);
            routes.entry(stream_id).or_default().push(processors.len());
            processors.push(processor);
            template_arrivals.push(arrival);
        }

        debug!(
            detector = %self.id,
            processors = processors.len(),
            channels = linker.associated_channel_count(),
            "detector built"
        );

        Ok(Detector {
            id: self.id,
            origin: self.origin,
            processors,
            routes,
            template_arrivals,
            linker,
            pending,
            callback: None,
            metrics: Arc::new(DetectorMetrics::new()),
            terminated: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualClock;
    use crate::types::Pick;
    use approx::assert_relative_eq;

    fn stream(sta: &str) -> WaveformStreamId {
        WaveformStreamId::new("CH", sta, "", "HHZ")
    }

    fn wavelet() -> Vec<f64> {
        (0..200)
            .map(|i| {
                let t = i as f64 / 100.0;
                (t * 35.0).sin() * (-(t - 1.0).powi(2) * 4.0).exp()
            })
            .collect()
    }

    /// Template on `sta` starting at `start`, pick 0.5 s in.
    fn template(id: &str, sta: &str, start: f64) -> TemplateWaveform {
        TemplateWaveform {
            id: id.into(),
            stream_id: stream(sta),
            samples: wavelet(),
            sampling_frequency: 100.0,
            start_time: Time::from_epoch(start),
            pick_time: Time::from_epoch(start + 0.5),
        }
    }

    fn arrival(sta: &str, pick_time: f64) -> Arrival {
        Arrival::new(Pick {
            time: Time::from_epoch(pick_time),
            stream_id: stream(sta),
            phase_hint: Some("P".into()),
        })
    }

    fn origin() -> Origin {
        Origin {
            time: Time::from_epoch(1000.0),
            latitude: 46.9,
            longitude: 8.6,
            depth: 5.0,
            magnitude: Some(2.4),
        }
    }

    /// Two-stream detector: template picks 1000.5 on AAA, 1001.7 on BBB
    /// (inter-arrival offset 1.2 s).
    fn two_stream_detector() -> (Detector, Rc<RefCell<Vec<Detection>>>) {
        let config = DetectorConfig {
            trigger_threshold: 0.8,
            arrival_offset_threshold: 0.1,
            on_hold: 10.0,
            ..Default::default()
        };
        let mut detector = Detector::builder("det-01", origin())
            .config(config)
            .clock(ManualClock::new(Time::from_epoch(0.0)))
            .stream(template("tpl-a", "AAA", 1000.0), arrival("AAA", 1000.5))
            .stream(template("tpl-b", "BBB", 1001.2), arrival("BBB", 1001.7))
            .build()
            .unwrap();

        let detections = Rc::new(RefCell::new(Vec::new()));
        let sink = detections.clone();
        detector.set_detection_callback(Box::new(move |d| sink.borrow_mut().push(d)));
        (detector, detections)
    }

    fn record_with_wavelet(sta: &str, start: f64, lead_zeros: usize, total: usize) -> Record {
        let mut samples = vec![0.0; lead_zeros];
        samples.extend(wavelet());
        samples.resize(total, 0.0);
        Record::new(stream(sta), Time::from_epoch(start), 100.0, samples)
    }

    #[test]
    fn test_end_to_end_detection() {
        let (mut detector, detections) = two_stream_detector();
        assert_eq!(detector.stream_ids().len(), 2);

        // Event replayed at 2001.5/2002.7: the same 1.2 s geometry.
        detector
            .feed(&record_with_wavelet("AAA", 2000.0, 100, 1000))
            .unwrap();
        assert!(detections.borrow().is_empty());
        detector
            .feed(&record_with_wavelet("BBB", 2000.0, 220, 1000))
            .unwrap();

        let detections = detections.borrow();
        assert_eq!(detections.len(), 1);
        let d = &detections[0];
        assert_relative_eq!(d.fit, 1.0, epsilon = 1e-9);
        assert_relative_eq!(d.time.epoch_secs(), 2001.5, epsilon = 1e-9);
        assert_relative_eq!(d.latitude, 46.9);
        assert_relative_eq!(d.longitude, 8.6);
        assert_relative_eq!(d.depth, 5.0);
        assert_eq!(d.magnitude, Some(2.4));
        assert_eq!(d.num_stations_associated, 2);
        assert_eq!(d.num_stations_used, 2);
        assert_eq!(d.num_channels_associated, 2);
        assert_eq!(d.num_channels_used, 2);
        assert!(d.num_channels_used <= d.num_channels_associated);
        assert_eq!(d.template_results.len(), 2);

        let metrics = detector.metrics().snapshot();
        assert_eq!(metrics.records_received, 2);
        assert_eq!(metrics.matches_emitted, 2);
        assert_eq!(metrics.detections_emitted, 1);
    }

    #[test]
    fn test_broken_geometry_produces_no_detection() {
        let (mut detector, detections) = two_stream_detector();

        detector
            .feed(&record_with_wavelet("AAA", 2000.0, 100, 1000))
            .unwrap();
        // B arrives 2.0 s after A instead of 1.2 s.
        detector
            .feed(&record_with_wavelet("BBB", 2000.0, 300, 1000))
            .unwrap();
        assert!(detections.borrow().is_empty());
        assert_eq!(detector.metrics().snapshot().matches_emitted, 2);
    }

    #[test]
    fn test_terminate_flushes_processors_and_linker() {
        let (mut detector, detections) = two_stream_detector();

        // Both wavelets sit at the very end of their records, so the
        // peaks stay pending until termination.
        detector
            .feed(&record_with_wavelet("AAA", 2000.0, 400, 600))
            .unwrap();
        detector
            .feed(&record_with_wavelet("BBB", 2000.0, 520, 720))
            .unwrap();
        assert!(detections.borrow().is_empty());

        detector.terminate().unwrap();
        let detections = detections.borrow();
        assert_eq!(detections.len(), 1);
        assert_relative_eq!(detections[0].time.epoch_secs(), 2004.5, epsilon = 1e-9);

        // Terminated detectors drop further records.
        drop(detections);
        detector
            .feed(&record_with_wavelet("AAA", 3000.0, 100, 1000))
            .unwrap();
        assert_eq!(detector.metrics().snapshot().detections_emitted, 1);
    }

    #[test]
    fn test_reset_allows_redetection() {
        let (mut detector, detections) = two_stream_detector();

        detector
            .feed(&record_with_wavelet("AAA", 2000.0, 100, 1000))
            .unwrap();
        detector
            .feed(&record_with_wavelet("BBB", 2000.0, 220, 1000))
            .unwrap();
        assert_eq!(detections.borrow().len(), 1);

        detector.reset();
        detector.reset();

        detector
            .feed(&record_with_wavelet("AAA", 5000.0, 100, 1000))
            .unwrap();
        detector
            .feed(&record_with_wavelet("BBB", 5000.0, 220, 1000))
            .unwrap();
        assert_eq!(detections.borrow().len(), 2);
        assert_relative_eq!(
            detections.borrow()[1].time.epoch_secs(),
            5001.5,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_unsubscribed_streams_are_ignored() {
        let (mut detector, detections) = two_stream_detector();
        detector
            .feed(&record_with_wavelet("ZZZ", 2000.0, 100, 1000))
            .unwrap();
        assert!(detections.borrow().is_empty());
        assert_eq!(detector.metrics().snapshot().records_received, 0);
    }

    #[test]
    fn test_stream_reset_counted() {
        let (mut detector, _detections) = two_stream_detector();
        detector
            .feed(&record_with_wavelet("AAA", 2000.0, 100, 1000))
            .unwrap();
        // 100 s gap at default tolerance: stream resets.
        detector
            .feed(&record_with_wavelet("AAA", 2100.0, 100, 1000))
            .unwrap();
        assert_eq!(detector.metrics().snapshot().stream_resets, 1);
    }

    #[test]
    fn test_builder_rejects_bad_setups() {
        // No streams.
        assert!(Detector::builder("det", origin()).build().is_err());

        // Duplicate template ids.
        let result = Detector::builder("det", origin())
            .stream(template("tpl", "AAA", 1000.0), arrival("AAA", 1000.5))
            .stream(template("tpl", "BBB", 1001.2), arrival("BBB", 1001.7))
            .build();
        assert!(result.is_err());

        // min_arrivals exceeding the stream count.
        let config = DetectorConfig {
            min_arrivals: Some(3),
            ..Default::default()
        };
        let result = Detector::builder("det", origin())
            .config(config)
            .stream(template("tpl-a", "AAA", 1000.0), arrival("AAA", 1000.5))
            .stream(template("tpl-b", "BBB", 1001.2), arrival("BBB", 1001.7))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_two_templates_on_one_stream() {
        let config = DetectorConfig {
            trigger_threshold: 0.8,
            arrival_offset_threshold: 0.1,
            min_arrivals: Some(1),
            on_hold: 0.0,
            ..Default::default()
        };
        let clock = ManualClock::new(Time::from_epoch(0.0));
        let mut detector = Detector::builder("det-02", origin())
            .config(config)
            .clock(clock)
            .stream(template("tpl-a", "AAA", 1000.0), arrival("AAA", 1000.5))
            .stream(template("tpl-a2", "AAA", 1000.1), arrival("AAA", 1000.6))
            .build()
            .unwrap();

        let detections = Rc::new(RefCell::new(Vec::new()));
        let sink = detections.clone();
        detector.set_detection_callback(Box::new(move |d| sink.borrow_mut().push(d)));

        // One record drives both processors on the shared stream.
        detector
            .feed(&record_with_wavelet("AAA", 2000.0, 100, 1000))
            .unwrap();
        assert!(!detections.borrow().is_empty());
        let d = &detections.borrow()[0];
        assert_eq!(d.num_channels_associated, 1);
        assert_eq!(d.num_stations_associated, 1);
    }
}
