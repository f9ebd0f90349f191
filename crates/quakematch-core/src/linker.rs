//! # Linker
//!
//! Associates per-template match results belonging to one detector/origin
//! into multi-arrival detections within a sliding time window, enforcing
//! pick-offset geometry and a minimum-arrivals rule.
//!
//! The linker keeps a time-ordered queue of candidate events (partially
//! filled detections). An incoming match merges into every compatible
//! queued event and always seeds a fresh candidate; candidates are emitted
//! when complete, or when their on-hold deadline passes with enough
//! arrivals, and are dropped when they expire short.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use crate::error::{DetectError, DetectResult};
use crate::pot::{validate_pick_offsets, PickOffsetTable};
use crate::template_processor::MatchResult;
use crate::time::{Clock, SystemClock, Time};
use crate::types::{Arrival, WaveformStreamId};

/// One template's contribution to a linked result.
#[derive(Debug, Clone)]
pub struct TemplateResult {
    /// The template arrival with its pick time recomputed from the match.
    pub arrival: Arrival,
    pub match_result: MatchResult,
}

/// A linked, scored multi-arrival result.
#[derive(Debug, Clone, Default)]
pub struct LinkerResult {
    /// Composite fit: arithmetic mean of the contributing coefficients.
    pub fit: f64,
    /// Processor whose arrival has the earliest recomputed pick time.
    pub ref_proc_id: String,
    /// Contributions by processor id.
    pub results: HashMap<String, TemplateResult>,
    /// Pick-offset table over the contributing arrivals.
    pub pot: PickOffsetTable,
}

impl LinkerResult {
    pub fn arrival_count(&self) -> usize {
        self.results.len()
    }

    /// Compact single-line description for diagnostics.
    pub fn debug_summary(&self) -> String {
        let start = self
            .results
            .get(&self.ref_proc_id)
            .map(|tr| tr.match_result.time_window.start)
            .unwrap_or_default();
        let end = start + self.pot.pick_offset().unwrap_or(0.0);
        format!(
            "({} - {}): fit={:.6}, arrival_count={}",
            start.iso(),
            end.iso(),
            self.fit,
            self.arrival_count()
        )
    }
}

/// Linker lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LinkerStatus {
    WaitingForData,
    Processing,
    Terminated,
}

/// Callback receiving emitted results.
pub type LinkerResultCallback = Box<dyn FnMut(&LinkerResult)>;

#[derive(Debug, Clone)]
struct RegisteredProcessor {
    /// The template arrival carried alongside the processor.
    arrival: Arrival,
    /// Offset of the template arrival pick from the template start, in
    /// seconds; recomputed pick = window.start + lag + pick_offset.
    pick_offset: f64,
}

/// A candidate event accumulating compatible matches until it completes
/// or its on-hold deadline passes.
struct QueuedEvent {
    result: LinkerResult,
    ref_pick_time: Option<Time>,
    expiry: Time,
}

impl QueuedEvent {
    fn new(expiry: Time) -> Self {
        Self {
            result: LinkerResult::default(),
            ref_pick_time: None,
            expiry,
        }
    }

    fn arrival_count(&self) -> usize {
        self.result.arrival_count()
    }

    /// Insert or replace the contribution of `proc_id`, recompute the
    /// composite fit and the reference processor.
    fn merge_result(&mut self, proc_id: &str, res: TemplateResult, pot: PickOffsetTable) {
        let pick_time = res.arrival.pick.time;
        self.result.results.insert(proc_id.to_string(), res);

        let n = self.result.results.len() as f64;
        self.result.fit = self
            .result
            .results
            .values()
            .map(|tr| tr.match_result.coefficient)
            .sum::<f64>()
            / n;
        self.result.pot = pot;

        if self.ref_pick_time.map_or(true, |t| pick_time < t) {
            self.ref_pick_time = Some(pick_time);
            self.result.ref_proc_id = proc_id.to_string();
        }
    }
}

/// Associates match results from all template processors of one detector.
pub struct Linker {
    processors: HashMap<String, RegisteredProcessor>,
    queue: VecDeque<QueuedEvent>,
    reference_pot: PickOffsetTable,
    pot_valid: bool,
    on_hold: f64,
    thres_arrival_offset: Option<f64>,
    thres_result: Option<f64>,
    min_arrivals: Option<usize>,
    status: LinkerStatus,
    clock: Box<dyn Clock>,
    callback: Option<LinkerResultCallback>,
}

impl Linker {
    /// Create a linker with the given on-hold duration in seconds and
    /// optional arrival-offset threshold (`None` disables pick-offset
    /// validation).
    pub fn new(on_hold: f64, arrival_offset_threshold: Option<f64>) -> Self {
        Self {
            processors: HashMap::new(),
            queue: VecDeque::new(),
            reference_pot: PickOffsetTable::default(),
            pot_valid: false,
            on_hold,
            thres_arrival_offset: arrival_offset_threshold,
            thres_result: None,
            min_arrivals: None,
            status: LinkerStatus::WaitingForData,
            clock: Box::new(SystemClock),
            callback: None,
        }
    }

    /// Replace the time source used for on-hold expiry.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Replace the time source with an already boxed clock.
    pub fn set_clock(&mut self, clock: Box<dyn Clock>) {
        self.clock = clock;
    }

    pub fn set_arrival_offset_threshold(&mut self, thres: Option<f64>) {
        self.thres_arrival_offset = thres;
    }

    pub fn arrival_offset_threshold(&self) -> Option<f64> {
        self.thres_arrival_offset
    }

    pub fn set_result_threshold(&mut self, thres: Option<f64>) {
        self.thres_result = thres;
    }

    pub fn result_threshold(&self) -> Option<f64> {
        self.thres_result
    }

    /// Values below 1 unset the minimum.
    pub fn set_min_arrivals(&mut self, n: Option<usize>) {
        self.min_arrivals = n.filter(|&v| v >= 1);
    }

    pub fn min_arrivals(&self) -> Option<usize> {
        self.min_arrivals
    }

    pub fn set_on_hold(&mut self, duration_secs: f64) {
        self.on_hold = duration_secs;
    }

    pub fn on_hold(&self) -> f64 {
        self.on_hold
    }

    pub fn status(&self) -> LinkerStatus {
        self.status
    }

    pub fn set_result_callback(&mut self, callback: LinkerResultCallback) {
        self.callback = Some(callback);
    }

    /// Number of distinct waveform stream ids over the registered
    /// template arrivals.
    pub fn associated_channel_count(&self) -> usize {
        let ids: HashSet<&WaveformStreamId> = self
            .processors
            .values()
            .map(|p| &p.arrival.pick.stream_id)
            .collect();
        ids.len()
    }

    pub fn processor_count(&self) -> usize {
        self.processors.len()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Register a template processor with its template arrival and
    /// pick-to-template-start offset.
    pub fn add(&mut self, proc_id: impl Into<String>, arrival: Arrival, pick_offset: f64) {
        self.processors.insert(
            proc_id.into(),
            RegisteredProcessor {
                arrival,
                pick_offset,
            },
        );
        self.pot_valid = false;
    }

    pub fn remove(&mut self, proc_id: &str) {
        self.processors.remove(proc_id);
        self.pot_valid = false;
    }

    /// Drop all candidate events and return to the initial state.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.pot_valid = false;
        self.status = LinkerStatus::WaitingForData;
    }

    /// Walk the queue once, emitting every remaining event that still
    /// satisfies the minimum-arrivals and result-threshold rules, then
    /// clear it and refuse further input.
    pub fn terminate(&mut self) {
        let min = self.min_arrivals.unwrap_or_else(|| self.processor_count());
        let events = std::mem::take(&mut self.queue);
        for event in events {
            if event.arrival_count() >= min
                && self
                    .thres_result
                    .map_or(true, |t| event.result.fit >= t)
            {
                self.emit(&event.result);
            }
        }
        self.status = LinkerStatus::Terminated;
    }

    /// Feed a match result from a template processor.
    ///
    /// The arrival pick time is recomputed from the match: pick =
    /// window.start + lag + pick_offset. Unknown processor ids are
    /// reported to the caller; the linker remains usable.
    pub fn feed(&mut self, proc_id: &str, res: MatchResult) -> DetectResult<()> {
        if self.status >= LinkerStatus::Terminated {
            return Ok(());
        }
        let proc = self
            .processors
            .get(proc_id)
            .ok_or_else(|| DetectError::UnknownProcessor(proc_id.to_string()))?;

        let pick_time = res.time_window.start + res.lag + proc.pick_offset;
        let mut arrival = proc.arrival.clone();
        arrival.pick.time = pick_time;

        self.process(
            proc_id,
            TemplateResult {
                arrival,
                match_result: res,
            },
        );
        Ok(())
    }

    fn process(&mut self, proc_id: &str, res: TemplateResult) {
        if self.processors.is_empty() {
            return;
        }
        if !self.pot_valid {
            self.rebuild_reference_pot();
        }
        self.reference_pot.enable_all();
        self.status = LinkerStatus::Processing;

        let proc_count = self.processor_count();

        // Merge phase: fold the match into every compatible candidate.
        for event in self.queue.iter_mut() {
            if event.arrival_count() >= proc_count {
                continue;
            }
            let replace = match event.result.results.get(proc_id) {
                None => true,
                Some(existing) => {
                    res.match_result.coefficient > existing.match_result.coefficient
                }
            };
            if replace {
                let mut arrivals = vec![res.arrival.clone()];
                let mut wf_ids: HashSet<WaveformStreamId> = HashSet::new();
                for tr in event.result.results.values() {
                    arrivals.push(tr.arrival.clone());
                    wf_ids.insert(tr.arrival.pick.stream_id.clone());
                }
                let pot = PickOffsetTable::from_arrivals(&arrivals);

                let compatible = match self.thres_arrival_offset {
                    Some(thres) => {
                        self.reference_pot.disable(&wf_ids);
                        validate_pick_offsets(&self.reference_pot, &pot, thres)
                    }
                    None => true,
                };
                if compatible {
                    event.merge_result(proc_id, res.clone(), pot);
                    debug!(
                        processor = proc_id,
                        arrivals = event.arrival_count(),
                        fit = event.result.fit,
                        "match merged into candidate event"
                    );
                }
            }
            self.reference_pot.enable_all();
        }

        let now = self.clock.now();

        // New-event phase: every match also seeds its own candidate.
        let mut event = QueuedEvent::new(now + self.on_hold);
        let pot = PickOffsetTable::from_arrivals(std::slice::from_ref(&res.arrival));
        event.merge_result(proc_id, res, pot);
        self.queue.push_back(event);

        // Emission phase.
        let min = self.min_arrivals.unwrap_or(proc_count);
        let events = std::mem::take(&mut self.queue);
        let mut kept = VecDeque::with_capacity(events.len());
        for event in events {
            let count = event.arrival_count();
            if count == proc_count || (now >= event.expiry && count >= min) {
                if self
                    .thres_result
                    .map_or(true, |t| event.result.fit >= t)
                {
                    self.emit(&event.result);
                }
            } else if now >= event.expiry {
                debug!(
                    arrivals = count,
                    required = min,
                    "candidate event expired short, dropped"
                );
            } else {
                kept.push_back(event);
            }
        }
        self.queue = kept;
    }

    fn emit(&mut self, res: &LinkerResult) {
        debug!(summary = %res.debug_summary(), "result emitted");
        if let Some(callback) = self.callback.as_mut() {
            callback(res);
        }
    }

    fn rebuild_reference_pot(&mut self) {
        let arrivals: Vec<Arrival> = self
            .processors
            .values()
            .map(|p| p.arrival.clone())
            .collect();
        self.reference_pot = PickOffsetTable::from_arrivals(&arrivals);
        self.pot_valid = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualClock;
    use crate::types::{Pick, TimeWindow};
    use approx::assert_relative_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    const PICK_OFFSET: f64 = 0.5;

    fn stream(sta: &str) -> WaveformStreamId {
        WaveformStreamId::new("CH", sta, "", "HHZ")
    }

    fn template_arrival(sta: &str, pick_time: f64) -> Arrival {
        Arrival::new(Pick {
            time: Time::from_epoch(pick_time),
            stream_id: stream(sta),
            phase_hint: Some("P".into()),
        })
    }

    /// A match whose recomputed pick time lands on `pick_time`.
    fn match_for(pick_time: f64, coefficient: f64) -> MatchResult {
        let window_start = pick_time - PICK_OFFSET;
        MatchResult {
            time_window: TimeWindow::new(
                Time::from_epoch(window_start),
                Time::from_epoch(window_start + 10.0),
            ),
            lag: 0.0,
            coefficient,
            num_samples_evaluated: 100,
        }
    }

    /// Three-stream linker with template pick offsets {A:0, B:1.2, C:2.5} s
    /// and a collector callback.
    fn three_stream_linker(
        on_hold: f64,
        clock: ManualClock,
    ) -> (Linker, Rc<RefCell<Vec<LinkerResult>>>) {
        let mut linker = Linker::new(on_hold, Some(0.01)).with_clock(clock);
        linker.add("A", template_arrival("AAA", 100.0), PICK_OFFSET);
        linker.add("B", template_arrival("BBB", 101.2), PICK_OFFSET);
        linker.add("C", template_arrival("CCC", 102.5), PICK_OFFSET);

        let emitted = Rc::new(RefCell::new(Vec::new()));
        let sink = emitted.clone();
        linker.set_result_callback(Box::new(move |res| {
            sink.borrow_mut().push(res.clone());
        }));
        (linker, emitted)
    }

    #[test]
    fn test_three_stream_event_geometry_satisfied() {
        let clock = ManualClock::new(Time::from_epoch(0.0));
        let (mut linker, emitted) = three_stream_linker(10.0, clock);

        linker.feed("A", match_for(10.0, 0.9)).unwrap();
        linker.feed("B", match_for(11.199, 0.8)).unwrap();
        assert!(emitted.borrow().is_empty());
        linker.feed("C", match_for(12.501, 0.7)).unwrap();

        let results = emitted.borrow();
        assert_eq!(results.len(), 1);
        let res = &results[0];
        assert_eq!(res.arrival_count(), 3);
        assert_relative_eq!(res.fit, (0.9 + 0.8 + 0.7) / 3.0, epsilon = 1e-12);
        assert_eq!(res.ref_proc_id, "A");
        assert!((-1.0..=1.0).contains(&res.fit));
        // All entries re-enabled after validation scratch use.
        assert!(linker.reference_pot.all_enabled());
    }

    #[test]
    fn test_geometry_rejected_drops_when_min_arrivals_full() {
        let clock = ManualClock::new(Time::from_epoch(0.0));
        let (mut linker, emitted) = three_stream_linker(2.0, clock.clone());

        linker.feed("A", match_for(10.0, 0.9)).unwrap();
        linker.feed("B", match_for(11.199, 0.8)).unwrap();
        // 12.7 breaks the A-C offset (2.7 vs 2.5 at 0.01 tolerance).
        linker.feed("C", match_for(12.7, 0.7)).unwrap();
        assert!(emitted.borrow().is_empty());

        // All candidates expire short of three arrivals.
        clock.advance(3.0);
        linker.feed("A", match_for(50.0, 0.6)).unwrap();
        assert!(emitted.borrow().is_empty());
    }

    #[test]
    fn test_geometry_rejected_partial_emission_with_min_two() {
        let clock = ManualClock::new(Time::from_epoch(0.0));
        let (mut linker, emitted) = three_stream_linker(2.0, clock.clone());
        linker.set_min_arrivals(Some(2));

        linker.feed("A", match_for(10.0, 0.9)).unwrap();
        linker.feed("B", match_for(11.199, 0.8)).unwrap();
        linker.feed("C", match_for(12.7, 0.7)).unwrap();
        assert!(emitted.borrow().is_empty());

        clock.advance(3.0);
        linker.feed("A", match_for(50.0, 0.6)).unwrap();

        let results = emitted.borrow();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].arrival_count(), 2);
        assert_relative_eq!(results[0].fit, (0.9 + 0.8) / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_on_hold_expiry_driven_by_clock() {
        let clock = ManualClock::new(Time::from_epoch(0.0));
        let (mut linker, emitted) = three_stream_linker(2.0, clock.clone());
        linker.set_min_arrivals(Some(2));

        linker.feed("A", match_for(10.0, 0.9)).unwrap();
        clock.advance(0.5);
        linker.feed("B", match_for(11.2, 0.8)).unwrap();
        assert!(emitted.borrow().is_empty());

        clock.set(Time::from_epoch(3.0));
        // Any process call runs the expiry sweep.
        linker.feed("C", match_for(500.0, 0.5)).unwrap();

        let results = emitted.borrow();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].arrival_count(), 2);
    }

    #[test]
    fn test_complete_event_emits_immediately() {
        let clock = ManualClock::new(Time::from_epoch(0.0));
        let mut linker = Linker::new(10.0, Some(0.01)).with_clock(clock);
        linker.add("A", template_arrival("AAA", 100.0), PICK_OFFSET);
        linker.add("B", template_arrival("BBB", 101.2), PICK_OFFSET);

        let emitted = Rc::new(RefCell::new(Vec::new()));
        let sink = emitted.clone();
        linker.set_result_callback(Box::new(move |res| sink.borrow_mut().push(res.clone())));

        linker.feed("A", match_for(10.0, 0.9)).unwrap();
        linker.feed("B", match_for(11.2, 0.7)).unwrap();
        assert_eq!(emitted.borrow().len(), 1);
        assert_relative_eq!(emitted.borrow()[0].fit, 0.8, epsilon = 1e-12);
    }

    #[test]
    fn test_result_threshold_gates_emission() {
        let clock = ManualClock::new(Time::from_epoch(0.0));
        let (mut linker, emitted) = three_stream_linker(10.0, clock);
        linker.set_result_threshold(Some(0.95));

        linker.feed("A", match_for(10.0, 0.9)).unwrap();
        linker.feed("B", match_for(11.2, 0.8)).unwrap();
        linker.feed("C", match_for(12.5, 0.7)).unwrap();
        // Complete but below the fit cutoff: removed without emission.
        // The partial {B,C} candidate and the fresh C candidate remain.
        assert!(emitted.borrow().is_empty());
        assert_eq!(linker.queue_len(), 2);
    }

    #[test]
    fn test_multi_merge_into_all_compatible_events() {
        let clock = ManualClock::new(Time::from_epoch(0.0));
        let mut linker = Linker::new(10.0, Some(0.01)).with_clock(clock);
        linker.add("A", template_arrival("AAA", 100.0), PICK_OFFSET);
        linker.add("B", template_arrival("BBB", 101.2), PICK_OFFSET);

        let emitted = Rc::new(RefCell::new(Vec::new()));
        let sink = emitted.clone();
        linker.set_result_callback(Box::new(move |res| sink.borrow_mut().push(res.clone())));

        // Two A candidates queue up; the better coefficient replaces the
        // weaker entry in the existing event.
        linker.feed("A", match_for(10.0, 0.9)).unwrap();
        linker.feed("A", match_for(10.0, 0.95)).unwrap();
        assert_eq!(linker.queue_len(), 2);

        // A compatible B completes both candidates.
        linker.feed("B", match_for(11.2, 0.8)).unwrap();
        assert_eq!(emitted.borrow().len(), 2);
        for res in emitted.borrow().iter() {
            assert_eq!(res.arrival_count(), 2);
            assert_relative_eq!(res.fit, (0.95 + 0.8) / 2.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_lower_coefficient_does_not_replace() {
        let clock = ManualClock::new(Time::from_epoch(0.0));
        let (mut linker, emitted) = three_stream_linker(10.0, clock);

        linker.feed("A", match_for(10.0, 0.9)).unwrap();
        linker.feed("A", match_for(10.0, 0.4)).unwrap();
        linker.feed("B", match_for(11.2, 0.8)).unwrap();
        linker.feed("C", match_for(12.5, 0.7)).unwrap();

        // Both A candidates completed; the first kept its stronger A
        // because 0.4 did not replace 0.9.
        let results = emitted.borrow();
        assert_eq!(results.len(), 2);
        assert_relative_eq!(results[0].fit, (0.9 + 0.8 + 0.7) / 3.0, epsilon = 1e-12);
        assert_relative_eq!(results[1].fit, (0.4 + 0.8 + 0.7) / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_terminate_flushes_queue() {
        let clock = ManualClock::new(Time::from_epoch(0.0));
        let (mut linker, emitted) = three_stream_linker(10.0, clock);
        linker.set_min_arrivals(Some(2));

        linker.feed("A", match_for(10.0, 0.9)).unwrap();
        linker.feed("B", match_for(11.2, 0.8)).unwrap();
        assert!(emitted.borrow().is_empty());

        linker.terminate();
        assert_eq!(emitted.borrow().len(), 1);
        assert_eq!(linker.queue_len(), 0);
        assert_eq!(linker.status(), LinkerStatus::Terminated);

        // Terminated linkers drop further input silently.
        linker.feed("A", match_for(20.0, 0.9)).unwrap();
        assert_eq!(emitted.borrow().len(), 1);
    }

    #[test]
    fn test_terminate_respects_minimums() {
        let clock = ManualClock::new(Time::from_epoch(0.0));
        let (mut linker, emitted) = three_stream_linker(10.0, clock);

        // min_arrivals unset: all three processors must contribute.
        linker.feed("A", match_for(10.0, 0.9)).unwrap();
        linker.terminate();
        assert!(emitted.borrow().is_empty());
        assert_eq!(linker.queue_len(), 0);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let clock = ManualClock::new(Time::from_epoch(0.0));
        let (mut linker, _emitted) = three_stream_linker(10.0, clock);

        linker.feed("A", match_for(10.0, 0.9)).unwrap();
        assert_eq!(linker.queue_len(), 1);
        assert_eq!(linker.status(), LinkerStatus::Processing);

        linker.reset();
        let after_once = (linker.queue_len(), linker.status());
        linker.reset();
        assert_eq!((linker.queue_len(), linker.status()), after_once);
        assert_eq!(linker.queue_len(), 0);
        assert_eq!(linker.status(), LinkerStatus::WaitingForData);
    }

    #[test]
    fn test_unknown_processor_is_reported_not_fatal() {
        let clock = ManualClock::new(Time::from_epoch(0.0));
        let (mut linker, emitted) = three_stream_linker(10.0, clock);

        let err = linker.feed("Z", match_for(10.0, 0.9)).unwrap_err();
        assert!(matches!(err, DetectError::UnknownProcessor(_)));
        assert!(err.is_recoverable());

        // The linker keeps working.
        linker.feed("A", match_for(10.0, 0.9)).unwrap();
        linker.feed("B", match_for(11.2, 0.8)).unwrap();
        linker.feed("C", match_for(12.5, 0.7)).unwrap();
        assert_eq!(emitted.borrow().len(), 1);
    }

    #[test]
    fn test_queue_bounded_by_arrival_count_invariant() {
        let clock = ManualClock::new(Time::from_epoch(0.0));
        let (mut linker, _emitted) = three_stream_linker(10.0, clock);

        linker.feed("A", match_for(10.0, 0.9)).unwrap();
        linker.feed("B", match_for(11.199, 0.8)).unwrap();
        for event in linker.queue.iter() {
            assert!(event.arrival_count() <= linker.processor_count());
        }
    }

    #[test]
    fn test_associated_channel_count() {
        let clock = ManualClock::new(Time::from_epoch(0.0));
        let (mut linker, _emitted) = three_stream_linker(10.0, clock);
        assert_eq!(linker.associated_channel_count(), 3);

        // A second template on an already covered channel adds nothing.
        linker.add("A2", template_arrival("AAA", 100.3), PICK_OFFSET);
        assert_eq!(linker.associated_channel_count(), 3);
        assert_eq!(linker.processor_count(), 4);
    }

    #[test]
    fn test_debug_summary_mentions_fit_and_count() {
        let clock = ManualClock::new(Time::from_epoch(0.0));
        let (mut linker, emitted) = three_stream_linker(10.0, clock);
        linker.feed("A", match_for(10.0, 0.9)).unwrap();
        linker.feed("B", match_for(11.2, 0.8)).unwrap();
        linker.feed("C", match_for(12.5, 0.7)).unwrap();

        let results = emitted.borrow();
        let summary = results[0].debug_summary();
        assert!(summary.contains("fit=0.8"));
        assert!(summary.contains("arrival_count=3"));
    }
}
