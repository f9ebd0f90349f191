//! Filter trait consumed by the stream preprocessing pipeline.

/// An in-place streaming filter over real-valued samples.
///
/// Implementations maintain internal state (delay lines) that persists
/// across calls, so a stream can be filtered record by record.
pub trait StreamFilter: Send {
    /// Filter samples in place, advancing internal state.
    fn apply(&mut self, samples: &mut [f64]);

    /// Clear internal state. Call when a stream restarts to avoid
    /// artifacts from previous data.
    fn reset(&mut self);

    /// The sampling frequency this filter was designed for, in Hz.
    fn sampling_frequency(&self) -> f64;
}
