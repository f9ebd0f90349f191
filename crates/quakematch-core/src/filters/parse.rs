//! Filter-string parsing.
//!
//! The engine treats filter strings as opaque except for validation; this
//! module is the replaceable factory behind them. The grammar covers
//! Butterworth designs:
//!
//! ```text
//! BW(order,low_hz,high_hz)    band-pass
//! BW_LP(order,cutoff_hz)      low-pass
//! BW_HP(order,cutoff_hz)      high-pass
//! ```
//!
//! A parsed [`FilterSpec`] is instantiated per stream once the stream's
//! sampling frequency is known.

use std::str::FromStr;

use crate::error::{DetectError, DetectResult};
use crate::filters::iir::IirFilter;

/// A validated filter expression, not yet bound to a sampling frequency.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterSpec {
    Bandpass { order: usize, low: f64, high: f64 },
    Lowpass { order: usize, cutoff: f64 },
    Highpass { order: usize, cutoff: f64 },
}

impl FilterSpec {
    /// Instantiate the filter for a concrete sampling frequency.
    pub fn instantiate(&self, sampling_frequency: f64) -> DetectResult<IirFilter> {
        match *self {
            FilterSpec::Bandpass { order, low, high } => {
                IirFilter::butterworth_bandpass(order, low, high, sampling_frequency)
            }
            FilterSpec::Lowpass { order, cutoff } => {
                IirFilter::butterworth_lowpass(order, cutoff, sampling_frequency)
            }
            FilterSpec::Highpass { order, cutoff } => {
                IirFilter::butterworth_highpass(order, cutoff, sampling_frequency)
            }
        }
    }
}

impl FromStr for FilterSpec {
    type Err = DetectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_filter(s)
    }
}

/// Parse a filter string. A non-empty string must parse successfully;
/// empty strings are rejected.
pub fn parse_filter(s: &str) -> DetectResult<FilterSpec> {
    let bad = |reason: &str| DetectError::Config(format!("unparseable filter '{s}': {reason}"));

    let trimmed: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    if trimmed.is_empty() {
        return Err(bad("empty expression"));
    }
    let open = trimmed.find('(').ok_or_else(|| bad("missing '('"))?;
    if !trimmed.ends_with(')') {
        return Err(bad("missing ')'"));
    }
    let name = &trimmed[..open];
    let args: Vec<&str> = trimmed[open + 1..trimmed.len() - 1].split(',').collect();

    let order = |a: &str| -> DetectResult<usize> {
        a.parse::<usize>()
            .map_err(|_| bad(&format!("invalid order '{a}'")))
    };
    let freq = |a: &str| -> DetectResult<f64> {
        let v = a
            .parse::<f64>()
            .map_err(|_| bad(&format!("invalid frequency '{a}'")))?;
        if v <= 0.0 {
            return Err(bad(&format!("frequency must be positive: {v}")));
        }
        Ok(v)
    };

    match name {
        "BW" => {
            if args.len() != 3 {
                return Err(bad("BW takes (order,low,high)"));
            }
            let (low, high) = (freq(args[1])?, freq(args[2])?);
            if low >= high {
                return Err(bad("corner frequencies out of order"));
            }
            Ok(FilterSpec::Bandpass {
                order: order(args[0])?,
                low,
                high,
            })
        }
        "BW_LP" => {
            if args.len() != 2 {
                return Err(bad("BW_LP takes (order,cutoff)"));
            }
            Ok(FilterSpec::Lowpass {
                order: order(args[0])?,
                cutoff: freq(args[1])?,
            })
        }
        "BW_HP" => {
            if args.len() != 2 {
                return Err(bad("BW_HP takes (order,cutoff)"));
            }
            Ok(FilterSpec::Highpass {
                order: order(args[0])?,
                cutoff: freq(args[1])?,
            })
        }
        other => Err(bad(&format!("unknown filter '{other}'"))),
    }
}
