//! Streaming filters for the record preprocessing pipeline.
//!
//! Filter expressions arrive as opaque strings (e.g. `BW(3,1.5,15)`),
//! are validated at configuration time by [`parse_filter`], and are
//! instantiated per stream once the sampling frequency is known.

pub mod iir;
pub mod parse;
pub mod traits;

pub use iir::{Biquad, IirFilter};
pub use parse::{parse_filter, FilterSpec};
pub use traits::StreamFilter;
