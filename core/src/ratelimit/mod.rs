//! Streaming rate-limit detection over live process output.

mod detector;
mod line_buffer;
mod patterns;

pub use detector::{RateLimitDetector, StreamDetector};
pub use line_buffer::{LineBuffer, MAX_LINE_BYTES};
pub use patterns::default_patterns;
