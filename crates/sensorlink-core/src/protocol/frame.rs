//! Frame parsing
//!
//! Turns one line of device output into a reading fragment. Firmware mixes
//! boot banners and debug prints with its JSON telemetry, so rejection is the
//! common case and is reported as a value, not an error.

use crate::reading::Fragment;

/// Why a line was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Not wrapped in `{` ... `}` after trimming
    Unframed,
    /// Looked like an object but did not decode
    Malformed,
}

/// Result of parsing one device line
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Decoded fragment; may be empty if the object named no reading field
    Accepted(Fragment),
    /// Noise or a damaged line; nothing from it may be merged
    Rejected(RejectReason),
}

impl Frame {
    /// The fragment, if the line was accepted
    pub fn fragment(&self) -> Option<&Fragment> {
        match self {
            Frame::Accepted(fragment) => Some(fragment),
            Frame::Rejected(_) => None,
        }
    }

    /// True if the line was accepted
    pub fn is_accepted(&self) -> bool {
        matches!(self, Frame::Accepted(_))
    }
}

/// Parse a single line (with or without its line terminator).
pub fn parse_line(line: &str) -> Frame {
    let trimmed = line.trim();
    if !(trimmed.starts_with('{') && trimmed.ends_with('}')) {
        return Frame::Rejected(RejectReason::Unframed);
    }

    match serde_json::from_str::<Fragment>(trimmed) {
        Ok(fragment) => Frame::Accepted(fragment),
        Err(_) => Frame::Rejected(RejectReason::Malformed),
    }
}
