//! Line ingest
//!
//! Parse, merge, broadcast: the path every device line takes.

use tracing::{debug, trace};

use crate::hub::SubscriberHub;
use crate::protocol::{parse_line, Frame};
use crate::reading::Reading;

/// Applies device lines to the hub's store and fans the result out
#[derive(Debug, Clone)]
pub struct Ingestor {
    hub: SubscriberHub,
}

impl Ingestor {
    /// Ingestor publishing through `hub` (and so into the hub's store)
    pub fn new(hub: SubscriberHub) -> Self {
        Self { hub }
    }

    /// Handle one line. Returns the merged snapshot if the line changed
    /// anything worth broadcasting.
    ///
    /// Only objects carrying `bpm` or `temp` are merged. Rejected lines and
    /// objects without either (including `ir`-only objects) leave the store
    /// alone and broadcast nothing.
    pub fn ingest_line(&self, line: &str) -> Option<Reading> {
        let fragment = match parse_line(line) {
            Frame::Accepted(fragment) if fragment.has_vitals() => fragment,
            Frame::Accepted(_) => {
                trace!(line, "object without bpm or temp");
                return None;
            }
            Frame::Rejected(reason) => {
                trace!(?reason, line, "ignoring device line");
                return None;
            }
        };

        let (snapshot, delivered) = self.hub.publish(&fragment);
        debug!(?snapshot, delivered, "reading merged");
        Some(snapshot)
    }
}
