//! Readings
//!
//! The composite sensor value relayed to subscribers, and the partial
//! fragments decoded from individual device lines.

mod store;

pub use store::ReadingStore;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// Composite sensor snapshot.
///
/// Serializes as `{"bpm": .., "temp": .., "ir": ..}`, the shape the
/// dashboard expects on both the query endpoint and the subscription channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Heart rate in beats per minute
    pub bpm: u32,
    /// Body temperature in degrees
    pub temp: f64,
    /// Raw infrared sensor value
    pub ir: u32,
}

impl Reading {
    /// Overwrite every field present in `fragment`, leaving the rest untouched.
    pub fn apply(&mut self, fragment: &Fragment) {
        if let Some(bpm) = fragment.bpm {
            self.bpm = bpm;
        }
        if let Some(temp) = fragment.temp {
            self.temp = temp;
        }
        if let Some(ir) = fragment.ir {
            self.ir = ir;
        }
    }
}

/// A partial reading decoded from one device line.
///
/// Unknown keys are ignored and `null` counts as absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct Fragment {
    /// Heart rate, if the line carried one
    #[serde(default, deserialize_with = "lenient_count")]
    pub bpm: Option<u32>,
    /// Temperature, if the line carried one
    #[serde(default)]
    pub temp: Option<f64>,
    /// Infrared value, if the line carried one
    #[serde(default, deserialize_with = "lenient_count")]
    pub ir: Option<u32>,
}

impl Fragment {
    /// True when the fragment names none of the reading fields
    pub fn is_empty(&self) -> bool {
        self.bpm.is_none() && self.temp.is_none() && self.ir.is_none()
    }

    /// True when the fragment carries heart rate or temperature. Only such
    /// fragments are merged; `ir` rides along with them.
    pub fn has_vitals(&self) -> bool {
        self.bpm.is_some() || self.temp.is_some()
    }
}

/// Counts may arrive as floats (`72.0`); round them. Negative or
/// out-of-range values fail the whole line.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<f64>::deserialize(deserializer)? {
        None => Ok(None),
        Some(value) if value.is_finite() && (0.0..=u32::MAX as f64).contains(&value) => {
            Ok(Some(value.round() as u32))
        }
        Some(value) => Err(D::Error::custom(format!(
            "{value} is not a non-negative integer"
        ))),
    }
}
