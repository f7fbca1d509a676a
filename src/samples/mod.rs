// Pen samples - canonical row type of the segmentation engine
//
// A Sample carries the seven raw digitizer fields produced by an importer
// plus the derived fields written by the pipeline and the id of the segment
// that currently owns it. Rows are kept time-ascending by SampleStore.

use serde::{Deserialize, Serialize};
use std::ops::BitOr;

use crate::segment::SegmentId;

mod store;

pub use store::{SampleStore, DEFAULT_SAMPLING_RATE_HZ};

/// Device status bitmask reported with every sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PenState(pub u8);

impl PenState {
    pub const NONE: PenState = PenState(0);
    /// First sample of a new Series (pen entered tracking range)
    pub const FIRST_ENTER: PenState = PenState(0x01);
    /// First sample of a pressed Run
    pub const FIRST_PRESS: PenState = PenState(0x02);
    /// First sample of a hover Run
    pub const FIRST_HOVER: PenState = PenState(0x04);
    pub const PRESSED: PenState = PenState(0x08);
    pub const HOVERING: PenState = PenState(0x10);

    /// True when every bit of `flag` is set
    pub fn contains(self, flag: PenState) -> bool {
        flag.0 != 0 && self.0 & flag.0 == flag.0
    }
}

impl BitOr for PenState {
    type Output = PenState;

    fn bitor(self, rhs: PenState) -> PenState {
        PenState(self.0 | rhs.0)
    }
}

/// Raw importer row (input contract)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub time: f64,
    pub x: i32,
    pub y: i32,
    pub pressure: i32,
    #[serde(default)]
    pub state: PenState,
}

/// One row of the sample array
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Seconds, zero-based after normalization
    pub time: f64,
    pub x: i32,
    pub y: i32,
    /// 0 = hovering
    pub pressure: i32,
    pub state: PenState,
    #[serde(default)]
    pub x_filtered: f64,
    #[serde(default)]
    pub y_filtered: f64,
    #[serde(default)]
    pub pressure_filtered: f64,
    #[serde(default)]
    pub x_velocity: f64,
    #[serde(default)]
    pub y_velocity: f64,
    #[serde(default)]
    pub xy_velocity: f64,
    #[serde(default)]
    pub xy_acceleration: f64,
    /// Most specific owning segment (0 = root)
    #[serde(default)]
    pub segment_id: SegmentId,
}

impl Sample {
    pub fn is_pressed(&self) -> bool {
        self.pressure > 0
    }
}

impl From<RawSample> for Sample {
    fn from(raw: RawSample) -> Self {
        Self {
            time: raw.time,
            x: raw.x,
            y: raw.y,
            pressure: raw.pressure,
            state: raw.state,
            x_filtered: 0.0,
            y_filtered: 0.0,
            pressure_filtered: 0.0,
            x_velocity: 0.0,
            y_velocity: 0.0,
            xy_velocity: 0.0,
            xy_acceleration: 0.0,
            segment_id: SegmentId::ROOT,
        }
    }
}
