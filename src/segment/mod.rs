// Segment tree - hierarchical, time-indexed grouping of samples
//
// Segments are the user/algorithm-visible grouping objects (trials,
// words, strokes promoted to segments). They live in an arena owned by
// SegmentTree: ids double as arena slots, are handed out monotonically
// and are never reused while the tree is alive. Parent/child links are
// plain ids, so there are no reference cycles to manage.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;

mod lookup;
mod tree;

pub use lookup::{IndexSpan, SpanTable};
pub use tree::SegmentTree;

/// Identifier of a segment; 0 is the root
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SegmentId(pub u32);

impl SegmentId {
    pub const ROOT: SegmentId = SegmentId(0);

    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// External trial condition-variable row
pub type CondVars = BTreeMap<String, serde_json::Value>;

/// How the extent of a new segment is given
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentExtent {
    /// Explicit `[start, end]` in seconds
    TimeRange(f64, f64),
    /// Explicit inclusive sample index range
    Samples(RangeInclusive<usize>),
}

/// Containment test accepted by [`SegmentTree::contains`]
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Instant falls inside the segment's time range
    Time(f64),
    /// Point falls inside the bounding box of the segment's raw samples
    Position(i32, i32),
    /// Value falls inside the min/max raw pressure of the segment
    Pressure(i32),
    /// Period lies entirely inside the segment's time range
    TimePeriod(f64, f64),
    Tag(String),
    /// Segment is a descendant (any depth)
    Child(SegmentId),
}

/// A node of the segment tree
#[derive(Debug, Clone, Serialize)]
pub struct Segment {
    id: SegmentId,
    name: String,
    parent: Option<SegmentId>,
    children: Vec<SegmentId>,
    locked: bool,
    start_time: f64,
    end_time: f64,
    index_range: Option<(usize, usize)>,
    tags: Vec<String>,
    cond_vars: Option<CondVars>,
}

impl Segment {
    pub fn id(&self) -> SegmentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `None` only for the root
    pub fn parent(&self) -> Option<SegmentId> {
        self.parent
    }

    /// Children sorted by start time
    pub fn children(&self) -> &[SegmentId] {
        &self.children
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn time_range(&self) -> (f64, f64) {
        (self.start_time, self.end_time)
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Inclusive sample index range, `None` if no sample fell inside
    pub fn index_range(&self) -> Option<(usize, usize)> {
        self.index_range
    }

    pub fn sample_count(&self) -> usize {
        self.index_range.map(|(lo, hi)| hi - lo + 1).unwrap_or(0)
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Condition variables defined on this node only
    pub fn cond_vars(&self) -> Option<&CondVars> {
        self.cond_vars.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_id_display_and_root() {
        assert_eq!(SegmentId(17).to_string(), "17");
        assert!(SegmentId::ROOT.is_root());
        assert!(!SegmentId(1).is_root());
        assert_eq!(SegmentId::default(), SegmentId::ROOT);
    }
}
