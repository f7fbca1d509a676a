//! SegmentTree - arena of segments with index/time-range invariants
//!
//! Invariants maintained here:
//! - ids are handed out monotonically and never reused
//! - children of every node are sorted by start time (ties by id)
//! - a new segment's time range lies inside its parent's at creation time
//! - a segment's index range lies inside its parent's; a wider request is
//!   clipped
//! - each sample's `segment_id` names the most recently assigned segment
//!   covering it; ancestors are implied by the tree
//!
//! Operations that touch samples take the `SampleStore` explicitly; the
//! tree never holds on to it.

use std::collections::VecDeque;

use log::{debug, info};

use super::{CondVars, Query, Segment, SegmentExtent, SegmentId};
use crate::error::SegmentError;
use crate::samples::SampleStore;

#[derive(Debug, Clone)]
pub struct SegmentTree {
    slots: Vec<Option<Segment>>,
    live: usize,
}

impl SegmentTree {
    /// Create the tree and its root spanning the whole sample array
    ///
    /// Every sample is assigned to the root.
    pub fn new(root_name: &str, store: &mut SampleStore) -> Self {
        let (start_time, end_time) = store.time_bounds().unwrap_or((0.0, 0.0));
        let index_range = if store.is_empty() {
            None
        } else {
            Some((0, store.len() - 1))
        };
        if let Some((lo, hi)) = index_range {
            store.assign_segment(lo..=hi, SegmentId::ROOT);
        }

        let root = Segment {
            id: SegmentId::ROOT,
            name: root_name.to_string(),
            parent: None,
            children: Vec::new(),
            locked: false,
            start_time,
            end_time,
            index_range,
            tags: Vec::new(),
            cond_vars: None,
        };

        Self {
            slots: vec![Some(root)],
            live: 1,
        }
    }

    pub fn root(&self) -> &Segment {
        // Slot 0 is created in `new` and `remove` refuses the root
        self.slots[0]
            .as_ref()
            .expect("root segment slot is never vacated")
    }

    pub fn get(&self, id: SegmentId) -> Option<&Segment> {
        self.slots.get(id.0 as usize).and_then(|slot| slot.as_ref())
    }

    fn get_mut(&mut self, id: SegmentId) -> Option<&mut Segment> {
        self.slots.get_mut(id.0 as usize).and_then(|slot| slot.as_mut())
    }

    /// Number of live segments, root included
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Id the next created segment will receive
    pub fn next_id(&self) -> SegmentId {
        SegmentId(self.slots.len() as u32)
    }

    /// Live segments in id order
    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.slots.iter().filter_map(|slot| slot.as_ref())
    }

    /// Create a segment under `parent`
    ///
    /// The new id is the next sequential id; samples inside the resolved
    /// index range are assigned to it. On error nothing is modified.
    pub fn create(
        &mut self,
        store: &mut SampleStore,
        name: &str,
        parent: SegmentId,
        extent: SegmentExtent,
        trim_zero_pressure: bool,
    ) -> Result<SegmentId, SegmentError> {
        let (parent_range, parent_indices) = self
            .get(parent)
            .map(|p| (p.time_range(), p.index_range()))
            .ok_or(SegmentError::UnknownParent { id: parent })?;

        let (start_time, end_time, index_range) = match extent {
            SegmentExtent::TimeRange(start, end) => {
                if !(start.is_finite() && end.is_finite() && start <= end) {
                    return Err(SegmentError::InvalidTimeRange { start, end });
                }
                let index_range = store.time_range_to_index_range(start, end, trim_zero_pressure);
                (start, end, index_range)
            }
            SegmentExtent::Samples(range) => {
                let (lo, hi) = (*range.start(), *range.end());
                if lo > hi || hi >= store.len() {
                    return Err(SegmentError::InvalidSampleRange { start: lo, end: hi });
                }
                let samples = store.samples();
                (samples[lo].time, samples[hi].time, Some((lo, hi)))
            }
        };

        let (parent_start, parent_end) = parent_range;
        if start_time < parent_start || end_time > parent_end {
            return Err(SegmentError::OutsideParentRange {
                parent,
                start: start_time,
                end: end_time,
                parent_start,
                parent_end,
            });
        }

        // A child never owns samples its parent does not cover
        let index_range = index_range.and_then(|(lo, hi)| {
            let (plo, phi) = parent_indices?;
            let (lo, hi) = (lo.max(plo), hi.min(phi));
            (lo <= hi).then_some((lo, hi))
        });

        let id = self.next_id();
        self.slots.push(Some(Segment {
            id,
            name: name.to_string(),
            parent: Some(parent),
            children: Vec::new(),
            locked: false,
            start_time,
            end_time,
            index_range,
            tags: Vec::new(),
            cond_vars: None,
        }));
        self.live += 1;
        self.attach_child(parent, id);

        if let Some((lo, hi)) = index_range {
            store.assign_segment(lo..=hi, id);
        }

        debug!(
            "[SegmentTree] Created segment {} '{}' under {} [{:.4}, {:.4}] samples {:?}",
            id, name, parent, start_time, end_time, index_range
        );
        Ok(id)
    }

    /// Remove an unlocked, non-root segment
    ///
    /// Samples owned by the segment go back to its parent and its children
    /// are re-parented to that same parent. Returns the detached segment.
    pub fn remove(
        &mut self,
        store: &mut SampleStore,
        id: SegmentId,
    ) -> Result<Segment, SegmentError> {
        if id.is_root() {
            return Err(SegmentError::RootImmutable);
        }
        let segment = self.get(id).ok_or(SegmentError::UnknownSegment { id })?;
        if segment.locked {
            return Err(SegmentError::Locked { id });
        }
        let parent = segment.parent.unwrap_or(SegmentId::ROOT);

        let mut removed = self.slots[id.0 as usize]
            .take()
            .ok_or(SegmentError::UnknownSegment { id })?;
        self.live -= 1;

        if let Some((lo, hi)) = removed.index_range {
            let moved = store.reassign_segment(lo..=hi, id, parent);
            debug!(
                "[SegmentTree] Returned {} samples of segment {} to {}",
                moved, id, parent
            );
        }

        if let Some(p) = self.get_mut(parent) {
            p.children.retain(|&child| child != id);
        }
        let orphans = std::mem::take(&mut removed.children);
        for child in &orphans {
            if let Some(c) = self.get_mut(*child) {
                c.parent = Some(parent);
            }
            self.attach_child(parent, *child);
        }

        info!(
            "[SegmentTree] Removed segment {} '{}' ({} children re-parented to {})",
            id,
            removed.name,
            orphans.len(),
            parent
        );
        Ok(removed)
    }

    pub fn rename(&mut self, id: SegmentId, name: &str) -> Result<(), SegmentError> {
        let segment = self
            .get_mut(id)
            .ok_or(SegmentError::UnknownSegment { id })?;
        if segment.locked {
            return Err(SegmentError::Locked { id });
        }
        segment.name = name.to_string();
        Ok(())
    }

    pub fn set_locked(&mut self, id: SegmentId, locked: bool) -> Result<(), SegmentError> {
        self.get_mut(id)
            .ok_or(SegmentError::UnknownSegment { id })?
            .locked = locked;
        Ok(())
    }

    pub fn set_tags(&mut self, id: SegmentId, tags: Vec<String>) -> Result<(), SegmentError> {
        self.get_mut(id)
            .ok_or(SegmentError::UnknownSegment { id })?
            .tags = tags;
        Ok(())
    }

    pub fn set_cond_vars(
        &mut self,
        id: SegmentId,
        cond_vars: Option<CondVars>,
    ) -> Result<(), SegmentError> {
        self.get_mut(id)
            .ok_or(SegmentError::UnknownSegment { id })?
            .cond_vars = cond_vars;
        Ok(())
    }

    /// Condition variables of the nearest node (self first) defining them
    pub fn effective_cond_vars(&self, id: SegmentId) -> Option<&CondVars> {
        self.ancestors_inclusive(id)
            .find_map(|segment| segment.cond_vars.as_ref())
    }

    /// `id` followed by its ancestors up to the root
    pub fn ancestors_inclusive(&self, id: SegmentId) -> impl Iterator<Item = &Segment> {
        std::iter::successors(self.get(id), move |segment| {
            segment.parent.and_then(|p| self.get(p))
        })
    }

    /// Distance from the root (root = 0)
    pub fn depth(&self, id: SegmentId) -> Option<usize> {
        self.get(id)?;
        Some(self.ancestors_inclusive(id).count() - 1)
    }

    /// True when `id` lies strictly below `ancestor`
    pub fn is_descendant(&self, ancestor: SegmentId, id: SegmentId) -> bool {
        self.ancestors_inclusive(id)
            .skip(1)
            .any(|segment| segment.id == ancestor)
    }

    /// Non-root segments grouped by depth; entry 0 holds depth 1
    pub fn leveled_segments(&self) -> Vec<Vec<&Segment>> {
        let mut levels: Vec<Vec<&Segment>> = Vec::new();
        let mut queue: VecDeque<(SegmentId, usize)> = self
            .root()
            .children
            .iter()
            .map(|&child| (child, 1))
            .collect();

        while let Some((id, depth)) = queue.pop_front() {
            let Some(segment) = self.get(id) else {
                continue;
            };
            if levels.len() < depth {
                levels.push(Vec::new());
            }
            levels[depth - 1].push(segment);
            queue.extend(segment.children.iter().map(|&child| (child, depth + 1)));
        }

        levels
    }

    /// Evaluate a containment query against segment `id`
    pub fn contains(
        &self,
        store: &SampleStore,
        id: SegmentId,
        query: &Query,
    ) -> Result<bool, SegmentError> {
        let segment = self.get(id).ok_or(SegmentError::UnknownSegment { id })?;
        let (start, end) = segment.time_range();

        let hit = match query {
            Query::Time(t) => start <= *t && *t <= end,
            Query::TimePeriod(a, b) => a <= b && start <= *a && *b <= end,
            Query::Tag(tag) => segment.tags.iter().any(|t| t == tag),
            Query::Child(child) => self.is_descendant(id, *child),
            Query::Position(x, y) => match segment.index_range {
                Some((lo, hi)) => {
                    let samples = &store.samples()[lo..=hi];
                    let (min_x, max_x) = min_max(samples.iter().map(|s| s.x));
                    let (min_y, max_y) = min_max(samples.iter().map(|s| s.y));
                    min_x <= *x && *x <= max_x && min_y <= *y && *y <= max_y
                }
                None => false,
            },
            Query::Pressure(p) => match segment.index_range {
                Some((lo, hi)) => {
                    let (min_p, max_p) =
                        min_max(store.samples()[lo..=hi].iter().map(|s| s.pressure));
                    min_p <= *p && *p <= max_p
                }
                None => false,
            },
        };
        Ok(hit)
    }

    fn attach_child(&mut self, parent: SegmentId, child: SegmentId) {
        let mut children = match self.get_mut(parent) {
            Some(p) => std::mem::take(&mut p.children),
            None => return,
        };
        children.push(child);
        children.sort_by(|a, b| {
            let ta = self.get(*a).map(|s| s.start_time).unwrap_or(f64::INFINITY);
            let tb = self.get(*b).map(|s| s.start_time).unwrap_or(f64::INFINITY);
            ta.total_cmp(&tb).then(a.cmp(b))
        });
        if let Some(p) = self.get_mut(parent) {
            p.children = children;
        }
    }
}

fn min_max(values: impl Iterator<Item = i32>) -> (i32, i32) {
    values.fold((i32::MAX, i32::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)))
}
