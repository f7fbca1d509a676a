//! Reverse lookups from a sample index to the span that owns it
//!
//! A `SpanTable` wraps an ordered table of index spans (Runs, Strokes) and
//! precomputes a per-sample owner so lookups are O(1). When spans share a
//! sample the first span in table order wins and the ambiguity is logged
//! once per table.

use log::warn;
use once_cell::sync::OnceCell;

/// Anything covering an inclusive sample index range
pub trait IndexSpan {
    fn start_ix(&self) -> usize;
    fn end_ix(&self) -> usize;

    fn contains_ix(&self, ix: usize) -> bool {
        self.start_ix() <= ix && ix <= self.end_ix()
    }
}

#[derive(Debug)]
pub struct SpanTable<T> {
    label: &'static str,
    spans: Vec<T>,
    owner: Vec<Option<usize>>,
    shared: Vec<bool>,
    ambiguity_reported: OnceCell<()>,
}

impl<T: IndexSpan> SpanTable<T> {
    /// Index `spans` over a sample array of `sample_count` rows
    pub fn new(label: &'static str, spans: Vec<T>, sample_count: usize) -> Self {
        let mut owner = vec![None; sample_count];
        let mut shared = vec![false; sample_count];

        for (pos, span) in spans.iter().enumerate() {
            if span.start_ix() >= sample_count {
                continue;
            }
            let end = span.end_ix().min(sample_count - 1);
            for ix in span.start_ix()..=end {
                match owner[ix] {
                    None => owner[ix] = Some(pos),
                    Some(_) => shared[ix] = true,
                }
            }
        }

        Self {
            label,
            spans,
            owner,
            shared,
            ambiguity_reported: OnceCell::new(),
        }
    }

    pub fn spans(&self) -> &[T] {
        &self.spans
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Span owning sample `ix`, first in table order on shared samples
    pub fn lookup(&self, ix: usize) -> Option<&T> {
        let pos = (*self.owner.get(ix)?)?;
        if self.shared[ix] && self.ambiguity_reported.set(()).is_ok() {
            warn!(
                "[SpanTable] Sample {} belongs to more than one {} span; using the first match (reported once)",
                ix, self.label
            );
        }
        self.spans.get(pos)
    }

    /// True if any sample is covered by more than one span
    pub fn has_shared_samples(&self) -> bool {
        self.shared.iter().any(|&s| s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Span(usize, usize, u32);

    impl IndexSpan for Span {
        fn start_ix(&self) -> usize {
            self.0
        }
        fn end_ix(&self) -> usize {
            self.1
        }
    }

    #[test]
    fn test_lookup_disjoint_spans() {
        let table = SpanTable::new("run", vec![Span(2, 4, 1), Span(7, 9, 2)], 12);
        assert_eq!(table.lookup(0), None);
        assert_eq!(table.lookup(2).map(|s| s.2), Some(1));
        assert_eq!(table.lookup(4).map(|s| s.2), Some(1));
        assert_eq!(table.lookup(5), None);
        assert_eq!(table.lookup(9).map(|s| s.2), Some(2));
        assert_eq!(table.lookup(100), None);
        assert!(!table.has_shared_samples());
    }

    #[test]
    fn test_shared_boundary_returns_first_match() {
        let table = SpanTable::new("stroke", vec![Span(0, 5, 1), Span(5, 9, 2)], 10);
        assert!(table.has_shared_samples());
        assert_eq!(table.lookup(5).map(|s| s.2), Some(1));
        // Repeated ambiguous lookups stay deterministic
        assert_eq!(table.lookup(5).map(|s| s.2), Some(1));
        assert!(table.ambiguity_reported.get().is_some());
        assert_eq!(table.lookup(6).map(|s| s.2), Some(2));
    }

    #[test]
    fn test_spans_past_array_end_are_clamped() {
        let table = SpanTable::new("run", vec![Span(3, 50, 1), Span(60, 70, 2)], 5);
        assert_eq!(table.lookup(4).map(|s| s.2), Some(1));
        assert_eq!(table.len(), 2);
    }
}
