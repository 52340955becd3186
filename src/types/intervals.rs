//! A tree of nested intervals with inclusive bounds on either end.
//!
//! Intervals in the tree are either disjoint or fully contained in one
//! another; partial overlap is a data invariant violation.

use crate::error::InvariantError;

#[derive(Clone, Debug)]
pub struct Interval<T> {
    pub begin: i64,
    pub end: i64,
    /// Synthetic container intervals carry no data.
    pub data: Option<T>,
    children: Vec<Interval<T>>,
    // begin time of every child, kept in step with `children`
    child_begins: Vec<i64>,
}

impl<T> Interval<T> {
    fn new(begin: i64, end: i64, data: Option<T>) -> Self {
        debug_assert!(begin <= end);
        Self {
            begin,
            end,
            data,
            children: Vec::new(),
            child_begins: Vec::new(),
        }
    }

    pub fn length(&self) -> i64 {
        self.end - self.begin
    }

    pub fn children(&self) -> &[Interval<T>] {
        &self.children
    }

    pub fn contains_point(&self, t: i64) -> bool {
        self.begin <= t && t <= self.end
    }

    /// Whether `other` nests within this interval. Partial overlap raises.
    fn contains(&self, other: &Interval<T>) -> Result<bool, InvariantError> {
        if self.begin < other.begin && other.begin < self.end && self.end < other.end {
            return Err(InvariantError::OverlappingIntervals {
                existing: (self.begin, self.end),
                added: (other.begin, other.end),
            });
        }
        Ok(self.begin <= other.begin && other.end <= self.end)
    }

    fn add_child(&mut self, child: Interval<T>) {
        let idx = self.child_begins.partition_point(|b| *b <= child.begin);
        self.child_begins.insert(idx, child.begin);
        self.children.insert(idx, child);
    }

    /// Candidate child for a begin time: the rightmost child whose begin is
    /// not past it.
    fn candidate_child_idx(&self, begin: i64) -> Option<usize> {
        let idx = self.child_begins.partition_point(|b| *b <= begin);
        idx.checked_sub(1)
    }

    /// Find the narrowest interval containing `t`, starting at this node.
    pub fn find(&self, t: i64) -> Option<&Interval<T>> {
        if !self.contains_point(t) {
            return None;
        }
        if let Some(idx) = self.candidate_child_idx(t) {
            if let Some(found) = self.children[idx].find(t) {
                return Some(found);
            }
        }
        Some(self)
    }

    /// Insert `interval` below this node.
    ///
    /// The precondition is that this node contains `interval`; the insert
    /// recurses into the deepest containing child.
    fn insert(&mut self, interval: Interval<T>) -> Result<(), InvariantError> {
        if let Some(idx) = self.candidate_child_idx(interval.begin) {
            if self.children[idx].contains(&interval)? {
                return self.children[idx].insert(interval);
            }
        }
        self.add_child(interval);
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct IntervalTree<T> {
    root: Option<Interval<T>>,
}

impl<T> IntervalTree<T> {
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Find the narrowest interval containing `t`.
    pub fn find_interval(&self, t: i64) -> Option<&Interval<T>> {
        self.root.as_ref().and_then(|root| root.find(t))
    }

    pub fn root(&self) -> Option<&Interval<T>> {
        self.root.as_ref()
    }

    pub fn add_interval(
        &mut self,
        begin: i64,
        end: i64,
        data: Option<T>,
    ) -> Result<(), InvariantError> {
        let interval = Interval::new(begin, end, data);

        let Some(root) = self.root.as_mut() else {
            self.root = Some(interval);
            return Ok(());
        };

        if root.contains(&interval)? {
            return root.insert(interval);
        }

        // Not nested below the root; the interval either adopts the root,
        // sits alongside it under a synthetic container, or extends an
        // already-synthetic root.
        if interval.contains(root)? {
            let old_root = self.root.take().unwrap();
            let mut new_root = interval;
            new_root.add_child(old_root);
            self.root = Some(new_root);
        } else if root.data.is_some() {
            let old_root = self.root.take().unwrap();
            let mut new_root = Interval::new(
                old_root.begin.min(interval.begin),
                old_root.end.max(interval.end),
                None,
            );
            new_root.add_child(old_root);
            new_root.add_child(interval);
            self.root = Some(new_root);
        } else {
            root.begin = root.begin.min(interval.begin);
            root.end = root.end.max(interval.end);
            root.add_child(interval);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bounds<T>(interval: Option<&Interval<T>>) -> (i64, i64) {
        let interval = interval.unwrap();
        (interval.begin, interval.end)
    }

    #[test]
    fn find_containing() {
        let mut tree = IntervalTree::new();
        tree.add_interval(1, 10, Some("1-10")).unwrap();
        tree.add_interval(1, 5, Some("1-5")).unwrap();
        tree.add_interval(1, 2, Some("1-2")).unwrap();
        tree.add_interval(3, 4, Some("3-4")).unwrap();
        tree.add_interval(7, 8, Some("7-8")).unwrap();

        assert_eq!(bounds(tree.find_interval(1)), (1, 2));
        assert_eq!(bounds(tree.find_interval(2)), (1, 2));
        assert_eq!(bounds(tree.find_interval(3)), (3, 4));
        assert_eq!(bounds(tree.find_interval(4)), (3, 4));
        assert_eq!(bounds(tree.find_interval(5)), (1, 5));
        assert_eq!(bounds(tree.find_interval(6)), (1, 10));
        assert_eq!(bounds(tree.find_interval(7)), (7, 8));
        assert_eq!(bounds(tree.find_interval(8)), (7, 8));
        assert_eq!(bounds(tree.find_interval(9)), (1, 10));
        assert_eq!(bounds(tree.find_interval(10)), (1, 10));
        assert!(tree.find_interval(11).is_none());
    }

    #[test]
    fn new_interval_adopts_the_root() {
        let mut tree = IntervalTree::new();
        tree.add_interval(10, 20, Some("inner")).unwrap();
        tree.add_interval(5, 30, Some("outer")).unwrap();

        let root = tree.root().unwrap();
        assert_eq!((root.begin, root.end), (5, 30));
        assert_eq!(root.data, Some("outer"));
        assert_eq!(root.children().len(), 1);
        assert_eq!(bounds(tree.find_interval(15)), (10, 20));
        assert_eq!(bounds(tree.find_interval(25)), (5, 30));
    }

    #[test]
    fn disjoint_intervals_get_a_synthetic_root() {
        let mut tree = IntervalTree::new();
        tree.add_interval(1, 2, Some("a")).unwrap();
        tree.add_interval(5, 6, Some("b")).unwrap();

        let root = tree.root().unwrap();
        assert_eq!((root.begin, root.end), (1, 6));
        assert!(root.data.is_none());
        assert_eq!(root.children().len(), 2);

        // A synthetic root extends in place
        tree.add_interval(8, 9, Some("c")).unwrap();
        let root = tree.root().unwrap();
        assert_eq!((root.begin, root.end), (1, 9));
        assert_eq!(root.children().len(), 3);

        assert_eq!(tree.find_interval(5).unwrap().data, Some("b"));
        // Points covered only by the synthetic container land on it
        assert!(tree.find_interval(4).unwrap().data.is_none());
    }

    #[test]
    fn partial_overlap_is_rejected() {
        let mut tree = IntervalTree::new();
        tree.add_interval(1, 10, Some("a")).unwrap();
        let err = tree.add_interval(5, 15, Some("b")).unwrap_err();
        assert_eq!(
            err,
            InvariantError::OverlappingIntervals {
                existing: (1, 10),
                added: (5, 15),
            }
        );
    }

    #[test]
    fn containment_query_property() {
        // For any inserted interval and any point within it, the lookup
        // returns the interval itself or a descendant containing the point.
        let mut tree = IntervalTree::new();
        let intervals = [(0, 100), (10, 40), (12, 20), (30, 39), (50, 80), (55, 60)];
        for (b, e) in intervals {
            tree.add_interval(b, e, Some((b, e))).unwrap();
        }
        for (b, e) in intervals {
            for t in b..=e {
                let found = tree.find_interval(t).unwrap();
                assert!(found.contains_point(t));
                // narrowest: contained in (b, e)
                assert!(b <= found.begin && found.end <= e || (found.begin, found.end) == (b, e));
            }
        }
    }
}
