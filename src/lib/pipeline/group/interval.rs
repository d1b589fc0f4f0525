//! Candidate-breakpoint intervals.

use crate::engine::record::Strand;

/// Closed range `[pos5, pos3]` of 1-based reference positions.
///
/// `pos5 > pos3` denotes the empty interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub pos5: i64,
    pub pos3: i64,
}

impl Interval {
    pub fn new(pos5: i64, pos3: i64) -> Self {
        Self { pos5, pos3 }
    }

    /// Range in which the breakpoint may lie, given one end of a pair.
    ///
    /// A forward read looks downstream of its start, a reverse read upstream
    /// of its end, each by at most `max_insert`, clamped to the reference.
    /// Only valid for short-insert libraries in forward/reverse orientation.
    pub fn project(pos: i64, strand: Strand, read_length: i64, ref_length: i64, max_insert: i64) -> Self {
        match strand {
            Strand::Forward => Self {
                pos5: pos,
                pos3: (pos + max_insert).min(ref_length),
            },
            Strand::Reverse => {
                let end = pos + read_length;
                Self {
                    pos5: (end - max_insert).max(1),
                    pos3: end.min(ref_length),
                }
            }
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pos5 > self.pos3
    }

    #[inline]
    pub fn len(&self) -> i64 {
        (self.pos3 - self.pos5 + 1).max(0)
    }

    /// Whether the two ranges share at least one position.
    #[inline]
    pub fn intersects(&self, other: &Interval) -> bool {
        !(self.pos3 < other.pos5 || self.pos5 > other.pos3)
    }

    /// Shrink to the intersection with `other`. Never grows.
    #[inline]
    pub fn intersect_assign(&mut self, other: &Interval) {
        if other.pos5 > self.pos5 {
            self.pos5 = other.pos5;
        }
        if other.pos3 < self.pos3 {
            self.pos3 = other.pos3;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn covers(outer: &Interval, inner: &Interval) -> bool {
        inner.is_empty() || (outer.pos5 <= inner.pos5 && inner.pos3 <= outer.pos3)
    }

    #[test]
    fn projection_clamps_to_reference() {
        let fwd = Interval::project(1_000, Strand::Forward, 100, 1_000_000, 500);
        assert_eq!(fwd, Interval::new(1_000, 1_500));

        let fwd_end = Interval::project(999_800, Strand::Forward, 100, 1_000_000, 500);
        assert_eq!(fwd_end.pos3, 1_000_000);

        let rev = Interval::project(1_000, Strand::Reverse, 100, 1_000_000, 500);
        assert_eq!(rev, Interval::new(600, 1_100));

        let rev_start = Interval::project(50, Strand::Reverse, 100, 1_000_000, 500);
        assert_eq!(rev_start.pos5, 1);
    }

    #[test]
    fn disjoint_intersection_is_empty() {
        let mut a = Interval::new(10, 20);
        let b = Interval::new(21, 30);
        assert!(!a.intersects(&b));
        a.intersect_assign(&b);
        assert!(a.is_empty());
        assert_eq!(a.len(), 0);

        assert!(Interval::new(10, 20).intersects(&Interval::new(20, 25)));
    }

    proptest! {
        #[test]
        fn intersect_assign_never_grows(a5 in 0i64..1000, alen in 0i64..500, b5 in 0i64..1000, blen in 0i64..500) {
            let mut a = Interval::new(a5, a5 + alen);
            let b = Interval::new(b5, b5 + blen);
            let before = a;
            a.intersect_assign(&b);
            prop_assert!(covers(&before, &a));
            prop_assert!(covers(&b, &a));
            prop_assert_eq!(a.is_empty(), !before.intersects(&b));
        }
    }
}
