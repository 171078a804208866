// SPDX-License-Identifier: MPL-2.0

//! A set of versions, represented as an ordered list of disjoint intervals.
//!
//! [`Ranges`] is kept in a canonical form at all times:
//!
//! 1. Segments are sorted by their start bound.
//! 2. Each segment contains at least one version.
//! 3. Consecutive segments are separated by a gap: there is at least one
//!    possible version between the end of a segment and the start of the next
//!    one, so touching or overlapping segments are always merged.
//!
//! Canonicity is what makes structural equality (`==`) coincide with set
//! equality, which the solver relies on when comparing term intersections.
//!
//! The version type `V` only needs [`Ord`] and [`Clone`]; the set operations
//! never construct new versions, they only move bounds around.

use std::fmt::{self, Display, Formatter};
use std::ops::Bound::{self, Excluded, Included, Unbounded};
use std::ops::RangeBounds;

#[cfg(any(test, feature = "proptest"))]
pub mod testing;

/// An interval is a pair of bounds, each either unbounded or finite with an
/// inclusivity flag.
pub type Interval<V> = (Bound<V>, Bound<V>);

pub(crate) type SmallVec<T> = smallvec::SmallVec<[T; 2]>;

/// Ranges represents multiple intervals of a continuous range of monotone increasing values.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Ranges<V> {
    /// Sorted, disjoint, gap-separated intervals.
    pub(crate) segments: SmallVec<Interval<V>>,
}

impl<V> Ranges<V> {
    /// Empty set of versions.
    pub fn empty() -> Self {
        Self {
            segments: SmallVec::new(),
        }
    }

    /// Set of all possible versions.
    pub fn full() -> Self {
        Self {
            segments: smallvec::smallvec![(Unbounded, Unbounded)],
        }
    }

    /// Set of all versions higher or equal to some version.
    pub fn higher_than(v: impl Into<V>) -> Self {
        Self {
            segments: smallvec::smallvec![(Included(v.into()), Unbounded)],
        }
    }

    /// Set of all versions strictly higher than some version.
    pub fn strictly_higher_than(v: impl Into<V>) -> Self {
        Self {
            segments: smallvec::smallvec![(Excluded(v.into()), Unbounded)],
        }
    }

    /// Set of all versions lower or equal to some version.
    pub fn lower_than(v: impl Into<V>) -> Self {
        Self {
            segments: smallvec::smallvec![(Unbounded, Included(v.into()))],
        }
    }

    /// Set of all versions strictly lower than some version.
    pub fn strictly_lower_than(v: impl Into<V>) -> Self {
        Self {
            segments: smallvec::smallvec![(Unbounded, Excluded(v.into()))],
        }
    }

    /// Set of versions greater or equal to `v1` but strictly lower than `v2`.
    pub fn between(v1: impl Into<V>, v2: impl Into<V>) -> Self {
        Self {
            segments: smallvec::smallvec![(Included(v1.into()), Excluded(v2.into()))],
        }
    }

    /// Whether the set contains no version at all.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl<V: Clone> Ranges<V> {
    /// Set containing exactly one version.
    pub fn singleton(v: impl Into<V>) -> Self {
        let v = v.into();
        Self {
            segments: smallvec::smallvec![(Included(v.clone()), Included(v))],
        }
    }

    /// Iterate over the intervals, in order, without consuming them.
    pub fn iter(&self) -> impl Iterator<Item = (&Bound<V>, &Bound<V>)> {
        self.segments.iter().map(|(start, end)| (start, end))
    }
}

impl<V: Ord> Ranges<V> {
    /// Convert any type that implements [`RangeBounds`] into a canonical range.
    pub fn from_range_bounds<R, IV>(bounds: R) -> Self
    where
        R: RangeBounds<IV>,
        IV: Clone + Into<V>,
    {
        let start = match bounds.start_bound() {
            Included(v) => Included(v.clone().into()),
            Excluded(v) => Excluded(v.clone().into()),
            Unbounded => Unbounded,
        };
        let end = match bounds.end_bound() {
            Included(v) => Included(v.clone().into()),
            Excluded(v) => Excluded(v.clone().into()),
            Unbounded => Unbounded,
        };
        if valid_segment(&start, &end) {
            Self {
                segments: smallvec::smallvec![(start, end)],
            }
        } else {
            Self::empty()
        }
    }

    /// Whether the set contains the given version.
    pub fn contains(&self, version: &V) -> bool {
        self.segments
            .iter()
            .any(|segment| within_bounds(version, segment))
    }

    /// If the set contains a single version, return it.
    pub fn as_singleton(&self) -> Option<&V> {
        match self.segments.as_slice() {
            [(Included(v1), Included(v2))] if v1 == v2 => Some(v1),
            _ => None,
        }
    }
}

impl<V: Ord + Clone> Ranges<V> {
    /// Compute the complement: the set of all versions not in `self`.
    pub fn complement(&self) -> Self {
        match self.segments.first() {
            // Complement of ∅ is *.
            None => Self::full(),
            // Complement of * is ∅.
            Some((Unbounded, Unbounded)) => Self::empty(),
            // First segment starts at -∞: the complement starts after its end.
            Some((Unbounded, end)) => Self::negate_segments(flip(end), &self.segments[1..]),
            // Otherwise the complement starts at -∞.
            Some(_) => Self::negate_segments(Unbounded, &self.segments),
        }
    }

    /// Build the complement from the gaps between segments, starting the
    /// first complement interval at `start`. Every segment start must be
    /// finite here; the caller has peeled off a leading unbounded start.
    fn negate_segments(start: Bound<V>, segments: &[Interval<V>]) -> Self {
        let mut output = SmallVec::new();
        let mut start = Some(start);
        for (seg_start, seg_end) in segments {
            output.push((
                start.take().expect("segment list ended at an unbounded end"),
                flip(seg_start),
            ));
            start = match seg_end {
                Included(v) => Some(Excluded(v.clone())),
                Excluded(v) => Some(Included(v.clone())),
                Unbounded => None,
            };
        }
        if let Some(start) = start {
            output.push((start, Unbounded));
        }
        Self { segments: output }.check_invariants()
    }

    /// Compute the union of two sets of versions.
    pub fn union(&self, other: &Self) -> Self {
        let mut output = SmallVec::new();
        let mut accumulator: Option<Interval<V>> = None;
        let mut left_iter = self.segments.iter().peekable();
        let mut right_iter = other.segments.iter().peekable();
        loop {
            // Take the segment with the smaller start from either input.
            let smaller = match (left_iter.peek(), right_iter.peek()) {
                (Some(left), Some(right)) => {
                    if left_start_is_smaller(&left.0, &right.0) {
                        left_iter.next().unwrap()
                    } else {
                        right_iter.next().unwrap()
                    }
                }
                (Some(_), None) => left_iter.next().unwrap(),
                (None, Some(_)) => right_iter.next().unwrap(),
                (None, None) => break,
            };
            match accumulator.as_mut() {
                None => accumulator = Some(smaller.clone()),
                Some((_, accumulator_end)) => {
                    if end_before_start_with_gap(accumulator_end, &smaller.0) {
                        // There is a possible version between the accumulated
                        // segment and the next one: flush and start over.
                        output.push(accumulator.take().unwrap());
                        accumulator = Some(smaller.clone());
                    } else if left_end_is_smaller(accumulator_end, &smaller.1) {
                        *accumulator_end = smaller.1.clone();
                    }
                }
            }
        }
        if let Some(accumulator) = accumulator {
            output.push(accumulator);
        }
        Self { segments: output }.check_invariants()
    }

    /// Compute the intersection of two sets of versions.
    pub fn intersection(&self, other: &Self) -> Self {
        let mut output = SmallVec::new();
        let mut left_iter = self.segments.iter().peekable();
        let mut right_iter = other.segments.iter().peekable();
        // Overlapping segments of the two inputs contribute their overlap;
        // advance whichever side ends first.
        while let (Some(left), Some(right)) = (left_iter.peek(), right_iter.peek()) {
            let start = if left_start_is_smaller(&left.0, &right.0) {
                &right.0
            } else {
                &left.0
            };
            let end = if left_end_is_smaller(&left.1, &right.1) {
                &left.1
            } else {
                &right.1
            };
            if valid_segment(start, end) {
                output.push((start.clone(), end.clone()));
            }
            if left_end_is_smaller(&left.1, &right.1) {
                left_iter.next();
            } else {
                right_iter.next();
            }
        }
        Self { segments: output }.check_invariants()
    }

    /// Whether the two sets have no version in common.
    pub fn is_disjoint(&self, other: &Self) -> bool {
        self.intersection(other).is_empty()
    }

    /// Whether all versions of `self` are contained in `other`.
    pub fn subset_of(&self, other: &Self) -> bool {
        self == &self.intersection(other)
    }

    /// Assert the canonical-form invariants in debug builds, pass through in
    /// release builds.
    pub(crate) fn check_invariants(self) -> Self {
        if cfg!(debug_assertions) {
            for (start, end) in &self.segments {
                assert!(valid_segment(start, end), "segment contains no version");
            }
            for pair in self.segments.windows(2) {
                assert!(
                    end_before_start_with_gap(&pair[0].1, &pair[1].0),
                    "segments not separated by a gap"
                );
            }
        }
        self
    }
}

fn within_bounds<V: Ord>(version: &V, segment: &Interval<V>) -> bool {
    let (start, end) = segment;
    let after_start = match start {
        Included(v) => version >= v,
        Excluded(v) => version > v,
        Unbounded => true,
    };
    let before_end = match end {
        Included(v) => version <= v,
        Excluded(v) => version < v,
        Unbounded => true,
    };
    after_start && before_end
}

/// Mirror a bound between the end of one interval and the start of the
/// adjacent complement interval.
fn flip<V: Clone>(bound: &Bound<V>) -> Bound<V> {
    match bound {
        Included(v) => Excluded(v.clone()),
        Excluded(v) => Included(v.clone()),
        Unbounded => Unbounded,
    }
}

/// A segment is valid if it contains at least one version.
fn valid_segment<V: Ord>(start: &Bound<V>, end: &Bound<V>) -> bool {
    match (start, end) {
        (Unbounded, _) | (_, Unbounded) => true,
        (Included(s), Included(e)) => s <= e,
        (Included(s), Excluded(e)) | (Excluded(s), Included(e)) | (Excluded(s), Excluded(e)) => {
            s < e
        }
    }
}

/// The end of one interval and the start of the next leave a gap between
/// them if there can be a version between the two:
///
/// ```text
/// true:   |----|         false:  |----|          depends:  |----|
///                |---|              |----|                      |----|
/// ```
///
/// When the bounds share a value, a gap exists only if both exclude it.
/// Touching closed bounds must be merged instead.
fn end_before_start_with_gap<V: Ord>(end: &Bound<V>, start: &Bound<V>) -> bool {
    match (end, start) {
        (Unbounded, _) | (_, Unbounded) => false,
        (Included(e), Included(s)) => e < s,
        (Included(e), Excluded(s)) | (Excluded(e), Included(s)) => e < s,
        (Excluded(e), Excluded(s)) => e <= s,
    }
}

fn left_start_is_smaller<V: Ord>(left: &Bound<V>, right: &Bound<V>) -> bool {
    match (left, right) {
        (Unbounded, _) => true,
        (_, Unbounded) => false,
        (Included(l), Included(r)) | (Excluded(l), Excluded(r)) | (Included(l), Excluded(r)) => {
            l <= r
        }
        (Excluded(l), Included(r)) => l < r,
    }
}

fn left_end_is_smaller<V: Ord>(left: &Bound<V>, right: &Bound<V>) -> bool {
    match (left, right) {
        (_, Unbounded) => true,
        (Unbounded, _) => false,
        (Included(l), Included(r)) | (Excluded(l), Excluded(r)) | (Excluded(l), Included(r)) => {
            l <= r
        }
        (Included(l), Excluded(r)) => l < r,
    }
}

impl<V: Display + Eq> Display for Ranges<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            write!(f, "∅")?;
        } else {
            for (idx, segment) in self.segments.iter().enumerate() {
                if idx > 0 {
                    write!(f, " | ")?;
                }
                match segment {
                    (Unbounded, Unbounded) => write!(f, "*")?,
                    (Unbounded, Included(v)) => write!(f, "<={v}")?,
                    (Unbounded, Excluded(v)) => write!(f, "<{v}")?,
                    (Included(v), Unbounded) => write!(f, ">={v}")?,
                    (Excluded(v), Unbounded) => write!(f, ">{v}")?,
                    (Included(v), Included(b)) if v == b => write!(f, "=={v}")?,
                    (Included(v), Included(b)) => write!(f, ">={v}, <={b}")?,
                    (Included(v), Excluded(b)) => write!(f, ">={v}, <{b}")?,
                    (Excluded(v), Included(b)) => write!(f, ">{v}, <={b}")?,
                    (Excluded(v), Excluded(b)) => write!(f, ">{v}, <{b}")?,
                }
            }
        }
        Ok(())
    }
}

// TESTS #######################################################################
