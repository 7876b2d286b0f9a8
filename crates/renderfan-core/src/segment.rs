//! Segment planning: deterministic partition of a frame range into
//! contiguous, disjoint per-worker sub-ranges.

use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};
use crate::job::FrameRange;

/// One contiguous sub-range of the job's frame range, assigned to one worker.
///
/// Immutable after planning. `index` is both insertion and execution order;
/// `name` is derived from it and doubles as the worker's service name in the
/// generated manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// 0-based position in the plan.
    pub index: usize,
    /// Frames this segment's worker renders.
    pub range: FrameRange,
    /// Deterministic worker name, `frame1`, `frame2`, ...
    pub name: String,
}

impl Segment {
    fn new(index: usize, range: FrameRange) -> Self {
        Segment {
            index,
            range,
            name: format!("frame{}", index + 1),
        }
    }
}

/// Deterministic frame-range partitioner.
pub struct SegmentPlanner;

impl SegmentPlanner {
    /// Partition `range` into at most `segment_count` contiguous segments.
    ///
    /// Segments are `ceil(total / segment_count)` frames wide; the last one
    /// absorbs the remainder. Emission stops as soon as a segment's end
    /// reaches the job's end, so when the range holds fewer frames than
    /// `segment_count` the plan naturally contains fewer segments. The
    /// returned segments are pairwise disjoint, gapless, and their union is
    /// exactly `range`.
    pub fn plan(range: FrameRange, segment_count: usize) -> Result<Vec<Segment>> {
        if segment_count == 0 {
            return Err(OrchestratorError::InvalidPlanRequest { segment_count });
        }

        // u64 arithmetic so a full-u32 range cannot overflow.
        let total = range.end() as u64 - range.start() as u64 + 1;
        let per_segment = total.div_ceil(segment_count as u64);

        let mut segments = Vec::with_capacity(segment_count);
        for i in 0..segment_count {
            let s = range.start() as u64 + i as u64 * per_segment;
            let e = (s + per_segment - 1).min(range.end() as u64);
            // s <= e <= range.end() holds because emission stops at the end.
            let sub = FrameRange::new(s as u32, e as u32)?;
            segments.push(Segment::new(i, sub));
            if e >= range.end() as u64 {
                break;
            }
        }

        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: u32, end: u32) -> FrameRange {
        FrameRange::new(start, end).unwrap()
    }

    fn assert_plan_invariants(input: FrameRange, segments: &[Segment]) {
        assert!(!segments.is_empty());
        assert_eq!(segments[0].range.start(), input.start());
        assert_eq!(segments.last().unwrap().range.end(), input.end());
        for (i, seg) in segments.iter().enumerate() {
            assert_eq!(seg.index, i);
            assert_eq!(seg.name, format!("frame{}", i + 1));
        }
        for pair in segments.windows(2) {
            assert_eq!(
                pair[1].range.start(),
                pair[0].range.end() + 1,
                "segments must be contiguous and gapless"
            );
        }
    }

    #[test]
    fn test_plan_1_to_100_in_3_segments() {
        let segments = SegmentPlanner::plan(range(1, 100), 3).unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].range, range(1, 34));
        assert_eq!(segments[1].range, range(35, 68));
        assert_eq!(segments[2].range, range(69, 100));
        assert_plan_invariants(range(1, 100), &segments);
    }

    #[test]
    fn test_plan_even_division() {
        let segments = SegmentPlanner::plan(range(1, 90), 3).unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].range, range(1, 30));
        assert_eq!(segments[1].range, range(31, 60));
        assert_eq!(segments[2].range, range(61, 90));
    }

    #[test]
    fn test_plan_fewer_frames_than_segments_early_stops() {
        let segments = SegmentPlanner::plan(range(1, 2), 3).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].range, range(1, 1));
        assert_eq!(segments[1].range, range(2, 2));
        assert_plan_invariants(range(1, 2), &segments);
    }

    #[test]
    fn test_plan_single_frame() {
        let segments = SegmentPlanner::plan(range(5, 5), 4).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].range, range(5, 5));
    }

    #[test]
    fn test_plan_single_segment_takes_whole_range() {
        let segments = SegmentPlanner::plan(range(10, 250), 1).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].range, range(10, 250));
    }

    #[test]
    fn test_plan_zero_segments_rejected() {
        let err = SegmentPlanner::plan(range(1, 10), 0).unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::InvalidPlanRequest { segment_count: 0 }
        ));
    }

    #[test]
    fn test_plan_is_idempotent() {
        let a = SegmentPlanner::plan(range(1, 100), 7).unwrap();
        let b = SegmentPlanner::plan(range(1, 100), 7).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_plan_invariants_across_inputs() {
        for (start, end, count) in [
            (1u32, 100u32, 3usize),
            (0, 0, 1),
            (0, 999, 8),
            (240, 260, 5),
            (1, 2, 3),
            (1, 10_000, 16),
        ] {
            let input = range(start, end);
            let segments = SegmentPlanner::plan(input, count).unwrap();
            assert!(segments.len() <= count);
            let covered: u64 = segments.iter().map(|s| s.range.len() as u64).sum();
            assert_eq!(covered, input.len() as u64, "union must equal the input");
            assert_eq!(
                segments.len() < count,
                (input.len() as usize) < count,
                "under-allocation exactly when frames < segments"
            );
            assert_plan_invariants(input, &segments);
        }
    }
}
