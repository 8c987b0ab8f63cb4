use serde::{Deserialize, Serialize};

use crate::core::error::TimelineError;

/// One clip reference as the composition document supplies it: a source file
/// plus an optional trim window, in playback order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipSource {
    pub source_path: String,
    #[serde(default)]
    pub source_start: f64,
    #[serde(default)]
    pub source_end: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Fade,
    Crossfade,
    Cut,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionSpec {
    pub kind: TransitionKind,
    #[serde(default)]
    pub duration_seconds: f64,
    #[serde(default)]
    pub offset_seconds: f64,
}

impl TransitionSpec {
    pub fn cut() -> Self {
        Self {
            kind: TransitionKind::Cut,
            duration_seconds: 0.0,
            offset_seconds: 0.0,
        }
    }

    /// Timeline overlap this transition claims between two adjacent clips.
    pub fn overlap(&self) -> f64 {
        match self.kind {
            TransitionKind::Crossfade => self.duration_seconds,
            TransitionKind::Fade | TransitionKind::Cut => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipSegment {
    pub source_path: String,
    pub source_start: f64,
    pub source_end: Option<f64>,
    pub timeline_start: f64,
    pub timeline_end: f64,
}

impl ClipSegment {
    pub fn duration(&self) -> f64 {
        self.timeline_end - self.timeline_start
    }

    pub fn has_trim(&self) -> bool {
        self.source_start > 0.0 || self.source_end.is_some()
    }
}

/// Resolves an ordered clip list into absolute timeline placement.
///
/// Adjacent segments are contiguous; a crossfade declared at a boundary lets
/// the following segment start early by exactly the transition duration.
/// `source_durations[i]` supplies the full duration of clip `i`'s source file
/// when the clip has no explicit end trim.
pub fn assemble(
    clips: &[ClipSource],
    transitions: &[TransitionSpec],
    source_durations: &[f64],
) -> Result<Vec<ClipSegment>, TimelineError> {
    if clips.is_empty() {
        return Err(TimelineError::EmptyTimeline);
    }

    let mut segments = Vec::with_capacity(clips.len());
    let mut cursor = 0.0_f64;

    for (i, clip) in clips.iter().enumerate() {
        if let Some(end) = clip.source_end {
            if end <= clip.source_start {
                return Err(TimelineError::InvalidTrim {
                    path: clip.source_path.clone(),
                    start: clip.source_start,
                    end,
                });
            }
        }

        let effective_end = match clip.source_end {
            Some(end) => end,
            None => *source_durations.get(i).unwrap_or(&0.0),
        };
        let duration = effective_end - clip.source_start;
        if duration <= 0.0 {
            return Err(TimelineError::NegativeDuration {
                path: clip.source_path.clone(),
            });
        }

        if i > 0 {
            let overlap = transitions.get(i - 1).map(|t| t.overlap()).unwrap_or(0.0);
            cursor -= overlap;
        }

        let segment = ClipSegment {
            source_path: clip.source_path.clone(),
            source_start: clip.source_start,
            source_end: clip.source_end,
            timeline_start: cursor,
            timeline_end: cursor + duration,
        };
        cursor = segment.timeline_end;
        segments.push(segment);
    }

    Ok(segments)
}

/// Total composed duration: the last segment's end (overlaps already folded
/// in during assembly).
pub fn total_duration(segments: &[ClipSegment]) -> f64 {
    segments.last().map(|s| s.timeline_end).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(path: &str, start: f64, end: Option<f64>) -> ClipSource {
        ClipSource {
            source_path: path.to_string(),
            source_start: start,
            source_end: end,
        }
    }

    #[test]
    fn empty_timeline_rejected() {
        assert_eq!(assemble(&[], &[], &[]), Err(TimelineError::EmptyTimeline));
    }

    #[test]
    fn segments_are_contiguous_without_transitions() {
        for n in 1..=5 {
            let clips: Vec<ClipSource> = (0..n)
                .map(|i| clip(&format!("c{i}.mp4"), 0.0, Some(4.0)))
                .collect();
            let segments = assemble(&clips, &[], &[]).unwrap();
            assert_eq!(segments.len(), n);
            for pair in segments.windows(2) {
                assert_eq!(pair[1].timeline_start, pair[0].timeline_end);
            }
            assert_eq!(total_duration(&segments), 4.0 * n as f64);
        }
    }

    #[test]
    fn trim_window_maps_to_timeline_window() {
        let segments = assemble(&[clip("a.mp4", 2.5, Some(7.5))], &[], &[]).unwrap();
        assert_eq!(segments[0].timeline_start, 0.0);
        assert_eq!(segments[0].timeline_end, 5.0);
        assert_eq!(
            segments[0].timeline_end - segments[0].timeline_start,
            segments[0].source_end.unwrap() - segments[0].source_start
        );
    }

    #[test]
    fn crossfade_overlaps_adjacent_segments() {
        let clips = vec![
            clip("a.mp4", 0.0, Some(10.0)),
            clip("b.mp4", 0.0, Some(10.0)),
            clip("c.mp4", 0.0, Some(10.0)),
        ];
        let transitions = vec![
            TransitionSpec {
                kind: TransitionKind::Crossfade,
                duration_seconds: 1.0,
                offset_seconds: 0.0,
            },
            TransitionSpec {
                kind: TransitionKind::Crossfade,
                duration_seconds: 1.0,
                offset_seconds: 0.0,
            },
        ];
        let segments = assemble(&clips, &transitions, &[]).unwrap();
        assert_eq!(segments[1].timeline_start, 9.0);
        assert_eq!(segments[2].timeline_start, 18.0);
        assert_eq!(total_duration(&segments), 28.0);
    }

    #[test]
    fn unbounded_clip_uses_probed_duration() {
        let segments = assemble(&[clip("a.mp4", 1.0, None)], &[], &[9.0]).unwrap();
        assert_eq!(segments[0].duration(), 8.0);
    }

    #[test]
    fn invalid_trim_rejected() {
        let err = assemble(&[clip("a.mp4", 5.0, Some(5.0))], &[], &[]).unwrap_err();
        assert!(matches!(err, TimelineError::InvalidTrim { .. }));
    }

    #[test]
    fn zero_duration_rejected() {
        let err = assemble(&[clip("a.mp4", 3.0, None)], &[], &[3.0]).unwrap_err();
        assert!(matches!(err, TimelineError::NegativeDuration { .. }));
    }
}
