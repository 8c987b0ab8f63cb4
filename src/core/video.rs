use crate::core::error::GraphError;
use crate::core::graph::{FilterGraphBuilder, FilterStatement};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeDirection {
    In,
    Out,
}

impl FadeDirection {
    fn as_str(self) -> &'static str {
        match self {
            FadeDirection::In => "in",
            FadeDirection::Out => "out",
        }
    }
}

/// Result of chaining statements that ends in one labeled stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    pub statements: Vec<FilterStatement>,
    pub output: String,
}

impl FilterGraphBuilder {
    pub fn scale(&mut self, input: &str, width: u32, height: u32) -> Chain {
        let output = self.label("sc");
        let statement = FilterStatement::new("scale")
            .input(input)
            .param("w", width)
            .param("h", height)
            .param("force_original_aspect_ratio", "decrease")
            .output(&output);
        Chain {
            statements: vec![statement],
            output,
        }
    }

    pub fn pad(&mut self, input: &str, width: u32, height: u32) -> Chain {
        let output = self.label("pd");
        let statement = FilterStatement::new("pad")
            .input(input)
            .param("w", width)
            .param("h", height)
            .param("x", "(ow-iw)/2")
            .param("y", "(oh-ih)/2")
            .output(&output);
        Chain {
            statements: vec![statement],
            output,
        }
    }

    pub fn fps(&mut self, input: &str, fps: f64) -> Chain {
        let output = self.label("fr");
        let statement = FilterStatement::new("fps")
            .input(input)
            .param("fps", fps)
            .output(&output);
        Chain {
            statements: vec![statement],
            output,
        }
    }

    /// Trim to a source window; always followed by a timestamp reset so
    /// downstream timing starts at zero.
    pub fn trim(&mut self, input: &str, start: f64, end: Option<f64>) -> Chain {
        let trimmed = self.label("tr");
        let output = self.label("pts");
        let mut trim = FilterStatement::new("trim").input(input).param("start", start);
        if let Some(end) = end {
            trim = trim.param("end", end);
        }
        let trim = trim.output(&trimmed);
        let reset = FilterStatement::new("setpts")
            .input(&trimmed)
            .positional("PTS-STARTPTS")
            .output(&output);
        Chain {
            statements: vec![trim, reset],
            output,
        }
    }

    /// Fade-out start is `source_duration - duration`, clamped to zero when
    /// the clip is shorter than the fade.
    pub fn fade(
        &mut self,
        input: &str,
        direction: FadeDirection,
        source_duration: f64,
        duration: f64,
    ) -> Chain {
        let start = match direction {
            FadeDirection::In => 0.0,
            FadeDirection::Out => (source_duration - duration).max(0.0),
        };
        let output = self.label("fd");
        let statement = FilterStatement::new("fade")
            .input(input)
            .param("t", direction.as_str())
            .param("st", start)
            .param("d", duration)
            .output(&output);
        Chain {
            statements: vec![statement],
            output,
        }
    }

    /// Two-clip crossfade. `offset = first_duration - transition + extra`;
    /// a negative offset means the first clip is too short for the
    /// requested transition and is an error, never emitted.
    pub fn crossfade(
        &mut self,
        first: &str,
        second: &str,
        first_duration: f64,
        transition_duration: f64,
        extra_offset: f64,
        output: &str,
    ) -> Result<FilterStatement, GraphError> {
        let offset = first_duration - transition_duration + extra_offset;
        if offset < 0.0 {
            return Err(GraphError::InvalidTransition {
                clip: first_duration,
                transition: transition_duration,
            });
        }
        Ok(FilterStatement::new("xfade")
            .input(first)
            .input(second)
            .param("transition", "fade")
            .param("duration", transition_duration)
            .param("offset", format_seconds(offset))
            .output(output))
    }

    /// Chains pairwise crossfades left-to-right across N clips. Each
    /// intermediate output feeds the next statement's first input; the last
    /// statement gets the caller-supplied final label. Emits N-1 statements.
    pub fn multi_clip_crossfade(
        &mut self,
        clips: &[(String, f64)],
        transition_duration: f64,
        final_label: &str,
    ) -> Result<Vec<FilterStatement>, GraphError> {
        if clips.len() < 2 {
            return Err(GraphError::TooFewClips(clips.len()));
        }

        let mut statements = Vec::with_capacity(clips.len() - 1);
        let (mut current_label, mut current_duration) = clips[0].clone();

        for (i, (next_label, next_duration)) in clips.iter().enumerate().skip(1) {
            let output = if i == clips.len() - 1 {
                final_label.to_string()
            } else {
                self.label("xf")
            };
            let statement = self.crossfade(
                &current_label,
                next_label,
                current_duration,
                transition_duration,
                0.0,
                &output,
            )?;
            statements.push(statement);
            current_duration = current_duration + next_duration - transition_duration;
            current_label = output;
        }

        Ok(statements)
    }

    /// Hard-cut join of N segments. Audio inclusion is an explicit flag;
    /// when set, `pairs` must interleave as (video, audio) per segment.
    pub fn concat(
        &mut self,
        pairs: &[(String, Option<String>)],
        with_audio: bool,
        video_out: &str,
        audio_out: Option<&str>,
    ) -> Result<FilterStatement, GraphError> {
        if pairs.is_empty() {
            return Err(GraphError::EmptySegments);
        }
        let mut statement = FilterStatement::new("concat");
        for (video, audio) in pairs {
            statement = statement.input(video);
            if with_audio {
                if let Some(audio) = audio {
                    statement = statement.input(audio);
                }
            }
        }
        statement = statement
            .param("n", pairs.len())
            .param("v", 1)
            .param("a", if with_audio { 1 } else { 0 })
            .output(video_out);
        if with_audio {
            if let Some(audio_out) = audio_out {
                statement = statement.output(audio_out);
            }
        }
        Ok(statement)
    }
}

/// Seconds rendered with millisecond precision, trailing zeros trimmed the
/// way ffmpeg examples write offsets.
pub(crate) fn format_seconds(value: f64) -> String {
    let rendered = format!("{value:.3}");
    let trimmed = rendered.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trim_appends_timestamp_reset() {
        let mut builder = FilterGraphBuilder::new();
        let chain = builder.trim("0:v", 1.5, Some(6.5));
        assert_eq!(chain.statements.len(), 2);
        assert_eq!(
            chain.statements[0].serialize(),
            "[0:v]trim=start=1.5:end=6.5[tr0]"
        );
        assert_eq!(
            chain.statements[1].serialize(),
            "[tr0]setpts=PTS-STARTPTS[pts1]"
        );
        assert_eq!(chain.output, "pts1");
    }

    #[test]
    fn fade_out_start_is_clamped() {
        let mut builder = FilterGraphBuilder::new();
        let chain = builder.fade("v0", FadeDirection::Out, 1.0, 2.0);
        assert_eq!(chain.statements[0].serialize(), "[v0]fade=t=out:st=0:d=2[fd0]");
    }

    #[test]
    fn crossfade_offset_formula() {
        let mut builder = FilterGraphBuilder::new();
        let statement = builder
            .crossfade("a", "b", 10.0, 1.0, 0.0, "out")
            .unwrap();
        assert_eq!(
            statement.serialize(),
            "[a][b]xfade=transition=fade:duration=1:offset=9[out]"
        );
    }

    #[test]
    fn crossfade_rejects_negative_offset() {
        let mut builder = FilterGraphBuilder::new();
        let err = builder.crossfade("a", "b", 0.5, 1.0, 0.0, "out").unwrap_err();
        assert!(matches!(err, GraphError::InvalidTransition { .. }));
    }

    #[test]
    fn three_clips_two_crossfades() {
        let mut builder = FilterGraphBuilder::new();
        let clips = vec![
            ("v0".to_string(), 10.0),
            ("v1".to_string(), 10.0),
            ("v2".to_string(), 10.0),
        ];
        let statements = builder.multi_clip_crossfade(&clips, 1.0, "vfinal").unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].output_labels, vec!["xf0"]);
        assert_eq!(statements[1].input_labels, vec!["xf0", "v2"]);
        assert_eq!(statements[1].output_labels, vec!["vfinal"]);
        // Second offset is over the combined 19s intermediate: 19 - 1 = 18.
        assert!(statements[1].serialize().contains("offset=18"));
    }

    #[test]
    fn concat_with_audio_pairs() {
        let mut builder = FilterGraphBuilder::new();
        let pairs = vec![
            ("v0".to_string(), Some("a0".to_string())),
            ("v1".to_string(), Some("a1".to_string())),
        ];
        let statement = builder
            .concat(&pairs, true, "outv", Some("outa"))
            .unwrap();
        assert_eq!(
            statement.serialize(),
            "[v0][a0][v1][a1]concat=n=2:v=1:a=1[outv][outa]"
        );
    }

    #[test]
    fn concat_video_only() {
        let mut builder = FilterGraphBuilder::new();
        let pairs = vec![("v0".to_string(), None), ("v1".to_string(), None)];
        let statement = builder.concat(&pairs, false, "outv", None).unwrap();
        assert_eq!(statement.serialize(), "[v0][v1]concat=n=2:v=1:a=0[outv]");
    }

    #[test]
    fn format_seconds_trims_zeros() {
        assert_eq!(format_seconds(9.0), "9");
        assert_eq!(format_seconds(1.25), "1.25");
        assert_eq!(format_seconds(0.5), "0.5");
        assert_eq!(format_seconds(0.0), "0");
    }
}
