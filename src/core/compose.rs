use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::audio::DuckingSettings;
use crate::core::command::{Command, CommandBuilder};
use crate::core::concat::{build_join_args, ManifestFile, ManifestSegment};
use crate::core::encoder::{EncoderSettings, RateControl, ResolutionPreset};
use crate::core::error::{CommandError, RenderError};
use crate::core::graph::{
    audio_input, video_input, FilterGraph, FilterGraphBuilder, FilterStatement,
};
use crate::core::overlay::TextOverlay;
use crate::core::timeline::{
    self, ClipSegment, ClipSource, TransitionKind, TransitionSpec,
};
use crate::core::validate::validate_filter_chain;
use crate::core::video::FadeDirection;

pub const VIDEO_OUT_LABEL: &str = "outv";
pub const AUDIO_OUT_LABEL: &str = "outa";

/// One mixed audio track. `input_index` refers to the command's input list:
/// clips occupy indices `0..clips.len()`, entries of `audio_files` follow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTrack {
    pub input_index: usize,
    #[serde(default = "default_volume")]
    pub volume: f64,
    #[serde(default)]
    pub start_time: f64,
    #[serde(default)]
    pub end_time: Option<f64>,
    #[serde(default)]
    pub fade_in: f64,
    #[serde(default)]
    pub fade_out: f64,
    /// Index of the track (in this list) whose signal ducks this one.
    #[serde(default)]
    pub duck_against: Option<usize>,
    #[serde(default)]
    pub ducking: Option<DuckingSettings>,
}

fn default_volume() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    pub path: String,
    #[serde(default)]
    pub resolution: Option<ResolutionPreset>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub crf: Option<u32>,
    #[serde(default)]
    pub bitrate_kbps: Option<u32>,
    #[serde(default = "default_codec")]
    pub codec: String,
    #[serde(default = "default_preset")]
    pub preset: String,
    /// Ask for the zero-re-encode concat join when the composition allows.
    #[serde(default)]
    pub codec_copy: bool,
}

fn default_codec() -> String {
    "libx264".to_string()
}

fn default_preset() -> String {
    "medium".to_string()
}

impl OutputSettings {
    pub fn dimensions(&self) -> (u32, u32) {
        if let Some(preset) = self.resolution {
            return preset.dimensions();
        }
        match (self.width, self.height) {
            (Some(w), Some(h)) => (w, h),
            _ => (1920, 1080),
        }
    }

    pub fn encoder(&self) -> Result<EncoderSettings, CommandError> {
        let rate_control = match (self.crf, self.bitrate_kbps) {
            (Some(_), Some(_)) => return Err(CommandError::CrfAndBitrate),
            (None, Some(kbps)) => RateControl::BitrateKbps(kbps),
            (Some(crf), None) => RateControl::Crf(crf),
            (None, None) => RateControl::Crf(23),
        };
        let settings = EncoderSettings {
            codec: self.codec.clone(),
            rate_control,
            preset: self.preset.clone(),
            ..EncoderSettings::default()
        };
        settings.validate()?;
        Ok(settings)
    }
}

/// The external composition description: ordered clips, boundary-aligned
/// transitions, mixed audio tracks, text overlays, and output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    pub clips: Vec<ClipSource>,
    #[serde(default)]
    pub transitions: Vec<TransitionSpec>,
    #[serde(default)]
    pub audio_files: Vec<String>,
    #[serde(default)]
    pub audio_tracks: Vec<AudioTrack>,
    #[serde(default)]
    pub overlays: Vec<TextOverlay>,
    /// Carry the clips' own audio through a hard-cut join. Explicit, never
    /// inferred from the sources.
    #[serde(default)]
    pub clip_audio: bool,
    pub output: OutputSettings,
}

impl Composition {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    fn wants_crossfades(&self) -> bool {
        self.transitions
            .iter()
            .any(|t| t.kind == TransitionKind::Crossfade)
    }

    /// The sequential-join path applies only when nothing needs re-encoding.
    fn eligible_for_concat_join(&self) -> bool {
        self.output.codec_copy
            && self.transitions.iter().all(|t| t.kind == TransitionKind::Cut)
            && self.audio_tracks.is_empty()
            && self.overlays.is_empty()
    }
}

/// A compiled composition, ready for dispatch.
#[derive(Debug)]
pub enum RenderPlan {
    FilterGraph {
        command: Command,
        total_duration: f64,
        warnings: Vec<String>,
    },
    ConcatJoin {
        segments: Vec<ManifestSegment>,
        output_path: String,
        total_duration: f64,
    },
}

impl RenderPlan {
    pub fn total_duration(&self) -> f64 {
        match self {
            RenderPlan::FilterGraph { total_duration, .. } => *total_duration,
            RenderPlan::ConcatJoin { total_duration, .. } => *total_duration,
        }
    }

    /// Materializes the executable command for the given binary, appending
    /// `extra_output_args` through the builder so they are validated the
    /// same way every other argument was. The concat path writes its
    /// manifest to a scoped temp file; the caller must keep the handle
    /// alive until the process exits and should `cleanup()` it after.
    pub fn build_command(
        &self,
        program: &str,
        extra_output_args: &[String],
    ) -> Result<(Command, Option<ManifestFile>), RenderError> {
        match self {
            RenderPlan::FilterGraph { command, .. } => Ok((
                rebuild_for(command, program, extra_output_args)?,
                None,
            )),
            RenderPlan::ConcatJoin {
                segments,
                output_path,
                ..
            } => {
                let manifest = ManifestFile::create(segments)?;
                let manifest_path = manifest.path().display().to_string();
                let join_args = build_join_args(manifest.path(), output_path, false, true);

                let mut builder = CommandBuilder::new();
                builder.program(program);
                builder.global_option("-y", None)?;
                builder.add_input(
                    &manifest_path,
                    &[("-f", Some("concat")), ("-safe", Some("0"))],
                )?;
                builder.set_output(output_path, &[("-c", Some("copy"))])?;
                builder.output_args(extra_output_args)?;
                let command = builder.build()?;
                debug!(args = ?join_args, "concat join plan");
                Ok((command, Some(manifest)))
            }
        }
    }
}

/// Replays a compiled invocation through a fresh builder with the caller's
/// binary and extra output arguments. A built `Command` is never edited in
/// place; overrides go through the same validation as the original build.
fn rebuild_for(
    command: &Command,
    program: &str,
    extra_output_args: &[String],
) -> Result<Command, CommandError> {
    let mut builder = CommandBuilder::new();
    builder.program(program);
    for (flag, value) in &command.global_options {
        builder.global_option(flag, value.as_deref())?;
    }
    for input in &command.inputs {
        let options: Vec<(&str, Option<&str>)> = input
            .options
            .iter()
            .map(|(flag, value)| (flag.as_str(), value.as_deref()))
            .collect();
        builder.add_input(&input.path, &options)?;
    }
    if let Some(graph) = &command.filter_graph {
        builder.filter_graph(graph.clone());
    }
    for mapping in &command.mappings {
        builder.map(mapping);
    }
    let options: Vec<(&str, Option<&str>)> = command
        .output
        .options
        .iter()
        .map(|(flag, value)| (flag.as_str(), value.as_deref()))
        .collect();
    builder.set_output(&command.output.path, &options)?;
    builder.output_args(extra_output_args)?;
    Ok(builder.build()?)
}

/// Compiles a composition into a render plan. `source_durations[i]` is the
/// probed duration of clip `i`'s source, used when a clip has no end trim.
/// Every fatal error aborts before any command exists.
pub fn compile(
    composition: &Composition,
    source_durations: &[f64],
) -> Result<RenderPlan, RenderError> {
    let segments = timeline::assemble(
        &composition.clips,
        &composition.transitions,
        source_durations,
    )?;
    let total_duration = timeline::total_duration(&segments);

    if composition.eligible_for_concat_join() {
        debug!(segments = segments.len(), "compiling to concat join");
        return Ok(RenderPlan::ConcatJoin {
            segments: segments.iter().map(ManifestSegment::from_clip).collect(),
            output_path: composition.output.path.clone(),
            total_duration,
        });
    }

    let mut graph = FilterGraph::new();
    let mut builder = FilterGraphBuilder::new();
    let (width, height) = composition.output.dimensions();

    // Conform each clip: trim window first, then scale/pad (and fps when
    // requested) so crossfade inputs agree on geometry and timing.
    let mut clip_labels: Vec<(String, f64)> = Vec::with_capacity(segments.len());
    for (index, segment) in segments.iter().enumerate() {
        let mut label = video_input(index);
        if segment.has_trim() {
            let chain = builder.trim(&label, segment.source_start, segment.source_end);
            graph.extend(chain.statements);
            label = chain.output;
        }
        let chain = builder.scale(&label, width, height);
        graph.extend(chain.statements);
        label = chain.output;
        let chain = builder.pad(&label, width, height);
        graph.extend(chain.statements);
        label = chain.output;
        if let Some(fps) = composition.output.fps {
            let chain = builder.fps(&label, fps);
            graph.extend(chain.statements);
            label = chain.output;
        }
        clip_labels.push((label, segment.duration()));
    }

    let (video_label, clip_audio_label) = join_clips(
        &mut builder,
        &mut graph,
        composition,
        &segments,
        &clip_labels,
    )?;

    // Overlays stack on the joined video in declaration order.
    let mut video_label = video_label;
    for overlay in &composition.overlays {
        let chain = builder.text_overlay(&video_label, overlay, total_duration)?;
        graph.extend(chain.statements);
        video_label = chain.output;
    }
    if video_label != VIDEO_OUT_LABEL {
        rename_last_output(&mut graph, &video_label, VIDEO_OUT_LABEL);
    }

    let audio_label = build_audio(&mut builder, &mut graph, composition, clip_audio_label)?;

    let graph_text = graph.serialize();
    crate::core::security::validate_filter_expression(&graph_text, false)?;
    let validation = validate_filter_chain(&graph_text);
    for warning in &validation.warnings {
        warn!(%warning, "filter chain warning");
    }
    if !validation.is_valid {
        return Err(RenderError::GraphRejected(validation.errors.join("; ")));
    }

    let encoder = composition.output.encoder()?;

    let mut command = CommandBuilder::new();
    command.global_option("-y", None)?;
    for clip in &composition.clips {
        command.add_input(&clip.source_path, &[])?;
    }
    for audio_file in &composition.audio_files {
        command.add_input(audio_file, &[])?;
    }
    command.filter_graph(graph);
    command.map(VIDEO_OUT_LABEL);
    if audio_label.is_some() {
        command.map(AUDIO_OUT_LABEL);
    }
    command.set_output(&composition.output.path, &[])?;
    command.output_args(&encoder.to_args())?;
    if audio_label.is_some() {
        command.output_args(&[
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            "192k".to_string(),
        ])?;
    }

    Ok(RenderPlan::FilterGraph {
        command: command.build()?,
        total_duration,
        warnings: validation.warnings,
    })
}

/// Joins the conformed clips into one video stream, boundary by boundary:
/// xfade at crossfade boundaries, edge fades plus a butt join at fade
/// boundaries, a plain pairwise concat at cuts. When no boundary
/// crossfades, a single N-way concat is used instead and can carry the
/// clips' own audio. Returns the joined video label and, for that path
/// with `clip_audio` set, the joined clip-audio label.
fn join_clips(
    builder: &mut FilterGraphBuilder,
    graph: &mut FilterGraph,
    composition: &Composition,
    segments: &[ClipSegment],
    clip_labels: &[(String, f64)],
) -> Result<(String, Option<String>), RenderError> {
    if clip_labels.len() == 1 {
        let audio = if composition.clip_audio {
            Some(clip_segment_audio(builder, graph, 0, &segments[0]))
        } else {
            None
        };
        return Ok((clip_labels[0].0.clone(), audio));
    }

    if composition.wants_crossfades() {
        if composition.clip_audio {
            warn!("clip audio is not carried across crossfade joins; use audio_tracks");
        }
        let (mut current_label, mut current_duration) = clip_labels[0].clone();
        for (i, (next_label, next_duration)) in clip_labels.iter().enumerate().skip(1) {
            let transition = composition
                .transitions
                .get(i - 1)
                .cloned()
                .unwrap_or_else(TransitionSpec::cut);
            match transition.kind {
                TransitionKind::Crossfade => {
                    let duration = transition.overlap();
                    let output = builder.labels.next("xf");
                    let statement = builder.crossfade(
                        &current_label,
                        next_label,
                        current_duration,
                        duration,
                        transition.offset_seconds,
                        &output,
                    )?;
                    graph.push(statement);
                    current_duration = current_duration + *next_duration - duration;
                    current_label = output;
                }
                // A fade boundary keeps the clips disjoint in time: fade the
                // tail of the left side and the head of the right, then
                // butt-join. A cut is the same join without the fades.
                TransitionKind::Fade | TransitionKind::Cut => {
                    let mut left = current_label;
                    let mut right = next_label.clone();
                    if transition.kind == TransitionKind::Fade
                        && transition.duration_seconds > 0.0
                    {
                        let d = transition.duration_seconds;
                        let chain =
                            builder.fade(&left, FadeDirection::Out, current_duration, d);
                        graph.extend(chain.statements);
                        left = chain.output;
                        let chain =
                            builder.fade(&right, FadeDirection::In, *next_duration, d);
                        graph.extend(chain.statements);
                        right = chain.output;
                    }
                    let output = builder.labels.next("cat");
                    let pairs = vec![(left, None), (right, None)];
                    let statement = builder.concat(&pairs, false, &output, None)?;
                    graph.push(statement);
                    current_duration += *next_duration;
                    current_label = output;
                }
            }
        }
        return Ok((current_label, None));
    }

    // Boundary fades re-encode but keep the clips disjoint in time.
    let mut faded: Vec<(String, Option<String>)> = Vec::with_capacity(clip_labels.len());
    for (i, (label, duration)) in clip_labels.iter().enumerate() {
        let mut label = label.clone();
        let audio = composition
            .clip_audio
            .then(|| clip_segment_audio(builder, graph, i, &segments[i]));
        let fade_in = i
            .checked_sub(1)
            .and_then(|b| composition.transitions.get(b))
            .filter(|t| t.kind == TransitionKind::Fade)
            .map(|t| t.duration_seconds);
        let fade_out = composition
            .transitions
            .get(i)
            .filter(|t| t.kind == TransitionKind::Fade)
            .map(|t| t.duration_seconds);
        if let Some(d) = fade_in {
            let chain = builder.fade(&label, FadeDirection::In, *duration, d);
            graph.extend(chain.statements);
            label = chain.output;
        }
        if let Some(d) = fade_out {
            let chain = builder.fade(&label, FadeDirection::Out, *duration, d);
            graph.extend(chain.statements);
            label = chain.output;
        }
        faded.push((label, audio));
    }
    let joined = builder.labels.next("cat");
    if composition.clip_audio {
        let joined_audio = builder.labels.next("cata");
        let statement = builder.concat(&faded, true, &joined, Some(joined_audio.as_str()))?;
        graph.push(statement);
        Ok((joined, Some(joined_audio)))
    } else {
        let statement = builder.concat(&faded, false, &joined, None)?;
        graph.push(statement);
        Ok((joined, None))
    }
}

/// Conforms one clip's own audio to its trim window.
fn clip_segment_audio(
    builder: &mut FilterGraphBuilder,
    graph: &mut FilterGraph,
    index: usize,
    segment: &ClipSegment,
) -> String {
    let label = audio_input(index);
    if segment.has_trim() {
        let chain = builder.audio_trim(&label, segment.source_start, segment.source_end);
        graph.extend(chain.statements);
        chain.output
    } else {
        label
    }
}

/// Builds the mixed audio chain. Returns the final audio label when the
/// composition carries any audio at all, `None` otherwise. Joined clip
/// audio, when present, enters the mix as one more full-volume track.
fn build_audio(
    builder: &mut FilterGraphBuilder,
    graph: &mut FilterGraph,
    composition: &Composition,
    clip_audio_label: Option<String>,
) -> Result<Option<String>, RenderError> {
    if composition.audio_tracks.is_empty() {
        return match clip_audio_label {
            Some(label) => {
                if !rename_last_output(graph, &label, AUDIO_OUT_LABEL) {
                    // Raw input labels have no producing statement to rename.
                    graph.push(
                        FilterStatement::new("anull")
                            .input(&label)
                            .output(AUDIO_OUT_LABEL),
                    );
                }
                Ok(Some(AUDIO_OUT_LABEL.to_string()))
            }
            None => Ok(None),
        };
    }

    // Per-track prep: end bound, fades, and placement delay, before the
    // volume/mix pass. Fade math below is in track-local time, so the trim
    // comes first.
    let mut prepared: Vec<(String, f64)> = Vec::with_capacity(composition.audio_tracks.len());
    for track in &composition.audio_tracks {
        let mut label = audio_input(track.input_index);
        if let Some(end) = track.end_time {
            let bound = end - track.start_time;
            if bound > 0.0 {
                let chain = builder.audio_trim(&label, 0.0, Some(bound));
                graph.extend(chain.statements);
                label = chain.output;
            }
        }
        if track.fade_in > 0.0 {
            let chain = builder.audio_fade(&label, FadeDirection::In, 0.0, track.fade_in);
            graph.extend(chain.statements);
            label = chain.output;
        }
        if track.fade_out > 0.0 {
            if let Some(end) = track.end_time {
                let start = (end - track.start_time - track.fade_out).max(0.0);
                let chain = builder.audio_fade(&label, FadeDirection::Out, start, track.fade_out);
                graph.extend(chain.statements);
                label = chain.output;
            }
        }
        if track.start_time > 0.0 {
            let chain = builder.audio_delay(&label, track.start_time);
            graph.extend(chain.statements);
            label = chain.output;
        }
        prepared.push((label, track.volume));
    }

    // Appended last so `duck_against` indices keep pointing at tracks.
    if let Some(label) = clip_audio_label {
        prepared.push((label, 1.0));
    }

    // Sidechain ducking rewires a prepared track to be compressed by its
    // trigger's signal. The trigger stream still has to reach the mix, so
    // it gets split: one leg keeps feeding the mix, the other drives the
    // compressor's sidechain.
    for (index, track) in composition.audio_tracks.iter().enumerate() {
        if let Some(trigger) = track.duck_against {
            if trigger == index || trigger >= prepared.len() {
                continue;
            }
            let mix_leg = builder.labels.next("asp");
            let duck_leg = builder.labels.next("asp");
            graph.push(
                FilterStatement::new("asplit")
                    .input(&prepared[trigger].0)
                    .positional(2)
                    .output(&mix_leg)
                    .output(&duck_leg),
            );
            prepared[trigger].0 = mix_leg;

            let settings = track.ducking.clone().unwrap_or_default();
            let ducked_label = prepared[index].0.clone();
            let chain = builder.audio_duck(&ducked_label, &duck_leg, &settings);
            graph.extend(chain.statements);
            prepared[index].0 = chain.output;
        }
    }

    let (statements, mixed) = builder.audio_mix(&prepared, AUDIO_OUT_LABEL)?;
    graph.extend(statements);
    if mixed != AUDIO_OUT_LABEL {
        rename_last_output(graph, &mixed, AUDIO_OUT_LABEL);
        return Ok(Some(AUDIO_OUT_LABEL.to_string()));
    }
    Ok(Some(mixed))
}

/// Rewrites the statement that produced `from` so the graph's terminal
/// label matches what gets `-map`ped. Returns false when no statement
/// produced `from`, which happens for raw input labels.
fn rename_last_output(graph: &mut FilterGraph, from: &str, to: &str) -> bool {
    for statement in graph.statements.iter_mut().rev() {
        if let Some(position) = statement.output_labels.iter().position(|l| l == from) {
            statement.output_labels[position] = to.to_string();
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::timeline::TransitionKind;

    fn clip(path: &str, start: f64, end: f64) -> ClipSource {
        ClipSource {
            source_path: path.to_string(),
            source_start: start,
            source_end: Some(end),
        }
    }

    fn output(path: &str) -> OutputSettings {
        OutputSettings {
            path: path.to_string(),
            resolution: None,
            width: None,
            height: None,
            fps: None,
            crf: Some(20),
            bitrate_kbps: None,
            codec: default_codec(),
            preset: default_preset(),
            codec_copy: false,
        }
    }

    fn crossfade(duration: f64) -> TransitionSpec {
        TransitionSpec {
            kind: TransitionKind::Crossfade,
            duration_seconds: duration,
            offset_seconds: 0.0,
        }
    }

    #[test]
    fn three_clips_two_crossfades_compile() {
        let composition = Composition {
            clips: vec![
                clip("a.mp4", 0.0, 10.0),
                clip("b.mp4", 0.0, 10.0),
                clip("c.mp4", 0.0, 10.0),
            ],
            transitions: vec![crossfade(1.0), crossfade(1.0)],
            audio_files: vec![],
            audio_tracks: vec![],
            overlays: vec![],
            clip_audio: false,
            output: output("out.mp4"),
        };
        let plan = compile(&composition, &[]).unwrap();
        assert_eq!(plan.total_duration(), 28.0);

        let RenderPlan::FilterGraph { command, .. } = plan else {
            panic!("expected filter graph plan");
        };
        let graph_text = command.filter_graph.as_ref().unwrap().serialize();
        assert_eq!(graph_text.matches("xfade").count(), 2);
        assert!(graph_text.contains(&format!("[{VIDEO_OUT_LABEL}]")));
        assert!(command.to_args().contains(&format!("[{VIDEO_OUT_LABEL}]")));
    }

    #[test]
    fn fade_boundary_in_crossfade_composition_emits_fades() {
        let composition = Composition {
            clips: vec![
                clip("a.mp4", 0.0, 10.0),
                clip("b.mp4", 0.0, 10.0),
                clip("c.mp4", 0.0, 10.0),
            ],
            transitions: vec![
                crossfade(1.0),
                TransitionSpec {
                    kind: TransitionKind::Fade,
                    duration_seconds: 1.0,
                    offset_seconds: 0.0,
                },
            ],
            audio_files: vec![],
            audio_tracks: vec![],
            overlays: vec![],
            clip_audio: false,
            output: output("out.mp4"),
        };
        let plan = compile(&composition, &[]).unwrap();
        // 10 + 10 - 1 overlap, then a disjoint 10s clip.
        assert_eq!(plan.total_duration(), 29.0);

        let RenderPlan::FilterGraph { command, warnings, .. } = plan else {
            panic!("expected filter graph plan");
        };
        assert!(warnings.is_empty(), "{warnings:?}");
        let graph_text = command.filter_graph.as_ref().unwrap().serialize();
        assert_eq!(graph_text.matches("xfade").count(), 1);
        // Fade-out over the 19s joined stream, fade-in on the last clip.
        assert!(graph_text.contains("fade=t=out:st=18:d=1"), "{graph_text}");
        assert!(graph_text.contains("fade=t=in:st=0:d=1"), "{graph_text}");
        assert!(graph_text.contains("concat=n=2:v=1:a=0"));
    }

    #[test]
    fn cut_boundary_in_crossfade_composition_joins_without_xfade() {
        let composition = Composition {
            clips: vec![
                clip("a.mp4", 0.0, 5.0),
                clip("b.mp4", 0.0, 5.0),
                clip("c.mp4", 0.0, 5.0),
            ],
            transitions: vec![crossfade(1.0), TransitionSpec::cut()],
            audio_files: vec![],
            audio_tracks: vec![],
            overlays: vec![],
            clip_audio: false,
            output: output("out.mp4"),
        };
        let plan = compile(&composition, &[]).unwrap();
        assert_eq!(plan.total_duration(), 14.0);
        let RenderPlan::FilterGraph { command, .. } = plan else {
            panic!("expected filter graph plan");
        };
        let graph_text = command.filter_graph.as_ref().unwrap().serialize();
        assert_eq!(graph_text.matches("xfade").count(), 1);
        assert!(!graph_text.contains("duration=0"), "{graph_text}");
        assert!(!graph_text.contains("fade=t="), "{graph_text}");
        assert!(graph_text.contains("concat=n=2:v=1:a=0"));
    }

    #[test]
    fn audio_tracks_all_reach_the_mix() {
        let mut composition = Composition {
            clips: vec![clip("a.mp4", 0.0, 10.0)],
            transitions: vec![],
            audio_files: vec!["music.mp3".to_string()],
            audio_tracks: vec![
                AudioTrack {
                    input_index: 0,
                    volume: 1.0,
                    start_time: 0.0,
                    end_time: None,
                    fade_in: 0.0,
                    fade_out: 0.0,
                    duck_against: None,
                    ducking: None,
                },
                AudioTrack {
                    input_index: 1,
                    volume: 0.3,
                    start_time: 0.0,
                    end_time: None,
                    fade_in: 0.0,
                    fade_out: 0.0,
                    duck_against: Some(0),
                    ducking: None,
                },
            ],
            overlays: vec![],
            clip_audio: false,
            output: output("out.mp4"),
        };
        composition.output.crf = Some(23);

        let plan = compile(&composition, &[]).unwrap();
        let RenderPlan::FilterGraph { command, .. } = plan else {
            panic!("expected filter graph plan");
        };
        let graph_text = command.filter_graph.as_ref().unwrap().serialize();
        assert!(graph_text.contains("sidechaincompress"));
        let mix = command
            .filter_graph
            .as_ref()
            .unwrap()
            .statements
            .iter()
            .find(|s| s.filter_name == "amix")
            .expect("mix statement");
        // Two volume-adjusted inputs, one of them ducked, none omitted.
        assert_eq!(mix.input_labels.len(), 2);
        assert!(command.to_args().contains(&format!("[{AUDIO_OUT_LABEL}]")));
    }

    #[test]
    fn audio_track_end_time_bounds_the_track() {
        let composition = Composition {
            clips: vec![clip("a.mp4", 0.0, 10.0)],
            transitions: vec![],
            audio_files: vec!["music.mp3".to_string()],
            audio_tracks: vec![AudioTrack {
                input_index: 1,
                volume: 0.5,
                start_time: 2.0,
                end_time: Some(6.0),
                fade_in: 0.0,
                fade_out: 0.0,
                duck_against: None,
                ducking: None,
            }],
            overlays: vec![],
            clip_audio: false,
            output: output("out.mp4"),
        };
        let plan = compile(&composition, &[]).unwrap();
        let RenderPlan::FilterGraph { command, .. } = plan else {
            panic!("expected filter graph plan");
        };
        let graph_text = command.filter_graph.as_ref().unwrap().serialize();
        // Four timeline seconds of source, placed at t=2 by the delay.
        assert!(
            graph_text.contains("[1:a]atrim=start=0:end=4"),
            "{graph_text}"
        );
        assert!(graph_text.contains("adelay=delays=2000"), "{graph_text}");
        assert!(command.to_args().contains(&format!("[{AUDIO_OUT_LABEL}]")));
    }

    #[test]
    fn build_command_threads_program_and_extra_args() {
        let composition = Composition {
            clips: vec![clip("a.mp4", 0.0, 5.0)],
            transitions: vec![],
            audio_files: vec![],
            audio_tracks: vec![],
            overlays: vec![],
            clip_audio: false,
            output: output("out.mp4"),
        };
        let plan = compile(&composition, &[]).unwrap();
        let extra = vec!["-movflags".to_string(), "+faststart".to_string()];
        let (command, manifest) = plan
            .build_command("/opt/ffmpeg/bin/ffmpeg", &extra)
            .unwrap();
        assert!(manifest.is_none());
        assert_eq!(command.program, "/opt/ffmpeg/bin/ffmpeg");
        let args = command.to_args();
        let pos = args.iter().position(|a| a == "-movflags").unwrap();
        assert_eq!(args[pos + 1], "+faststart");
        assert_eq!(args.last().unwrap(), "out.mp4");

        // Extra arguments go through the same option validation as the rest.
        assert!(plan.build_command("ffmpeg", &["rm -rf".to_string()]).is_err());
    }

    #[test]
    fn clip_audio_rides_the_hard_cut_join() {
        let composition = Composition {
            clips: vec![clip("a.mp4", 0.0, 5.0), clip("b.mp4", 1.0, 6.0)],
            transitions: vec![],
            audio_files: vec![],
            audio_tracks: vec![],
            overlays: vec![],
            clip_audio: true,
            output: output("out.mp4"),
        };
        let plan = compile(&composition, &[]).unwrap();
        let RenderPlan::FilterGraph { command, warnings, .. } = plan else {
            panic!("expected filter graph plan");
        };
        assert!(warnings.is_empty(), "{warnings:?}");
        let graph_text = command.filter_graph.as_ref().unwrap().serialize();
        assert!(graph_text.contains("concat=n=2:v=1:a=1"));
        assert!(graph_text.contains("atrim"));
        let args = command.to_args();
        assert!(args.contains(&format!("[{AUDIO_OUT_LABEL}]")));
        assert!(args.contains(&"-c:a".to_string()));
    }

    #[test]
    fn codec_copy_without_effects_takes_concat_path() {
        let composition = Composition {
            clips: vec![clip("a.mp4", 0.0, 2.0), clip("a.mp4", 2.0, 4.0)],
            transitions: vec![],
            audio_files: vec![],
            audio_tracks: vec![],
            overlays: vec![],
            clip_audio: true,
            output: OutputSettings {
                codec_copy: true,
                ..output("joined.mp4")
            },
        };
        let plan = compile(&composition, &[]).unwrap();
        let RenderPlan::ConcatJoin { segments, .. } = plan else {
            panic!("expected concat plan");
        };
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].inpoint, Some(2.0));
    }

    #[test]
    fn crossfades_disable_the_concat_path() {
        let composition = Composition {
            clips: vec![clip("a.mp4", 0.0, 5.0), clip("b.mp4", 0.0, 5.0)],
            transitions: vec![crossfade(1.0)],
            audio_files: vec![],
            audio_tracks: vec![],
            overlays: vec![],
            clip_audio: false,
            output: OutputSettings {
                codec_copy: true,
                ..output("out.mp4")
            },
        };
        let plan = compile(&composition, &[]).unwrap();
        assert!(matches!(plan, RenderPlan::FilterGraph { .. }));
    }

    #[test]
    fn compiled_graph_passes_chain_validation() {
        let composition = Composition {
            clips: vec![clip("a.mp4", 1.0, 6.0), clip("b.mp4", 0.0, 5.0)],
            transitions: vec![crossfade(0.5)],
            audio_files: vec![],
            audio_tracks: vec![],
            overlays: vec![TextOverlay {
                text: "Title".to_string(),
                position: crate::core::overlay::OverlayPosition::BottomCenter,
                start_time: 0.5,
                end_time: Some(3.0),
                style: Default::default(),
                animation: crate::core::overlay::OverlayAnimation::Fade { fade_seconds: 0.5 },
            }],
            clip_audio: false,
            output: output("out.mp4"),
        };
        let plan = compile(&composition, &[]).unwrap();
        let RenderPlan::FilterGraph { command, warnings, .. } = plan else {
            panic!("expected filter graph plan");
        };
        assert!(warnings.is_empty(), "{warnings:?}");
        let result = validate_filter_chain(&command.filter_graph.as_ref().unwrap().serialize());
        assert!(result.is_valid, "{:?}", result.errors);
    }

    #[test]
    fn crf_and_bitrate_together_rejected() {
        let mut composition = Composition {
            clips: vec![clip("a.mp4", 0.0, 5.0)],
            transitions: vec![],
            audio_files: vec![],
            audio_tracks: vec![],
            overlays: vec![],
            clip_audio: false,
            output: output("out.mp4"),
        };
        composition.output.bitrate_kbps = Some(4000);
        let err = compile(&composition, &[]).unwrap_err();
        assert!(matches!(
            err,
            RenderError::Command(CommandError::CrfAndBitrate)
        ));
    }

    #[test]
    fn composition_parses_from_json() {
        let json = r#"{
            "clips": [
                {"source_path": "a.mp4", "source_start": 0.0, "source_end": 5.0},
                {"source_path": "b.mp4"}
            ],
            "transitions": [
                {"kind": "crossfade", "duration_seconds": 0.5}
            ],
            "output": {"path": "out.mp4", "resolution": "hd720", "crf": 21}
        }"#;
        let composition = Composition::from_json(json).unwrap();
        assert_eq!(composition.clips.len(), 2);
        assert_eq!(composition.output.dimensions(), (1280, 720));
        let plan = compile(&composition, &[0.0, 8.0]).unwrap();
        assert_eq!(plan.total_duration(), 12.5);
    }
}
