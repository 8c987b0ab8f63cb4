use std::process::{Command, Stdio};

use serde::Deserialize;
use tracing::debug;

use crate::core::error::ProbeError;
use crate::core::security::validate_path;

pub const DEFAULT_FFPROBE_BIN: &str = "ffprobe";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub index: usize,
    pub kind: StreamKind,
    pub codec_name: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<f64>,
    pub duration_seconds: Option<f64>,
    pub bit_rate: Option<u64>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaFileInfo {
    pub path: String,
    pub container_format: Option<String>,
    pub duration_seconds: Option<f64>,
    pub size_bytes: Option<u64>,
    pub bit_rate: Option<u64>,
    pub streams: Vec<StreamInfo>,
}

impl MediaFileInfo {
    pub fn has_video(&self) -> bool {
        self.streams.iter().any(|s| s.kind == StreamKind::Video)
    }

    pub fn has_audio(&self) -> bool {
        self.streams.iter().any(|s| s.kind == StreamKind::Audio)
    }

    pub fn primary_stream(&self, kind: StreamKind) -> Option<&StreamInfo> {
        self.streams.iter().find(|s| s.kind == kind)
    }
}

// ffprobe's JSON document, numbers-as-strings and all.
#[derive(Debug, Deserialize)]
struct FfprobeDocument {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    index: usize,
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
    bit_rate: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
}

/// `30000/1001` and plain `30` both appear in `r_frame_rate`.
fn parse_frame_rate(value: &str) -> Option<f64> {
    match value.split_once('/') {
        Some((numerator, denominator)) => {
            let numerator: f64 = numerator.trim().parse().ok()?;
            let denominator: f64 = denominator.trim().parse().ok()?;
            if denominator == 0.0 {
                return None;
            }
            Some(numerator / denominator)
        }
        None => value.trim().parse().ok(),
    }
}

pub fn parse_probe_output(path: &str, json: &[u8]) -> Result<MediaFileInfo, ProbeError> {
    let document: FfprobeDocument = serde_json::from_slice(json)?;

    let streams = document
        .streams
        .into_iter()
        .map(|stream| {
            let kind = match stream.codec_type.as_deref() {
                Some("video") => StreamKind::Video,
                Some("audio") => StreamKind::Audio,
                Some("subtitle") => StreamKind::Subtitle,
                _ => StreamKind::Other,
            };
            StreamInfo {
                index: stream.index,
                kind,
                codec_name: stream.codec_name,
                width: stream.width,
                height: stream.height,
                fps: stream.r_frame_rate.as_deref().and_then(parse_frame_rate),
                duration_seconds: stream.duration.as_deref().and_then(|d| d.parse().ok()),
                bit_rate: stream.bit_rate.as_deref().and_then(|b| b.parse().ok()),
                sample_rate: stream.sample_rate.as_deref().and_then(|s| s.parse().ok()),
                channels: stream.channels,
            }
        })
        .collect();

    let format = document.format;
    Ok(MediaFileInfo {
        path: path.to_string(),
        container_format: format.as_ref().and_then(|f| f.format_name.clone()),
        duration_seconds: format
            .as_ref()
            .and_then(|f| f.duration.as_deref())
            .and_then(|d| d.parse().ok()),
        size_bytes: format
            .as_ref()
            .and_then(|f| f.size.as_deref())
            .and_then(|s| s.parse().ok()),
        bit_rate: format
            .as_ref()
            .and_then(|f| f.bit_rate.as_deref())
            .and_then(|b| b.parse().ok()),
        streams,
    })
}

/// Runs ffprobe over one file and returns its typed stream metadata.
pub fn probe(ffprobe_bin: &str, path: &str) -> Result<MediaFileInfo, ProbeError> {
    validate_path(path, None)?;

    debug!(path, "probing input");
    let output = Command::new(ffprobe_bin)
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            path,
        ])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProbeError::BinaryNotFound
            } else {
                ProbeError::Io(e)
            }
        })?;

    if !output.status.success() {
        return Err(ProbeError::ProbeFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    parse_probe_output(path, &output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {
                "index": 0,
                "codec_name": "h264",
                "codec_type": "video",
                "width": 1920,
                "height": 1080,
                "r_frame_rate": "30000/1001",
                "duration": "10.427083",
                "bit_rate": "4200000"
            },
            {
                "index": 1,
                "codec_name": "aac",
                "codec_type": "audio",
                "r_frame_rate": "0/0",
                "sample_rate": "48000",
                "channels": 2,
                "duration": "10.432000"
            }
        ],
        "format": {
            "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
            "duration": "10.432000",
            "size": "5472183",
            "bit_rate": "4196321"
        }
    }"#;

    #[test]
    fn parses_streams_and_format() {
        let info = parse_probe_output("clip.mp4", SAMPLE.as_bytes()).unwrap();
        assert!(info.has_video());
        assert!(info.has_audio());
        assert_eq!(info.size_bytes, Some(5472183));
        assert_eq!(info.duration_seconds, Some(10.432));

        let video = info.primary_stream(StreamKind::Video).unwrap();
        assert_eq!(video.codec_name.as_deref(), Some("h264"));
        assert_eq!((video.width, video.height), (Some(1920), Some(1080)));
        assert!((video.fps.unwrap() - 29.97).abs() < 0.01);

        let audio = info.primary_stream(StreamKind::Audio).unwrap();
        assert_eq!(audio.sample_rate, Some(48000));
        assert_eq!(audio.channels, Some(2));
        assert_eq!(audio.fps, None);
    }

    #[test]
    fn frame_rate_forms() {
        assert_eq!(parse_frame_rate("30"), Some(30.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert!((parse_frame_rate("24000/1001").unwrap() - 23.976).abs() < 0.001);
    }

    #[test]
    fn audio_only_file() {
        let json = r#"{"streams":[{"index":0,"codec_type":"audio","codec_name":"mp3"}],"format":{"format_name":"mp3"}}"#;
        let info = parse_probe_output("song.mp3", json.as_bytes()).unwrap();
        assert!(!info.has_video());
        assert!(info.has_audio());
        assert_eq!(info.primary_stream(StreamKind::Video), None);
    }

    #[test]
    fn bad_json_is_an_error() {
        assert!(matches!(
            parse_probe_output("x.mp4", b"not json"),
            Err(ProbeError::BadJson(_))
        ));
    }

    #[test]
    fn unsafe_path_is_rejected_before_spawning() {
        assert!(matches!(
            probe(DEFAULT_FFPROBE_BIN, "a;rm.mp4"),
            Err(ProbeError::Security(_))
        ));
    }
}
