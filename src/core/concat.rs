use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::core::error::ManifestError;
use crate::core::timeline::ClipSegment;

/// One entry of a concat-demuxer manifest. Trim points are kept only when
/// non-default so untrimmed segments round-trip to bare `file` lines.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestSegment {
    pub source_path: String,
    pub inpoint: Option<f64>,
    pub outpoint: Option<f64>,
}

impl ManifestSegment {
    pub fn plain(source_path: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            inpoint: None,
            outpoint: None,
        }
    }

    pub fn from_clip(segment: &ClipSegment) -> Self {
        Self {
            source_path: segment.source_path.clone(),
            inpoint: (segment.source_start > 0.0).then_some(segment.source_start),
            outpoint: segment.source_end,
        }
    }
}

/// Renders the manifest text: one `file '<path>'` line per segment, then
/// `inpoint` / `outpoint` / `duration` lines in that order when set.
pub fn generate_manifest(segments: &[ManifestSegment]) -> Result<String, ManifestError> {
    if segments.is_empty() {
        return Err(ManifestError::EmptyManifest);
    }

    let mut out = String::new();
    for segment in segments {
        out.push_str(&format!("file '{}'\n", quote_manifest_path(&segment.source_path)));
        if let Some(inpoint) = segment.inpoint {
            out.push_str(&format!("inpoint {inpoint}\n"));
        }
        if let Some(outpoint) = segment.outpoint {
            out.push_str(&format!("outpoint {outpoint}\n"));
        }
        if let (Some(inpoint), Some(outpoint)) = (segment.inpoint, segment.outpoint) {
            out.push_str(&format!("duration {}\n", outpoint - inpoint));
        } else if let Some(outpoint) = segment.outpoint {
            out.push_str(&format!("duration {outpoint}\n"));
        }
    }
    Ok(out)
}

/// Parses manifest text back into segments; `duration` lines are derived
/// data and are checked but not stored.
pub fn load_manifest(text: &str) -> Result<Vec<ManifestSegment>, ManifestError> {
    let mut segments: Vec<ManifestSegment> = Vec::new();

    for (number, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(rest) = line.strip_prefix("file ") {
            let raw = rest.trim();
            // Exactly one pair of surrounding quotes; anything inside is
            // part of the path and unescapes after.
            let unquoted = match raw.strip_prefix('\'') {
                Some(inner) => inner.strip_suffix('\'').ok_or_else(|| ManifestError::BadLine {
                    line: number + 1,
                    message: "unterminated quoted path".to_string(),
                })?,
                None => raw,
            };
            segments.push(ManifestSegment::plain(unquoted.replace("'\\''", "'")));
            continue;
        }

        let current = segments.last_mut().ok_or_else(|| ManifestError::BadLine {
            line: number + 1,
            message: "directive before any file line".to_string(),
        })?;

        if let Some(value) = line.strip_prefix("inpoint ") {
            current.inpoint = Some(parse_seconds(value, number + 1)?);
        } else if let Some(value) = line.strip_prefix("outpoint ") {
            current.outpoint = Some(parse_seconds(value, number + 1)?);
        } else if let Some(value) = line.strip_prefix("duration ") {
            parse_seconds(value, number + 1)?;
        } else {
            return Err(ManifestError::BadLine {
                line: number + 1,
                message: format!("unrecognized directive: {line}"),
            });
        }
    }

    if segments.is_empty() {
        return Err(ManifestError::EmptyManifest);
    }
    Ok(segments)
}

fn parse_seconds(value: &str, line: usize) -> Result<f64, ManifestError> {
    value.trim().parse::<f64>().map_err(|_| ManifestError::BadLine {
        line,
        message: format!("not a number: {value}"),
    })
}

// The concat demuxer quotes with single quotes; an embedded quote closes,
// escapes, and reopens.
fn quote_manifest_path(path: &str) -> String {
    path.replace('\'', "'\\''")
}

/// Scoped manifest artifact. `cleanup()` is the primary release path;
/// dropping the handle removes the file as a fallback.
#[derive(Debug)]
pub struct ManifestFile {
    file: Option<NamedTempFile>,
    path: PathBuf,
}

impl ManifestFile {
    pub fn create(segments: &[ManifestSegment]) -> Result<Self, std::io::Error> {
        let text = generate_manifest(segments)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;
        let mut file = NamedTempFile::with_suffix(".txt")?;
        file.write_all(text.as_bytes())?;
        file.flush()?;
        let path = file.path().to_path_buf();
        debug!(path = %path.display(), segments = segments.len(), "wrote concat manifest");
        Ok(Self {
            file: Some(file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cleanup(mut self) -> Result<(), std::io::Error> {
        if let Some(file) = self.file.take() {
            file.close()?;
        }
        Ok(())
    }
}

/// Argument fragment for the zero-re-encode join. `safe_mode` must be false
/// when the manifest lists non-absolute paths.
pub fn build_join_args(
    manifest_path: &Path,
    output_path: &str,
    safe_mode: bool,
    codec_copy: bool,
) -> Vec<String> {
    let mut args = vec![
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        if safe_mode { "1" } else { "0" }.to_string(),
        "-i".to_string(),
        manifest_path.display().to_string(),
    ];
    if codec_copy {
        args.push("-c".to_string());
        args.push("copy".to_string());
    }
    args.push(output_path.to_string());
    args
}
