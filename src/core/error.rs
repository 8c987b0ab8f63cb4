use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SecurityError {
    #[error("path contains forbidden sequence {sequence:?}: {path}")]
    ForbiddenSequence { path: String, sequence: String },
    #[error("input contains shell metacharacter {found:?}")]
    ShellMetacharacter { found: char },
    #[error("input contains a null byte")]
    NullByte,
    #[error("input exceeds maximum length ({length} > {limit})")]
    TooLong { length: usize, limit: usize },
    #[error("path is empty")]
    EmptyPath,
    #[error("extension {extension:?} is not allowed")]
    ExtensionNotAllowed { extension: String },
    #[error("option flag must start with '-': {flag}")]
    BadOptionFlag { flag: String },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TimelineError {
    #[error("timeline has no clips")]
    EmptyTimeline,
    #[error("invalid trim for {path}: end {end} <= start {start}")]
    InvalidTrim { path: String, start: f64, end: f64 },
    #[error("clip {path} has non-positive duration after trim")]
    NegativeDuration { path: String },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GraphError {
    #[error("crossfade of {transition}s does not fit in a clip of {clip}s")]
    InvalidTransition { clip: f64, transition: f64 },
    #[error("crossfade chain needs at least 2 clips, got {0}")]
    TooFewClips(usize),
    #[error("concat needs at least 1 segment")]
    EmptySegments,
    #[error("audio mix needs at least 1 track")]
    EmptyMix,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CommandError {
    #[error("command has no inputs")]
    NoInputs,
    #[error("command has no output")]
    MissingOutput,
    #[error("crf {0} is out of range 0..=51")]
    CrfOutOfRange(u32),
    #[error("encoder settings specify both crf and bitrate")]
    CrfAndBitrate,
    #[error(transparent)]
    Security(#[from] SecurityError),
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("ffprobe binary not found in PATH")]
    BinaryNotFound,
    #[error("ffprobe failed (exit_code={exit_code:?}): {stderr}")]
    ProbeFailed {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("ffprobe output is not valid JSON: {0}")]
    BadJson(#[from] serde_json::Error),
    #[error(transparent)]
    Security(#[from] SecurityError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProgressError {
    #[error("stage weights sum to {sum:.3}, expected 1.0 +/- 0.01")]
    InvalidWeights { sum: f64 },
    #[error("unknown stage {0:?}")]
    UnknownStage(String),
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("ffmpeg binary not found in PATH")]
    BinaryNotFound,
    #[error("process failed (exit_code={exit_code:?}): {stderr}")]
    ProcessFailed {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("process cancelled")]
    Cancelled,
    #[error("process timed out after {0:.1}s")]
    TimedOut(f64),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ManifestError {
    #[error("manifest has no segments")]
    EmptyManifest,
    #[error("manifest line {line}: {message}")]
    BadLine { line: usize, message: String },
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Security(#[from] SecurityError),
    #[error(transparent)]
    Timeline(#[from] TimelineError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Run(#[from] RunError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("filter graph rejected: {0}")]
    GraphRejected(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
