use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "renderflow", version, about = "Composition-to-ffmpeg compiler")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override the ffmpeg binary
    #[arg(long = "ffmpeg-bin", default_value = "ffmpeg", global = true)]
    pub ffmpeg_bin: String,

    /// Override the ffprobe binary
    #[arg(long = "ffprobe-bin", default_value = "ffprobe", global = true)]
    pub ffprobe_bin: String,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print stream metadata for a media file
    Probe(ProbeArgs),
    /// Compile a composition and print the command without running it
    Plan(PlanArgs),
    /// Compile and execute a composition with live progress
    Run(RunArgs),
}

#[derive(Debug, Parser)]
pub struct ProbeArgs {
    #[arg(short = 'i', long = "input")]
    pub input: String,
}

#[derive(Debug, Parser)]
pub struct PlanArgs {
    /// Path to a composition JSON document
    #[arg(value_name = "COMPOSITION")]
    pub composition: std::path::PathBuf,
}

#[derive(Debug, Parser)]
pub struct RunArgs {
    #[arg(value_name = "COMPOSITION")]
    pub composition: std::path::PathBuf,

    /// Kill the render after this many seconds
    #[arg(long = "timeout")]
    pub timeout_seconds: Option<f64>,

    /// Extra output arguments appended verbatim, shell-style
    #[arg(long = "extra-args")]
    pub extra_args: Option<String>,
}

pub fn split_extra_args(text: &str) -> Result<Vec<String>, String> {
    shell_words::split(text).map_err(|err| err.to_string())
}
