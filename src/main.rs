use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use renderflow::core::compose::{compile, Composition, RenderPlan};
use renderflow::core::probe;
use renderflow::core::progress::ProgressParser;
use renderflow::core::runner::{run, RenderEvent, RunOptions};

mod cli;

use cli::{Cli, Commands, PlanArgs, ProbeArgs, RunArgs};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match &cli.command {
        Commands::Probe(args) => cmd_probe(&cli, args),
        Commands::Plan(args) => cmd_plan(&cli, args),
        Commands::Run(args) => cmd_run(&cli, args),
    };

    if let Err(err) = result {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn cmd_probe(cli: &Cli, args: &ProbeArgs) -> anyhow::Result<()> {
    let info = probe::probe(&cli.ffprobe_bin, &args.input)?;
    println!("path     : {}", info.path);
    println!(
        "container: {}",
        info.container_format.as_deref().unwrap_or("unknown")
    );
    if let Some(duration) = info.duration_seconds {
        println!("duration : {duration:.3}s");
    }
    if let Some(size) = info.size_bytes {
        println!("size     : {size} bytes");
    }
    for stream in &info.streams {
        let codec = stream.codec_name.as_deref().unwrap_or("unknown");
        match (stream.width, stream.height) {
            (Some(w), Some(h)) => {
                let fps = stream.fps.map(|f| format!(" @ {f:.2}fps")).unwrap_or_default();
                println!("stream #{}: {codec} {w}x{h}{fps}", stream.index);
            }
            _ => {
                let rate = stream
                    .sample_rate
                    .map(|r| format!(" {r}Hz"))
                    .unwrap_or_default();
                println!("stream #{}: {codec}{rate}", stream.index);
            }
        }
    }
    Ok(())
}

fn load_plan(cli: &Cli, path: &std::path::Path) -> anyhow::Result<RenderPlan> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let composition = Composition::from_json(&text).context("parsing composition")?;
    let durations = probe_durations(cli, &composition)?;
    Ok(compile(&composition, &durations)?)
}

/// Clips without an end trim need their source's real duration; probe each
/// distinct source once.
fn probe_durations(cli: &Cli, composition: &Composition) -> anyhow::Result<Vec<f64>> {
    let mut durations = Vec::with_capacity(composition.clips.len());
    for clip in &composition.clips {
        if clip.source_end.is_some() {
            durations.push(0.0);
            continue;
        }
        let info = probe::probe(&cli.ffprobe_bin, &clip.source_path)
            .with_context(|| format!("probing {}", clip.source_path))?;
        durations.push(info.duration_seconds.unwrap_or(0.0));
    }
    Ok(durations)
}

fn cmd_plan(cli: &Cli, args: &PlanArgs) -> anyhow::Result<()> {
    let plan = load_plan(cli, &args.composition)?;
    let (command, manifest) = plan.build_command(&cli.ffmpeg_bin, &[])?;
    println!("{}", command.to_shell_string());
    match &plan {
        RenderPlan::FilterGraph { warnings, .. } => {
            for warning in warnings {
                eprintln!("warning: {warning}");
            }
        }
        RenderPlan::ConcatJoin { segments, .. } => {
            eprintln!("(concat join of {} segments)", segments.len());
        }
    }
    if let Some(manifest) = manifest {
        manifest.cleanup()?;
    }
    Ok(())
}

fn cmd_run(cli: &Cli, args: &RunArgs) -> anyhow::Result<()> {
    let plan = load_plan(cli, &args.composition)?;
    let total_duration = plan.total_duration();

    let extra = match &args.extra_args {
        Some(extra) => cli::split_extra_args(extra).map_err(|e| anyhow::anyhow!(e))?,
        None => Vec::new(),
    };
    let (command, manifest) = plan
        .build_command(&cli.ffmpeg_bin, &extra)
        .context("building command")?;

    let options = RunOptions {
        timeout: args.timeout_seconds.map(Duration::from_secs_f64),
        cancel: None,
    };
    let mut parser = ProgressParser::with_total_duration(total_duration);

    let job = run(&command, &options, &mut parser, |event| {
        if let RenderEvent::Progress(snapshot) = event {
            let percent = snapshot
                .percent
                .map(|p| format!("{p:5.1}%"))
                .unwrap_or_else(|| "  ?  ".to_string());
            let eta = snapshot
                .eta_seconds
                .map(|e| format!(" eta {e:.0}s"))
                .unwrap_or_default();
            eprint!(
                "\r{percent} frame={} speed={}x{eta}    ",
                snapshot.frame, snapshot.speed_multiplier
            );
        }
    });
    eprintln!();

    if let Some(manifest) = manifest {
        manifest.cleanup()?;
    }

    let job = job?;
    match job.elapsed_seconds() {
        Some(elapsed) => eprintln!("done in {elapsed:.1}s"),
        None => eprintln!("done"),
    }
    Ok(())
}
