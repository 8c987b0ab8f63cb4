use std::collections::VecDeque;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::error::ProgressError;

const SPEED_WINDOW_SAMPLES: usize = 10;

static RE_FRAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"frame=\s*(\d+)").unwrap());
static RE_FPS: Lazy<Regex> = Lazy::new(|| Regex::new(r"fps=\s*([\d.]+)").unwrap());
static RE_BITRATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"bitrate=\s*([\d.]+)kbits/s").unwrap());
static RE_SIZE: Lazy<Regex> = Lazy::new(|| Regex::new(r"size=\s*(\d+)kB").unwrap());
static RE_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"time=\s*(\d{2}):(\d{2}):([\d.]+)").unwrap());
static RE_SPEED: Lazy<Regex> = Lazy::new(|| Regex::new(r"speed=\s*([\d.]+)x").unwrap());
static RE_DURATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Duration:\s*(\d{2}):(\d{2}):([\d.]+)").unwrap());

/// One parsed progress line. `percent` and `eta_seconds` are present only
/// once the total duration is known.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub frame: u64,
    pub fps: f64,
    pub bitrate_kbps: f64,
    pub total_size_bytes: u64,
    pub out_time_micros: u64,
    pub speed_multiplier: f64,
    pub percent: Option<f64>,
    pub eta_seconds: Option<f64>,
}

impl ProgressSnapshot {
    pub fn out_time_seconds(&self) -> f64 {
        self.out_time_micros as f64 / 1_000_000.0
    }
}

/// Extracts the one-time `Duration: HH:MM:SS.frac` announcement that
/// precedes progress lines. A zero duration is an anomaly and is skipped.
pub fn parse_duration_line(line: &str) -> Option<f64> {
    let captures = RE_DURATION.captures(line)?;
    let seconds = hms_to_seconds(
        captures.get(1)?.as_str(),
        captures.get(2)?.as_str(),
        captures.get(3)?.as_str(),
    )?;
    if seconds <= 0.0 {
        return None;
    }
    Some(seconds)
}

fn hms_to_seconds(hours: &str, minutes: &str, seconds: &str) -> Option<f64> {
    let hours: f64 = hours.parse().ok()?;
    let minutes: f64 = minutes.parse().ok()?;
    let seconds: f64 = seconds.parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Single-stage progress tracker for one external-process invocation.
/// Owned exclusively by its job; fresh instance per process.
#[derive(Debug, Default)]
pub struct ProgressParser {
    total_duration_seconds: Option<f64>,
    speed_window: VecDeque<f64>,
    last_percent: f64,
    last_snapshot: Option<ProgressSnapshot>,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_total_duration(total_seconds: f64) -> Self {
        Self {
            total_duration_seconds: (total_seconds > 0.0).then_some(total_seconds),
            ..Self::default()
        }
    }

    pub fn set_total_duration(&mut self, total_seconds: f64) {
        if total_seconds > 0.0 {
            self.total_duration_seconds = Some(total_seconds);
        }
    }

    pub fn total_duration(&self) -> Option<f64> {
        self.total_duration_seconds
    }

    pub fn last_percent(&self) -> f64 {
        self.last_percent
    }

    pub fn last_snapshot(&self) -> Option<&ProgressSnapshot> {
        self.last_snapshot.as_ref()
    }

    /// Parses one stderr line. Lines without a frame marker are ignored
    /// (but a `Duration:` announcement seeds the total). Each field is an
    /// independent match; any subset may be absent.
    pub fn parse_line(&mut self, line: &str) -> Option<ProgressSnapshot> {
        if !RE_FRAME.is_match(line) {
            if self.total_duration_seconds.is_none() {
                if let Some(total) = parse_duration_line(line) {
                    self.total_duration_seconds = Some(total);
                }
            }
            return None;
        }

        let frame = RE_FRAME
            .captures(line)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);
        let fps = capture_f64(&RE_FPS, line).unwrap_or(0.0);
        let bitrate_kbps = capture_f64(&RE_BITRATE, line).unwrap_or(0.0);
        let total_size_bytes = RE_SIZE
            .captures(line)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .map(|kb| kb * 1024)
            .unwrap_or(0);
        let out_time_micros = RE_TIME
            .captures(line)
            .and_then(|c| {
                hms_to_seconds(
                    c.get(1)?.as_str(),
                    c.get(2)?.as_str(),
                    c.get(3)?.as_str(),
                )
            })
            .map(|s| (s * 1_000_000.0) as u64)
            .unwrap_or(0);
        let speed_multiplier = capture_f64(&RE_SPEED, line).unwrap_or(0.0);

        if speed_multiplier > 0.0 {
            if self.speed_window.len() == SPEED_WINDOW_SAMPLES {
                self.speed_window.pop_front();
            }
            self.speed_window.push_back(speed_multiplier);
        }

        let elapsed = out_time_micros as f64 / 1_000_000.0;
        let percent = self.total_duration_seconds.map(|total| {
            let raw = (elapsed / total * 100.0).min(100.0);
            // Never decreases within one stage even if timestamps jitter.
            self.last_percent = self.last_percent.max(raw);
            self.last_percent
        });

        let eta_seconds = match (self.total_duration_seconds, self.average_speed()) {
            (Some(total), Some(speed)) if speed > 0.0 => {
                Some(((total - elapsed) / speed).max(0.0))
            }
            _ => None,
        };

        let snapshot = ProgressSnapshot {
            frame,
            fps,
            bitrate_kbps,
            total_size_bytes,
            out_time_micros,
            speed_multiplier,
            percent,
            eta_seconds,
        };
        self.last_snapshot = Some(snapshot.clone());
        Some(snapshot)
    }

    fn average_speed(&self) -> Option<f64> {
        if self.speed_window.is_empty() {
            return None;
        }
        Some(self.speed_window.iter().sum::<f64>() / self.speed_window.len() as f64)
    }
}

fn capture_f64(regex: &Regex, line: &str) -> Option<f64> {
    regex
        .captures(line)?
        .get(1)?
        .as_str()
        .parse::<f64>()
        .ok()
}

/// Fractional contribution of each pipeline stage to overall progress.
/// Weights must sum to 1.0 within a 0.01 tolerance.
#[derive(Debug, Clone, PartialEq)]
pub struct StageWeights {
    weights: Vec<(String, f64)>,
}

impl StageWeights {
    pub fn new(weights: Vec<(String, f64)>) -> Result<Self, ProgressError> {
        let sum: f64 = weights.iter().map(|(_, w)| w).sum();
        if !(0.99..=1.01).contains(&sum) {
            return Err(ProgressError::InvalidWeights { sum });
        }
        Ok(Self { weights })
    }

    pub fn stage_names(&self) -> impl Iterator<Item = &str> {
        self.weights.iter().map(|(name, _)| name.as_str())
    }

    pub fn weight_of(&self, stage: &str) -> Option<f64> {
        self.weights
            .iter()
            .find(|(name, _)| name == stage)
            .map(|(_, w)| *w)
    }
}

/// Combines several weighted pipeline stages into one overall figure. One
/// single-stage parser per declared stage; transitions happen only via
/// explicit `set_stage` calls.
#[derive(Debug)]
pub struct MultiStageProgress {
    stages: Vec<(String, ProgressParser)>,
    weights: StageWeights,
    current: Option<usize>,
}

impl MultiStageProgress {
    pub fn new(weights: StageWeights) -> Self {
        let stages = weights
            .stage_names()
            .map(|name| (name.to_string(), ProgressParser::new()))
            .collect();
        Self {
            stages,
            weights,
            current: None,
        }
    }

    pub fn set_stage(
        &mut self,
        name: &str,
        expected_duration_seconds: f64,
    ) -> Result<(), ProgressError> {
        let index = self
            .stages
            .iter()
            .position(|(stage, _)| stage == name)
            .ok_or_else(|| ProgressError::UnknownStage(name.to_string()))?;
        self.stages[index]
            .1
            .set_total_duration(expected_duration_seconds);
        self.current = Some(index);
        Ok(())
    }

    pub fn current_stage(&self) -> Option<&str> {
        self.current.map(|i| self.stages[i].0.as_str())
    }

    pub fn parse_line(&mut self, line: &str) -> Option<ProgressSnapshot> {
        let index = self.current?;
        self.stages[index].1.parse_line(line)
    }

    /// Weighted sum of each stage's last-known percent.
    pub fn overall_percent(&self) -> f64 {
        self.stages
            .iter()
            .map(|(name, parser)| {
                let weight = self.weights.weight_of(name).unwrap_or(0.0);
                weight * parser.last_percent()
            })
            .sum()
    }

    /// ETA for the current stage only, not the whole pipeline.
    pub fn current_stage_eta(&self) -> Option<f64> {
        let index = self.current?;
        self.stages[index]
            .1
            .last_snapshot()
            .and_then(|s| s.eta_seconds)
    }
}
