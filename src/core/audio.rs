use serde::{Deserialize, Serialize};

use crate::core::error::GraphError;
use crate::core::graph::{FilterGraphBuilder, FilterStatement};
use crate::core::video::{format_seconds, Chain, FadeDirection};

pub const MAX_DUCK_RATIO: f64 = 20.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuckingSettings {
    /// Fraction to reduce the ducked signal to, 0..1.
    pub duck_amount: f64,
    pub threshold: f64,
    pub attack_seconds: f64,
    pub release_seconds: f64,
}

impl Default for DuckingSettings {
    fn default() -> Self {
        Self {
            duck_amount: 0.7,
            threshold: 0.05,
            attack_seconds: 0.02,
            release_seconds: 0.3,
        }
    }
}

/// Maps a human duck amount (fraction to reduce to) onto a compressor
/// ratio: `1/(1-duck)`, capped at 20 once duck reaches 1. The constants are
/// load-bearing for existing renders; do not re-derive.
pub fn duck_ratio(duck_amount: f64) -> f64 {
    if duck_amount >= 1.0 {
        return MAX_DUCK_RATIO;
    }
    let clamped = duck_amount.max(0.0);
    (1.0 / (1.0 - clamped)).min(MAX_DUCK_RATIO)
}

impl FilterGraphBuilder {
    /// Volume is clamped to [0, 2]; anything louder is an authoring mistake.
    pub fn audio_volume(&mut self, input: &str, volume: f64) -> Chain {
        let output = self.label("vol");
        let statement = FilterStatement::new("volume")
            .input(input)
            .param("volume", format_seconds(volume.clamp(0.0, 2.0)))
            .output(&output);
        Chain {
            statements: vec![statement],
            output,
        }
    }

    pub fn audio_fade(
        &mut self,
        input: &str,
        direction: FadeDirection,
        start: f64,
        duration: f64,
    ) -> Chain {
        let output = self.label("afd");
        let direction_name = match direction {
            FadeDirection::In => "in",
            FadeDirection::Out => "out",
        };
        let statement = FilterStatement::new("afade")
            .input(input)
            .param("t", direction_name)
            .param("st", format_seconds(start))
            .param("d", format_seconds(duration))
            .output(&output);
        Chain {
            statements: vec![statement],
            output,
        }
    }

    /// Audio counterpart of the video trim: window plus timestamp reset.
    pub fn audio_trim(&mut self, input: &str, start: f64, end: Option<f64>) -> Chain {
        let trimmed = self.label("atr");
        let output = self.label("apts");
        let mut trim = FilterStatement::new("atrim")
            .input(input)
            .param("start", format_seconds(start));
        if let Some(end) = end {
            trim = trim.param("end", format_seconds(end));
        }
        let trim = trim.output(&trimmed);
        let reset = FilterStatement::new("asetpts")
            .input(&trimmed)
            .positional("PTS-STARTPTS")
            .output(&output);
        Chain {
            statements: vec![trim, reset],
            output,
        }
    }

    /// adelay takes milliseconds and needs `all=1` to cover every channel.
    pub fn audio_delay(&mut self, input: &str, delay_seconds: f64) -> Chain {
        let output = self.label("dly");
        let millis = (delay_seconds * 1000.0).round() as u64;
        let statement = FilterStatement::new("adelay")
            .input(input)
            .param("delays", millis)
            .param("all", 1)
            .output(&output);
        Chain {
            statements: vec![statement],
            output,
        }
    }

    /// EBU R128 loudness normalization with broadcast-ish defaults.
    pub fn audio_normalize(&mut self, input: &str) -> Chain {
        let output = self.label("ln");
        let statement = FilterStatement::new("loudnorm")
            .input(input)
            .param("I", -16)
            .param("TP", "-1.5")
            .param("LRA", 11)
            .output(&output);
        Chain {
            statements: vec![statement],
            output,
        }
    }

    /// Mixes N tracks: one volume statement per track, then one amix over
    /// all volume outputs. A single track degenerates to its volume
    /// statement alone, no amix.
    pub fn audio_mix(
        &mut self,
        tracks: &[(String, f64)],
        output: &str,
    ) -> Result<(Vec<FilterStatement>, String), GraphError> {
        if tracks.is_empty() {
            return Err(GraphError::EmptyMix);
        }

        let mut statements = Vec::new();
        let mut mixed_inputs = Vec::with_capacity(tracks.len());
        for (label, volume) in tracks {
            let chain = self.audio_volume(label, *volume);
            mixed_inputs.push(chain.output.clone());
            statements.extend(chain.statements);
        }

        if tracks.len() == 1 {
            return Ok((statements, mixed_inputs.remove(0)));
        }

        let mut mix = FilterStatement::new("amix");
        for label in &mixed_inputs {
            mix = mix.input(label);
        }
        mix = mix
            .param("inputs", mixed_inputs.len())
            .param("duration", "longest")
            .param("normalize", 0)
            .output(output);
        statements.push(mix);
        Ok((statements, output.to_string()))
    }

    /// Sidechain ducking: lowers `ducked` whenever `trigger` carries signal.
    /// Attack and release arrive in seconds and feed the filter in
    /// milliseconds.
    pub fn audio_duck(
        &mut self,
        ducked: &str,
        trigger: &str,
        settings: &DuckingSettings,
    ) -> Chain {
        let output = self.label("dk");
        let statement = FilterStatement::new("sidechaincompress")
            .input(ducked)
            .input(trigger)
            .param("threshold", format_seconds(settings.threshold))
            .param("ratio", format_seconds(duck_ratio(settings.duck_amount)))
            .param("attack", format_seconds(settings.attack_seconds * 1000.0))
            .param("release", format_seconds(settings.release_seconds * 1000.0))
            .output(&output);
        Chain {
            statements: vec![statement],
            output,
        }
    }
}
