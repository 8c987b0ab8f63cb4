use serde::{Deserialize, Serialize};

use crate::core::error::CommandError;

pub const PRESETS: [&str; 10] = [
    "ultrafast",
    "superfast",
    "veryfast",
    "faster",
    "fast",
    "medium",
    "slow",
    "slower",
    "veryslow",
    "placebo",
];

/// Quality control is either CRF or a target bitrate, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateControl {
    Crf(u32),
    BitrateKbps(u32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderSettings {
    pub codec: String,
    pub rate_control: RateControl,
    pub preset: String,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub tune: Option<String>,
    #[serde(default = "default_pixel_format")]
    pub pixel_format: String,
    #[serde(default = "default_keyframe_interval")]
    pub keyframe_interval: u32,
    #[serde(default)]
    pub b_frames: Option<u32>,
    #[serde(default)]
    pub ref_frames: Option<u32>,
}

fn default_pixel_format() -> String {
    "yuv420p".to_string()
}

fn default_keyframe_interval() -> u32 {
    250
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            codec: "libx264".to_string(),
            rate_control: RateControl::Crf(23),
            preset: "medium".to_string(),
            profile: None,
            tune: None,
            pixel_format: default_pixel_format(),
            keyframe_interval: default_keyframe_interval(),
            b_frames: None,
            ref_frames: None,
        }
    }
}

impl EncoderSettings {
    pub fn validate(&self) -> Result<(), CommandError> {
        if let RateControl::Crf(crf) = self.rate_control {
            if crf > 51 {
                return Err(CommandError::CrfOutOfRange(crf));
            }
        }
        Ok(())
    }

    pub fn crf(codec: &str, crf: u32) -> Result<Self, CommandError> {
        let settings = Self {
            codec: codec.to_string(),
            rate_control: RateControl::Crf(crf),
            ..Self::default()
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Output-side encoder arguments, in stable order.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec!["-c:v".to_string(), self.codec.clone()];
        match self.rate_control {
            RateControl::Crf(crf) => {
                args.push("-crf".to_string());
                args.push(crf.to_string());
            }
            RateControl::BitrateKbps(kbps) => {
                args.push("-b:v".to_string());
                args.push(format!("{kbps}k"));
            }
        }
        args.push("-preset".to_string());
        args.push(self.preset.clone());
        if let Some(profile) = &self.profile {
            args.push("-profile:v".to_string());
            args.push(profile.clone());
        }
        if let Some(tune) = &self.tune {
            args.push("-tune".to_string());
            args.push(tune.clone());
        }
        args.push("-pix_fmt".to_string());
        args.push(self.pixel_format.clone());
        args.push("-g".to_string());
        args.push(self.keyframe_interval.to_string());
        if let Some(b_frames) = self.b_frames {
            args.push("-bf".to_string());
            args.push(b_frames.to_string());
        }
        if let Some(ref_frames) = self.ref_frames {
            args.push("-refs".to_string());
            args.push(ref_frames.to_string());
        }
        args
    }
}

/// Named output resolutions the composition document may ask for instead of
/// explicit dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPreset {
    Hd1080,
    Hd720,
    Sd480,
    Vertical1080,
    Square1080,
}

impl ResolutionPreset {
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            ResolutionPreset::Hd1080 => (1920, 1080),
            ResolutionPreset::Hd720 => (1280, 720),
            ResolutionPreset::Sd480 => (854, 480),
            ResolutionPreset::Vertical1080 => (1080, 1920),
            ResolutionPreset::Square1080 => (1080, 1080),
        }
    }
}
