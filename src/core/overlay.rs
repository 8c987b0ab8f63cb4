use serde::{Deserialize, Serialize};

use crate::core::error::SecurityError;
use crate::core::graph::{FilterGraphBuilder, FilterStatement};
use crate::core::security::sanitize_text;
use crate::core::video::{format_seconds, Chain};

pub const MAX_OVERLAY_TEXT_LEN: usize = 1024;
const EDGE_MARGIN: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayPosition {
    TopLeft,
    TopCenter,
    TopRight,
    CenterLeft,
    Center,
    CenterRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
    Custom { x: u32, y: u32 },
}

impl OverlayPosition {
    /// Resolves to drawtext x/y expressions in terms of frame and text
    /// dimensions (`w`, `h`, `text_w`, `text_h`).
    pub fn expressions(self) -> (String, String) {
        let m = EDGE_MARGIN;
        let (x, y) = match self {
            OverlayPosition::TopLeft => (format!("{m}"), format!("{m}")),
            OverlayPosition::TopCenter => ("(w-text_w)/2".to_string(), format!("{m}")),
            OverlayPosition::TopRight => (format!("w-text_w-{m}"), format!("{m}")),
            OverlayPosition::CenterLeft => (format!("{m}"), "(h-text_h)/2".to_string()),
            OverlayPosition::Center => ("(w-text_w)/2".to_string(), "(h-text_h)/2".to_string()),
            OverlayPosition::CenterRight => {
                (format!("w-text_w-{m}"), "(h-text_h)/2".to_string())
            }
            OverlayPosition::BottomLeft => (format!("{m}"), format!("h-text_h-{m}")),
            OverlayPosition::BottomCenter => {
                ("(w-text_w)/2".to_string(), format!("h-text_h-{m}"))
            }
            OverlayPosition::BottomRight => {
                (format!("w-text_w-{m}"), format!("h-text_h-{m}"))
            }
            OverlayPosition::Custom { x, y } => (x.to_string(), y.to_string()),
        };
        (x, y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlideDirection {
    Left,
    Right,
    Top,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum OverlayAnimation {
    None,
    Fade { fade_seconds: f64 },
    Slide { from: SlideDirection, slide_seconds: f64 },
}

impl Default for OverlayAnimation {
    fn default() -> Self {
        OverlayAnimation::None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    #[serde(default = "default_font_color")]
    pub font_color: String,
    #[serde(default)]
    pub font_file: Option<String>,
    #[serde(default)]
    pub boxed: bool,
    #[serde(default = "default_box_color")]
    pub box_color: String,
}

fn default_font_size() -> u32 {
    48
}

fn default_font_color() -> String {
    "white".to_string()
}

fn default_box_color() -> String {
    "black@0.5".to_string()
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: default_font_size(),
            font_color: default_font_color(),
            font_file: None,
            boxed: false,
            box_color: default_box_color(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextOverlay {
    pub text: String,
    pub position: OverlayPosition,
    #[serde(default)]
    pub start_time: f64,
    #[serde(default)]
    pub end_time: Option<f64>,
    #[serde(default)]
    pub style: TextStyle,
    #[serde(default)]
    pub animation: OverlayAnimation,
}

/// drawtext treats backslash, quote, colon and percent specially; user text
/// gets each of them escaped, and raw newlines become escaped newlines.
pub fn escape_drawtext(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            ':' => out.push_str("\\:"),
            '%' => out.push_str("\\%"),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}

impl FilterGraphBuilder {
    pub fn text_overlay(
        &mut self,
        input: &str,
        overlay: &TextOverlay,
        total_duration: f64,
    ) -> Result<Chain, SecurityError> {
        let sanitized = sanitize_text(&overlay.text, MAX_OVERLAY_TEXT_LEN)?;
        let text = escape_drawtext(&sanitized);

        let start = overlay.start_time;
        let end = overlay.end_time.unwrap_or(total_duration);
        let (base_x, base_y) = overlay.position.expressions();

        let mut statement = FilterStatement::new("drawtext")
            .input(input)
            .param("text", format!("'{text}'"))
            .param("fontsize", overlay.style.font_size)
            .param("fontcolor", &overlay.style.font_color);

        if let Some(font_file) = &overlay.style.font_file {
            statement = statement.param("fontfile", font_file);
        }
        if overlay.style.boxed {
            statement = statement
                .param("box", 1)
                .param("boxcolor", &overlay.style.box_color)
                .param("boxborderw", 8);
        }

        match overlay.animation {
            OverlayAnimation::None => {
                statement = statement.param("x", base_x).param("y", base_y);
            }
            OverlayAnimation::Fade { fade_seconds } => {
                statement = statement
                    .param("x", base_x)
                    .param("y", base_y)
                    .param("alpha", fade_alpha_expression(start, end, fade_seconds));
            }
            OverlayAnimation::Slide { from, slide_seconds } => {
                let (x, y) =
                    slide_expressions(from, &base_x, &base_y, start, slide_seconds);
                statement = statement.param("x", x).param("y", y);
            }
        }

        statement = statement.param(
            "enable",
            format!(
                "'between(t,{},{})'",
                format_seconds(start),
                format_seconds(end)
            ),
        );

        let output = self.label("txt");
        statement = statement.output(&output);
        Ok(Chain {
            statements: vec![statement],
            output,
        })
    }
}

/// Time-windowed alpha: ramp up over the first `fade` seconds after start,
/// hold at 1, ramp down over the last `fade` seconds before end.
fn fade_alpha_expression(start: f64, end: f64, fade: f64) -> String {
    let s = format_seconds(start);
    let e = format_seconds(end);
    let f = format_seconds(fade.max(0.001));
    format!(
        "'if(lt(t,{s}),0,if(lt(t,{s}+{f}),(t-{s})/{f},if(lt(t,{e}-{f}),1,if(lt(t,{e}),({e}-t)/{f},0))))'"
    )
}

/// Position expressions that move the text from offscreen to its resting
/// spot over `slide` seconds starting at `start`.
fn slide_expressions(
    from: SlideDirection,
    base_x: &str,
    base_y: &str,
    start: f64,
    slide: f64,
) -> (String, String) {
    let s = format_seconds(start);
    let d = format_seconds(slide.max(0.001));
    let progress = format!("min((t-{s})/{d},1)");
    match from {
        SlideDirection::Left => (
            format!("'-text_w+({base_x}+text_w)*{progress}'"),
            base_y.to_string(),
        ),
        SlideDirection::Right => (
            format!("'w-(w-({base_x}))*{progress}'"),
            base_y.to_string(),
        ),
        SlideDirection::Top => (
            base_x.to_string(),
            format!("'-text_h+({base_y}+text_h)*{progress}'"),
        ),
        SlideDirection::Bottom => (
            base_x.to_string(),
            format!("'h-(h-({base_y}))*{progress}'"),
        ),
    }
}
