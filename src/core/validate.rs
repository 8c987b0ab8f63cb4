use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

/// Filters this crate's builders emit plus the ones operators commonly
/// splice in by hand. Anything outside the set is only a warning; ffmpeg
/// itself is the final authority.
pub const KNOWN_FILTERS: &[&str] = &[
    "scale",
    "pad",
    "crop",
    "trim",
    "atrim",
    "setpts",
    "asetpts",
    "fps",
    "fade",
    "afade",
    "xfade",
    "acrossfade",
    "concat",
    "overlay",
    "drawtext",
    "volume",
    "amix",
    "amerge",
    "adelay",
    "aresample",
    "loudnorm",
    "dynaudnorm",
    "sidechaincompress",
    "asplit",
    "split",
    "anull",
    "anullsrc",
    "null",
    "format",
    "setsar",
    "setdar",
];

/// Labels conventionally left unconsumed because they get `-map`ped.
const TERMINAL_LABELS: &[&str] = &["out", "outv", "outa", "final", "v", "a"];

static RE_FILTER_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-zA-Z_][a-zA-Z0-9_]*)").unwrap());
static RE_RAW_INPUT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(:[vas](:\d+)?)?$").unwrap());

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Best-effort static pass over a serialized filter graph, run before
/// dispatch. Errors are fatal to the caller; warnings are telemetry.
pub fn validate_filter_chain(graph_text: &str) -> ValidationResult {
    let mut result = ValidationResult {
        is_valid: true,
        errors: Vec::new(),
        warnings: Vec::new(),
    };

    let statements: Vec<&str> = graph_text
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if statements.is_empty() {
        result.errors.push("filter graph is empty".to_string());
        result.is_valid = false;
        return result;
    }

    let mut declared: HashSet<String> = HashSet::new();
    let mut consumed: HashSet<String> = HashSet::new();

    for (index, statement) in statements.iter().enumerate() {
        let (inputs, body, outputs) = split_statement(statement);

        if inputs.is_empty() && outputs.is_empty() {
            result.errors.push(format!(
                "statement {index} has no stream specifiers: {statement}"
            ));
            result.is_valid = false;
            continue;
        }

        match RE_FILTER_NAME.captures(body).and_then(|c| c.get(1)) {
            Some(name) => {
                let name = name.as_str();
                if !KNOWN_FILTERS.contains(&name) {
                    result
                        .warnings
                        .push(format!("statement {index} uses unknown filter {name:?}"));
                }
            }
            None => {
                result.errors.push(format!(
                    "statement {index} has no parseable filter name: {statement}"
                ));
                result.is_valid = false;
            }
        }

        for input in &inputs {
            consumed.insert(input.clone());
            if RE_RAW_INPUT.is_match(input) {
                continue;
            }
            if !declared.contains(input.as_str()) {
                result.errors.push(format!(
                    "statement {index} consumes undeclared stream [{input}]"
                ));
                result.is_valid = false;
            }
        }

        for output in &outputs {
            // Last write wins in ffmpeg; flag it but keep going.
            if !declared.insert(output.clone()) {
                result
                    .warnings
                    .push(format!("output label [{output}] is redeclared"));
            }
        }
    }

    for label in &declared {
        if !consumed.contains(label) && !TERMINAL_LABELS.contains(&label.as_str()) {
            result
                .warnings
                .push(format!("output label [{label}] is never consumed"));
        }
    }

    result
}

/// Splits one statement into leading input specifiers, the filter body, and
/// trailing output specifiers.
fn split_statement(statement: &str) -> (Vec<String>, &str, Vec<String>) {
    let mut inputs = Vec::new();
    let mut rest = statement;

    while rest.starts_with('[') {
        match rest.find(']') {
            Some(end) => {
                inputs.push(rest[1..end].to_string());
                rest = &rest[end + 1..];
            }
            None => break,
        }
    }

    let mut outputs = Vec::new();
    let mut body = rest;
    while body.ends_with(']') {
        match body.rfind('[') {
            Some(start) => {
                outputs.insert(0, body[start + 1..body.len() - 1].to_string());
                body = &body[..start];
            }
            None => break,
        }
    }

    (inputs, body, outputs)
}
