use std::fmt;

/// One labeled filter-graph statement: `[in0][in1]name=k=v:k2=v2[out]`.
///
/// Params keep insertion order; a param with an empty key serializes as a
/// bare positional value (`setpts=PTS-STARTPTS`).
#[derive(Debug, Clone, PartialEq)]
pub struct FilterStatement {
    pub input_labels: Vec<String>,
    pub filter_name: String,
    pub params: Vec<(String, String)>,
    pub output_labels: Vec<String>,
}

impl FilterStatement {
    pub fn new(filter_name: impl Into<String>) -> Self {
        Self {
            input_labels: Vec::new(),
            filter_name: filter_name.into(),
            params: Vec::new(),
            output_labels: Vec::new(),
        }
    }

    pub fn input(mut self, label: impl Into<String>) -> Self {
        self.input_labels.push(label.into());
        self
    }

    pub fn output(mut self, label: impl Into<String>) -> Self {
        self.output_labels.push(label.into());
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    pub fn positional(mut self, value: impl fmt::Display) -> Self {
        self.params.push((String::new(), value.to_string()));
        self
    }

    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for label in &self.input_labels {
            out.push('[');
            out.push_str(label);
            out.push(']');
        }
        out.push_str(&self.filter_name);
        if !self.params.is_empty() {
            out.push('=');
            let rendered: Vec<String> = self
                .params
                .iter()
                .map(|(key, value)| {
                    if key.is_empty() {
                        value.clone()
                    } else {
                        format!("{key}={value}")
                    }
                })
                .collect();
            out.push_str(&rendered.join(":"));
        }
        for label in &self.output_labels {
            out.push('[');
            out.push_str(label);
            out.push(']');
        }
        out
    }
}

/// Ordered filter-graph; later statements may reference earlier outputs,
/// never the reverse.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterGraph {
    pub statements: Vec<FilterStatement>,
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, statement: FilterStatement) {
        self.statements.push(statement);
    }

    pub fn extend(&mut self, statements: Vec<FilterStatement>) {
        self.statements.extend(statements);
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn serialize(&self) -> String {
        self.statements
            .iter()
            .map(FilterStatement::serialize)
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// Per-builder label counter. Instance state, never process-global, so
/// concurrent renders cannot collide on label names.
#[derive(Debug, Default)]
pub struct LabelAllocator {
    next: u32,
}

impl LabelAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self, prefix: &str) -> String {
        let label = format!("{prefix}{}", self.next);
        self.next += 1;
        label
    }
}

/// Builder for the effect statements of one graph instance. Holds the label
/// allocator; the video, audio, and overlay methods live in their own
/// modules. Fresh instance per render request.
#[derive(Debug, Default)]
pub struct FilterGraphBuilder {
    pub(crate) labels: LabelAllocator,
}

impl FilterGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn label(&mut self, prefix: &str) -> String {
        self.labels.next(prefix)
    }
}

/// Raw input stream reference: `index[:kind[:sub_index]]`.
pub fn input_label(index: usize, kind: Option<char>, sub_index: Option<usize>) -> String {
    match (kind, sub_index) {
        (Some(kind), Some(sub)) => format!("{index}:{kind}:{sub}"),
        (Some(kind), None) => format!("{index}:{kind}"),
        _ => index.to_string(),
    }
}

pub fn video_input(index: usize) -> String {
    input_label(index, Some('v'), None)
}

pub fn audio_input(index: usize) -> String {
    input_label(index, Some('a'), None)
}
