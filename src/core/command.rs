use crate::core::error::CommandError;
use crate::core::graph::FilterGraph;
use crate::core::security::{validate_command_length, validate_option, validate_path};

/// One registered input file. The index is assigned by insertion order and
/// never changes; it is the only way filter statements reference the input.
#[derive(Debug, Clone, PartialEq)]
pub struct InputSpec {
    pub path: String,
    pub index: usize,
    pub options: Vec<(String, Option<String>)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputSpec {
    pub path: String,
    pub options: Vec<(String, Option<String>)>,
}

/// An immutable, fully assembled invocation. Exposes the raw argv form
/// (preferred, no shell involved) and a shell-quoted string form.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub program: String,
    pub global_options: Vec<(String, Option<String>)>,
    pub inputs: Vec<InputSpec>,
    pub filter_graph: Option<FilterGraph>,
    pub mappings: Vec<String>,
    pub output: OutputSpec,
}

impl Command {
    /// Raw argument list, paths passed through untouched: process-spawn
    /// APIs take argv directly, so escaping here would double-escape.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        for (flag, value) in &self.global_options {
            args.push(flag.clone());
            if let Some(value) = value {
                args.push(value.clone());
            }
        }

        for input in &self.inputs {
            for (flag, value) in &input.options {
                args.push(flag.clone());
                if let Some(value) = value {
                    args.push(value.clone());
                }
            }
            args.push("-i".to_string());
            args.push(input.path.clone());
        }

        if let Some(graph) = &self.filter_graph {
            if !graph.is_empty() {
                args.push("-filter_complex".to_string());
                args.push(graph.serialize());
            }
        }

        for mapping in &self.mappings {
            args.push("-map".to_string());
            args.push(format!("[{mapping}]"));
        }

        for (flag, value) in &self.output.options {
            args.push(flag.clone());
            if let Some(value) = value {
                args.push(value.clone());
            }
        }
        args.push(self.output.path.clone());

        args
    }

    /// Shell-quoted single-string form, each argument individually quoted.
    pub fn to_shell_string(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.to_args());
        shell_words::join(parts.iter().map(String::as_str))
    }
}

/// Accumulates one invocation. Fresh builder per render request; inputs can
/// only be added, never removed, so indices stay stable.
#[derive(Debug, Default)]
pub struct CommandBuilder {
    program: Option<String>,
    global_options: Vec<(String, Option<String>)>,
    inputs: Vec<InputSpec>,
    filter_graph: Option<FilterGraph>,
    mappings: Vec<String>,
    output: Option<OutputSpec>,
}

impl CommandBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn program(&mut self, program: &str) -> &mut Self {
        self.program = Some(program.to_string());
        self
    }

    pub fn global_option(
        &mut self,
        flag: &str,
        value: Option<&str>,
    ) -> Result<&mut Self, CommandError> {
        validate_option(flag, value)?;
        self.global_options
            .push((flag.to_string(), value.map(str::to_string)));
        Ok(self)
    }

    /// Registers an input and returns its assigned index (0-based,
    /// monotonic).
    pub fn add_input(
        &mut self,
        path: &str,
        options: &[(&str, Option<&str>)],
    ) -> Result<usize, CommandError> {
        validate_path(path, None)?;
        let mut validated = Vec::with_capacity(options.len());
        for (flag, value) in options {
            validate_option(flag, *value)?;
            validated.push((flag.to_string(), value.map(str::to_string)));
        }
        let index = self.inputs.len();
        self.inputs.push(InputSpec {
            path: path.to_string(),
            index,
            options: validated,
        });
        Ok(index)
    }

    pub fn filter_graph(&mut self, graph: FilterGraph) -> &mut Self {
        self.filter_graph = Some(graph);
        self
    }

    /// Maps a labeled graph output into the container.
    pub fn map(&mut self, label: &str) -> &mut Self {
        self.mappings.push(label.to_string());
        self
    }

    pub fn set_output(
        &mut self,
        path: &str,
        options: &[(&str, Option<&str>)],
    ) -> Result<&mut Self, CommandError> {
        validate_path(path, None)?;
        let mut validated = Vec::with_capacity(options.len());
        for (flag, value) in options {
            validate_option(flag, *value)?;
            validated.push((flag.to_string(), value.map(str::to_string)));
        }
        self.output = Some(OutputSpec {
            path: path.to_string(),
            options: validated,
        });
        Ok(self)
    }

    pub fn output_args(&mut self, args: &[String]) -> Result<&mut Self, CommandError> {
        let output = self.output.as_mut().ok_or(CommandError::MissingOutput)?;
        let mut i = 0;
        while i < args.len() {
            let flag = &args[i];
            let value = args.get(i + 1).filter(|a| !a.starts_with('-'));
            validate_option(flag, value.map(String::as_str))?;
            output.options.push((flag.clone(), value.cloned()));
            i += if value.is_some() { 2 } else { 1 };
        }
        Ok(self)
    }

    pub fn build(&self) -> Result<Command, CommandError> {
        if self.inputs.is_empty() {
            return Err(CommandError::NoInputs);
        }
        let output = self.output.clone().ok_or(CommandError::MissingOutput)?;
        let command = Command {
            program: self.program.clone().unwrap_or_else(|| "ffmpeg".to_string()),
            global_options: self.global_options.clone(),
            inputs: self.inputs.clone(),
            filter_graph: self.filter_graph.clone(),
            mappings: self.mappings.clone(),
            output,
        };
        validate_command_length(&command.to_shell_string())?;
        Ok(command)
    }

    pub fn build_args(&self) -> Result<Vec<String>, CommandError> {
        Ok(self.build()?.to_args())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::{FilterGraph, FilterStatement};

    #[test]
    fn input_indices_are_monotonic() {
        let mut builder = CommandBuilder::new();
        assert_eq!(builder.add_input("a.mp4", &[]).unwrap(), 0);
        assert_eq!(builder.add_input("b.mp4", &[]).unwrap(), 1);
        assert_eq!(builder.add_input("c.mp4", &[]).unwrap(), 2);
    }

    #[test]
    fn build_requires_inputs_and_output() {
        let mut builder = CommandBuilder::new();
        assert!(matches!(builder.build(), Err(CommandError::NoInputs)));
        builder.add_input("a.mp4", &[]).unwrap();
        assert!(matches!(builder.build(), Err(CommandError::MissingOutput)));
        builder.set_output("out.mp4", &[]).unwrap();
        assert!(builder.build().is_ok());
    }

    #[test]
    fn args_order_inputs_graph_output() {
        let mut builder = CommandBuilder::new();
        builder.global_option("-y", None).unwrap();
        builder
            .add_input("a.mp4", &[("-ss", Some("1.5"))])
            .unwrap();
        let mut graph = FilterGraph::new();
        graph.push(
            FilterStatement::new("scale")
                .input("0:v")
                .param("w", 1280)
                .param("h", 720)
                .output("outv"),
        );
        builder.filter_graph(graph);
        builder.map("outv");
        builder
            .set_output("out.mp4", &[("-c:v", Some("libx264"))])
            .unwrap();
        let args = builder.build_args().unwrap();
        assert_eq!(
            args,
            vec![
                "-y",
                "-ss",
                "1.5",
                "-i",
                "a.mp4",
                "-filter_complex",
                "[0:v]scale=w=1280:h=720[outv]",
                "-map",
                "[outv]",
                "-c:v",
                "libx264",
                "out.mp4",
            ]
        );
    }

    #[test]
    fn unsafe_paths_never_reach_a_command() {
        let mut builder = CommandBuilder::new();
        assert!(builder.add_input("a;rm.mp4", &[]).is_err());
        assert!(builder.add_input("../escape.mp4", &[]).is_err());
        assert!(builder.set_output("$(whoami).mp4", &[]).is_err());
    }

    #[test]
    fn shell_string_quotes_arguments() {
        let mut builder = CommandBuilder::new();
        builder.add_input("my clip.mp4", &[]).unwrap();
        builder.set_output("out file.mp4", &[]).unwrap();
        let command = builder.build().unwrap();
        let shell = command.to_shell_string();
        assert!(shell.starts_with("ffmpeg"));
        assert!(shell.contains("'my clip.mp4'"));
        // argv form keeps the raw string, no quoting
        assert!(command.to_args().contains(&"my clip.mp4".to_string()));
    }
}
