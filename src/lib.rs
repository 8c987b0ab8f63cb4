pub mod core;

pub use core::command::{Command, CommandBuilder};
pub use core::compose::{compile, Composition, RenderPlan};
pub use core::error::RenderError;
pub use core::probe::{probe, MediaFileInfo};
pub use core::progress::{MultiStageProgress, ProgressParser, ProgressSnapshot, StageWeights};
pub use core::runner::{run, CancelToken, RenderEvent, RunOptions};
pub use core::validate::{validate_filter_chain, ValidationResult};
