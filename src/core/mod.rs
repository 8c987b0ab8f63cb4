pub mod audio;
pub mod command;
pub mod compose;
pub mod concat;
pub mod encoder;
pub mod error;
pub mod graph;
pub mod job;
pub mod overlay;
pub mod probe;
pub mod progress;
pub mod runner;
pub mod security;
pub mod timeline;
pub mod validate;
pub mod video;
