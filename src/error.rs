use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Everything that can end a pipeline run.
///
/// All variants are fatal to the current invocation; malformed *lines* inside
/// a sample never surface here (the offending frame is dropped and the sample
/// continues), and malformed *samples* are dropped silently. Only aggregate
/// emptiness and real environmental failures are reported.
#[derive(Error, Debug)]
pub enum Error {
    /// The input path does not exist.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Opening, mapping, or creating a file failed.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// Configuration validation rejected a field.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The input yielded zero valid samples.
    #[error("no valid samples found in input")]
    ParseEmpty,

    /// Internal inconsistency while reading a sample the parser had already
    /// committed to (truncated numeric, malformed header).
    #[error("malformed {dialect} input: {message}")]
    ParseFormat {
        dialect: &'static str,
        message: String,
    },

    /// A downstream stage (folding, tree building) produced nothing.
    #[error("pipeline stage produced no output: {0}")]
    PipelineEmpty(&'static str),

    /// The output stream failed mid-write.
    #[error("render failed: {0}")]
    Render(#[from] quick_xml::Error),

    /// The output extension selects no known renderer.
    #[error("unsupported output suffix: {0:?} (expected \"svg\" or \"html\")")]
    SuffixUnknown(String),
}

pub type Result<T> = std::result::Result<T, Error>;
