use std::path::PathBuf;
use thiserror::Error;

/// Failures to open or parse a font face. No partial face is ever created.
#[derive(Debug, Error)]
pub enum FaceError {
    #[error("face has neither a file path nor in-memory data")]
    EmptySource,
    #[error("could not read font file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed font data: {0}")]
    Malformed(String),
    #[error("face index {index} out of range ({count} faces)")]
    IndexOutOfRange { index: u32, count: u32 },
    #[error("rasterizer library failed to initialize: {0}")]
    Library(String),
}

/// A glyph load failure reported by a rasterizer backend.
///
/// These never reach the consumer: the hint policy retries or degrades them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The hinting bytecode popped more arguments than it pushed.
    #[error("hinting bytecode ran out of arguments")]
    TooFewArguments,
    /// The hinting bytecode exceeded its execution budget.
    #[error("hinting bytecode execution too long")]
    ExecutionTooLong,
    #[error("glyph {0} does not exist in this face")]
    InvalidGlyph(u32),
    #[error("glyph has no outline or supported bitmap")]
    UnsupportedFormat,
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid raster configuration: {0}")]
    Toml(#[from] toml::de::Error),
}
