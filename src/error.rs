use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::header::HeaderError;

/// Which part of bundle production an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Descriptor,
    Icon,
    Binary,
    Output,
    Bundle,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Descriptor => "JSON descriptor",
            Stage::Icon       => "icon",
            Stage::Binary     => "binary payload",
            Stage::Output     => "output bundle",
            Stage::Bundle     => "bundle",
        })
    }
}

#[derive(Error, Debug)]
pub enum BundleError {
    #[error("{stage} not found: {}", path.display())]
    FileNotFound { stage: Stage, path: PathBuf },

    #[error("invalid JSON descriptor{}", describe(path))]
    Format {
        /// `None` when the descriptor came from memory.
        path:   Option<PathBuf>,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot decode icon {}", path.display())]
    Decode {
        path:   PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("I/O error on {stage} {}", path.display())]
    Io {
        stage:  Stage,
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed bundle {}", path.display())]
    Header {
        path:   PathBuf,
        #[source]
        source: HeaderError,
    },
}

impl BundleError {
    /// Classify an I/O failure on `path`, turning `NotFound` into
    /// [`BundleError::FileNotFound`].
    pub fn io(stage: Stage, path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            BundleError::FileNotFound { stage, path: path.to_owned() }
        } else {
            BundleError::Io { stage, path: path.to_owned(), source }
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            BundleError::FileNotFound { stage, .. } => *stage,
            BundleError::Format { .. }              => Stage::Descriptor,
            BundleError::Decode { .. }              => Stage::Icon,
            BundleError::Io { stage, .. }           => *stage,
            BundleError::Header { .. }              => Stage::Bundle,
        }
    }
}

fn describe(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" {}", path.display()),
        None       => String::new(),
    }
}

/// Read a whole input file, attributing failures to `stage`.
pub(crate) fn read_input(stage: Stage, path: &Path) -> Result<Vec<u8>, BundleError> {
    std::fs::read(path).map_err(|e| BundleError::io(stage, path, e))
}
