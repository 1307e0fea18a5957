use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Opaque reference to image bytes stored on the local filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageHandle(PathBuf);

impl ImageHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl std::fmt::Display for ImageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl From<PathBuf> for ImageHandle {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

impl From<&str> for ImageHandle {
    fn from(path: &str) -> Self {
        Self(PathBuf::from(path))
    }
}

/// How a picker interaction resolved. Cancellation is a normal outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquisition {
    Image(ImageHandle),
    Cancelled,
}
