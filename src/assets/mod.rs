pub mod loader;

pub use loader::{apply_preselection, FenceOutcome, LoadState, ModelLoadController, PendingPreselection};

use crate::engine::ResourceResolver;
use crate::render::color::ColorConfig;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Model container kinds the viewer accepts, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    /// Binary container with embedded buffers.
    Glb,
    /// JSON scene description referencing external resources.
    Gltf,
}

impl ModelFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        let extension = Path::new(name).extension()?.to_str()?;
        if extension.eq_ignore_ascii_case("glb") {
            Some(Self::Glb)
        } else if extension.eq_ignore_ascii_case("gltf") {
            Some(Self::Gltf)
        } else {
            None
        }
    }
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Glb => f.write_str("glb"),
            Self::Gltf => f.write_str("gltf"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// External resources of one load request, keyed by the URI the model uses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceMap {
    entries: HashMap<String, Vec<u8>>,
}

impl ResourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, uri: impl Into<String>, bytes: Vec<u8>) {
        self.entries.insert(uri.into(), bytes);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> HashMap<String, Vec<u8>> {
        self.entries
    }

    /// Reads every regular file of `dir` (not recursive), keyed by file name.
    pub fn from_dir(dir: &Path) -> Result<Self, AssetError> {
        let read_err = |source| AssetError::Read {
            path: dir.display().to_string(),
            source,
        };
        let mut resources = Self::new();
        for entry in std::fs::read_dir(dir).map_err(read_err)? {
            let path = entry.map_err(read_err)?.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            let bytes = std::fs::read(&path).map_err(|source| AssetError::Read {
                path: path.display().to_string(),
                source,
            })?;
            resources.insert(name, bytes);
        }
        Ok(resources)
    }
}

impl From<HashMap<String, Vec<u8>>> for ResourceMap {
    fn from(entries: HashMap<String, Vec<u8>>) -> Self {
        Self { entries }
    }
}

impl ResourceResolver for ResourceMap {
    fn resolve(&self, uri: &str) -> &[u8] {
        match self.entries.get(uri) {
            Some(bytes) => bytes,
            None => {
                log::error!("Missing resource: {uri}");
                &[]
            }
        }
    }
}

/// Everything a `loadModel` command carries.
#[derive(Debug, Clone, Default)]
pub struct LoadRequest {
    pub bytes: Vec<u8>,
    pub name: String,
    pub resources: ResourceMap,
    pub preselected: Option<Vec<String>>,
    pub colors: ColorConfig,
}

impl LoadRequest {
    pub fn new(bytes: Vec<u8>, name: impl Into<String>) -> Self {
        Self {
            bytes,
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_resources(mut self, resources: ResourceMap) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_preselected<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preselected = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_colors(mut self, colors: ColorConfig) -> Self {
        self.colors = colors;
        self
    }
}
