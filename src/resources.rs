use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use log::debug;

use crate::error::ResourceError;

pub const VERTEX_SHADER: &str = "shaders/mesh.vert.wgsl";
pub const FRAGMENT_SHADER: &str = "shaders/mesh.frag.wgsl";
pub const DEFAULT_TEXTURE: &str = "textures/checker.png";
pub const DEFAULT_MODEL: &str = "models/cube.obj";

const EMBEDDED: &[(&str, &[u8])] = &[
    (
        VERTEX_SHADER,
        include_bytes!("../assets/shaders/mesh.vert.wgsl"),
    ),
    (
        FRAGMENT_SHADER,
        include_bytes!("../assets/shaders/mesh.frag.wgsl"),
    ),
    (
        DEFAULT_TEXTURE,
        include_bytes!("../assets/textures/checker.png"),
    ),
    (DEFAULT_MODEL, include_bytes!("../assets/models/cube.obj")),
];

/// Key-value store mapping resource names to bytes.
///
/// Names are `/`-separated relative paths. Layers are consulted from the
/// most recently added to the first; the embedded assets form the base.
#[derive(Debug, Clone)]
pub struct ResourceStore {
    layers: Vec<ResourceBacking>,
}

#[derive(Debug, Clone)]
enum ResourceBacking {
    Embedded(&'static [(&'static str, &'static [u8])]),
    Directory(PathBuf),
    Memory(Vec<(String, Vec<u8>)>),
}

impl ResourceStore {
    /// Store backed only by the assets compiled into the binary.
    pub fn embedded() -> Self {
        Self {
            layers: vec![ResourceBacking::Embedded(EMBEDDED)],
        }
    }

    /// Store with no resources at all.
    pub fn empty() -> Self {
        Self { layers: Vec::new() }
    }

    /// Overlays a directory; its files shadow earlier layers.
    pub fn with_directory(mut self, root: impl Into<PathBuf>) -> Self {
        self.layers.push(ResourceBacking::Directory(root.into()));
        self
    }

    /// Overlays a single in-memory entry.
    pub fn with_entry(mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        let entry = (name.into(), data.into());
        match self.layers.last_mut() {
            Some(ResourceBacking::Memory(entries)) => entries.push(entry),
            _ => self.layers.push(ResourceBacking::Memory(vec![entry])),
        }
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_ok()
    }

    /// Returns the bytes stored under `name`.
    pub fn get(&self, name: &str) -> Result<Cow<'static, [u8]>, ResourceError> {
        for layer in self.layers.iter().rev() {
            if let Some(bytes) = layer.lookup(name)? {
                debug!("resolved resource {name} ({} bytes)", bytes.len());
                return Ok(bytes);
            }
        }
        Err(ResourceError::NotFound {
            name: name.to_string(),
        })
    }

    /// Returns the resource as UTF-8 text.
    pub fn get_text(&self, name: &str) -> Result<String, ResourceError> {
        let bytes = self.get(name)?;
        String::from_utf8(bytes.into_owned()).map_err(|_| ResourceError::NotUtf8 {
            name: name.to_string(),
        })
    }
}

impl Default for ResourceStore {
    fn default() -> Self {
        Self::embedded()
    }
}

impl ResourceBacking {
    fn lookup(&self, name: &str) -> Result<Option<Cow<'static, [u8]>>, ResourceError> {
        match self {
            ResourceBacking::Embedded(entries) => Ok(entries
                .iter()
                .find(|(entry, _)| *entry == name)
                .map(|(_, data)| Cow::Borrowed(*data))),
            ResourceBacking::Memory(entries) => Ok(entries
                .iter()
                .rev()
                .find(|(entry, _)| entry == name)
                .map(|(_, data)| Cow::Owned(data.clone()))),
            ResourceBacking::Directory(root) => {
                let Some(path) = resolve_in(root, name) else {
                    return Ok(None);
                };
                match fs::read(&path) {
                    Ok(data) => Ok(Some(Cow::Owned(data))),
                    Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
                    Err(source) => Err(ResourceError::Io {
                        name: name.to_string(),
                        source,
                    }),
                }
            }
        }
    }
}

/// Joins `name` under `root`, refusing absolute paths and `..` segments.
fn resolve_in(root: &Path, name: &str) -> Option<PathBuf> {
    let relative = Path::new(name);
    relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)))
        .then(|| root.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn embedded_assets_are_available() {
        let store = ResourceStore::embedded();
        for name in [VERTEX_SHADER, FRAGMENT_SHADER, DEFAULT_TEXTURE, DEFAULT_MODEL] {
            assert!(store.contains(name), "{name} missing");
        }
        assert!(store.get_text(VERTEX_SHADER).unwrap().contains("fn vs_main"));
    }

    #[test]
    fn missing_resource_is_not_found() {
        let err = ResourceStore::embedded().get("shaders/missing.wgsl").unwrap_err();
        assert!(matches!(err, ResourceError::NotFound { name } if name == "shaders/missing.wgsl"));
    }

    #[test]
    fn directory_overlay_shadows_embedded() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("shaders")).unwrap();
        fs::write(dir.path().join(VERTEX_SHADER), "// custom").unwrap();

        let store = ResourceStore::embedded().with_directory(dir.path());
        assert_eq!(store.get_text(VERTEX_SHADER).unwrap(), "// custom");
        assert!(store.get_text(FRAGMENT_SHADER).unwrap().contains("fn fs_main"));
    }

    #[test]
    fn overlay_rejects_escaping_names() {
        let dir = tempdir().unwrap();
        let store = ResourceStore::empty().with_directory(dir.path().join("assets"));
        fs::write(dir.path().join("secret.txt"), "nope").unwrap();
        assert!(matches!(
            store.get("../secret.txt"),
            Err(ResourceError::NotFound { .. })
        ));
    }

    #[test]
    fn non_utf8_text_is_reported() {
        let store = ResourceStore::empty().with_entry("blob.bin", vec![0xff, 0xfe]);
        assert!(matches!(
            store.get_text("blob.bin"),
            Err(ResourceError::NotUtf8 { .. })
        ));
        assert_eq!(store.get("blob.bin").unwrap().as_ref(), &[0xff, 0xfe]);
    }
}
