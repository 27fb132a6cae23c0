//! Builder - one-shot schema loading
//!
//! All loading happens here, before any event is processed. `build` indexes
//! the services and hands out an immutable [`SchemaRegistry`].

use crate::error::{Error, Result};
use crate::registry::SchemaRegistry;
use prost::Message as _;
use prost_reflect::DescriptorPool;
use prost_types::{FileDescriptorProto, FileDescriptorSet};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, instrument};

/// Accumulates schema sources into a descriptor pool
#[derive(Debug, Default)]
pub struct SchemaRegistryBuilder {
    pool: DescriptorPool,
}

impl SchemaRegistryBuilder {
    /// Create an empty builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `.proto` files, resolving imports through `import_paths`.
    ///
    /// With no import paths, files below the current directory are resolved
    /// from it and any other file from its own directory.
    #[instrument(skip(self))]
    pub fn load_from_schema_sources(
        &mut self,
        paths: &[PathBuf],
        import_paths: &[PathBuf],
    ) -> Result<&mut Self> {
        if paths.is_empty() {
            return Ok(self);
        }

        let (includes, files) = if import_paths.is_empty() {
            default_roots(paths)
        } else {
            (import_paths.to_vec(), paths.to_vec())
        };

        let mut compiler =
            protox::Compiler::new(&includes).map_err(|e| Error::Parse(e.to_string()))?;
        compiler.include_imports(true);
        compiler
            .open_files(&files)
            .map_err(|e| Error::Parse(e.to_string()))?;
        let set = compiler.file_descriptor_set();

        let origin = paths.first().cloned().unwrap_or_default();
        let added = self.merge(&origin, set, |e| Error::Parse(e.to_string()))?;
        info!(files = paths.len(), added, "loaded schema sources");
        Ok(self)
    }

    /// Load serialized `FileDescriptorSet` files.
    ///
    /// Paths that do not exist are skipped.
    #[instrument(skip(self))]
    pub fn load_from_schema_sets(&mut self, paths: &[PathBuf]) -> Result<&mut Self> {
        for path in paths {
            let bytes = match std::fs::read(path) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!(path = %path.display(), "schema set not found, skipping");
                    continue;
                }
                Err(e) => {
                    return Err(Error::SchemaSet {
                        path: path.clone(),
                        source: Box::new(e),
                    })
                }
            };

            let set = FileDescriptorSet::decode(bytes.as_slice()).map_err(|e| Error::SchemaSet {
                path: path.clone(),
                source: Box::new(e),
            })?;
            let added = self.merge(path, set, |e| Error::SchemaSet {
                path: path.clone(),
                source: Box::new(e),
            })?;
            info!(path = %path.display(), added, "loaded schema set");
        }
        Ok(self)
    }

    /// Index services and freeze the registry
    #[must_use]
    pub fn build(self) -> SchemaRegistry {
        SchemaRegistry::new(self.pool)
    }

    /// Add the files of `set` not already present.
    ///
    /// Identical redefinitions are ignored; a file name registered with
    /// different contents is a conflict.
    fn merge(
        &mut self,
        origin: &Path,
        set: FileDescriptorSet,
        link_error: impl FnOnce(prost_reflect::DescriptorError) -> Error,
    ) -> Result<usize> {
        let mut fresh = Vec::with_capacity(set.file.len());
        for file in set.file {
            match self.pool.get_file_by_name(file.name()) {
                Some(existing) => {
                    if !same_definition(existing.file_descriptor_proto(), &file) {
                        return Err(Error::Conflict {
                            path: origin.to_path_buf(),
                            file: file.name().to_string(),
                        });
                    }
                }
                None => fresh.push(file),
            }
        }

        let added = fresh.len();
        if added > 0 {
            self.pool
                .add_file_descriptor_set(FileDescriptorSet { file: fresh })
                .map_err(link_error)?;
        }
        Ok(added)
    }
}

fn same_definition(a: &FileDescriptorProto, b: &FileDescriptorProto) -> bool {
    let strip = |f: &FileDescriptorProto| FileDescriptorProto {
        source_code_info: None,
        ..f.clone()
    };
    strip(a) == strip(b)
}

/// Include roots and file names used when no import path is given.
///
/// A relative path that stays below the current directory keeps `.` as its
/// root. Anything else is opened by file name from its parent directory.
fn default_roots(paths: &[PathBuf]) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let mut includes: Vec<PathBuf> = Vec::new();
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let below_cwd = path.is_relative()
            && !path
                .components()
                .any(|c| matches!(c, Component::ParentDir));
        let (root, file) = match (below_cwd, path.parent(), path.file_name()) {
            (false, Some(parent), Some(name)) if !parent.as_os_str().is_empty() => {
                (parent.to_path_buf(), PathBuf::from(name))
            }
            _ => (PathBuf::from("."), path.clone()),
        };
        if !includes.contains(&root) {
            includes.push(root);
        }
        files.push(file);
    }
    (includes, files)
}
