//! Discovery of migration source files and binding them to registered units.

use crate::core::MigrationUnit;
use crate::error::Error;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub(crate) const DEFAULT_UNIT_EXTENSION: &str = "rs";

type Constructor = Box<dyn Fn() -> Box<dyn MigrationUnit>>;

/// An explicit mapping from migration identifier to the unit that implements it.
///
/// Units are stored as constructors and only built when resolved, so units the
/// migrator skips are never instantiated.
#[derive(Default)]
pub struct Registry {
    constructors: BTreeMap<String, Constructor>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("identifiers", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `U` under `identifier`, constructing it with `U::default()`.
    pub fn register<U>(&mut self, identifier: impl Into<String>) -> Result<&mut Self, Error>
    where
        U: MigrationUnit + Default + 'static,
    {
        self.register_with(identifier, || -> Box<dyn MigrationUnit> {
            Box::new(U::default())
        })
    }

    /// Register a constructor under `identifier`.
    pub fn register_with<F>(&mut self, identifier: impl Into<String>, constructor: F) -> Result<&mut Self, Error>
    where
        F: Fn() -> Box<dyn MigrationUnit> + 'static,
    {
        let identifier = identifier.into();
        if self.constructors.contains_key(&identifier) {
            return Err(Error::DuplicateRegistration(identifier));
        }
        self.constructors.insert(identifier, Box::new(constructor));
        Ok(self)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.constructors.contains_key(identifier)
    }

    /// Registered identifiers in ascending order.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    fn build(&self, identifier: &str) -> Option<Box<dyn MigrationUnit>> {
        self.constructors.get(identifier).map(|constructor| constructor())
    }
}

/// Discovers migration source files in a directory and resolves them to units.
///
/// A file `<identifier>.<extension>` marks a migration as present; its
/// identifier is the file stem. The unit itself comes from the [Registry].
#[derive(Debug)]
pub struct UnitLoader {
    directory: PathBuf,
    extension: String,
    registry: Registry,
}

impl UnitLoader {
    pub fn new(directory: impl Into<PathBuf>, registry: Registry) -> Self {
        Self {
            directory: directory.into(),
            extension: DEFAULT_UNIT_EXTENSION.to_string(),
            registry,
        }
    }

    /// Set the source file extension that marks a migration. Defaults to `rs`.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Fail with [Error::DirectoryNotFound] unless the source directory exists.
    pub fn ensure_directory(&self) -> Result<(), Error> {
        if self.directory.is_dir() {
            Ok(())
        } else {
            Err(Error::DirectoryNotFound(self.directory.clone()))
        }
    }

    /// Identifiers of every migration source file, sorted lexicographically.
    ///
    /// Hidden files, subdirectories and files with another extension are ignored.
    pub fn discover_all(&self) -> Result<Vec<String>, Error> {
        self.ensure_directory()?;

        let mut identifiers = Vec::new();
        for entry in std::fs::read_dir(&self.directory)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(self.extension.as_str()) {
                continue;
            }
            // non-UTF-8 names cannot round-trip through the ledger
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if stem.is_empty() || stem.starts_with('.') {
                continue;
            }
            identifiers.push(stem.to_string());
        }
        identifiers.sort();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            directory = %self.directory.display(),
            discovered = ?identifiers,
            "Discovered migration sources"
        );

        Ok(identifiers)
    }

    /// Turn a user-supplied name into an identifier, accepting a trailing extension.
    pub fn identifier_for<'a>(&self, name: &'a str) -> &'a str {
        name.strip_suffix(&format!(".{}", self.extension))
            .unwrap_or(name)
    }

    /// Whether a source file for `identifier` exists in the directory.
    pub fn source_exists(&self, identifier: &str) -> bool {
        if identifier.is_empty()
            || identifier.starts_with('.')
            || identifier.contains(|c: char| c == '/' || c == '\\')
        {
            return false;
        }
        self.source_path(identifier).is_file()
    }

    fn source_path(&self, identifier: &str) -> PathBuf {
        self.directory
            .join(format!("{}.{}", identifier, self.extension))
    }

    /// Build the unit for `identifier`.
    ///
    /// Fails with [Error::UnitNotFound] if its source file is missing and with
    /// [Error::MalformedUnit] if the file exists but no unit is registered for it.
    pub fn resolve(&self, identifier: &str) -> Result<Box<dyn MigrationUnit>, Error> {
        self.ensure_directory()?;
        if !self.source_exists(identifier) {
            return Err(Error::UnitNotFound(identifier.to_string()));
        }
        self.registry
            .build(identifier)
            .ok_or_else(|| Error::MalformedUnit {
                identifier: identifier.to_string(),
                reason: format!(
                    "'{}' does not register an apply/revert pair",
                    self.source_path(identifier).display()
                ),
            })
    }
}
