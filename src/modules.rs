//! Module source retrieval and bookkeeping of loaded modules.
//!
//! The interpreter asks a [`ModuleSource`] for the text of a module by name and
//! records every loaded name (and the parsed tree) in a [`ModuleRegistry`] that
//! lives as long as the interpreter does.

use std::{
    fs, io,
    path::{Path, PathBuf},
    rc::Rc,
};

use indexmap::{IndexMap, IndexSet};

use crate::{ast::Program, diagnostics::ModuleError};

/// File extension assumed for module names given without one.
pub const MODULE_EXTENSION: &str = "lm";

/// Raw module text plus where it came from. `origin` names the file in call frames.
#[derive(Debug, Clone)]
pub struct ModuleText {
    pub origin: String,
    pub source: String,
}

pub trait ModuleSource {
    fn fetch(&self, name: &str) -> Result<ModuleText, ModuleError>;
}

/// Resolves module names against a list of directories, first hit wins.
#[derive(Debug, Clone)]
pub struct FileSystemSource {
    search_paths: Vec<PathBuf>,
}

impl Default for FileSystemSource {
    fn default() -> Self {
        Self::new(vec![PathBuf::from(".")])
    }
}

impl FileSystemSource {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    fn candidates(&self, name: &str) -> Vec<PathBuf> {
        let relative = Path::new(name);
        let relative = if relative.extension().is_some() {
            relative.to_path_buf()
        } else {
            relative.with_extension(MODULE_EXTENSION)
        };
        if relative.is_absolute() {
            return vec![relative];
        }
        self.search_paths
            .iter()
            .map(|dir| dir.join(&relative))
            .collect()
    }
}

impl ModuleSource for FileSystemSource {
    fn fetch(&self, name: &str) -> Result<ModuleText, ModuleError> {
        let candidates = self.candidates(name);
        for path in &candidates {
            match fs::read_to_string(path) {
                Ok(source) => {
                    return Ok(ModuleText {
                        origin: path.display().to_string(),
                        source,
                    });
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(source) => {
                    return Err(ModuleError::Io {
                        name: name.to_string(),
                        source,
                    });
                }
            }
        }
        Err(ModuleError::NotFound {
            name: name.to_string(),
            searched: candidates,
        })
    }
}

/// In-memory module table, for embedding hosts and tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    modules: IndexMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(name, source);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.modules.insert(name.into(), source.into());
    }
}

impl ModuleSource for MemorySource {
    fn fetch(&self, name: &str) -> Result<ModuleText, ModuleError> {
        self.modules
            .get(name)
            .map(|source| ModuleText {
                origin: name.to_string(),
                source: source.clone(),
            })
            .ok_or_else(|| ModuleError::NotFound {
                name: name.to_string(),
                searched: Vec::new(),
            })
    }
}

/// Loaded module names (append-only) and the syntax trees kept alive for them.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    loaded: IndexSet<String>,
    retained: Vec<Rc<Program>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `name` as loaded. Returns `false` if it already was.
    pub fn mark_loaded(&mut self, name: &str) -> bool {
        self.loaded.insert(name.to_string())
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.contains(name)
    }

    pub fn loaded(&self) -> impl Iterator<Item = &str> {
        self.loaded.iter().map(String::as_str)
    }

    pub fn retain(&mut self, program: Rc<Program>) {
        self.retained.push(program);
    }

    pub fn retained_count(&self) -> usize {
        self.retained.len()
    }
}
