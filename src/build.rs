//! Build-invocation plumbing shared by every compiler.
//!
//! The surrounding orchestration layer (out of scope here) hands each
//! compiler a [`BuildContext`]: the logical asset path, the content and
//! output folders, a named/typed parameter bag, a dependency registrar
//! and a cancellation token. Compilers poll the token between stages and
//! serialise their complete output in memory before touching the
//! filesystem, so a failed or cancelled build never leaves a partial file.

use crate::error::{CompilerError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A single named build parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f32),
    Text(String),
}

/// Named/typed build parameters.
///
/// Keys are human-readable strings (e.g. "Scale", "Remove Unused Nodes").
/// Every getter substitutes its documented default when the key is absent
/// or has an incompatible type.
#[derive(Debug, Clone, Default)]
pub struct ParameterBag {
    values: HashMap<String, ParamValue>,
}

impl ParameterBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: ParamValue) {
        self.values.insert(key.into(), value);
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.values.get(key) {
            Some(ParamValue::Bool(b)) => *b,
            _ => default,
        }
    }

    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        match self.values.get(key) {
            Some(ParamValue::Int(i)) => *i,
            Some(ParamValue::Float(f)) => *f as i64,
            _ => default,
        }
    }

    pub fn get_float(&self, key: &str, default: f32) -> f32 {
        match self.values.get(key) {
            Some(ParamValue::Float(f)) => *f,
            Some(ParamValue::Int(i)) => *i as f32,
            _ => default,
        }
    }

    pub fn get_str<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        match self.values.get(key) {
            Some(ParamValue::Text(s)) => s.as_str(),
            _ => default,
        }
    }
}

/// Collaborator interface for queueing referenced side files
/// (e.g. textures named by a compiled material) for their own processing.
pub trait DependencyRegistrar {
    fn register(&mut self, path: &Path);
}

/// Registrar that discards all registrations.
#[derive(Debug, Default)]
pub struct NullRegistrar;

impl DependencyRegistrar for NullRegistrar {
    fn register(&mut self, _path: &Path) {}
}

/// Registrar that records registered paths, for tests and simple drivers.
#[derive(Debug, Default)]
pub struct CollectingRegistrar {
    pub paths: Vec<PathBuf>,
}

impl DependencyRegistrar for CollectingRegistrar {
    fn register(&mut self, path: &Path) {
        self.paths.push(path.to_path_buf());
    }
}

/// Cooperative cancellation token.
///
/// Clonable; the orchestration layer keeps one clone and the compiler
/// polls another. Cancellation is a distinct non-error termination path:
/// outputs are discarded and nothing is logged.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the build using this token.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Return `Err(Cancelled)` if cancellation has been requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(CompilerError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Everything a compiler needs for one asset build.
pub struct BuildContext<'a> {
    /// Logical path of the source asset, relative to the content root.
    pub asset_path: PathBuf,
    /// Root folder for authoring-time content.
    pub content_root: PathBuf,
    /// Folder the compiled binaries are written into.
    pub output_root: PathBuf,
    /// Named build parameters.
    pub params: ParameterBag,
    /// Receives referenced input files to queue for their own builds.
    pub registrar: &'a mut dyn DependencyRegistrar,
    /// Cooperative cancellation.
    pub cancel: CancelToken,
}

impl<'a> BuildContext<'a> {
    /// Absolute path of the source asset.
    pub fn input_path(&self) -> PathBuf {
        self.content_root.join(&self.asset_path)
    }

    /// Output path for this asset with the given extension.
    pub fn output_path(&self, extension: &str) -> PathBuf {
        self.output_root
            .join(&self.asset_path)
            .with_extension(extension)
    }

    /// Write a fully serialised output, creating parent folders as needed.
    ///
    /// Callers must only invoke this after the whole object graph has been
    /// compiled and validated; the buffer is the complete file content.
    pub fn write_output(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, bytes)?;
        Ok(())
    }
}
