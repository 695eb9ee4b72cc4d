//! # Content Compiler
//!
//! An offline content-build pipeline for a game engine: it converts
//! authoring-time assets (3D scene interchange documents, sprite-sheet
//! manifests, shader descriptors) into compact binary runtime formats
//! consumed at load time.
//!
//! ## Overview
//!
//! Three compilers share one invocation model: an orchestration layer
//! (GUI or CLI) supplies a [`build::BuildContext`] — asset path, content
//! and output folders, a typed parameter bag, a dependency registrar and
//! a cancellation token — and calls a single `process` entry point per
//! asset. Each compiler reads its one input document, builds its object
//! graph, validates it and writes its binary output in a single step, so
//! a failed or cancelled build never leaves a partial file.
//!
//! ## Quick Start
//!
//! ```ignore
//! use content_compiler::build::{BuildContext, CancelToken, NullRegistrar, ParameterBag};
//! use content_compiler::model::ModelCompiler;
//!
//! let mut registrar = NullRegistrar;
//! let mut ctx = BuildContext {
//!     asset_path: "props/crate.scene".into(),
//!     content_root: "content".into(),
//!     output_root: "build".into(),
//!     params: ParameterBag::new(),
//!     registrar: &mut registrar,
//!     cancel: CancelToken::new(),
//! };
//!
//! ModelCompiler::process(&mut ctx)?;
//! ```
//!
//! The scene/model compiler is the core: it resolves the interchange
//! document's web of cross-references, reconciles per-attribute index
//! streams into one interleaved vertex format, welds duplicate vertices,
//! normalizes bone weights, computes bounds and emits an indexed binary
//! model. The atlas packer and shader descriptor compiler follow the
//! same build-time transformation shape with their own binary contracts.

pub mod atlas;
pub mod binio;
pub mod build;
pub mod error;
pub mod model;
pub mod scene;
pub mod shader;
pub mod types;

// Re-export main types for convenience
pub use atlas::{AtlasCompiler, AtlasConfig, CompiledAtlas, PackingStrategy};
pub use build::{BuildContext, CancelToken, DependencyRegistrar, NullRegistrar, ParameterBag, ParamValue};
pub use error::{CompilerError, Result};
pub use model::{Model, ModelCompiler, ModelConfig, ModelFormat};
pub use scene::SceneDocument;
pub use shader::{ShaderCompiler, ShaderService, SourceScanService};
pub use types::{Color, PixelFormat};
