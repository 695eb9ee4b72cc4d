//! Error types for the content compiler.

use thiserror::Error;

/// Result type alias using CompilerError.
pub type Result<T> = std::result::Result<T, CompilerError>;

/// Main error type for content compilation.
///
/// Every variant is a fatal build error: it aborts the current asset's
/// pipeline and no output file is written. Recoverable conditions are
/// logged as warnings instead and never surface here.
#[derive(Error, Debug)]
pub enum CompilerError {
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse a JSON document.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to read or process an image.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// A `#id` URL or symbolic name did not resolve to a document object.
    #[error("Unresolved reference: {0}")]
    UnresolvedReference(String),

    /// A sampled index fell outside its source array.
    #[error("Index out of range: {0}")]
    IndexOutOfRange(String),

    /// A sampled value could not be coerced to a number.
    #[error("Invalid scalar value: {0}")]
    InvalidScalar(String),

    /// Structurally invalid or unsupported scene content
    /// (unknown primitive topology, degenerate polygon, negative bone index).
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Material/effect content that cannot be compiled.
    #[error("Material error: {0}")]
    Material(String),

    /// Vertices with differing optional-channel sets in one mesh.
    #[error("Mixed vertex formats in mesh '{0}'")]
    MixedVertexFormat(String),

    /// Mesh exceeds the 16-bit vertex/index budget.
    #[error("Mesh too large: {0}")]
    MeshTooLarge(String),

    /// A mesh instance is missing a binding for a material symbol,
    /// or binds the same symbol more than once.
    #[error("Material binding error: {0}")]
    MaterialBinding(String),

    /// Atlas manifest or image preprocessing problem.
    #[error("Atlas error: {0}")]
    Atlas(String),

    /// Images could not be packed within the configured maximum sheet size.
    #[error("Atlas packing failed: {0}")]
    AtlasPack(String),

    /// Shader preprocessing (include/substitution) failure.
    #[error("Shader preprocess error: {0}")]
    ShaderPreprocess(String),

    /// External shader service failed to compile a technique.
    #[error("Shader compile error: {0}")]
    ShaderCompile(String),

    /// Aggregate shader surface validation failure (all problems of one
    /// validation phase, collected before raising).
    #[error("Shader validation failed:\n{0}")]
    ShaderValidation(String),

    /// The build was cancelled externally. Not an error condition:
    /// outputs are discarded and nothing is logged.
    #[error("build cancelled")]
    Cancelled,
}
