//! Loosely-typed value sources and input bindings.
//!
//! A source is a flat array of scalars (or names) with a declared stride
//! and named components. Inputs bind a semantic to a source; shared
//! inputs additionally carry an index-table offset.

use crate::error::{CompilerError, Result};
use serde::Deserialize;

/// A loosely-typed scalar as it appears in the interchange document.
///
/// Authoring tools emit numbers, booleans and occasionally quoted
/// numbers; [`Scalar::to_f32`] is the single coercion routine that
/// normalizes all of them.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl Scalar {
    /// Coerce to f32. Strings are parsed locale-invariantly; anything
    /// unparsable is a structural error.
    pub fn to_f32(&self) -> Result<f32> {
        match self {
            Scalar::Number(n) => Ok(*n as f32),
            Scalar::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Scalar::Text(t) => t.trim().parse::<f32>().map_err(|_| {
                CompilerError::InvalidScalar(format!("cannot parse '{t}' as a number"))
            }),
        }
    }
}

/// Payload of a value source.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceData {
    /// Numeric values (positions, normals, weights, matrices, times).
    Values(Vec<Scalar>),
    /// Symbolic names (joint identifiers).
    Names(Vec<String>),
}

/// A named, strided value array.
#[derive(Debug, Clone, Deserialize)]
pub struct ValueSource {
    pub id: String,
    pub data: SourceData,
    #[serde(default = "default_stride")]
    pub stride: usize,
    /// Component names, e.g. `["X", "Y", "Z"]`. May name fewer
    /// components than the stride covers.
    #[serde(default)]
    pub params: Vec<String>,
}

fn default_stride() -> usize {
    1
}

impl ValueSource {
    /// Number of logical elements (array length / stride).
    pub fn count(&self) -> usize {
        let len = match &self.data {
            SourceData::Values(v) => v.len(),
            SourceData::Names(n) => n.len(),
        };
        if self.stride == 0 {
            0
        } else {
            len / self.stride
        }
    }

    /// Bounds-checked numeric read of one component of element `index`.
    pub fn float(&self, index: usize, component: usize) -> Result<f32> {
        let values = match &self.data {
            SourceData::Values(v) => v,
            SourceData::Names(_) => {
                return Err(CompilerError::InvalidScalar(format!(
                    "source '{}' holds names, not numbers",
                    self.id
                )))
            }
        };
        let at = index * self.stride + component;
        values
            .get(at)
            .ok_or_else(|| {
                CompilerError::IndexOutOfRange(format!(
                    "source '{}': element {index} component {component} (array length {})",
                    self.id,
                    values.len()
                ))
            })?
            .to_f32()
    }

    /// Bounds-checked read of all `stride` components of element `index`.
    pub fn element(&self, index: usize) -> Result<Vec<f32>> {
        (0..self.stride).map(|c| self.float(index, c)).collect()
    }

    /// Bounds-checked name read of element `index`.
    pub fn name(&self, index: usize) -> Result<&str> {
        let names = match &self.data {
            SourceData::Names(n) => n,
            SourceData::Values(_) => {
                return Err(CompilerError::InvalidScalar(format!(
                    "source '{}' holds numbers, not names",
                    self.id
                )))
            }
        };
        names
            .get(index)
            .map(|s| s.as_str())
            .ok_or_else(|| {
                CompilerError::IndexOutOfRange(format!(
                    "source '{}': name {index} (array length {})",
                    self.id,
                    names.len()
                ))
            })
    }
}

/// Input semantics recognized by the compilers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Semantic {
    /// Indirection into a vertex group's own unshared inputs.
    Vertex,
    Position,
    Normal,
    #[serde(rename = "TEXCOORD")]
    TexCoord,
    Color,
    Joint,
    Weight,
    InvBindMatrix,
    /// Keyframe times (animation samplers).
    Input,
    /// Keyframe values (animation samplers).
    Output,
    Interpolation,
}

impl Semantic {
    /// Sample-key prefix for this semantic. Texture coordinates fold the
    /// set number into the prefix so two channels stay distinct.
    pub fn prefix(self, set: u32) -> String {
        match self {
            Semantic::Vertex => "VERTEX".to_string(),
            Semantic::Position => "POSITION".to_string(),
            Semantic::Normal => "NORMAL".to_string(),
            Semantic::TexCoord => format!("TEXCOORD{set}"),
            Semantic::Color => "COLOR".to_string(),
            Semantic::Joint => "JOINT".to_string(),
            Semantic::Weight => "WEIGHT".to_string(),
            Semantic::InvBindMatrix => "INV_BIND_MATRIX".to_string(),
            Semantic::Input => "INPUT".to_string(),
            Semantic::Output => "OUTPUT".to_string(),
            Semantic::Interpolation => "INTERPOLATION".to_string(),
        }
    }
}

/// An input binding inside a shared index table. `offset` is the slot
/// position within one logical vertex's run of indices.
#[derive(Debug, Clone, Deserialize)]
pub struct SharedInput {
    pub semantic: Semantic,
    pub source: String,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub set: u32,
}

/// An input binding without an offset; always read at the caller's index.
#[derive(Debug, Clone, Deserialize)]
pub struct UnsharedInput {
    pub semantic: Semantic,
    pub source: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_coercion() {
        assert_eq!(Scalar::Number(2.5).to_f32().unwrap(), 2.5);
        assert_eq!(Scalar::Bool(true).to_f32().unwrap(), 1.0);
        assert_eq!(Scalar::Text(" 3.25 ".into()).to_f32().unwrap(), 3.25);
        assert!(Scalar::Text("abc".into()).to_f32().is_err());
    }

    #[test]
    fn test_source_bounds_check() {
        let source = ValueSource {
            id: "s".into(),
            data: SourceData::Values(vec![
                Scalar::Number(1.0),
                Scalar::Number(2.0),
                Scalar::Number(3.0),
                Scalar::Number(4.0),
            ]),
            stride: 2,
            params: vec!["X".into(), "Y".into()],
        };

        assert_eq!(source.count(), 2);
        assert_eq!(source.float(1, 1).unwrap(), 4.0);
        assert!(matches!(
            source.float(2, 0),
            Err(CompilerError::IndexOutOfRange(_))
        ));
    }

    #[test]
    fn test_semantic_parse_and_prefix() {
        let s: Semantic = serde_json::from_str("\"TEXCOORD\"").unwrap();
        assert_eq!(s, Semantic::TexCoord);
        assert_eq!(s.prefix(1), "TEXCOORD1");

        let s: Semantic = serde_json::from_str("\"INV_BIND_MATRIX\"").unwrap();
        assert_eq!(s, Semantic::InvBindMatrix);
    }
}
