//! Shared-input sampling.
//!
//! The bridge between the document's indexed-array storage and concrete
//! vertex construction: given a flat index table, a cursor and an
//! ordered list of semantic bindings, extract named values for one
//! logical vertex and report how many table slots were consumed so the
//! caller can advance its cursor.
//!
//! Samples are delivered to a [`SampleSink`] under `"PREFIX.PARAM"`
//! keys. Sinks recognize a fixed key set and warn-and-ignore anything
//! else, so unexpected authoring-tool channels never abort a build.
//!
//! Every source lookup here bounds-checks and raises a structural error
//! on an out-of-range index; there is no silently-skipped category.

use super::source::{Semantic, SharedInput, SourceData, UnsharedInput};
use super::SceneDocument;
use crate::error::{CompilerError, Result};

/// One sampled value.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleValue {
    Float(f32),
    /// Raw resolved integer index (joint synonym key).
    Int(i32),
    Name(String),
}

/// Receives sampled values keyed by `"PREFIX.PARAM"`.
pub trait SampleSink {
    fn set(&mut self, key: &str, value: SampleValue) -> Result<()>;

    /// Called with the raw index of the vertex-group indirection, which
    /// identifies the original source vertex for later skin binding.
    fn vertex_index(&mut self, _index: u32) {}
}

/// Sample one logical vertex through a shared index table.
///
/// Reads `indices[cursor + input.offset]` for every binding and returns
/// the number of table slots consumed (`max(offset) + 1`).
pub fn sample_shared(
    doc: &SceneDocument,
    indices: &[u32],
    cursor: usize,
    inputs: &[SharedInput],
    sink: &mut dyn SampleSink,
) -> Result<usize> {
    let mut consumed = 0;
    for input in inputs {
        consumed = consumed.max(input.offset + 1);
        let slot = cursor + input.offset;
        let index = *indices.get(slot).ok_or_else(|| {
            CompilerError::IndexOutOfRange(format!(
                "index table slot {slot} out of range (table length {})",
                indices.len()
            ))
        })? as usize;

        if input.semantic == Semantic::Vertex {
            // The vertex-group construct is an alias for a stack of other
            // sources all read at this same index.
            sink.vertex_index(index as u32);
            let group = doc.resolve_vertex_group(&input.source)?;
            sample_unshared(doc, index, &group.inputs, sink)?;
        } else {
            sample_source(doc, input.semantic, input.set, &input.source, index, sink)?;
        }
    }
    Ok(consumed)
}

/// Sample unshared inputs. Unshared bindings have no offset concept:
/// every one is read at the caller's index.
pub fn sample_unshared(
    doc: &SceneDocument,
    index: usize,
    inputs: &[UnsharedInput],
    sink: &mut dyn SampleSink,
) -> Result<()> {
    for input in inputs {
        sample_source(doc, input.semantic, 0, &input.source, index, sink)?;
    }
    Ok(())
}

fn sample_source(
    doc: &SceneDocument,
    semantic: Semantic,
    set: u32,
    url: &str,
    index: usize,
    sink: &mut dyn SampleSink,
) -> Result<()> {
    let source = doc.resolve_source(url)?;
    let prefix = semantic.prefix(set);

    match &source.data {
        SourceData::Names(_) => {
            let name = source.name(index)?.to_string();
            sink.set(&format!("{prefix}.NAME"), SampleValue::Name(name))?;
        }
        SourceData::Values(_) => {
            for (component, param) in source.params.iter().enumerate() {
                let value = source.float(index, component)?;
                sink.set(&format!("{prefix}.{param}"), SampleValue::Float(value))?;
            }
        }
    }

    // Joint bindings additionally expose the raw resolved index, which
    // later disambiguates bone weights per source vertex.
    if semantic == Semantic::Joint {
        sink.set("JOINT.INDEX", SampleValue::Int(index as i32))?;
    }
    Ok(())
}

/// Accumulator for geometry vertex samples.
///
/// A struct-of-optionals stand-in for the original string-keyed value
/// bag: the recognized key set is fixed, and unrecognized keys are
/// logged and ignored rather than failing the build.
#[derive(Debug, Clone, Default)]
pub struct VertexSample {
    pub position: [f32; 3],
    pub has_position: bool,
    pub normal: [f32; 3],
    pub has_normal: bool,
    pub color: [f32; 4],
    pub has_color: bool,
    pub texcoords: [[f32; 2]; 2],
    pub has_texcoord: [bool; 2],
    /// Index of the vertex-group element this sample came from.
    pub source_vertex: u32,
}

impl VertexSample {
    pub fn new() -> Self {
        Self {
            color: [1.0, 1.0, 1.0, 1.0],
            ..Self::default()
        }
    }
}

impl SampleSink for VertexSample {
    fn set(&mut self, key: &str, value: SampleValue) -> Result<()> {
        let number = match &value {
            SampleValue::Float(f) => *f,
            SampleValue::Int(i) => *i as f32,
            SampleValue::Name(_) => {
                log::warn!("ignoring non-numeric vertex sample '{key}'");
                return Ok(());
            }
        };

        match key {
            "POSITION.X" => self.position[0] = number,
            "POSITION.Y" => self.position[1] = number,
            "POSITION.Z" => self.position[2] = number,
            "NORMAL.X" => self.normal[0] = number,
            "NORMAL.Y" => self.normal[1] = number,
            "NORMAL.Z" => self.normal[2] = number,
            "COLOR.R" => self.color[0] = number,
            "COLOR.G" => self.color[1] = number,
            "COLOR.B" => self.color[2] = number,
            "COLOR.A" => self.color[3] = number,
            "TEXCOORD0.S" => self.texcoords[0][0] = number,
            "TEXCOORD0.T" => self.texcoords[0][1] = number,
            "TEXCOORD1.S" => self.texcoords[1][0] = number,
            "TEXCOORD1.T" => self.texcoords[1][1] = number,
            _ => {
                log::warn!("ignoring unrecognized vertex sample key '{key}'");
                return Ok(());
            }
        }

        match key.split('.').next() {
            Some("POSITION") => self.has_position = true,
            Some("NORMAL") => self.has_normal = true,
            Some("COLOR") => self.has_color = true,
            Some("TEXCOORD0") => self.has_texcoord[0] = true,
            Some("TEXCOORD1") => self.has_texcoord[1] = true,
            _ => {}
        }
        Ok(())
    }

    fn vertex_index(&mut self, index: u32) {
        self.source_vertex = index;
    }
}

/// Accumulator for one skin influence (joint + weight pair).
#[derive(Debug, Clone, Default)]
pub struct InfluenceSample {
    pub joint_name: Option<String>,
    pub joint_index: Option<i32>,
    pub weight: Option<f32>,
}

impl SampleSink for InfluenceSample {
    fn set(&mut self, key: &str, value: SampleValue) -> Result<()> {
        match (key, value) {
            ("JOINT.NAME", SampleValue::Name(name)) => self.joint_name = Some(name),
            ("JOINT.INDEX", SampleValue::Int(index)) => self.joint_index = Some(index),
            ("WEIGHT.WEIGHT", SampleValue::Float(weight)) => self.weight = Some(weight),
            (key, _) => log::warn!("ignoring unrecognized influence sample key '{key}'"),
        }
        Ok(())
    }
}
