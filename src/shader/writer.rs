//! Binary shader descriptor serialisation.

use crate::binio::{count_u16, write_f32, write_i32, write_str, write_u16, write_u32, write_u8};
use crate::error::Result;
use bitflags::bitflags;

use super::descriptor::LiteralValue;
use super::validate::ParameterSource;
use super::CompiledShader;

/// Version tag of the binary shader layout.
pub const SHADER_VERSION: u16 = 1;

bitflags! {
    /// Which render-state sections the descriptor applies.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RenderStateFlags: u16 {
        const COLOR_MASK = 1 << 0;
        const BLEND = 1 << 1;
        const DEPTH = 1 << 2;
        const CULL = 1 << 3;
    }
}

bitflags! {
    /// Per-parameter record flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ParameterFlags: u16 {
        /// Value comes from a named engine-global binding.
        const ENGINE_BINDING = 1 << 0;
        /// Synthesized for an undeclared uniform.
        const SYNTHESIZED = 1 << 1;
    }
}

/// Literal value kind tags.
const LITERAL_FLOAT: u8 = 0;
const LITERAL_INT: u8 = 1;

pub fn write_shader(shader: &CompiledShader) -> Result<Vec<u8>> {
    let mut out = Vec::new();

    write_u16(&mut out, SHADER_VERSION)?;
    write_u16(&mut out, 0)?; // reserved flags

    write_render_state(&mut out, shader)?;

    write_u16(&mut out, count_u16(shader.attributes.len(), "attribute")?)?;
    for attribute in &shader.attributes {
        write_str(&mut out, &attribute.name)?;
        write_u16(&mut out, attribute.gl_type)?;
        write_u16(&mut out, attribute.array_size)?;
        write_u16(&mut out, attribute.location)?;
    }

    write_u16(&mut out, count_u16(shader.parameters.len(), "parameter")?)?;
    for parameter in &shader.parameters {
        let mut flags = ParameterFlags::empty();
        match &parameter.source {
            ParameterSource::Binding(_) => flags |= ParameterFlags::ENGINE_BINDING,
            ParameterSource::Synthesized => flags |= ParameterFlags::SYNTHESIZED,
            ParameterSource::Literal(_) => {}
        }
        write_u16(&mut out, flags.bits())?;
        write_str(&mut out, &parameter.name)?;
        write_u16(&mut out, parameter.gl_type)?;
        write_u16(&mut out, parameter.array_size)?;
        match &parameter.source {
            ParameterSource::Binding(binding) => write_str(&mut out, binding)?,
            ParameterSource::Literal(value) => write_literal(&mut out, value)?,
            ParameterSource::Synthesized => {
                // Empty literal: engine-settable, no initial value.
                write_u8(&mut out, LITERAL_FLOAT)?;
                write_u16(&mut out, 0)?;
            }
        }
    }

    write_u16(&mut out, count_u16(shader.techniques.len(), "technique")?)?;
    for technique in &shader.techniques {
        for list in [
            &technique.platforms,
            &technique.excluded_platforms,
            &technique.devices,
            &technique.excluded_devices,
        ] {
            write_u16(&mut out, count_u16(list.len(), "platform/device")?)?;
            for entry in list.iter() {
                write_str(&mut out, entry)?;
            }
        }
        write_str(&mut out, &technique.name)?;
        write_u32(&mut out, technique.vertex.len() as u32)?;
        out.extend_from_slice(technique.vertex.as_bytes());
        write_u32(&mut out, technique.fragment.len() as u32)?;
        out.extend_from_slice(technique.fragment.as_bytes());
    }

    Ok(out)
}

fn write_render_state(out: &mut Vec<u8>, shader: &CompiledShader) -> Result<()> {
    let state = &shader.render_state;
    let mut flags = RenderStateFlags::empty();
    if state.color_mask.is_some() {
        flags |= RenderStateFlags::COLOR_MASK;
    }
    if state.blend.is_some() {
        flags |= RenderStateFlags::BLEND;
    }
    if state.depth.is_some() {
        flags |= RenderStateFlags::DEPTH;
    }
    if state.cull.is_some() {
        flags |= RenderStateFlags::CULL;
    }
    write_u16(out, flags.bits())?;

    if let Some(mask) = &state.color_mask {
        let bits = (mask.red as u8)
            | (mask.green as u8) << 1
            | (mask.blue as u8) << 2
            | (mask.alpha as u8) << 3;
        write_u8(out, bits)?;
    }
    if let Some(blend) = &state.blend {
        write_u8(out, blend.enabled as u8)?;
        write_u16(out, blend.source.code())?;
        write_u16(out, blend.dest.code())?;
    }
    if let Some(depth) = &state.depth {
        write_u8(out, depth.test as u8)?;
        write_u8(out, depth.write as u8)?;
        write_u16(out, depth.function.code())?;
    }
    if let Some(cull) = &state.cull {
        write_u8(out, cull.enabled as u8)?;
        write_u16(out, cull.face.code())?;
    }
    Ok(())
}

fn write_literal(out: &mut Vec<u8>, value: &LiteralValue) -> Result<()> {
    match value {
        LiteralValue::Float(v) => {
            write_u8(out, LITERAL_FLOAT)?;
            write_u16(out, 1)?;
            write_f32(out, *v)?;
        }
        LiteralValue::Int(v) => {
            write_u8(out, LITERAL_INT)?;
            write_u16(out, 1)?;
            write_i32(out, *v as i32)?;
        }
        LiteralValue::FloatArray(values) => {
            write_u8(out, LITERAL_FLOAT)?;
            write_u16(out, count_u16(values.len(), "literal value")?)?;
            for v in values {
                write_f32(out, *v)?;
            }
        }
    }
    Ok(())
}
