//! The external shader-compilation collaborator.
//!
//! Compilation is used purely for validation: the service compiles a
//! technique and reports the resulting attribute/uniform surface. The
//! compiled binary stores source text, never bytecode. Implementations
//! own native contexts; dropping the service must release them on every
//! exit path, including cancellation (RAII).

use crate::error::{CompilerError, Result};

/// One attribute or uniform discovered by compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderVar {
    pub name: String,
    /// GL type constant (GL_FLOAT_VEC3, GL_SAMPLER_2D, ...).
    pub gl_type: u16,
    pub array_size: u16,
}

/// The attribute/uniform surface of one compiled technique.
#[derive(Debug, Clone, Default)]
pub struct ProgramSurface {
    pub attributes: Vec<ShaderVar>,
    pub uniforms: Vec<ShaderVar>,
}

/// Opaque shader compilation service.
pub trait ShaderService {
    /// Compile a vertex/fragment pair and enumerate its surface.
    fn compile(&mut self, technique: &str, vertex: &str, fragment: &str) -> Result<ProgramSurface>;
}

/// Default service that discovers the surface by scanning `attribute`
/// and `uniform` declarations in the source text. Suitable for offline
/// builds without a GL context; engines plug their own compiler in.
#[derive(Debug, Default)]
pub struct SourceScanService;

impl ShaderService for SourceScanService {
    fn compile(&mut self, technique: &str, vertex: &str, fragment: &str) -> Result<ProgramSurface> {
        let mut surface = ProgramSurface::default();

        for declaration in scan_declarations(vertex, "attribute") {
            let var = parse_declaration(technique, declaration)?;
            if !surface.attributes.iter().any(|a| a.name == var.name) {
                surface.attributes.push(var);
            }
        }

        for source in [vertex, fragment] {
            for declaration in scan_declarations(source, "uniform") {
                let var = parse_declaration(technique, declaration)?;
                match surface.uniforms.iter().find(|u| u.name == var.name) {
                    None => surface.uniforms.push(var),
                    Some(existing) if *existing != var => {
                        return Err(CompilerError::ShaderCompile(format!(
                            "technique '{technique}': uniform '{}' declared with conflicting types",
                            var.name
                        )))
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(surface)
    }
}

/// Yield `"<type> <name>"` fragments of lines starting with `keyword`.
fn scan_declarations<'a>(source: &'a str, keyword: &'a str) -> impl Iterator<Item = &'a str> {
    source.lines().filter_map(move |line| {
        let trimmed = line.trim();
        trimmed
            .strip_prefix(keyword)
            .filter(|rest| rest.starts_with(char::is_whitespace))
            .map(|rest| rest.trim().trim_end_matches(';'))
    })
}

fn parse_declaration(technique: &str, declaration: &str) -> Result<ShaderVar> {
    let mut parts = declaration.split_whitespace();
    let type_name = parts.next().unwrap_or("");
    let name_part = parts.next().unwrap_or("");

    let gl_type = gl_type_code(type_name).ok_or_else(|| {
        CompilerError::ShaderCompile(format!(
            "technique '{technique}': unsupported GLSL type '{type_name}'"
        ))
    })?;

    let (name, array_size) = match name_part.split_once('[') {
        Some((name, rest)) => {
            let count = rest.trim_end_matches(']').trim().parse::<u16>().map_err(|_| {
                CompilerError::ShaderCompile(format!(
                    "technique '{technique}': bad array size in '{declaration}'"
                ))
            })?;
            (name, count)
        }
        None => (name_part, 1),
    };
    if name.is_empty() {
        return Err(CompilerError::ShaderCompile(format!(
            "technique '{technique}': malformed declaration '{declaration}'"
        )));
    }

    Ok(ShaderVar {
        name: name.to_string(),
        gl_type,
        array_size,
    })
}

/// GL type constants for the declarable GLSL types.
fn gl_type_code(type_name: &str) -> Option<u16> {
    Some(match type_name {
        "float" => 0x1406,
        "int" => 0x1404,
        "bool" => 0x8B56,
        "vec2" => 0x8B50,
        "vec3" => 0x8B51,
        "vec4" => 0x8B52,
        "ivec2" => 0x8B53,
        "ivec3" => 0x8B54,
        "ivec4" => 0x8B55,
        "mat2" => 0x8B5A,
        "mat3" => 0x8B5B,
        "mat4" => 0x8B5C,
        "sampler2D" => 0x8B5E,
        "samplerCube" => 0x8B60,
        _ => return None,
    })
}
