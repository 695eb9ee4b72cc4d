//! The shader descriptor compiler.
//!
//! Parses a render-state + multi-technique descriptor, preprocesses the
//! embedded GLSL, validates that all techniques expose an identical
//! attribute/uniform surface (via an external compilation service) and
//! emits a binary descriptor storing resolved bindings, parameter
//! defaults and the preprocessed source text.

pub mod descriptor;
pub mod preprocess;
pub mod service;
pub mod validate;
pub mod writer;

pub use descriptor::{RenderStateDesc, ShaderDescriptor, SourceDesc, TechniqueDesc};
pub use service::{ProgramSurface, ShaderService, ShaderVar, SourceScanService};
pub use validate::{ParameterSource, ResolvedAttribute, ResolvedParameter};

use crate::build::{BuildContext, CancelToken};
use crate::error::Result;
use std::path::Path;

/// One compiled technique: gating lists plus preprocessed stage sources.
#[derive(Debug, Clone)]
pub struct CompiledTechnique {
    pub name: String,
    pub platforms: Vec<String>,
    pub excluded_platforms: Vec<String>,
    pub devices: Vec<String>,
    pub excluded_devices: Vec<String>,
    pub vertex: String,
    pub fragment: String,
}

/// The compiled shader descriptor ready for serialisation.
#[derive(Debug, Clone)]
pub struct CompiledShader {
    pub render_state: RenderStateDesc,
    pub attributes: Vec<ResolvedAttribute>,
    pub parameters: Vec<ResolvedParameter>,
    pub techniques: Vec<CompiledTechnique>,
}

/// The shader compiler entry point.
pub struct ShaderCompiler;

impl ShaderCompiler {
    /// Process one descriptor document into a binary shader file.
    ///
    /// The caller owns the service; dropping it releases any native
    /// compilation context on every exit path, including cancellation.
    pub fn process(ctx: &mut BuildContext, service: &mut dyn ShaderService) -> Result<()> {
        let input = ctx.input_path();
        let text = std::fs::read_to_string(&input)?;
        let descriptor: ShaderDescriptor = serde_json::from_str(&text)?;

        let folder = input.parent().unwrap_or_else(|| Path::new("")).to_path_buf();
        let compiled = Self::compile(&descriptor, &folder, service, &ctx.cancel)?;
        let bytes = writer::write_shader(&compiled)?;
        ctx.cancel.check()?;
        ctx.write_output(&ctx.output_path("shader"), &bytes)
    }

    /// Preprocess, compile-for-validation and validate a descriptor.
    pub fn compile(
        descriptor: &ShaderDescriptor,
        folder: &Path,
        service: &mut dyn ShaderService,
        cancel: &CancelToken,
    ) -> Result<CompiledShader> {
        let mut techniques = Vec::with_capacity(descriptor.techniques.len());
        let mut surfaces = Vec::with_capacity(descriptor.techniques.len());

        for technique in &descriptor.techniques {
            cancel.check()?;
            let vertex = preprocess::preprocess(&load_source(&technique.vertex, folder)?, folder)?;
            let fragment =
                preprocess::preprocess(&load_source(&technique.fragment, folder)?, folder)?;

            // Compilation is validation only; the binary keeps source text.
            surfaces.push(service.compile(&technique.name, &vertex, &fragment)?);
            techniques.push(CompiledTechnique {
                name: technique.name.clone(),
                platforms: technique.platforms.clone(),
                excluded_platforms: technique.excluded_platforms.clone(),
                devices: technique.devices.clone(),
                excluded_devices: technique.excluded_devices.clone(),
                vertex,
                fragment,
            });
        }

        let validated = validate::validate(descriptor, &surfaces)?;
        Ok(CompiledShader {
            render_state: descriptor.render_state.clone(),
            attributes: validated.attributes,
            parameters: validated.parameters,
            techniques,
        })
    }
}

fn load_source(source: &SourceDesc, folder: &Path) -> Result<String> {
    match source {
        SourceDesc::Inline { source } => Ok(source.clone()),
        SourceDesc::File { file } => Ok(std::fs::read_to_string(folder.join(file))?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompilerError;

    fn two_technique_descriptor(fragment_b: &str) -> ShaderDescriptor {
        serde_json::from_str(&format!(
            r#"{{
                "attributes": [ {{ "name": "aPosition", "location": 0 }} ],
                "techniques": [
                    {{
                        "name": "high",
                        "vertex": {{ "source": "attribute vec3 aPosition;\nuniform mat4 uWvp;\n" }},
                        "fragment": {{ "source": "uniform sampler2D uDiffuse;\n" }}
                    }},
                    {{
                        "name": "low",
                        "vertex": {{ "source": "attribute vec3 aPosition;\nuniform mat4 uWvp;\n" }},
                        "fragment": {{ "source": "{fragment_b}" }}
                    }}
                ],
                "parameters": [ {{ "name": "uWvp", "binding": "WorldViewProjection" }} ]
            }}"#
        ))
        .unwrap()
    }

    #[test]
    fn test_compile_matching_techniques() {
        let descriptor = two_technique_descriptor("uniform sampler2D uDiffuse;\\n");
        let mut service = SourceScanService;
        let compiled = ShaderCompiler::compile(
            &descriptor,
            Path::new("."),
            &mut service,
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(compiled.techniques.len(), 2);
        assert_eq!(compiled.attributes.len(), 1);
        assert_eq!(compiled.attributes[0].location, 0);
        // uWvp declared + uDiffuse synthesized.
        assert_eq!(compiled.parameters.len(), 2);
    }

    #[test]
    fn test_divergent_attribute_surface_fails() {
        let descriptor: ShaderDescriptor = serde_json::from_str(
            r#"{
                "attributes": [ { "name": "aPosition", "location": 0 } ],
                "techniques": [
                    {
                        "name": "a",
                        "vertex": { "source": "attribute vec3 aPosition;\n" },
                        "fragment": { "source": "" }
                    },
                    {
                        "name": "b",
                        "vertex": { "source": "attribute vec3 aPosition;\nattribute vec2 aUv;\n" },
                        "fragment": { "source": "" }
                    }
                ]
            }"#,
        )
        .unwrap();
        let mut service = SourceScanService;
        let result = ShaderCompiler::compile(
            &descriptor,
            Path::new("."),
            &mut service,
            &CancelToken::new(),
        );
        assert!(matches!(result, Err(CompilerError::ShaderValidation(_))));
    }

    #[test]
    fn test_cancellation_before_compile() {
        let descriptor = two_technique_descriptor("");
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut service = SourceScanService;
        assert!(matches!(
            ShaderCompiler::compile(&descriptor, Path::new("."), &mut service, &cancel),
            Err(CompilerError::Cancelled)
        ));
    }
}
