//! Shader surface validation.
//!
//! Each validation phase collects every problem it finds before raising
//! one aggregate fatal error, so authors fix a whole phase per rebuild
//! instead of one message at a time.

use crate::error::{CompilerError, Result};

use super::descriptor::{LiteralValue, ShaderDescriptor};
use super::service::{ProgramSurface, ShaderVar};

/// A fully resolved attribute: surface type joined with its bound
/// location.
#[derive(Debug, Clone)]
pub struct ResolvedAttribute {
    pub name: String,
    pub gl_type: u16,
    pub array_size: u16,
    pub location: u16,
}

/// Where a parameter's value comes from at runtime.
#[derive(Debug, Clone)]
pub enum ParameterSource {
    /// Named engine-global binding.
    Binding(String),
    /// Literal initial value.
    Literal(LiteralValue),
    /// Auto-synthesized for an undeclared uniform; engine-settable only.
    Synthesized,
}

/// A resolved parameter backed by a discovered uniform.
#[derive(Debug, Clone)]
pub struct ResolvedParameter {
    pub name: String,
    pub gl_type: u16,
    pub array_size: u16,
    pub source: ParameterSource,
}

/// Result of the validation phases.
#[derive(Debug, Clone, Default)]
pub struct ValidatedSurface {
    pub attributes: Vec<ResolvedAttribute>,
    pub parameters: Vec<ResolvedParameter>,
}

/// Validate one surface per technique against the descriptor.
pub fn validate(descriptor: &ShaderDescriptor, surfaces: &[ProgramSurface]) -> Result<ValidatedSurface> {
    let attributes = validate_attributes(descriptor, surfaces)?;
    let parameters = validate_uniforms(descriptor, surfaces)?;
    Ok(ValidatedSurface {
        attributes,
        parameters,
    })
}

fn var_signature(var: &ShaderVar) -> String {
    format!("{} (type 0x{:04X}, size {})", var.name, var.gl_type, var.array_size)
}

/// Phase 1: every technique must expose the identical attribute set
/// (name + type + size) as the first technique, and the declared
/// location bindings must match that set one-to-one.
fn validate_attributes(
    descriptor: &ShaderDescriptor,
    surfaces: &[ProgramSurface],
) -> Result<Vec<ResolvedAttribute>> {
    let mut errors: Vec<String> = Vec::new();
    let reference = match surfaces.first() {
        Some(surface) => &surface.attributes,
        None => return Ok(Vec::new()),
    };

    for (at, surface) in surfaces.iter().enumerate().skip(1) {
        let technique = &descriptor.techniques[at].name;
        for var in reference {
            match surface.attributes.iter().find(|a| a.name == var.name) {
                None => errors.push(format!(
                    "technique '{technique}': missing attribute '{}'",
                    var.name
                )),
                Some(other) if other != var => errors.push(format!(
                    "technique '{technique}': attribute {} does not match {}",
                    var_signature(other),
                    var_signature(var)
                )),
                Some(_) => {}
            }
        }
        for var in &surface.attributes {
            if !reference.iter().any(|a| a.name == var.name) {
                errors.push(format!(
                    "technique '{technique}': extra attribute '{}'",
                    var.name
                ));
            }
        }
    }

    let mut resolved = Vec::with_capacity(reference.len());
    for var in reference {
        match descriptor.attributes.iter().find(|b| b.name == var.name) {
            Some(binding) => resolved.push(ResolvedAttribute {
                name: var.name.clone(),
                gl_type: var.gl_type,
                array_size: var.array_size,
                location: binding.location,
            }),
            None => errors.push(format!("attribute '{}' has no location binding", var.name)),
        }
    }
    for binding in &descriptor.attributes {
        if !reference.iter().any(|a| a.name == binding.name) {
            errors.push(format!(
                "binding '{}' matches no shader attribute",
                binding.name
            ));
        }
    }

    if errors.is_empty() {
        Ok(resolved)
    } else {
        Err(CompilerError::ShaderValidation(errors.join("\n")))
    }
}

/// Phase 2: discovered uniforms must agree on type/size across
/// techniques. Declared parameters without a backing uniform are dropped
/// with a warning; uniforms without a declared parameter get one
/// synthesized with a warning.
fn validate_uniforms(
    descriptor: &ShaderDescriptor,
    surfaces: &[ProgramSurface],
) -> Result<Vec<ResolvedParameter>> {
    let mut errors: Vec<String> = Vec::new();
    let mut discovered: Vec<ShaderVar> = Vec::new();

    for (at, surface) in surfaces.iter().enumerate() {
        let technique = &descriptor.techniques[at].name;
        for var in &surface.uniforms {
            match discovered.iter().find(|u| u.name == var.name) {
                None => discovered.push(var.clone()),
                Some(existing) if existing != var => errors.push(format!(
                    "technique '{technique}': uniform {} conflicts with {}",
                    var_signature(var),
                    var_signature(existing)
                )),
                Some(_) => {}
            }
        }
    }
    if !errors.is_empty() {
        return Err(CompilerError::ShaderValidation(errors.join("\n")));
    }

    let mut parameters = Vec::new();
    for declared in &descriptor.parameters {
        match discovered.iter().find(|u| u.name == declared.name) {
            Some(uniform) => {
                let source = match (&declared.binding, &declared.value) {
                    (Some(binding), _) => ParameterSource::Binding(binding.clone()),
                    (None, Some(value)) => ParameterSource::Literal(value.clone()),
                    (None, None) => ParameterSource::Synthesized,
                };
                parameters.push(ResolvedParameter {
                    name: declared.name.clone(),
                    gl_type: uniform.gl_type,
                    array_size: uniform.array_size,
                    source,
                });
            }
            None => log::warn!(
                "parameter '{}' matches no shader uniform; dropped",
                declared.name
            ),
        }
    }
    for uniform in &discovered {
        if !descriptor.parameters.iter().any(|p| p.name == uniform.name) {
            log::warn!("uniform '{}' has no declared parameter; synthesizing one", uniform.name);
            parameters.push(ResolvedParameter {
                name: uniform.name.clone(),
                gl_type: uniform.gl_type,
                array_size: uniform.array_size,
                source: ParameterSource::Synthesized,
            });
        }
    }

    Ok(parameters)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(attributes: &str, parameters: &str) -> ShaderDescriptor {
        serde_json::from_str(&format!(
            r#"{{
                "attributes": {attributes},
                "techniques": [
                    {{ "name": "a", "vertex": {{ "source": "" }}, "fragment": {{ "source": "" }} }},
                    {{ "name": "b", "vertex": {{ "source": "" }}, "fragment": {{ "source": "" }} }}
                ],
                "parameters": {parameters}
            }}"#
        ))
        .unwrap()
    }

    fn var(name: &str, gl_type: u16, size: u16) -> ShaderVar {
        ShaderVar {
            name: name.to_string(),
            gl_type,
            array_size: size,
        }
    }

    #[test]
    fn test_matching_surfaces_resolve() {
        let descriptor = descriptor(
            r#"[ { "name": "aPos", "location": 0 } ]"#,
            r#"[ { "name": "uWorld", "binding": "World" } ]"#,
        );
        let surface = ProgramSurface {
            attributes: vec![var("aPos", 0x8B51, 1)],
            uniforms: vec![var("uWorld", 0x8B5C, 1)],
        };
        let validated = validate(&descriptor, &[surface.clone(), surface]).unwrap();

        assert_eq!(validated.attributes.len(), 1);
        assert_eq!(validated.attributes[0].location, 0);
        assert_eq!(validated.parameters.len(), 1);
        assert!(matches!(
            validated.parameters[0].source,
            ParameterSource::Binding(_)
        ));
    }

    #[test]
    fn test_attribute_mismatch_collects_all_errors() {
        let descriptor = descriptor(
            r#"[ { "name": "aPos", "location": 0 }, { "name": "aGhost", "location": 1 } ]"#,
            "[]",
        );
        let first = ProgramSurface {
            attributes: vec![var("aPos", 0x8B51, 1), var("aUv", 0x8B50, 1)],
            uniforms: vec![],
        };
        let second = ProgramSurface {
            attributes: vec![var("aPos", 0x8B52, 1)],
            uniforms: vec![],
        };

        let err = validate(&descriptor, &[first, second]).unwrap_err();
        let message = err.to_string();
        // One aggregate failure carrying every independent problem:
        // type mismatch, missing attribute, unbound attribute, stale binding.
        assert!(message.contains("does not match"));
        assert!(message.contains("missing attribute 'aUv'"));
        assert!(message.contains("'aUv' has no location binding"));
        assert!(message.contains("binding 'aGhost' matches no shader attribute"));
    }

    #[test]
    fn test_uniform_type_conflict_is_fatal() {
        let descriptor = descriptor(r#"[]"#, "[]");
        let first = ProgramSurface {
            attributes: vec![],
            uniforms: vec![var("uTint", 0x8B52, 1)],
        };
        let second = ProgramSurface {
            attributes: vec![],
            uniforms: vec![var("uTint", 0x8B51, 1)],
        };
        assert!(matches!(
            validate(&descriptor, &[first, second]),
            Err(CompilerError::ShaderValidation(_))
        ));
    }

    #[test]
    fn test_undeclared_uniform_synthesized_and_stale_parameter_dropped() {
        let descriptor = descriptor(
            r#"[]"#,
            r#"[ { "name": "uGone", "binding": "X" } ]"#,
        );
        let surface = ProgramSurface {
            attributes: vec![],
            uniforms: vec![var("uNew", 0x1406, 1)],
        };
        let validated = validate(&descriptor, &[surface.clone(), surface]).unwrap();

        assert_eq!(validated.parameters.len(), 1);
        assert_eq!(validated.parameters[0].name, "uNew");
        assert!(matches!(
            validated.parameters[0].source,
            ParameterSource::Synthesized
        ));
    }
}
