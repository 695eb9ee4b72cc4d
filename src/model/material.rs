//! Material resolution.
//!
//! Each material instances an effect whose profile carries exactly one
//! shading technique (Blinn, Phong or Lambert). Channel values resolve
//! to concrete colors or image paths before compilation completes;
//! parameter references walk four scopes in priority order: instance
//! override, effect, profile, technique.

use crate::error::{CompilerError, Result};
use crate::scene::{
    ChannelDef, EffectParam, MaterialDef, ParamValueDef, SceneDocument, ShadingModel,
};
use crate::types::Color;

use super::types::{Material, MaterialFlags};

/// The four parameter scopes, highest priority first.
struct ParamScopes<'a> {
    layers: [&'a [EffectParam]; 4],
}

impl<'a> ParamScopes<'a> {
    fn lookup(&self, sid: &str) -> Option<&'a ParamValueDef> {
        for layer in &self.layers {
            if let Some(param) = layer.iter().find(|p| p.sid == sid) {
                return Some(&param.value);
            }
        }
        None
    }
}

/// Compile every declared material, in library order.
pub fn compile_materials(doc: &SceneDocument) -> Result<Vec<Material>> {
    doc.materials
        .iter()
        .map(|def| compile_material(doc, def))
        .collect()
}

/// The lazily-created material bound to unassigned geometry.
pub fn default_material(diffuse: Color) -> Material {
    Material {
        id: "default".to_string(),
        flags: MaterialFlags::empty(),
        emissive: Color::BLACK,
        ambient: Color::BLACK,
        diffuse,
        specular: Color::BLACK,
        shininess: 0.0,
        diffuse_texture: None,
        bump_texture: None,
    }
}

fn compile_material(doc: &SceneDocument, def: &MaterialDef) -> Result<Material> {
    let effect = doc.resolve_effect(&def.effect)?;
    let technique = &effect.profile.technique;
    let shading = &technique.shading;

    match shading.model {
        ShadingModel::Blinn | ShadingModel::Phong | ShadingModel::Lambert => {}
        other => {
            return Err(CompilerError::Material(format!(
                "effect '{}' uses unsupported shading model {other:?}",
                effect.id
            )))
        }
    }

    let scopes = ParamScopes {
        layers: [
            &def.params,
            &effect.params,
            &effect.profile.params,
            &technique.params,
        ],
    };

    let mut flags = MaterialFlags::empty();
    let emissive = resolve_color(&def.id, "emission", &shading.emission, &scopes, Color::BLACK)?;
    let ambient = resolve_color(&def.id, "ambient", &shading.ambient, &scopes, Color::BLACK)?;

    // Diffuse is the one channel that may be textured. A textured diffuse
    // forces the color to opaque white so the runtime modulation is a no-op.
    let (diffuse, diffuse_texture) = match &shading.diffuse {
        None => (Color::WHITE, None),
        Some(ChannelDef::Color(c)) => (Color::from_f32(*c), None),
        Some(ChannelDef::Texture(sid)) => {
            flags |= MaterialFlags::DIFFUSE_TEXTURE;
            (Color::WHITE, Some(resolve_texture(doc, &def.id, sid, &scopes)?))
        }
        Some(ChannelDef::Param(_)) => {
            return Err(CompilerError::Material(format!(
                "material '{}': diffuse must be a flat color or a texture",
                def.id
            )))
        }
    };

    // Lambert has no specular term; it mirrors the diffuse color with
    // zero shininess so the runtime lighting model stays uniform.
    let (specular, shininess) = if shading.model == ShadingModel::Lambert {
        (diffuse, 0.0)
    } else {
        (
            resolve_color(&def.id, "specular", &shading.specular, &scopes, Color::BLACK)?,
            shading.shininess.unwrap_or(0.0),
        )
    };

    let bump_texture = match &shading.bump {
        None => None,
        Some(ChannelDef::Texture(sid)) => {
            flags |= MaterialFlags::BUMP_TEXTURE;
            Some(resolve_texture(doc, &def.id, sid, &scopes)?)
        }
        Some(_) => {
            return Err(CompilerError::Material(format!(
                "material '{}': bump channel must be a texture",
                def.id
            )))
        }
    };

    Ok(Material {
        id: def.id.clone(),
        flags,
        emissive,
        ambient,
        diffuse,
        specular,
        shininess,
        diffuse_texture,
        bump_texture,
    })
}

fn resolve_color(
    material: &str,
    channel: &str,
    def: &Option<ChannelDef>,
    scopes: &ParamScopes,
    default: Color,
) -> Result<Color> {
    match def {
        None => Ok(default),
        Some(ChannelDef::Color(c)) => Ok(Color::from_f32(*c)),
        Some(ChannelDef::Param(sid)) => match scopes.lookup(sid) {
            Some(ParamValueDef::Color(c)) => Ok(Color::from_f32(*c)),
            Some(_) => Err(CompilerError::Material(format!(
                "material '{material}': {channel} parameter '{sid}' is not a color"
            ))),
            None => Err(CompilerError::Material(format!(
                "material '{material}': {channel} parameter '{sid}' not found in any scope"
            ))),
        },
        Some(ChannelDef::Texture(_)) => Err(CompilerError::Material(format!(
            "material '{material}': {channel} channel cannot be textured"
        ))),
    }
}

fn resolve_texture(
    doc: &SceneDocument,
    material: &str,
    sid: &str,
    scopes: &ParamScopes,
) -> Result<String> {
    match scopes.lookup(sid) {
        Some(ParamValueDef::Image(image)) => Ok(doc.resolve_image(image)?.path.clone()),
        Some(_) => Err(CompilerError::Material(format!(
            "material '{material}': texture parameter '{sid}' does not name an image"
        ))),
        None => Err(CompilerError::Material(format!(
            "material '{material}': texture parameter '{sid}' not found in any scope"
        ))),
    }
}
