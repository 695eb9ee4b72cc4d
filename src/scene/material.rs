//! Material, effect and image library definitions.
//!
//! A material instances an effect and may override its parameters. The
//! effect carries exactly one shading technique nested under a profile;
//! parameters can be declared (and shadowed) at the material, effect,
//! profile and technique level, which is what the compiler's four-layer
//! texture indirection walks through.

use serde::Deserialize;

/// A material: an effect instance plus parameter overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct MaterialDef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// URL of the instanced effect.
    pub effect: String,
    /// Instance-level parameter overrides (highest-priority layer).
    #[serde(default)]
    pub params: Vec<EffectParam>,
}

/// An effect: parameters plus one profile.
#[derive(Debug, Clone, Deserialize)]
pub struct EffectDef {
    pub id: String,
    #[serde(default)]
    pub params: Vec<EffectParam>,
    pub profile: ProfileDef,
}

/// A profile: parameters plus exactly one shading technique.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileDef {
    #[serde(default)]
    pub params: Vec<EffectParam>,
    pub technique: TechniqueDef,
}

/// A shading technique: parameters plus the shading model channels.
#[derive(Debug, Clone, Deserialize)]
pub struct TechniqueDef {
    #[serde(default)]
    pub params: Vec<EffectParam>,
    pub shading: ShadingDef,
}

/// A named parameter usable from channel references.
#[derive(Debug, Clone, Deserialize)]
pub struct EffectParam {
    pub sid: String,
    pub value: ParamValueDef,
}

/// Parameter payloads.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamValueDef {
    Color([f32; 4]),
    Float(f32),
    /// Reference to an image library entry.
    Image(String),
}

/// Shading models. Constant parses but is rejected by the compiler, so
/// unsupported documents fail with a model name in the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadingModel {
    Blinn,
    Phong,
    Lambert,
    Constant,
}

/// Channel set of one shading technique.
#[derive(Debug, Clone, Deserialize)]
pub struct ShadingDef {
    pub model: ShadingModel,
    #[serde(default)]
    pub emission: Option<ChannelDef>,
    #[serde(default)]
    pub ambient: Option<ChannelDef>,
    #[serde(default)]
    pub diffuse: Option<ChannelDef>,
    #[serde(default)]
    pub specular: Option<ChannelDef>,
    #[serde(default)]
    pub shininess: Option<f32>,
    /// Normal-map channel; always texture-valued when present.
    #[serde(default)]
    pub bump: Option<ChannelDef>,
}

/// A channel value: a flat color, a texture reference (by parameter
/// sid), or a parameter reference to a color/float param.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelDef {
    Color([f32; 4]),
    Texture(String),
    Param(String),
}

/// An image library entry: a content-relative path to a texture file.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageDef {
    pub id: String,
    pub path: String,
}
