//! Shader descriptor parsing.
//!
//! A descriptor declares render state (each section independently
//! apply-gated, so unset sections never override engine defaults),
//! attribute location bindings, one or more technique blocks and named
//! parameters.

use serde::Deserialize;

/// The parsed shader descriptor document.
#[derive(Debug, Clone, Deserialize)]
pub struct ShaderDescriptor {
    #[serde(default)]
    pub render_state: RenderStateDesc,
    #[serde(default)]
    pub attributes: Vec<AttributeBinding>,
    pub techniques: Vec<TechniqueDesc>,
    #[serde(default)]
    pub parameters: Vec<ParameterDesc>,
}

/// Render state; every section is optional and only applied when set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RenderStateDesc {
    #[serde(default)]
    pub color_mask: Option<ColorMaskDesc>,
    #[serde(default)]
    pub blend: Option<BlendDesc>,
    #[serde(default)]
    pub depth: Option<DepthDesc>,
    #[serde(default)]
    pub cull: Option<CullDesc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColorMaskDesc {
    #[serde(default = "enabled")]
    pub red: bool,
    #[serde(default = "enabled")]
    pub green: bool,
    #[serde(default = "enabled")]
    pub blue: bool,
    #[serde(default = "enabled")]
    pub alpha: bool,
}

fn enabled() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlendDesc {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_source_factor")]
    pub source: BlendFactor,
    #[serde(default = "default_dest_factor")]
    pub dest: BlendFactor,
}

fn default_source_factor() -> BlendFactor {
    BlendFactor::SrcAlpha
}

fn default_dest_factor() -> BlendFactor {
    BlendFactor::OneMinusSrcAlpha
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    DstColor,
    OneMinusDstColor,
}

impl BlendFactor {
    /// GL blend factor constant.
    pub fn code(self) -> u16 {
        match self {
            BlendFactor::Zero => 0x0000,
            BlendFactor::One => 0x0001,
            BlendFactor::SrcColor => 0x0300,
            BlendFactor::OneMinusSrcColor => 0x0301,
            BlendFactor::SrcAlpha => 0x0302,
            BlendFactor::OneMinusSrcAlpha => 0x0303,
            BlendFactor::DstAlpha => 0x0304,
            BlendFactor::OneMinusDstAlpha => 0x0305,
            BlendFactor::DstColor => 0x0306,
            BlendFactor::OneMinusDstColor => 0x0307,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DepthDesc {
    #[serde(default = "enabled")]
    pub test: bool,
    #[serde(default = "enabled")]
    pub write: bool,
    #[serde(default = "default_depth_function")]
    pub function: DepthFunction,
}

fn default_depth_function() -> DepthFunction {
    DepthFunction::LessEqual
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

impl DepthFunction {
    /// GL depth function constant.
    pub fn code(self) -> u16 {
        0x0200 + self as u16
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CullDesc {
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default = "default_cull_face")]
    pub face: CullFace,
}

fn default_cull_face() -> CullFace {
    CullFace::Back
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CullFace {
    Front,
    Back,
}

impl CullFace {
    pub fn code(self) -> u16 {
        match self {
            CullFace::Front => 0x0404,
            CullFace::Back => 0x0405,
        }
    }
}

/// Binds a vertex attribute name to a fixed location.
#[derive(Debug, Clone, Deserialize)]
pub struct AttributeBinding {
    pub name: String,
    pub location: u16,
}

/// One technique: platform/device gating plus the two shader stages.
#[derive(Debug, Clone, Deserialize)]
pub struct TechniqueDesc {
    pub name: String,
    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(default)]
    pub excluded_platforms: Vec<String>,
    #[serde(default)]
    pub devices: Vec<String>,
    #[serde(default)]
    pub excluded_devices: Vec<String>,
    pub vertex: SourceDesc,
    pub fragment: SourceDesc,
}

/// GLSL source, inlined or referenced by file.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SourceDesc {
    Inline { source: String },
    File { file: String },
}

/// A named parameter: bound to an engine global by name, or carrying a
/// literal initial value.
#[derive(Debug, Clone, Deserialize)]
pub struct ParameterDesc {
    pub name: String,
    #[serde(default)]
    pub binding: Option<String>,
    #[serde(default)]
    pub value: Option<LiteralValue>,
}

/// Literal parameter payloads.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LiteralValue {
    Int(i64),
    Float(f32),
    FloatArray(Vec<f32>),
}
