//! Atlas manifest parsing.
//!
//! The manifest declares images (individually or via wildcard paths)
//! nested in groups that layer default parameters, plus named
//! animations over the image set.

use crate::types::PixelFormat;
use serde::Deserialize;

/// The declarative atlas manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct AtlasManifest {
    /// Atlas-wide parameter defaults, lowest-priority layer.
    #[serde(default)]
    pub defaults: GroupParams,
    #[serde(default)]
    pub groups: Vec<ImageGroup>,
    #[serde(default)]
    pub animations: Vec<AnimationDecl>,
}

/// Parameters layered from atlas defaults through nested groups down to
/// single images; each level overrides only the fields it sets.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupParams {
    #[serde(default)]
    pub pixel_format: Option<PixelFormat>,
    #[serde(default)]
    pub scale: Option<f32>,
    /// Literal color to flood-replace with transparency.
    #[serde(default)]
    pub color_key: Option<[u8; 3]>,
    /// Pad content-bearing edges by one pixel for bilinear-safe sampling.
    #[serde(default)]
    pub smooth_edges: Option<bool>,
}

impl GroupParams {
    /// This layer's values over `base`'s.
    pub fn layered_over(&self, base: &GroupParams) -> GroupParams {
        GroupParams {
            pixel_format: self.pixel_format.or(base.pixel_format),
            scale: self.scale.or(base.scale),
            color_key: self.color_key.or(base.color_key),
            smooth_edges: self.smooth_edges.or(base.smooth_edges),
        }
    }
}

/// A group of image declarations sharing layered parameters. Groups
/// nest arbitrarily.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageGroup {
    #[serde(flatten)]
    pub params: GroupParams,
    #[serde(default)]
    pub images: Vec<ImageDecl>,
    #[serde(default)]
    pub groups: Vec<ImageGroup>,
}

/// One image declaration. The path may contain `*`/`?` wildcards, which
/// expand against the content folder sorted by file name.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageDecl {
    /// Atlas-unique image name; defaults to the file stem.
    #[serde(default)]
    pub name: Option<String>,
    pub path: String,
    #[serde(flatten)]
    pub params: GroupParams,
    #[serde(default)]
    pub reference_point: Option<PointSpec>,
    #[serde(default)]
    pub child_points: Vec<NamedPoint>,
}

/// How a reference or child point is found.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PointSpec {
    /// Literal pixel coordinates.
    Pixels { x: u32, y: u32 },
    /// Named anchor: "center", "top-left", "bottom", ...
    Anchor { anchor: String },
    /// Detect two adjacent pixels of this exact color, then erase every
    /// pixel of that color.
    Marker { marker: [u8; 3] },
}

/// A named attachment point.
#[derive(Debug, Clone, Deserialize)]
pub struct NamedPoint {
    pub name: String,
    #[serde(flatten)]
    pub spec: PointSpec,
}

/// An animation over atlas images: exact names or wildcard patterns
/// (wildcard matches are sorted by name).
#[derive(Debug, Clone, Deserialize)]
pub struct AnimationDecl {
    pub name: String,
    pub fps: f32,
    pub frames: Vec<String>,
}

/// Glob-style match supporting `*` (any run) and `?` (any one char).
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    // Iterative matcher with single-star backtracking.
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, t));
            p += 1;
        } else if let Some((sp, st)) = star {
            p = sp + 1;
            t = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}

/// Does the string contain wildcard metacharacters?
pub fn is_wildcard(text: &str) -> bool {
    text.contains('*') || text.contains('?')
}
