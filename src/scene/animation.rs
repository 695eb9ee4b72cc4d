//! Animation and clip library definitions.

use super::source::{UnsharedInput, ValueSource};
use serde::Deserialize;

/// An animation: channels plus nested child animations (authoring tools
/// group per-node animations under a parent).
#[derive(Debug, Clone, Deserialize)]
pub struct AnimationDef {
    pub id: String,
    #[serde(default)]
    pub sources: Vec<ValueSource>,
    #[serde(default)]
    pub channels: Vec<AnimChannelDef>,
    #[serde(default)]
    pub children: Vec<AnimationDef>,
}

/// One channel: keyframe inputs (INPUT = times, OUTPUT = 4x4 pose
/// matrices) targeting a scene node by URL.
#[derive(Debug, Clone, Deserialize)]
pub struct AnimChannelDef {
    /// URL of the targeted node.
    pub target: String,
    pub inputs: Vec<UnsharedInput>,
}

/// A clip: a named window over a list of already-declared animations.
#[derive(Debug, Clone, Deserialize)]
pub struct ClipDef {
    pub id: String,
    #[serde(default)]
    pub start: f32,
    #[serde(default)]
    pub end: f32,
    /// URLs of the animations the clip plays.
    pub animations: Vec<String>,
}
