//! The texture atlas packer.
//!
//! Consumes a declarative image/animation manifest, preprocesses each
//! image, groups by target pixel format, bin-packs each group into
//! sheets and emits a binary atlas manifest plus one packed PNG per
//! sheet.

pub mod image;
pub mod manifest;
pub mod packer;
pub mod writer;

pub use image::{AtlasImage, Surface};
pub use manifest::{AtlasManifest, ImageDecl};
pub use packer::AtlasSheet;

use crate::build::{BuildContext, CancelToken, ParameterBag};
use crate::error::{CompilerError, Result};
use crate::types::PixelFormat;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use manifest::{is_wildcard, wildcard_match, GroupParams};
use self::image::EffectiveParams;

/// Which bin-packing policy an atlas build uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackingStrategy {
    BestFit,
    PowerOfTwo,
}

/// Atlas-compiler configuration, read from the build parameter bag.
#[derive(Debug, Clone)]
pub struct AtlasConfig {
    pub max_sheet_width: u32,
    pub max_sheet_height: u32,
    pub min_sheet_size: u32,
    pub force_32_bit: bool,
    pub global_scale: f32,
    pub strategy: PackingStrategy,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            max_sheet_width: 1024,
            max_sheet_height: 1024,
            min_sheet_size: 64,
            force_32_bit: false,
            global_scale: 1.0,
            strategy: PackingStrategy::BestFit,
        }
    }
}

impl AtlasConfig {
    pub fn from_params(params: &ParameterBag) -> Result<Self> {
        let defaults = Self::default();
        let strategy = match params.get_str("Packing", "best-fit") {
            "best-fit" => PackingStrategy::BestFit,
            "power-of-two" => PackingStrategy::PowerOfTwo,
            other => {
                return Err(CompilerError::InvalidScalar(format!(
                    "unknown Packing strategy '{other}' (expected 'best-fit' or 'power-of-two')"
                )))
            }
        };
        Ok(Self {
            max_sheet_width: params.get_int("Max Sheet Width", defaults.max_sheet_width as i64) as u32,
            max_sheet_height: params.get_int("Max Sheet Height", defaults.max_sheet_height as i64) as u32,
            min_sheet_size: params.get_int("Min Sheet Size", defaults.min_sheet_size as i64) as u32,
            force_32_bit: params.get_bool("Force 32-Bit", false),
            global_scale: params.get_float("Scale", 1.0),
            strategy,
        })
    }
}

/// A compiled animation: resolved image indices in playback order.
#[derive(Debug, Clone)]
pub struct CompiledAnimation {
    pub name: String,
    pub fps: f32,
    pub images: Vec<usize>,
}

/// The compiled atlas: images with final placements, composited sheets
/// and resolved animations.
#[derive(Debug)]
pub struct CompiledAtlas {
    pub images: Vec<AtlasImage>,
    pub sheets: Vec<AtlasSheet>,
    pub animations: Vec<CompiledAnimation>,
}

/// The atlas compiler entry point.
pub struct AtlasCompiler;

impl AtlasCompiler {
    /// Process one manifest into a binary atlas plus its sheet images.
    pub fn process(ctx: &mut BuildContext) -> Result<()> {
        let config = AtlasConfig::from_params(&ctx.params)?;
        let text = std::fs::read_to_string(ctx.input_path())?;
        let manifest: AtlasManifest = serde_json::from_str(&text)?;

        let atlas = Self::compile(&manifest, &config, &ctx.content_root, &ctx.cancel)?;

        // Serialise everything before the first write so a failure or
        // cancellation leaves no partial output.
        let binary = writer::write_atlas(&atlas)?;
        let mut sheet_files = Vec::with_capacity(atlas.sheets.len());
        for (at, sheet) in atlas.sheets.iter().enumerate() {
            sheet_files.push((sheet_path(&ctx.output_path("atlas"), at), sheet.surface.to_png()?));
        }
        ctx.cancel.check()?;

        ctx.write_output(&ctx.output_path("atlas"), &binary)?;
        for (path, bytes) in &sheet_files {
            ctx.write_output(path, bytes)?;
        }
        Ok(())
    }

    /// Compile a manifest without touching the output folder.
    pub fn compile(
        manifest: &AtlasManifest,
        config: &AtlasConfig,
        content_root: &Path,
        cancel: &CancelToken,
    ) -> Result<CompiledAtlas> {
        cancel.check()?;
        let images = load_images(manifest, config, content_root, cancel)?;
        cancel.check()?;

        let mut atlas = CompiledAtlas {
            images,
            sheets: Vec::new(),
            animations: Vec::new(),
        };
        pack(&mut atlas, config)?;
        cancel.check()?;
        composite(&mut atlas);
        atlas.animations = resolve_animations(manifest, &atlas.images)?;
        Ok(atlas)
    }
}

/// Sheet images live alongside the atlas: `hud.atlas` -> `hud_0.png`.
fn sheet_path(atlas_path: &Path, sheet: usize) -> PathBuf {
    let stem = atlas_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    atlas_path.with_file_name(format!("{stem}_{sheet}.png"))
}

/// Walk the group tree layering parameters, expand wildcard paths and
/// preprocess every declared image. Names must be atlas-unique.
fn load_images(
    manifest: &AtlasManifest,
    config: &AtlasConfig,
    content_root: &Path,
    cancel: &CancelToken,
) -> Result<Vec<AtlasImage>> {
    let mut images = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    fn walk(
        groups: &[manifest::ImageGroup],
        inherited: &GroupParams,
        config: &AtlasConfig,
        content_root: &Path,
        cancel: &CancelToken,
        seen: &mut HashSet<String>,
        images: &mut Vec<AtlasImage>,
    ) -> Result<()> {
        for group in groups {
            let layered = group.params.layered_over(inherited);
            for decl in &group.images {
                cancel.check()?;
                load_declared(decl, &layered, config, content_root, seen, images)?;
            }
            walk(&group.groups, &layered, config, content_root, cancel, seen, images)?;
        }
        Ok(())
    }

    walk(
        &manifest.groups,
        &manifest.defaults,
        config,
        content_root,
        cancel,
        &mut seen,
        &mut images,
    )?;
    Ok(images)
}

fn load_declared(
    decl: &ImageDecl,
    inherited: &GroupParams,
    config: &AtlasConfig,
    content_root: &Path,
    seen: &mut HashSet<String>,
    images: &mut Vec<AtlasImage>,
) -> Result<()> {
    let params = decl.params.layered_over(inherited);
    let mut effective = EffectiveParams {
        pixel_format: params.pixel_format.unwrap_or_default(),
        scale: params.scale.unwrap_or(1.0),
        color_key: params.color_key,
        smooth_edges: params.smooth_edges.unwrap_or(true),
    };
    if config.force_32_bit {
        effective.pixel_format = effective.pixel_format.forced_32_bit();
    }

    for (name, path) in expand_path(decl, content_root)? {
        if !seen.insert(name.clone()) {
            return Err(CompilerError::Atlas(format!(
                "duplicate atlas image name '{name}'"
            )));
        }
        let data = std::fs::read(&path)?;
        let surface = self::image::decode_surface(&data)?;
        images.push(self::image::preprocess(
            name,
            surface,
            &effective,
            decl.reference_point.as_ref(),
            &decl.child_points,
            config.global_scale,
        )?);
    }
    Ok(())
}

/// Expand one declaration into (name, absolute path) pairs. A wildcard
/// path expands against its parent folder sorted by file name, each file
/// named by its stem; a literal path yields one entry named by the
/// declaration (or its stem).
fn expand_path(decl: &ImageDecl, content_root: &Path) -> Result<Vec<(String, PathBuf)>> {
    let declared = Path::new(&decl.path);
    if !is_wildcard(&decl.path) {
        let name = decl.name.clone().unwrap_or_else(|| file_stem(declared));
        return Ok(vec![(name, content_root.join(declared))]);
    }

    let pattern = declared
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    let folder = content_root.join(declared.parent().unwrap_or_else(|| Path::new("")));

    let mut matches = Vec::new();
    for entry in std::fs::read_dir(&folder)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if wildcard_match(&pattern, &file_name) {
            matches.push((file_stem(Path::new(&file_name)), entry.path()));
        }
    }
    if matches.is_empty() {
        return Err(CompilerError::Atlas(format!(
            "wildcard path '{}' matched no files",
            decl.path
        )));
    }
    matches.sort();
    Ok(matches)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Group images by effective pixel format (first-seen order) and pack
/// each group with the configured strategy.
fn pack(atlas: &mut CompiledAtlas, config: &AtlasConfig) -> Result<()> {
    let mut formats: Vec<PixelFormat> = Vec::new();
    for image in &atlas.images {
        if !formats.contains(&image.pixel_format) {
            formats.push(image.pixel_format);
        }
    }

    for format in formats {
        let group: Vec<usize> = atlas
            .images
            .iter()
            .enumerate()
            .filter(|(_, i)| i.pixel_format == format)
            .map(|(at, _)| at)
            .collect();
        match config.strategy {
            PackingStrategy::BestFit => packer::pack_best_fit(
                &mut atlas.images,
                group,
                format,
                config.max_sheet_width,
                config.max_sheet_height,
                &mut atlas.sheets,
            )?,
            PackingStrategy::PowerOfTwo => packer::pack_power_of_two(
                &mut atlas.images,
                group,
                format,
                config.min_sheet_size,
                config.max_sheet_width,
                config.max_sheet_height,
                &mut atlas.sheets,
            )?,
        }
    }
    Ok(())
}

/// Blit every placed image into its sheet surface and derive the
/// normalized texture coordinates of the content rectangle (padding
/// excluded).
fn composite(atlas: &mut CompiledAtlas) {
    for sheet in &mut atlas.sheets {
        sheet.surface = Surface::new(sheet.width, sheet.height);
        for &at in &sheet.images {
            let image = &atlas.images[at];
            sheet.surface.blit(&image.surface, image.position.0, image.position.1);
        }
        for &at in &sheet.images {
            let image = &mut atlas.images[at];
            let (left, top, _, _) = image.padding;
            let x = (image.position.0 + left) as f32;
            let y = (image.position.1 + top) as f32;
            image.uv_top_left = [x / sheet.width as f32, y / sheet.height as f32];
            image.uv_bottom_right = [
                (x + image.cropped_width as f32) / sheet.width as f32,
                (y + image.cropped_height as f32) / sheet.height as f32,
            ];
        }
    }
}

/// Resolve animation frame lists. Exact names must exist; wildcard
/// patterns expand to their matches sorted by name (empty matches warn).
fn resolve_animations(
    manifest: &AtlasManifest,
    images: &[AtlasImage],
) -> Result<Vec<CompiledAnimation>> {
    let mut animations = Vec::with_capacity(manifest.animations.len());
    for decl in &manifest.animations {
        let mut frames = Vec::new();
        for pattern in &decl.frames {
            if is_wildcard(pattern) {
                let mut matched: Vec<usize> = images
                    .iter()
                    .enumerate()
                    .filter(|(_, i)| wildcard_match(pattern, &i.name))
                    .map(|(at, _)| at)
                    .collect();
                if matched.is_empty() {
                    log::warn!(
                        "animation '{}': pattern '{pattern}' matched no images",
                        decl.name
                    );
                }
                matched.sort_by(|&a, &b| images[a].name.cmp(&images[b].name));
                frames.extend(matched);
            } else {
                let at = images.iter().position(|i| i.name == *pattern).ok_or_else(|| {
                    CompilerError::UnresolvedReference(format!(
                        "animation '{}' references unknown image '{pattern}'",
                        decl.name
                    ))
                })?;
                frames.push(at);
            }
        }
        animations.push(CompiledAnimation {
            name: decl.name.clone(),
            fps: decl.fps,
            images: frames,
        });
    }
    Ok(animations)
}
