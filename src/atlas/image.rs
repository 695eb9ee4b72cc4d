//! Atlas image loading and preprocessing.
//!
//! Per image, in order: decode, reference/child point extraction (marker
//! pixels are erased), color-key replacement, edge-content detection,
//! capped bilinear scaling, transparency crop, then the edge-padding
//! expansion. Reference and child points are normalized (0..1) against
//! the post-scale, pre-crop dimensions.

use crate::error::{CompilerError, Result};
use crate::types::PixelFormat;
use image::ImageEncoder;

use super::manifest::{NamedPoint, PointSpec};

/// A raw RGBA8 pixel surface.
#[derive(Debug, Clone, Default)]
pub struct Surface {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Surface {
    /// A transparent surface of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; (width * height * 4) as usize],
        }
    }

    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), (width * height * 4) as usize);
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let at = ((y * self.width + x) * 4) as usize;
        [
            self.pixels[at],
            self.pixels[at + 1],
            self.pixels[at + 2],
            self.pixels[at + 3],
        ]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        let at = ((y * self.width + x) * 4) as usize;
        self.pixels[at..at + 4].copy_from_slice(&rgba);
    }

    /// Copy `src` into this surface with its top-left at (x, y).
    pub fn blit(&mut self, src: &Surface, x: u32, y: u32) {
        for sy in 0..src.height {
            for sx in 0..src.width {
                self.set_pixel(x + sx, y + sy, src.get_pixel(sx, sy));
            }
        }
    }

    /// Sub-rectangle copy.
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Surface {
        let mut out = Surface::new(width, height);
        for sy in 0..height {
            for sx in 0..width {
                out.set_pixel(sx, sy, self.get_pixel(x + sx, y + sy));
            }
        }
        out
    }

    /// Bilinear resize via the image codec.
    pub fn resized(&self, width: u32, height: u32) -> Result<Surface> {
        let buffer = image::RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
            .ok_or_else(|| CompilerError::Atlas("surface buffer size mismatch".to_string()))?;
        let resized =
            image::imageops::resize(&buffer, width, height, image::imageops::FilterType::Triangle);
        Ok(Surface::from_rgba(width, height, resized.into_raw()))
    }

    /// Encode as PNG bytes.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        let cursor = std::io::Cursor::new(&mut bytes);
        let encoder = image::codecs::png::PngEncoder::new(cursor);
        encoder
            .write_image(
                &self.pixels,
                self.width,
                self.height,
                image::ExtendedColorType::Rgba8,
            )
            .map_err(|e| CompilerError::Atlas(format!("failed to encode PNG: {e}")))?;
        Ok(bytes)
    }
}

/// Decode PNG bytes into a surface.
pub fn decode_surface(data: &[u8]) -> Result<Surface> {
    let decoded = image::load_from_memory(data)?.to_rgba8();
    let (width, height) = decoded.dimensions();
    Ok(Surface::from_rgba(width, height, decoded.into_raw()))
}

/// Effective per-image parameters after layering.
#[derive(Debug, Clone)]
pub struct EffectiveParams {
    pub pixel_format: PixelFormat,
    pub scale: f32,
    pub color_key: Option<[u8; 3]>,
    pub smooth_edges: bool,
}

/// One processed atlas image, mutated by the packer and read-only after
/// the write stage.
#[derive(Debug, Clone)]
pub struct AtlasImage {
    pub name: String,
    pub pixel_format: PixelFormat,
    /// Full (post-scale) dimensions before cropping.
    pub width: u32,
    pub height: u32,
    pub cropped_offset: (u32, u32),
    pub cropped_width: u32,
    pub cropped_height: u32,
    /// 1px padding applied per edge: left, top, right, bottom.
    pub padding: (u32, u32, u32, u32),
    /// Normalized (0..1) pivot.
    pub reference_point: [f32; 2],
    /// Normalized named attachment points.
    pub child_points: Vec<(String, [f32; 2])>,
    /// Cropped-and-padded pixels; what the packer places and blits.
    pub surface: Surface,
    /// Owning sheet, assigned by the packer.
    pub sheet: usize,
    /// Placement within the sheet, assigned by the packer.
    pub position: (u32, u32),
    pub uv_top_left: [f32; 2],
    pub uv_bottom_right: [f32; 2],
}

/// Run the preprocessing pipeline over one decoded image.
pub fn preprocess(
    name: String,
    mut surface: Surface,
    params: &EffectiveParams,
    reference_point: Option<&PointSpec>,
    child_points: &[NamedPoint],
    global_scale: f32,
) -> Result<AtlasImage> {
    // Points first: marker detection reads (and erases) original pixels.
    let reference = match reference_point {
        Some(spec) => resolve_point(&name, &mut surface, spec)?,
        None => [0.0, 0.0],
    };
    let mut children = Vec::with_capacity(child_points.len());
    for point in child_points {
        children.push((point.name.clone(), resolve_point(&name, &mut surface, &point.spec)?));
    }

    if let Some(key) = params.color_key {
        apply_color_key(&mut surface, key);
    }

    // Decide per-edge padding before scaling blurs the borders.
    let padding = if params.smooth_edges {
        edge_padding(&surface)
    } else {
        (0, 0, 0, 0)
    };

    let scale = (params.scale * global_scale).min(1.0);
    if scale < 1.0 {
        let width = ((surface.width as f32 * scale).round() as u32).max(1);
        let height = ((surface.height as f32 * scale).round() as u32).max(1);
        surface = surface.resized(width, height)?;
    }

    let (width, height) = (surface.width, surface.height);
    let (offset, cropped) = match content_bounds(&surface) {
        Some((x0, y0, x1, y1)) => (
            (x0, y0),
            surface.crop(x0, y0, x1 - x0 + 1, y1 - y0 + 1),
        ),
        None => {
            log::warn!("atlas image '{name}' is entirely transparent; skipping crop");
            ((0, 0), surface)
        }
    };

    let (cropped_width, cropped_height) = (cropped.width, cropped.height);
    let (left, top, right, bottom) = padding;
    let padded = if padding == (0, 0, 0, 0) {
        cropped
    } else {
        let mut padded = Surface::new(cropped_width + left + right, cropped_height + top + bottom);
        padded.blit(&cropped, left, top);
        smooth_padding(&mut padded, left, top, cropped_width, cropped_height);
        padded
    };

    Ok(AtlasImage {
        name,
        pixel_format: params.pixel_format,
        width,
        height,
        cropped_offset: offset,
        cropped_width,
        cropped_height,
        padding,
        reference_point: reference,
        child_points: children,
        surface: padded,
        sheet: 0,
        position: (0, 0),
        uv_top_left: [0.0, 0.0],
        uv_bottom_right: [0.0, 0.0],
    })
}

/// Resolve a point spec to normalized coordinates.
fn resolve_point(name: &str, surface: &mut Surface, spec: &PointSpec) -> Result<[f32; 2]> {
    match spec {
        PointSpec::Pixels { x, y } => Ok([
            *x as f32 / surface.width.max(1) as f32,
            *y as f32 / surface.height.max(1) as f32,
        ]),
        PointSpec::Anchor { anchor } => anchor_point(anchor).ok_or_else(|| {
            CompilerError::Atlas(format!("image '{name}': unknown anchor '{anchor}'"))
        }),
        PointSpec::Marker { marker } => {
            let found = find_marker(surface, *marker).ok_or_else(|| {
                CompilerError::Atlas(format!(
                    "image '{name}': marker color {marker:?} not found as two adjacent pixels"
                ))
            })?;
            erase_color(surface, *marker);
            Ok([
                found.0 as f32 / surface.width.max(1) as f32,
                found.1 as f32 / surface.height.max(1) as f32,
            ])
        }
    }
}

/// Named anchors: horizontal in {left, center, right}, vertical in
/// {top, center, bottom}, combined as "top-left" etc. or alone.
fn anchor_point(anchor: &str) -> Option<[f32; 2]> {
    let mut x = None;
    let mut y = None;
    for part in anchor.split('-') {
        match part {
            "left" => x = Some(0.0),
            "right" => x = Some(1.0),
            "top" => y = Some(0.0),
            "bottom" => y = Some(1.0),
            "center" => {}
            _ => return None,
        }
    }
    Some([x.unwrap_or(0.5), y.unwrap_or(0.5)])
}

/// Find the first pair of horizontally-adjacent pixels of the marker
/// color, scanning rows top to bottom.
fn find_marker(surface: &Surface, marker: [u8; 3]) -> Option<(u32, u32)> {
    for y in 0..surface.height {
        for x in 0..surface.width.saturating_sub(1) {
            let a = surface.get_pixel(x, y);
            let b = surface.get_pixel(x + 1, y);
            if a[..3] == marker && a[3] == 255 && b[..3] == marker && b[3] == 255 {
                return Some((x, y));
            }
        }
    }
    None
}

fn erase_color(surface: &mut Surface, color: [u8; 3]) {
    for y in 0..surface.height {
        for x in 0..surface.width {
            let p = surface.get_pixel(x, y);
            if p[..3] == color && p[3] == 255 {
                surface.set_pixel(x, y, [0, 0, 0, 0]);
            }
        }
    }
}

fn apply_color_key(surface: &mut Surface, key: [u8; 3]) {
    erase_color(surface, key);
}

/// Tight bounds of non-transparent content, or None if fully transparent.
fn content_bounds(surface: &Surface) -> Option<(u32, u32, u32, u32)> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for y in 0..surface.height {
        for x in 0..surface.width {
            if surface.get_pixel(x, y)[3] > 0 {
                bounds = Some(match bounds {
                    None => (x, y, x, y),
                    Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                });
            }
        }
    }
    bounds
}

/// Per-edge 1px padding decision: pad an edge when any pixel on that
/// border is non-transparent (otherwise bilinear sampling would bleed a
/// neighboring sprite in).
fn edge_padding(surface: &Surface) -> (u32, u32, u32, u32) {
    if surface.width == 0 || surface.height == 0 {
        return (0, 0, 0, 0);
    }
    let column = |x: u32| (0..surface.height).any(|y| surface.get_pixel(x, y)[3] > 0);
    let row = |y: u32| (0..surface.width).any(|x| surface.get_pixel(x, y)[3] > 0);
    (
        column(0) as u32,
        row(0) as u32,
        column(surface.width - 1) as u32,
        row(surface.height - 1) as u32,
    )
}

/// Fill padding pixels with the adjacent edge color at zero alpha, so
/// bilinear filtering blends toward the edge color instead of black.
fn smooth_padding(surface: &mut Surface, left: u32, top: u32, content_w: u32, content_h: u32) {
    for y in 0..surface.height {
        for x in 0..surface.width {
            let inside_x = x >= left && x < left + content_w;
            let inside_y = y >= top && y < top + content_h;
            if inside_x && inside_y {
                continue;
            }
            let sx = x.clamp(left, left + content_w - 1);
            let sy = y.clamp(top, top + content_h - 1);
            let [r, g, b, _] = surface.get_pixel(sx, sy);
            surface.set_pixel(x, y, [r, g, b, 0]);
        }
    }
}
