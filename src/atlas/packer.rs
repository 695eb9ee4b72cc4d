//! 2D bin packing.
//!
//! Two strategies share one placement core: a free-rectangle region.
//! The best-fit heuristic searches candidate sheet sizes and placement
//! orders and scores each trial; the power-of-two variant doubles a
//! fixed sheet until the whole group fits.

use crate::error::{CompilerError, Result};
use crate::types::PixelFormat;

use super::image::{AtlasImage, Surface};

/// Candidate sheet sizes are interpolated between the largest single
/// image dimension and the configured maximum in this many steps.
const SIZE_STEPS: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.w
            && other.x < self.x + self.w
            && self.y < other.y + other.h
            && other.y < self.y + self.h
    }

    /// Subtract `other`, returning the up-to-four fully-free strips left
    /// over.
    fn subtract(&self, other: &Rect) -> Vec<Rect> {
        if !self.intersects(other) {
            return vec![*self];
        }
        let mut out = Vec::new();
        // Left strip.
        if other.x > self.x {
            out.push(Rect {
                x: self.x,
                y: self.y,
                w: other.x - self.x,
                h: self.h,
            });
        }
        // Right strip.
        if other.x + other.w < self.x + self.w {
            out.push(Rect {
                x: other.x + other.w,
                y: self.y,
                w: self.x + self.w - (other.x + other.w),
                h: self.h,
            });
        }
        // Top strip.
        if other.y > self.y {
            out.push(Rect {
                x: self.x,
                y: self.y,
                w: self.w,
                h: other.y - self.y,
            });
        }
        // Bottom strip.
        if other.y + other.h < self.y + self.h {
            out.push(Rect {
                x: self.x,
                y: other.y + other.h,
                w: self.w,
                h: self.y + self.h - (other.y + other.h),
            });
        }
        out
    }
}

/// The free area of a sheet, as a set of (possibly overlapping)
/// fully-free rectangles. Placement takes the first rectangle whose
/// horizontal and vertical spans cover the image, then subtracts the
/// placed rectangle from every free rectangle.
pub struct Region {
    free: Vec<Rect>,
}

impl Region {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            free: vec![Rect {
                x: 0,
                y: 0,
                w: width,
                h: height,
            }],
        }
    }

    /// Place a w x h rectangle on the first fit, returning its position.
    pub fn place(&mut self, w: u32, h: u32) -> Option<(u32, u32)> {
        let slot = *self.free.iter().find(|r| r.w >= w && r.h >= h)?;
        let placed = Rect {
            x: slot.x,
            y: slot.y,
            w,
            h,
        };
        self.free = self
            .free
            .iter()
            .flat_map(|f| f.subtract(&placed))
            .collect();
        Some((placed.x, placed.y))
    }
}

/// Placement order for a packing trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    WidthDescending,
    HeightDescending,
}

/// One packed sheet.
#[derive(Debug)]
pub struct AtlasSheet {
    pub pixel_format: PixelFormat,
    pub width: u32,
    pub height: u32,
    /// Indices into the atlas's image list.
    pub images: Vec<usize>,
    pub surface: Surface,
}

/// Sort a trial's images by the given order; ties fall through the other
/// dimension and then the name, keeping trials deterministic.
fn sorted_for_trial(images: &[AtlasImage], group: &[usize], order: SortOrder) -> Vec<usize> {
    let mut sorted = group.to_vec();
    sorted.sort_by(|&a, &b| {
        let (ia, ib) = (&images[a], &images[b]);
        let key = |i: &AtlasImage| match order {
            SortOrder::WidthDescending => (i.surface.width, i.surface.height),
            SortOrder::HeightDescending => (i.surface.height, i.surface.width),
        };
        key(ib).cmp(&key(ia)).then_with(|| ia.name.cmp(&ib.name))
    });
    sorted
}

/// Greedily place as many of the group as fit on a w x h sheet.
fn try_place(
    images: &[AtlasImage],
    group: &[usize],
    width: u32,
    height: u32,
    order: SortOrder,
) -> Vec<(usize, u32, u32)> {
    let mut region = Region::new(width, height);
    let mut placed = Vec::new();
    for at in sorted_for_trial(images, group, order) {
        let image = &images[at];
        if let Some((x, y)) = region.place(image.surface.width, image.surface.height) {
            placed.push((at, x, y));
        }
    }
    placed
}

fn round_up_even(v: u32) -> u32 {
    v + (v & 1)
}

struct Candidate {
    width: u32,
    height: u32,
    order: SortOrder,
    placed: usize,
    score: f64,
}

/// Best-fit heuristic over a pixel-format group.
///
/// Repeatedly: score candidate sheet sizes under both placement orders,
/// keep the best (ties break toward the shorter diagonal), round the
/// chosen width up to even, redo the placement at the final size, commit
/// a sheet, and drop the placed images from the pool.
pub fn pack_best_fit(
    images: &mut [AtlasImage],
    group: Vec<usize>,
    format: PixelFormat,
    max_width: u32,
    max_height: u32,
    sheets: &mut Vec<AtlasSheet>,
) -> Result<()> {
    let mut pending = group;
    while !pending.is_empty() {
        let min_width = pending.iter().map(|&i| images[i].surface.width).max().unwrap_or(1);
        let min_height = pending.iter().map(|&i| images[i].surface.height).max().unwrap_or(1);
        if min_width > max_width || min_height > max_height {
            let culprit = pending
                .iter()
                .map(|&i| &images[i])
                .max_by_key(|i| i.surface.width.max(i.surface.height))
                .unwrap();
            return Err(CompilerError::AtlasPack(format!(
                "image '{}' ({}x{}) exceeds the maximum sheet size {max_width}x{max_height}",
                culprit.name, culprit.surface.width, culprit.surface.height
            )));
        }

        let mut best: Option<Candidate> = None;
        for wi in 0..SIZE_STEPS {
            for hi in 0..SIZE_STEPS {
                let width = lerp_dim(min_width, max_width, wi);
                let height = lerp_dim(min_height, max_height, hi);
                for order in [SortOrder::WidthDescending, SortOrder::HeightDescending] {
                    let placed = try_place(images, &pending, width, height, order);
                    if placed.is_empty() {
                        continue;
                    }
                    let used: u64 = placed
                        .iter()
                        .map(|&(i, _, _)| {
                            images[i].surface.width as u64 * images[i].surface.height as u64
                        })
                        .sum();
                    let score = 0.5 * (used as f64 / (width as f64 * height as f64))
                        + 0.5 * (placed.len() as f64 / pending.len() as f64);

                    let diagonal = width as u64 * width as u64 + height as u64 * height as u64;
                    let better = match &best {
                        None => true,
                        Some(b) => {
                            score > b.score
                                || (score == b.score
                                    && diagonal
                                        < b.width as u64 * b.width as u64
                                            + b.height as u64 * b.height as u64)
                        }
                    };
                    if better {
                        best = Some(Candidate {
                            width,
                            height,
                            order,
                            placed: placed.len(),
                            score,
                        });
                    }
                }
            }
        }

        let best = best.ok_or_else(|| {
            CompilerError::AtlasPack(format!(
                "no image of the group could be placed at {max_width}x{max_height}"
            ))
        })?;
        debug_assert!(best.placed > 0);

        // Hardware alignment: final width is rounded up to even, then the
        // placement rerun at the final size yields the real coordinates.
        let final_width = round_up_even(best.width);
        let final_height = round_up_even(best.height);
        let placements = try_place(images, &pending, final_width, final_height, best.order);

        let sheet = sheets.len();
        let mut members = Vec::with_capacity(placements.len());
        for (at, x, y) in placements {
            images[at].sheet = sheet;
            images[at].position = (x, y);
            members.push(at);
            pending.retain(|&p| p != at);
        }
        sheets.push(AtlasSheet {
            pixel_format: format,
            width: final_width,
            height: final_height,
            images: members,
            surface: Surface::default(),
        });
    }
    Ok(())
}

fn lerp_dim(min: u32, max: u32, step: u32) -> u32 {
    let min = min.min(max);
    min + ((max - min) as u64 * step as u64 / (SIZE_STEPS as u64 - 1)) as u32
}

/// Power-of-two doubling over a fixed group: one sheet holds the whole
/// group, doubling the smaller dimension on each failed fit (both sort
/// orders tried at every size). Exceeding the maximum is fatal; a
/// committed sheet under 50% utilisation warns.
pub fn pack_power_of_two(
    images: &mut [AtlasImage],
    group: Vec<usize>,
    format: PixelFormat,
    min_size: u32,
    max_width: u32,
    max_height: u32,
    sheets: &mut Vec<AtlasSheet>,
) -> Result<()> {
    if group.is_empty() {
        return Ok(());
    }
    let mut width = min_size.max(2).next_power_of_two();
    let mut height = width;

    loop {
        if width > max_width || height > max_height {
            return Err(CompilerError::AtlasPack(format!(
                "group of {} images does not fit a {max_width}x{max_height} sheet",
                group.len()
            )));
        }

        for order in [SortOrder::WidthDescending, SortOrder::HeightDescending] {
            let placed = try_place(images, &group, width, height, order);
            if placed.len() != group.len() {
                continue;
            }

            let used: u64 = placed
                .iter()
                .map(|&(i, _, _)| images[i].surface.width as u64 * images[i].surface.height as u64)
                .sum();
            let usage = used as f64 / (width as f64 * height as f64);
            if usage < 0.5 {
                log::warn!(
                    "sheet utilisation {:.0}% below 50% for {width}x{height} sheet",
                    usage * 100.0
                );
            }

            let sheet = sheets.len();
            let mut members = Vec::with_capacity(placed.len());
            for (at, x, y) in placed {
                images[at].sheet = sheet;
                images[at].position = (x, y);
                members.push(at);
            }
            sheets.push(AtlasSheet {
                pixel_format: format,
                width,
                height,
                images: members,
                surface: Surface::default(),
            });
            return Ok(());
        }

        if width <= height {
            width *= 2;
        } else {
            height *= 2;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PixelFormat;

    fn image(name: &str, w: u32, h: u32) -> AtlasImage {
        AtlasImage {
            name: name.to_string(),
            pixel_format: PixelFormat::Rgba8888,
            width: w,
            height: h,
            cropped_offset: (0, 0),
            cropped_width: w,
            cropped_height: h,
            padding: (0, 0, 0, 0),
            reference_point: [0.0, 0.0],
            child_points: Vec::new(),
            surface: Surface::new(w, h),
            sheet: 0,
            position: (0, 0),
            uv_top_left: [0.0, 0.0],
            uv_bottom_right: [0.0, 0.0],
        }
    }

    fn overlaps(a: (u32, u32, u32, u32), b: (u32, u32, u32, u32)) -> bool {
        a.0 < b.0 + b.2 && b.0 < a.0 + a.2 && a.1 < b.1 + b.3 && b.1 < a.1 + a.3
    }

    #[test]
    fn test_region_subtracts_placements() {
        let mut region = Region::new(10, 10);
        let a = region.place(6, 10).unwrap();
        let b = region.place(4, 4).unwrap();
        assert_eq!(a, (0, 0));
        assert_eq!(b, (6, 0));
        // Nothing 5-wide is left.
        assert!(region.place(5, 5).is_none());
        assert!(region.place(4, 6).is_some());
    }

    #[test]
    fn test_best_fit_places_every_image_without_overlap() {
        let mut images = vec![
            image("a", 64, 64),
            image("b", 32, 32),
            image("c", 16, 16),
        ];
        let mut sheets = Vec::new();
        pack_best_fit(&mut images, vec![0, 1, 2], PixelFormat::Rgba5551, 256, 256, &mut sheets)
            .unwrap();

        // All three land on one sheet at least as large as the biggest
        // image, with an even width.
        assert_eq!(sheets.len(), 1);
        assert!(sheets[0].width >= 64 && sheets[0].height >= 64);
        assert_eq!(sheets[0].width % 2, 0);
        assert_eq!(sheets[0].images.len(), 3);

        for i in 0..images.len() {
            let a = &images[i];
            assert!(a.position.0 + a.surface.width <= sheets[a.sheet].width);
            assert!(a.position.1 + a.surface.height <= sheets[a.sheet].height);
            for b in &images[i + 1..] {
                if a.sheet == b.sheet {
                    assert!(
                        !overlaps(
                            (a.position.0, a.position.1, a.surface.width, a.surface.height),
                            (b.position.0, b.position.1, b.surface.width, b.surface.height)
                        ),
                        "{} overlaps {}",
                        a.name,
                        b.name
                    );
                }
            }
        }
    }

    #[test]
    fn test_best_fit_spills_to_multiple_sheets() {
        // Four 60x60 images cannot share one 100x100 sheet.
        let mut images = vec![
            image("a", 60, 60),
            image("b", 60, 60),
            image("c", 60, 60),
            image("d", 60, 60),
        ];
        let mut sheets = Vec::new();
        pack_best_fit(
            &mut images,
            vec![0, 1, 2, 3],
            PixelFormat::Rgba8888,
            100,
            100,
            &mut sheets,
        )
        .unwrap();

        assert!(sheets.len() > 1);
        let total: usize = sheets.iter().map(|s| s.images.len()).sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn test_oversized_image_is_fatal() {
        let mut images = vec![image("huge", 300, 10)];
        let mut sheets = Vec::new();
        let result = pack_best_fit(
            &mut images,
            vec![0],
            PixelFormat::Rgba8888,
            256,
            256,
            &mut sheets,
        );
        assert!(matches!(result, Err(CompilerError::AtlasPack(_))));
    }

    #[test]
    fn test_power_of_two_doubles_until_fit() {
        let mut images = vec![
            image("a", 40, 40),
            image("b", 40, 40),
            image("c", 40, 40),
        ];
        let mut sheets = Vec::new();
        pack_power_of_two(
            &mut images,
            vec![0, 1, 2],
            PixelFormat::Rgba8888,
            64,
            512,
            512,
            &mut sheets,
        )
        .unwrap();

        assert_eq!(sheets.len(), 1);
        assert!(sheets[0].width.is_power_of_two());
        assert!(sheets[0].height.is_power_of_two());
        assert_eq!(sheets[0].images.len(), 3);
    }

    #[test]
    fn test_power_of_two_over_max_is_fatal() {
        let mut images = vec![image("a", 100, 100), image("b", 100, 100)];
        let mut sheets = Vec::new();
        let result = pack_power_of_two(
            &mut images,
            vec![0, 1],
            PixelFormat::Rgba8888,
            64,
            128,
            128,
            &mut sheets,
        );
        assert!(matches!(result, Err(CompilerError::AtlasPack(_))));
    }
}
