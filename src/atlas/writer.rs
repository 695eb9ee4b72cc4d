//! Binary atlas manifest serialisation.
//!
//! Little-endian: sheet table, image table, animation table. Sheet
//! pixels are not embedded here; each sheet is written as a codec-native
//! PNG alongside the manifest.

use crate::binio::{count_u16, write_f32, write_str, write_u16, write_u8, write_vec2};
use crate::error::Result;

use super::CompiledAtlas;

pub fn write_atlas(atlas: &CompiledAtlas) -> Result<Vec<u8>> {
    let mut out = Vec::new();

    write_u16(&mut out, count_u16(atlas.sheets.len(), "sheet")?)?;
    for sheet in &atlas.sheets {
        write_u16(&mut out, count_u16(sheet.width as usize, "sheet width")?)?;
        write_u16(&mut out, count_u16(sheet.height as usize, "sheet height")?)?;
        write_u8(&mut out, sheet.pixel_format.code())?;
    }

    write_u16(&mut out, count_u16(atlas.images.len(), "image")?)?;
    for image in &atlas.images {
        write_str(&mut out, &image.name)?;
        write_u16(&mut out, image.sheet as u16)?;
        write_u16(&mut out, count_u16(image.width as usize, "image width")?)?;
        write_u16(&mut out, count_u16(image.height as usize, "image height")?)?;
        write_u16(&mut out, count_u16(image.cropped_width as usize, "cropped width")?)?;
        write_u16(&mut out, count_u16(image.cropped_height as usize, "cropped height")?)?;
        write_u16(&mut out, count_u16(image.cropped_offset.0 as usize, "cropped offset")?)?;
        write_u16(&mut out, count_u16(image.cropped_offset.1 as usize, "cropped offset")?)?;
        write_vec2(&mut out, image.uv_top_left)?;
        write_vec2(&mut out, image.uv_bottom_right)?;
        write_vec2(&mut out, image.reference_point)?;
        write_u16(&mut out, count_u16(image.child_points.len(), "child point")?)?;
        for (_, point) in &image.child_points {
            write_vec2(&mut out, *point)?;
        }
    }

    write_u16(&mut out, count_u16(atlas.animations.len(), "animation")?)?;
    for animation in &atlas.animations {
        write_str(&mut out, &animation.name)?;
        write_f32(&mut out, animation.fps)?;
        write_u16(&mut out, count_u16(animation.images.len(), "animation frame")?)?;
        for &image in &animation.images {
            write_u16(&mut out, image as u16)?;
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::super::image::Surface;
    use super::super::packer::AtlasSheet;
    use super::super::{AtlasImage, CompiledAnimation, CompiledAtlas};
    use super::*;
    use crate::types::PixelFormat;
    use byteorder::{LittleEndian, ReadBytesExt};
    use std::io::Cursor;

    fn test_atlas() -> CompiledAtlas {
        CompiledAtlas {
            images: vec![AtlasImage {
                name: "hero".into(),
                pixel_format: PixelFormat::Rgba5551,
                width: 10,
                height: 12,
                cropped_offset: (1, 2),
                cropped_width: 8,
                cropped_height: 9,
                padding: (0, 0, 0, 0),
                reference_point: [0.5, 1.0],
                child_points: vec![("hand".into(), [0.25, 0.25])],
                surface: Surface::new(8, 9),
                sheet: 0,
                position: (0, 0),
                uv_top_left: [0.0, 0.0],
                uv_bottom_right: [0.5, 0.5],
            }],
            sheets: vec![AtlasSheet {
                pixel_format: PixelFormat::Rgba5551,
                width: 16,
                height: 18,
                images: vec![0],
                surface: Surface::new(16, 18),
            }],
            animations: vec![CompiledAnimation {
                name: "wave".into(),
                fps: 8.0,
                images: vec![0, 0],
            }],
        }
    }

    #[test]
    fn test_atlas_layout() {
        let bytes = write_atlas(&test_atlas()).unwrap();
        let mut r = Cursor::new(&bytes[..]);

        assert_eq!(r.read_u16::<LittleEndian>().unwrap(), 1); // sheets
        assert_eq!(r.read_u16::<LittleEndian>().unwrap(), 16);
        assert_eq!(r.read_u16::<LittleEndian>().unwrap(), 18);
        assert_eq!(r.read_u8().unwrap(), PixelFormat::Rgba5551.code());

        assert_eq!(r.read_u16::<LittleEndian>().unwrap(), 1); // images
        let len = r.read_u16::<LittleEndian>().unwrap();
        assert_eq!(len, 4);
        let mut name = vec![0u8; len as usize];
        std::io::Read::read_exact(&mut r, &mut name).unwrap();
        assert_eq!(name, b"hero");
        assert_eq!(r.read_u16::<LittleEndian>().unwrap(), 0); // sheet index
        assert_eq!(r.read_u16::<LittleEndian>().unwrap(), 10); // width
        assert_eq!(r.read_u16::<LittleEndian>().unwrap(), 12); // height
        assert_eq!(r.read_u16::<LittleEndian>().unwrap(), 8); // cropped w
        assert_eq!(r.read_u16::<LittleEndian>().unwrap(), 9); // cropped h
        assert_eq!(r.read_u16::<LittleEndian>().unwrap(), 1); // offset x
        assert_eq!(r.read_u16::<LittleEndian>().unwrap(), 2); // offset y
        for expected in [0.0f32, 0.0, 0.5, 0.5, 0.5, 1.0] {
            assert_eq!(r.read_f32::<LittleEndian>().unwrap(), expected);
        }
        assert_eq!(r.read_u16::<LittleEndian>().unwrap(), 1); // child points
        assert_eq!(r.read_f32::<LittleEndian>().unwrap(), 0.25);
        assert_eq!(r.read_f32::<LittleEndian>().unwrap(), 0.25);

        assert_eq!(r.read_u16::<LittleEndian>().unwrap(), 1); // animations
    }
}
