//! Little-endian write helpers shared by the binary format writers.
//!
//! All runtime formats use explicit counts rather than terminators and
//! length-prefixed strings. Writers serialise into an in-memory buffer,
//! so the `io::Result`s here never fail in practice but still propagate.

use crate::error::{CompilerError, Result};
use byteorder::{LittleEndian, WriteBytesExt};
use glam::Mat4;
use std::io::Write;

use crate::types::Color;

/// Sentinel parent index for root nodes.
pub const NO_PARENT: u16 = u16::MAX;

/// Write a length-prefixed UTF-8 string (u16 length + bytes).
pub fn write_str<W: Write>(w: &mut W, s: &str) -> Result<()> {
    let bytes = s.as_bytes();
    if bytes.len() > u16::MAX as usize {
        return Err(CompilerError::InvalidScalar(format!(
            "string too long for binary format ({} bytes)",
            bytes.len()
        )));
    }
    w.write_u16::<LittleEndian>(bytes.len() as u16)?;
    w.write_all(bytes)?;
    Ok(())
}

pub fn write_u8<W: Write>(w: &mut W, v: u8) -> Result<()> {
    w.write_u8(v)?;
    Ok(())
}

pub fn write_u16<W: Write>(w: &mut W, v: u16) -> Result<()> {
    w.write_u16::<LittleEndian>(v)?;
    Ok(())
}

pub fn write_u32<W: Write>(w: &mut W, v: u32) -> Result<()> {
    w.write_u32::<LittleEndian>(v)?;
    Ok(())
}

pub fn write_i32<W: Write>(w: &mut W, v: i32) -> Result<()> {
    w.write_i32::<LittleEndian>(v)?;
    Ok(())
}

pub fn write_f32<W: Write>(w: &mut W, v: f32) -> Result<()> {
    w.write_f32::<LittleEndian>(v)?;
    Ok(())
}

/// Convert a usize count to u16, failing when it exceeds the format range.
pub fn count_u16(count: usize, what: &str) -> Result<u16> {
    u16::try_from(count).map_err(|_| {
        CompilerError::MeshTooLarge(format!("{what} count {count} exceeds 65535"))
    })
}

pub fn write_vec2<W: Write>(w: &mut W, v: [f32; 2]) -> Result<()> {
    write_f32(w, v[0])?;
    write_f32(w, v[1])
}

pub fn write_vec3<W: Write>(w: &mut W, v: [f32; 3]) -> Result<()> {
    write_f32(w, v[0])?;
    write_f32(w, v[1])?;
    write_f32(w, v[2])
}

/// Write a 4x4 matrix in column-major order.
pub fn write_mat4<W: Write>(w: &mut W, m: &Mat4) -> Result<()> {
    for v in m.to_cols_array() {
        write_f32(w, v)?;
    }
    Ok(())
}

/// Write a color as 4 bytes (RGBA order).
pub fn write_color<W: Write>(w: &mut W, c: Color) -> Result<()> {
    w.write_all(&[c.r, c.g, c.b, c.a])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_str() {
        let mut buf = Vec::new();
        write_str(&mut buf, "abc").unwrap();
        assert_eq!(buf, vec![3, 0, b'a', b'b', b'c']);
    }

    #[test]
    fn test_write_scalars_little_endian() {
        let mut buf = Vec::new();
        write_u16(&mut buf, 0x0102).unwrap();
        write_f32(&mut buf, 1.0).unwrap();
        assert_eq!(&buf[..2], &[0x02, 0x01]);
        assert_eq!(&buf[2..], &1.0f32.to_le_bytes());
    }

    #[test]
    fn test_count_u16_range() {
        assert_eq!(count_u16(65535, "vertex").unwrap(), 65535);
        assert!(count_u16(65536, "vertex").is_err());
    }
}
