//! Native-endian sequential binary encoding helpers.
//!
//! The model file is a straight dump of scalars and raw f32 arrays in a
//! fixed order, so everything here is a thin wrapper over `Read`/`Write`
//! with platform-native byte order. Cross-platform exchange of model files
//! is out of scope.

use std::io::{Read, Write};

use crate::real;

pub fn write_u8(w: &mut impl Write, v: u8) -> std::io::Result<()> {
    w.write_all(&[v])
}

pub fn read_u8(r: &mut (impl Read + ?Sized)) -> std::io::Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

pub fn write_bool(w: &mut impl Write, v: bool) -> std::io::Result<()> {
    write_u8(w, v as u8)
}

pub fn read_bool(r: &mut (impl Read + ?Sized)) -> std::io::Result<bool> {
    Ok(read_u8(r)? != 0)
}

pub fn write_u32(w: &mut impl Write, v: u32) -> std::io::Result<()> {
    w.write_all(&v.to_ne_bytes())
}

pub fn read_u32(r: &mut (impl Read + ?Sized)) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_ne_bytes(buf))
}

pub fn write_i32(w: &mut impl Write, v: i32) -> std::io::Result<()> {
    w.write_all(&v.to_ne_bytes())
}

pub fn read_i32(r: &mut (impl Read + ?Sized)) -> std::io::Result<i32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_ne_bytes(buf))
}

pub fn write_u64(w: &mut impl Write, v: u64) -> std::io::Result<()> {
    w.write_all(&v.to_ne_bytes())
}

pub fn read_u64(r: &mut (impl Read + ?Sized)) -> std::io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_ne_bytes(buf))
}

pub fn write_i64(w: &mut impl Write, v: i64) -> std::io::Result<()> {
    w.write_all(&v.to_ne_bytes())
}

pub fn read_i64(r: &mut (impl Read + ?Sized)) -> std::io::Result<i64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(i64::from_ne_bytes(buf))
}

pub fn write_f32(w: &mut impl Write, v: real) -> std::io::Result<()> {
    w.write_all(&v.to_ne_bytes())
}

pub fn read_f32(r: &mut (impl Read + ?Sized)) -> std::io::Result<real> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(real::from_ne_bytes(buf))
}

pub fn write_f32s(w: &mut impl Write, v: &[real]) -> std::io::Result<()> {
    w.write_all(bytemuck::cast_slice::<real, u8>(v))
}

pub fn read_f32s(r: &mut (impl Read + ?Sized), out: &mut [real]) -> std::io::Result<()> {
    r.read_exact(bytemuck::cast_slice_mut::<real, u8>(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    // The embedding loader reads through `&mut dyn Read`; the readers must
    // accept unsized readers.
    #[test]
    fn readers_work_through_dyn_read() {
        let mut buf = Vec::new();
        write_u32(&mut buf, 7).unwrap();
        write_i64(&mut buf, -3).unwrap();
        write_f32s(&mut buf, &[1.5, -2.0]).unwrap();

        let mut cur = Cursor::new(buf);
        let r: &mut dyn Read = &mut cur;
        assert_eq!(read_u32(&mut *r).unwrap(), 7);
        assert_eq!(read_i64(&mut *r).unwrap(), -3);
        let mut out = [0.0 as real; 2];
        read_f32s(&mut *r, &mut out).unwrap();
        assert_eq!(out, [1.5, -2.0]);
    }

    #[test]
    fn scalar_round_trips() {
        let mut buf = Vec::new();
        write_u8(&mut buf, 9).unwrap();
        write_bool(&mut buf, true).unwrap();
        write_i32(&mut buf, -40).unwrap();
        write_u64(&mut buf, u64::MAX).unwrap();
        write_f32(&mut buf, -0.25).unwrap();

        let mut cur = Cursor::new(buf);
        assert_eq!(read_u8(&mut cur).unwrap(), 9);
        assert!(read_bool(&mut cur).unwrap());
        assert_eq!(read_i32(&mut cur).unwrap(), -40);
        assert_eq!(read_u64(&mut cur).unwrap(), u64::MAX);
        assert_eq!(read_f32(&mut cur).unwrap(), -0.25);
    }
}
