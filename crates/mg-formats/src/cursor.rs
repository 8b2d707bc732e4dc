//! Bounds-checked byte reading.
//!
//! [`ByteCursor`] walks a buffer sequentially (headers, record tables,
//! event streams). [`BinaryRead`] reads at absolute offsets, which suits
//! formats that store a table of pointers into the file.

use crate::FormatError;

/// Parse a fixed-width text field: stops at the first NUL, trims padding.
pub fn parse_string(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end])
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Sequential reader over a byte buffer.
#[derive(Clone, Debug)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Cursor positioned at `pos`. Fails if `pos` is past the end.
    pub fn at(data: &'a [u8], pos: usize) -> Result<Self, FormatError> {
        let mut cursor = Self::new(data);
        cursor.seek(pos)?;
        Ok(cursor)
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn seek(&mut self, pos: usize) -> Result<(), FormatError> {
        if pos > self.data.len() {
            return Err(FormatError::UnexpectedEof { offset: pos });
        }
        self.pos = pos;
        Ok(())
    }

    pub fn skip(&mut self, n: usize) -> Result<(), FormatError> {
        self.take(n).map(|_| ())
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], FormatError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or(FormatError::UnexpectedEof { offset: self.pos })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], FormatError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn peek_u8(&self) -> Result<u8, FormatError> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(FormatError::UnexpectedEof { offset: self.pos })
    }

    pub fn read_u8(&mut self) -> Result<u8, FormatError> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, FormatError> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16_be(&mut self) -> Result<u16, FormatError> {
        Ok(u16::from_be_bytes(self.take_array()?))
    }

    pub fn read_u16_le(&mut self) -> Result<u16, FormatError> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    pub fn read_i16_be(&mut self) -> Result<i16, FormatError> {
        Ok(i16::from_be_bytes(self.take_array()?))
    }

    pub fn read_i16_le(&mut self) -> Result<i16, FormatError> {
        Ok(i16::from_le_bytes(self.take_array()?))
    }

    pub fn read_u32_be(&mut self) -> Result<u32, FormatError> {
        Ok(u32::from_be_bytes(self.take_array()?))
    }

    pub fn read_u32_le(&mut self) -> Result<u32, FormatError> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub fn read_i32_be(&mut self) -> Result<i32, FormatError> {
        Ok(self.read_u32_be()? as i32)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], FormatError> {
        self.take(n)
    }

    /// Read `n` bytes, or whatever is left if the buffer is shorter.
    pub fn read_up_to(&mut self, n: usize) -> &'a [u8] {
        let n = n.min(self.remaining());
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        slice
    }

    /// Read a NUL-terminated string. A missing terminator reads to the end.
    pub fn read_cstring(&mut self) -> Result<String, FormatError> {
        if self.is_at_end() {
            return Err(FormatError::UnexpectedEof { offset: self.pos });
        }
        let start = self.pos;
        let len = self.data[start..]
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.data.len() - start);
        let s = String::from_utf8_lossy(&self.data[start..start + len]).into_owned();
        self.pos = (start + len + 1).min(self.data.len());
        Ok(s)
    }

    /// Read a fixed-width text field of `n` bytes.
    pub fn read_fixed_string(&mut self, n: usize) -> Result<String, FormatError> {
        Ok(parse_string(self.take(n)?))
    }
}

/// Offset-addressed reads on a byte slice.
pub trait BinaryRead {
    fn slice_at(&self, ofs: usize, len: usize) -> Result<&[u8], FormatError>;

    fn u8_at(&self, ofs: usize) -> Result<u8, FormatError> {
        Ok(self.slice_at(ofs, 1)?[0])
    }

    fn i8_at(&self, ofs: usize) -> Result<i8, FormatError> {
        Ok(self.u8_at(ofs)? as i8)
    }

    fn u16be_at(&self, ofs: usize) -> Result<u16, FormatError> {
        let b = self.slice_at(ofs, 2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u16le_at(&self, ofs: usize) -> Result<u16, FormatError> {
        let b = self.slice_at(ofs, 2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn i16be_at(&self, ofs: usize) -> Result<i16, FormatError> {
        Ok(self.u16be_at(ofs)? as i16)
    }

    fn u32be_at(&self, ofs: usize) -> Result<u32, FormatError> {
        let b = self.slice_at(ofs, 4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u32le_at(&self, ofs: usize) -> Result<u32, FormatError> {
        let b = self.slice_at(ofs, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn string_at(&self, ofs: usize, len: usize) -> Result<String, FormatError> {
        Ok(parse_string(self.slice_at(ofs, len)?))
    }
}

impl BinaryRead for [u8] {
    fn slice_at(&self, ofs: usize, len: usize) -> Result<&[u8], FormatError> {
        ofs.checked_add(len)
            .and_then(|end| self.get(ofs..end))
            .ok_or(FormatError::UnexpectedEof { offset: ofs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_both_endians() {
        let data = [0x12, 0x34, 0x56, 0x78, 0xFF, 0xFE];
        let mut r = ByteCursor::new(&data);
        assert_eq!(r.read_u16_be().unwrap(), 0x1234);
        assert_eq!(r.read_u16_le().unwrap(), 0x7856);
        assert_eq!(r.read_i16_be().unwrap(), -2);
        assert!(r.is_at_end());

        let mut r = ByteCursor::new(&data);
        assert_eq!(r.read_u32_be().unwrap(), 0x1234_5678);
        let mut r = ByteCursor::new(&data);
        assert_eq!(r.read_u32_le().unwrap(), 0x7856_3412);
    }

    #[test]
    fn out_of_bounds_reports_offset() {
        let data = [1, 2, 3];
        let mut r = ByteCursor::new(&data);
        r.skip(2).unwrap();
        match r.read_u16_be() {
            Err(FormatError::UnexpectedEof { offset }) => assert_eq!(offset, 2),
            other => panic!("expected eof, got {other:?}"),
        }
        // A failed read does not move the cursor
        assert_eq!(r.position(), 2);
        assert!(r.seek(4).is_err());
        assert!(r.seek(3).is_ok());
    }

    #[test]
    fn cstring_consumes_terminator() {
        let data = b"abc\0de";
        let mut r = ByteCursor::new(data);
        assert_eq!(r.read_cstring().unwrap(), "abc");
        assert_eq!(r.position(), 4);
        assert_eq!(r.read_cstring().unwrap(), "de");
        assert!(r.is_at_end());
        assert!(r.read_cstring().is_err());
    }

    #[test]
    fn fixed_string_stops_at_nul_and_trims() {
        let data = b"  hi \0garbage";
        let mut r = ByteCursor::new(data);
        assert_eq!(r.read_fixed_string(13).unwrap(), "hi");
    }

    #[test]
    fn offset_reads_are_bounds_checked() {
        let data: &[u8] = &[0x80, 0x00, 0x00, 0x01];
        assert_eq!(data.i16be_at(0).unwrap(), i16::MIN);
        assert_eq!(data.u32be_at(0).unwrap(), 0x8000_0001);
        assert!(data.u32be_at(1).is_err());
        assert!(data.slice_at(usize::MAX, 2).is_err());
    }
}
