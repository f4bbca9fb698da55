use crate::error::{Error, Result};
use std::io::{self, Write};

/// Size of the `[magic u32][version u32]` header every segment file starts with
pub const HEADER_LEN: usize = 8;

/// Current on-disk format version
pub const FORMAT_VERSION: u32 = 1;

/// Encode a u64 as a variable-length integer
pub fn encode_varint(mut value: u64, buf: &mut Vec<u8>) {
    loop {
        if value < 0x80 {
            buf.push(value as u8);
            break;
        }
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
}

/// Decode a variable-length integer from a slice
/// Returns (value, bytes_consumed)
pub fn decode_varint(buf: &[u8]) -> Option<(u64, usize)> {
    let mut result: u64 = 0;
    let mut shift = 0;

    for (i, &byte) in buf.iter().enumerate() {
        if shift >= 64 {
            return None; // Overflow
        }

        result |= ((byte & 0x7F) as u64) << shift;

        if byte & 0x80 == 0 {
            return Some((result, i + 1));
        }

        shift += 7;
    }

    None // Incomplete
}

/// Delta-encode a non-decreasing list of offsets
pub fn delta_encode(values: &[u64], buf: &mut Vec<u8>) {
    let mut prev = 0u64;
    for &value in values {
        encode_varint(value - prev, buf);
        prev = value;
    }
}

/// Lazily delta-decode a posting list.
///
/// Stops at the first malformed varint; callers compare the yielded count
/// against the dictionary to detect truncation.
#[derive(Debug, Clone)]
pub struct DeltaDecoder<'a> {
    buf: &'a [u8],
    pos: usize,
    prev: u64,
}

impl<'a> DeltaDecoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0, prev: 0 }
    }
}

impl Iterator for DeltaDecoder<'_> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        let (delta, consumed) = decode_varint(&self.buf[self.pos..])?;
        self.prev = self.prev.checked_add(delta)?;
        self.pos += consumed;
        Some(self.prev)
    }
}

/// Append a varint-length-prefixed byte string
pub fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_varint(bytes.len() as u64, buf);
    buf.extend_from_slice(bytes);
}

/// Append a varint-length-prefixed UTF-8 string
pub fn put_str(buf: &mut Vec<u8>, s: &str) {
    put_bytes(buf, s.as_bytes());
}

/// Write the segment header
pub fn write_header<W: Write>(writer: &mut W, magic: u32) -> io::Result<()> {
    writer.write_all(&magic.to_le_bytes())?;
    writer.write_all(&FORMAT_VERSION.to_le_bytes())
}

/// Append one `[len u32][record]` entry to a record log
pub fn append_record<W: Write>(log: &mut W, len: u32, record: &[u8]) -> io::Result<()> {
    log.write_all(&len.to_le_bytes())?;
    log.write_all(record)
}

/// Validate the segment header of a mapped file
pub fn check_header(bytes: &[u8], magic: u32, what: &str) -> Result<()> {
    if bytes.len() < HEADER_LEN {
        return Err(Error::corrupt(format!("{what}: truncated header")));
    }
    let found = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    if found != magic {
        return Err(Error::corrupt(format!("{what}: bad magic {found:#010x}")));
    }
    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != FORMAT_VERSION {
        return Err(Error::corrupt(format!("{what}: unsupported version {version}")));
    }
    Ok(())
}

/// Cursor over an encoded record. Every read is bounds-checked and reports
/// truncation as a corrupt index.
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn u8(&mut self) -> Result<u8> {
        let byte = *self
            .buf
            .get(self.pos)
            .ok_or_else(|| Error::corrupt("unexpected end of record"))?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn u32_le(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn u64_le(&mut self) -> Result<u64> {
        let bytes = self.take(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(arr))
    }

    pub fn varint(&mut self) -> Result<u64> {
        let (value, consumed) = decode_varint(&self.buf[self.pos.min(self.buf.len())..])
            .ok_or_else(|| Error::corrupt("malformed varint"))?;
        self.pos += consumed;
        Ok(value)
    }

    pub fn varint_u32(&mut self) -> Result<u32> {
        let value = self.varint()?;
        u32::try_from(value).map_err(|_| Error::corrupt(format!("value {value} overflows u32")))
    }

    pub fn bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.varint()?;
        let len = usize::try_from(len).map_err(|_| Error::corrupt("length overflow"))?;
        self.take(len)
    }

    pub fn string(&mut self) -> Result<String> {
        let bytes = self.bytes()?;
        String::from_utf8(bytes.to_vec()).map_err(|_| Error::corrupt("string is not valid UTF-8"))
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| Error::corrupt("unexpected end of record"))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_roundtrip() {
        let values = [0, 1, 127, 128, 16383, 16384, u32::MAX as u64, u64::MAX];
        for value in values {
            let mut buf = Vec::new();
            encode_varint(value, &mut buf);
            let (decoded, consumed) = decode_varint(&buf).unwrap();
            assert_eq!(value, decoded);
            assert_eq!(consumed, buf.len());
        }
    }

    #[test]
    fn test_delta_encoding() {
        let values = vec![8, 40, 40, 97, 1000, 1 << 40];
        let mut buf = Vec::new();
        delta_encode(&values, &mut buf);
        let decoded: Vec<u64> = DeltaDecoder::new(&buf).collect();
        assert_eq!(values, decoded);
    }

    #[test]
    fn test_truncated_varint() {
        assert_eq!(decode_varint(&[0x80, 0x80]), None);
        let mut reader = ByteReader::new(&[0x80]);
        assert!(reader.varint().unwrap_err().is_fatal());
    }

    #[test]
    fn test_byte_reader_strings() {
        let mut buf = Vec::new();
        put_str(&mut buf, "proj");
        put_bytes(&mut buf, b"\x00\xff");
        buf.push(9);

        let mut reader = ByteReader::new(&buf);
        assert_eq!(reader.string().unwrap(), "proj");
        assert_eq!(reader.bytes().unwrap(), b"\x00\xff");
        assert_eq!(reader.u8().unwrap(), 9);
        assert!(reader.is_empty());
        assert!(reader.u8().is_err());
    }

    #[test]
    fn test_length_prefix_past_end() {
        let mut buf = Vec::new();
        encode_varint(100, &mut buf);
        buf.extend_from_slice(b"short");
        let mut reader = ByteReader::new(&buf);
        assert!(matches!(reader.bytes(), Err(Error::CorruptIndex(_))));
    }

    #[test]
    fn test_header_check() {
        let mut buf = Vec::new();
        write_header(&mut buf, 0xABCD_0001).unwrap();
        assert!(check_header(&buf, 0xABCD_0001, "test").is_ok());
        assert!(check_header(&buf, 0xABCD_0002, "test").is_err());
        assert!(check_header(&buf[..4], 0xABCD_0001, "test").is_err());
    }
}
