// src/nar/wire.rs

//! Wire primitives shared by the archive and export formats
//!
//! Integers are 8 bytes little-endian. Strings are a length prefix followed
//! by the raw bytes, zero-padded to the next 8-byte boundary. Both the
//! archive serialization and the export envelope are built from exactly
//! these two shapes, so any deviation here changes content addresses.

use crate::error::{Error, Result};

/// Append a little-endian u64.
pub fn write_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Append a length-prefixed byte string, zero-padded to 8 bytes.
pub fn write_bytes(out: &mut Vec<u8>, data: &[u8]) {
    write_u64(out, data.len() as u64);
    out.extend_from_slice(data);
    let pad = (8 - data.len() % 8) % 8;
    out.extend(std::iter::repeat(0u8).take(pad));
}

/// Append a length-prefixed UTF-8 string, zero-padded to 8 bytes.
pub fn write_str(out: &mut Vec<u8>, s: &str) {
    write_bytes(out, s.as_bytes());
}

/// Cursor over wire-encoded bytes.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// True when the buffer is exhausted.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let end = self.pos + 8;
        if end > self.buf.len() {
            return Err(Error::MalformedArchive(
                "truncated integer field".to_string(),
            ));
        }
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.buf[self.pos..end]);
        self.pos = end;
        Ok(u64::from_le_bytes(raw))
    }

    pub fn read_bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u64()? as usize;
        let end = self.pos + len;
        if end > self.buf.len() {
            return Err(Error::MalformedArchive(format!(
                "truncated string field ({} bytes expected)",
                len
            )));
        }
        let data = &self.buf[self.pos..end];
        self.pos = end;

        let pad = (8 - len % 8) % 8;
        let padded_end = self.pos + pad;
        if padded_end > self.buf.len() {
            return Err(Error::MalformedArchive("truncated padding".to_string()));
        }
        if self.buf[self.pos..padded_end].iter().any(|&b| b != 0) {
            return Err(Error::MalformedArchive("nonzero padding".to_string()));
        }
        self.pos = padded_end;
        Ok(data)
    }

    pub fn read_str(&mut self) -> Result<String> {
        let data = self.read_bytes()?;
        String::from_utf8(data.to_vec())
            .map_err(|_| Error::MalformedArchive("string field is not UTF-8".to_string()))
    }

    /// Read a string field and require an exact value.
    pub fn expect_str(&mut self, expected: &str) -> Result<()> {
        let got = self.read_str()?;
        if got != expected {
            return Err(Error::MalformedArchive(format!(
                "expected {:?}, found {:?}",
                expected, got
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_u64_little_endian() {
        let mut buf = Vec::new();
        write_u64(&mut buf, 0);
        assert_eq!(buf, [0, 0, 0, 0, 0, 0, 0, 0]);

        buf.clear();
        write_u64(&mut buf, 1);
        assert_eq!(buf, [1, 0, 0, 0, 0, 0, 0, 0]);

        buf.clear();
        write_u64(&mut buf, 0x4558_494e);
        assert_eq!(buf, [0x4e, 0x49, 0x58, 0x45, 0, 0, 0, 0]);
    }

    #[test]
    fn test_write_str_padding() {
        // (input, total bytes written)
        let cases = [("", 8), ("hi", 16), ("12345678", 16), ("123456789", 24)];
        for (s, want) in cases {
            let mut buf = Vec::new();
            write_str(&mut buf, s);
            assert_eq!(buf.len(), want, "string {:?}", s);

            // Length prefix matches and padding is all zeros
            let mut len_raw = [0u8; 8];
            len_raw.copy_from_slice(&buf[..8]);
            assert_eq!(u64::from_le_bytes(len_raw) as usize, s.len());
            for &b in &buf[8 + s.len()..] {
                assert_eq!(b, 0);
            }
        }
    }

    #[test]
    fn test_reader_roundtrip() {
        let mut buf = Vec::new();
        write_u64(&mut buf, 42);
        write_str(&mut buf, "nix-archive-1");
        write_bytes(&mut buf, b"payload");

        let mut r = Reader::new(&buf);
        assert_eq!(r.read_u64().unwrap(), 42);
        assert_eq!(r.read_str().unwrap(), "nix-archive-1");
        assert_eq!(r.read_bytes().unwrap(), b"payload");
        assert!(r.is_empty());
    }

    #[test]
    fn test_reader_rejects_truncation() {
        let mut buf = Vec::new();
        write_str(&mut buf, "hello");
        buf.truncate(buf.len() - 4);

        let mut r = Reader::new(&buf);
        assert!(matches!(r.read_str(), Err(Error::MalformedArchive(_))));
    }

    #[test]
    fn test_reader_rejects_nonzero_padding() {
        let mut buf = Vec::new();
        write_str(&mut buf, "hi");
        let last = buf.len() - 1;
        buf[last] = 0xff;

        let mut r = Reader::new(&buf);
        assert!(matches!(r.read_str(), Err(Error::MalformedArchive(_))));
    }

    #[test]
    fn test_expect_str() {
        let mut buf = Vec::new();
        write_str(&mut buf, "(");
        let mut r = Reader::new(&buf);
        assert!(r.expect_str("(").is_ok());

        let mut r = Reader::new(&buf);
        assert!(r.expect_str(")").is_err());
    }
}
