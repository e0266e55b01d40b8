use crate::chunk::{u16_at, u32_at, u8_at, RawChunk, RES_STRING_POOL_TYPE};
use anyhow::{ensure, Context, Result};

const UTF8_FLAG: u32 = 1 << 8;

/// Interned strings of a `ResStringPool` chunk, referenced by index from
/// binary XML and resource table chunks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringPool {
    strings: Vec<String>,
}

impl StringPool {
    pub fn parse(chunk: &RawChunk) -> Result<Self> {
        ensure!(
            chunk.header.ty == RES_STRING_POOL_TYPE,
            "Expected string pool chunk, got 0x{:04x}",
            chunk.header.ty
        );
        ensure!(
            chunk.header.header_size >= 28,
            "String pool header too small: {}",
            chunk.header.header_size
        );
        let data = chunk.data;
        let string_count = u32_at(data, 8)? as usize;
        let flags = u32_at(data, 16)?;
        let strings_start = u32_at(data, 20)? as usize;

        let offsets_start = chunk.header.header_size as usize;
        ensure!(
            string_count
                .checked_mul(4)
                .and_then(|n| n.checked_add(offsets_start))
                .is_some_and(|end| end <= data.len()),
            "String pool declares {} strings but is only {} bytes",
            string_count,
            data.len()
        );
        ensure!(
            string_count == 0 || strings_start < data.len(),
            "String data offset {} outside of pool",
            strings_start
        );

        let utf8 = flags & UTF8_FLAG != 0;
        let mut strings = Vec::with_capacity(string_count);
        for i in 0..string_count {
            let pos = strings_start + u32_at(data, offsets_start + i * 4)? as usize;
            let s = if utf8 {
                read_utf8(data, pos)
            } else {
                read_utf16(data, pos)
            }
            .with_context(|| format!("Corrupt string {} in string pool", i))?;
            strings.push(s);
        }
        Ok(StringPool { strings })
    }

    pub fn get(&self, idx: u32) -> Option<&str> {
        self.strings.get(idx as usize).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

fn read_utf8(data: &[u8], mut pos: usize) -> Result<String> {
    // utf16 length first, then the encoded byte length
    let _ = utf8_length(data, &mut pos)?;
    let len = utf8_length(data, &mut pos)?;
    let bytes = data
        .get(pos..pos + len)
        .context("UTF-8 string runs past end of pool")?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

fn utf8_length(data: &[u8], pos: &mut usize) -> Result<usize> {
    let b0 = u8_at(data, *pos)? as usize;
    *pos += 1;
    if b0 & 0x80 != 0 {
        let b1 = u8_at(data, *pos)? as usize;
        *pos += 1;
        Ok(((b0 & 0x7f) << 8) | b1)
    } else {
        Ok(b0)
    }
}

fn read_utf16(data: &[u8], mut pos: usize) -> Result<String> {
    let u0 = u16_at(data, pos)? as usize;
    pos += 2;
    let len = if u0 & 0x8000 != 0 {
        let u1 = u16_at(data, pos)? as usize;
        pos += 2;
        ((u0 & 0x7fff) << 16) | u1
    } else {
        u0
    };
    let units = (0..len)
        .map(|i| u16_at(data, pos + i * 2))
        .collect::<Result<Vec<u16>>>()
        .context("UTF-16 string runs past end of pool")?;
    Ok(String::from_utf16_lossy(&units))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::read_chunk;
    use crate::testing::encode_string_pool;

    #[test]
    fn decodes_utf16_pool() {
        let buf = encode_string_pool(&["manifest".to_string(), "Grüße".to_string()]);
        let pool = StringPool::parse(&read_chunk(&buf, 0).unwrap()).unwrap();
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.get(0), Some("manifest"));
        assert_eq!(pool.get(1), Some("Grüße"));
        assert_eq!(pool.get(2), None);
    }

    #[test]
    fn decodes_utf8_pool() {
        // header(28) + 1 offset + "abc" with two length bytes + terminator
        let mut buf = vec![];
        buf.extend_from_slice(&1u16.to_le_bytes());
        buf.extend_from_slice(&28u16.to_le_bytes());
        buf.extend_from_slice(&40u32.to_le_bytes());
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&UTF8_FLAG.to_le_bytes());
        buf.extend_from_slice(&32u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&[3, 3, b'a', b'b', b'c', 0, 0, 0]);
        let pool = StringPool::parse(&read_chunk(&buf, 0).unwrap()).unwrap();
        assert_eq!(pool.get(0), Some("abc"));
    }

    #[test]
    fn rejects_offsets_past_end() {
        let mut buf = encode_string_pool(&["a".to_string()]);
        // claim far more strings than the chunk holds
        buf[8..12].copy_from_slice(&1000u32.to_le_bytes());
        assert!(StringPool::parse(&read_chunk(&buf, 0).unwrap()).is_err());
    }
}
