use anyhow::{anyhow, ensure, Result};
use byteorder::{ByteOrder, LittleEndian};

pub const RES_STRING_POOL_TYPE: u16 = 0x0001;
pub const RES_TABLE_TYPE: u16 = 0x0002;
pub const RES_XML_TYPE: u16 = 0x0003;
pub const RES_XML_START_NAMESPACE_TYPE: u16 = 0x0100;
pub const RES_XML_END_NAMESPACE_TYPE: u16 = 0x0101;
pub const RES_XML_START_ELEMENT_TYPE: u16 = 0x0102;
pub const RES_XML_END_ELEMENT_TYPE: u16 = 0x0103;
pub const RES_XML_CDATA_TYPE: u16 = 0x0104;
pub const RES_XML_RESOURCE_MAP_TYPE: u16 = 0x0180;
pub const RES_TABLE_PACKAGE_TYPE: u16 = 0x0200;
pub const RES_TABLE_TYPE_TYPE: u16 = 0x0201;
pub const RES_TABLE_TYPE_SPEC_TYPE: u16 = 0x0202;

/// Common `ResChunk_header` prefix of every chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub ty: u16,
    pub header_size: u16,
    pub size: u32,
}

/// A chunk borrowed from its parent buffer, `data` spans the whole chunk
/// including its header.
#[derive(Debug, Clone, Copy)]
pub struct RawChunk<'a> {
    pub header: ChunkHeader,
    pub data: &'a [u8],
}

impl<'a> RawChunk<'a> {
    /// Bytes following the chunk header
    pub fn body(&self) -> &'a [u8] {
        &self.data[self.header.header_size as usize..]
    }
}

/// Read the chunk starting at `offset`, checking its size fields against
/// the buffer it lives in.
pub fn read_chunk(buf: &[u8], offset: usize) -> Result<RawChunk<'_>> {
    let ty = u16_at(buf, offset)?;
    let header_size = u16_at(buf, offset + 2)?;
    let size = u32_at(buf, offset + 4)?;
    ensure!(
        header_size >= 8 && header_size as u32 <= size,
        "Invalid chunk 0x{:04x} at offset {}: header size {} / chunk size {}",
        ty,
        offset,
        header_size,
        size
    );
    let end = offset
        .checked_add(size as usize)
        .ok_or_else(|| anyhow!("Chunk size overflow at offset {}", offset))?;
    ensure!(
        end <= buf.len(),
        "Chunk 0x{:04x} at offset {} claims {} bytes, only {} available",
        ty,
        offset,
        size,
        buf.len() - offset
    );
    Ok(RawChunk {
        header: ChunkHeader {
            ty,
            header_size,
            size,
        },
        data: &buf[offset..end],
    })
}

/// Iterates sibling chunks laid out back to back in a buffer
pub struct ChunkIter<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> ChunkIter<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        ChunkIter { buf, offset: 0 }
    }
}

impl<'a> Iterator for ChunkIter<'a> {
    type Item = Result<RawChunk<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.buf.len() {
            return None;
        }
        match read_chunk(self.buf, self.offset) {
            Ok(chunk) => {
                self.offset += chunk.header.size as usize;
                Some(Ok(chunk))
            }
            Err(e) => {
                // stop after the first broken chunk
                self.offset = self.buf.len();
                Some(Err(e))
            }
        }
    }
}

#[inline]
pub fn u8_at(buf: &[u8], pos: usize) -> Result<u8> {
    buf.get(pos)
        .copied()
        .ok_or_else(|| anyhow!("Unexpected end of data reading u8 at {}", pos))
}

#[inline]
pub fn u16_at(buf: &[u8], pos: usize) -> Result<u16> {
    buf.get(pos..pos.saturating_add(2))
        .map(LittleEndian::read_u16)
        .ok_or_else(|| anyhow!("Unexpected end of data reading u16 at {}", pos))
}

#[inline]
pub fn u32_at(buf: &[u8], pos: usize) -> Result<u32> {
    buf.get(pos..pos.saturating_add(4))
        .map(LittleEndian::read_u32)
        .ok_or_else(|| anyhow!("Unexpected end of data reading u32 at {}", pos))
}
