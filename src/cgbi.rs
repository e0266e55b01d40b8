//! Reverts Apple's "optimized" PNG encoding used for icons in iOS bundles.
//!
//! Such files carry a `CgBI` chunk before `IHDR`, store their image data
//! as a raw deflate stream (no zlib header or checksum), keep pixels in
//! BGRA order and premultiply the colour channels by alpha.

use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder};
use flate2::read::DeflateDecoder;
use flate2::write::ZlibEncoder;
use flate2::{Compression, Crc};
use log::debug;
use std::io::{Read, Write};

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

const COLOR_TYPE_RGB: u8 = 2;
const COLOR_TYPE_RGBA: u8 = 6;

struct PngChunk<'a> {
    ty: [u8; 4],
    data: &'a [u8],
}

struct Header {
    width: usize,
    height: usize,
    bytes_per_pixel: usize,
    /// Bytes per row without the filter byte
    stride: usize,
    /// Length of the inflated image data, filter bytes included
    image_len: usize,
}

/// Turn an Apple optimized PNG back into a standard PNG. Files without the
/// `CgBI` chunk are returned unchanged.
pub fn revert(data: &[u8]) -> Result<Vec<u8>> {
    let chunks = read_chunks(data)?;
    if !chunks.iter().any(|c| &c.ty == b"CgBI") {
        return Ok(data.to_vec());
    }

    let ihdr = chunks
        .iter()
        .find(|c| &c.ty == b"IHDR")
        .ok_or_else(|| Error::icon_decode("missing IHDR chunk"))?;
    let header = read_header(ihdr.data)?;

    let mut idat = vec![];
    for c in chunks.iter().filter(|c| &c.ty == b"IDAT") {
        idat.extend_from_slice(c.data);
    }
    let mut filtered = vec![];
    DeflateDecoder::new(idat.as_slice())
        .take(header.image_len as u64)
        .read_to_end(&mut filtered)
        .map_err(|e| Error::icon_decode(format!("image data: {}", e)))?;

    let mut pixels = unfilter(&filtered, &header)?;
    for px in pixels.chunks_exact_mut(header.bytes_per_pixel) {
        px.swap(0, 2);
        if header.bytes_per_pixel == 4 {
            unpremultiply(px);
        }
    }
    debug!("Reverted CgBI image {}x{}", header.width, header.height);

    let mut raw = Vec::with_capacity(header.image_len);
    for row in pixels.chunks_exact(header.stride) {
        raw.push(0);
        raw.extend_from_slice(row);
    }
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&raw)?;
    let compressed = encoder.finish()?;

    let mut out = Vec::with_capacity(compressed.len() + 1024);
    out.extend_from_slice(&PNG_SIGNATURE);
    let mut wrote_idat = false;
    for c in &chunks {
        match &c.ty {
            b"CgBI" => {}
            b"IDAT" => {
                if !wrote_idat {
                    write_chunk(&mut out, b"IDAT", &compressed);
                    wrote_idat = true;
                }
            }
            ty => write_chunk(&mut out, ty, c.data),
        }
    }
    Ok(out)
}

fn read_chunks(data: &[u8]) -> Result<Vec<PngChunk<'_>>> {
    if data.len() < PNG_SIGNATURE.len() || data[..8] != PNG_SIGNATURE {
        return Err(Error::icon_decode(format!(
            "not a PNG, signature {}",
            hex::encode(&data[..data.len().min(8)])
        )));
    }
    let mut chunks = vec![];
    let mut pos = PNG_SIGNATURE.len();
    while pos + 8 <= data.len() {
        let len = BigEndian::read_u32(&data[pos..]) as usize;
        let mut ty = [0u8; 4];
        ty.copy_from_slice(&data[pos + 4..pos + 8]);
        let start = pos + 8;
        let end = start
            .checked_add(len)
            .filter(|end| end + 4 <= data.len())
            .ok_or_else(|| {
                Error::icon_decode(format!(
                    "truncated {} chunk",
                    String::from_utf8_lossy(&ty)
                ))
            })?;
        chunks.push(PngChunk {
            ty,
            data: &data[start..end],
        });
        // skip the crc, it is recomputed on output
        pos = end + 4;
        if &ty == b"IEND" {
            break;
        }
    }
    Ok(chunks)
}

fn read_header(ihdr: &[u8]) -> Result<Header> {
    if ihdr.len() < 13 {
        return Err(Error::icon_decode("short IHDR chunk"));
    }
    let width = BigEndian::read_u32(&ihdr[0..4]) as usize;
    let height = BigEndian::read_u32(&ihdr[4..8]) as usize;
    let (bit_depth, color_type, interlace) = (ihdr[8], ihdr[9], ihdr[12]);
    let bytes_per_pixel = match (bit_depth, color_type) {
        (8, COLOR_TYPE_RGBA) => 4,
        (8, COLOR_TYPE_RGB) => 3,
        _ => {
            return Err(Error::icon_decode(format!(
                "unsupported CgBI layout: bit depth {}, colour type {}",
                bit_depth, color_type
            )))
        }
    };
    if interlace != 0 {
        return Err(Error::icon_decode("interlaced CgBI images are not supported"));
    }
    if width == 0 || height == 0 {
        return Err(Error::icon_decode(format!("empty image {}x{}", width, height)));
    }
    let (stride, image_len) = width
        .checked_mul(bytes_per_pixel)
        .and_then(|stride| Some((stride, stride.checked_add(1)?.checked_mul(height)?)))
        .ok_or_else(|| Error::icon_decode(format!("image {}x{} is too large", width, height)))?;
    Ok(Header {
        width,
        height,
        bytes_per_pixel,
        stride,
        image_len,
    })
}

/// Undo the per-row PNG filters, returning tightly packed pixel rows
fn unfilter(data: &[u8], header: &Header) -> Result<Vec<u8>> {
    let bpp = header.bytes_per_pixel;
    let stride = header.stride;
    if data.len() < header.image_len {
        return Err(Error::icon_decode(format!(
            "image data is {} bytes, expected {}",
            data.len(),
            header.image_len
        )));
    }

    let mut out = vec![0u8; header.height * stride];
    for y in 0..header.height {
        let line = &data[y * (stride + 1)..(y + 1) * (stride + 1)];
        let (filter, src) = (line[0], &line[1..]);
        let (done, rest) = out.split_at_mut(y * stride);
        let prev = if y == 0 {
            None
        } else {
            Some(&done[(y - 1) * stride..])
        };
        let cur = &mut rest[..stride];
        for x in 0..stride {
            let a = if x >= bpp { cur[x - bpp] } else { 0 };
            let b = prev.map_or(0, |p| p[x]);
            let c = match prev {
                Some(p) if x >= bpp => p[x - bpp],
                _ => 0,
            };
            cur[x] = match filter {
                0 => src[x],
                1 => src[x].wrapping_add(a),
                2 => src[x].wrapping_add(b),
                3 => src[x].wrapping_add(((a as u16 + b as u16) / 2) as u8),
                4 => src[x].wrapping_add(paeth(a, b, c)),
                f => {
                    return Err(Error::icon_decode(format!(
                        "invalid filter type {} in row {}",
                        f, y
                    )))
                }
            };
        }
    }
    Ok(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// Divide the colour channels of an RGBA pixel by its alpha
fn unpremultiply(px: &mut [u8]) {
    let a = px[3] as u32;
    if a == 0 {
        px[..3].fill(0);
        return;
    }
    for c in &mut px[..3] {
        *c = ((*c as u32 * 255 + a / 2) / a).min(255) as u8;
    }
}

fn write_chunk(out: &mut Vec<u8>, ty: &[u8; 4], data: &[u8]) {
    let mut crc = Crc::new();
    crc.update(ty);
    crc.update(data);
    let mut word = [0u8; 4];
    BigEndian::write_u32(&mut word, data.len() as u32);
    out.extend_from_slice(&word);
    out.extend_from_slice(ty);
    out.extend_from_slice(data);
    BigEndian::write_u32(&mut word, crc.sum());
    out.extend_from_slice(&word);
}
