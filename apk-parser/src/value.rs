use crate::chunk::{u32_at, u8_at};
use crate::string_pool::StringPool;
use anyhow::Result;

pub const TYPE_NULL: u8 = 0x00;
pub const TYPE_REFERENCE: u8 = 0x01;
pub const TYPE_ATTRIBUTE: u8 = 0x02;
pub const TYPE_STRING: u8 = 0x03;
pub const TYPE_FLOAT: u8 = 0x04;
pub const TYPE_DIMENSION: u8 = 0x05;
pub const TYPE_FRACTION: u8 = 0x06;
pub const TYPE_DYNAMIC_REFERENCE: u8 = 0x07;
pub const TYPE_INT_DEC: u8 = 0x10;
pub const TYPE_INT_HEX: u8 = 0x11;
pub const TYPE_INT_BOOLEAN: u8 = 0x12;
pub const TYPE_INT_COLOR_ARGB8: u8 = 0x1c;
pub const TYPE_INT_COLOR_RGB8: u8 = 0x1d;
pub const TYPE_INT_COLOR_ARGB4: u8 = 0x1e;
pub const TYPE_INT_COLOR_RGB4: u8 = 0x1f;

const DIMENSION_UNITS: [&str; 6] = ["px", "dip", "sp", "pt", "in", "mm"];
const FRACTION_UNITS: [&str; 2] = ["%", "%p"];
const RADIX_MULTS: [f32; 4] = [
    1.0 / (1 << 8) as f32,
    1.0 / (1 << 15) as f32,
    1.0 / (1 << 23) as f32,
    1.0 / (1u32 << 31) as f32,
];

/// Typed `Res_value` (type tag + 32-bit payload)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResValue {
    pub data_type: u8,
    pub data: u32,
}

impl ResValue {
    /// Read an 8 byte `Res_value` at `pos`
    pub fn read(buf: &[u8], pos: usize) -> Result<Self> {
        Ok(ResValue {
            data_type: u8_at(buf, pos + 3)?,
            data: u32_at(buf, pos + 4)?,
        })
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.data_type, TYPE_REFERENCE | TYPE_DYNAMIC_REFERENCE)
    }

    pub fn is_string(&self) -> bool {
        self.data_type == TYPE_STRING
    }

    /// Canonical textual form of the value, strings are looked up in `strings`
    pub fn to_string_with(&self, strings: &StringPool) -> String {
        let data = self.data;
        match self.data_type {
            TYPE_NULL => String::new(),
            TYPE_STRING => strings.get(data).unwrap_or_default().to_string(),
            TYPE_REFERENCE | TYPE_DYNAMIC_REFERENCE => format!("@0x{:08x}", data),
            TYPE_ATTRIBUTE => format!("?0x{:08x}", data),
            TYPE_FLOAT => f32::from_bits(data).to_string(),
            TYPE_DIMENSION => complex_to_string(data, &DIMENSION_UNITS),
            TYPE_FRACTION => complex_to_string(data, &FRACTION_UNITS),
            TYPE_INT_DEC => (data as i32).to_string(),
            TYPE_INT_HEX => format!("0x{:x}", data),
            TYPE_INT_BOOLEAN => (data != 0).to_string(),
            TYPE_INT_COLOR_ARGB8 | TYPE_INT_COLOR_ARGB4 => format!("#{:08x}", data),
            TYPE_INT_COLOR_RGB8 | TYPE_INT_COLOR_RGB4 => format!("#{:06x}", data & 0xff_ffff),
            _ => format!("0x{:x}", data),
        }
    }
}

fn complex_to_string(data: u32, units: &[&str]) -> String {
    let mantissa = (data & 0xffff_ff00) as i32 as f32;
    let value = mantissa * RADIX_MULTS[((data >> 4) & 0x3) as usize];
    let unit = units.get((data & 0xf) as usize).copied().unwrap_or("");
    format!("{}{}", value, unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(data_type: u8, data: u32) -> String {
        ResValue { data_type, data }.to_string_with(&StringPool::default())
    }

    #[test]
    fn formats_scalars() {
        assert_eq!(fmt(TYPE_INT_DEC, 42), "42");
        assert_eq!(fmt(TYPE_INT_DEC, (-3i32) as u32), "-3");
        assert_eq!(fmt(TYPE_INT_HEX, 0x30), "0x30");
        assert_eq!(fmt(TYPE_INT_BOOLEAN, 0xffff_ffff), "true");
        assert_eq!(fmt(TYPE_INT_BOOLEAN, 0), "false");
        assert_eq!(fmt(TYPE_NULL, 0), "");
        assert_eq!(fmt(TYPE_FLOAT, 1.5f32.to_bits()), "1.5");
    }

    #[test]
    fn formats_references_and_colors() {
        assert_eq!(fmt(TYPE_REFERENCE, 0x7f08_0001), "@0x7f080001");
        assert_eq!(fmt(TYPE_ATTRIBUTE, 0x0101_0000), "?0x01010000");
        assert_eq!(fmt(TYPE_INT_COLOR_ARGB8, 0xff00_ff00), "#ff00ff00");
        assert_eq!(fmt(TYPE_INT_COLOR_RGB8, 0xff12_3456), "#123456");
    }

    #[test]
    fn formats_dimensions() {
        // 16dip: mantissa 16 << 8, radix 0, unit 1
        assert_eq!(fmt(TYPE_DIMENSION, (16 << 8) | 1), "16dip");
        assert_eq!(fmt(TYPE_FRACTION, 50 << 8), "50%");
    }
}
