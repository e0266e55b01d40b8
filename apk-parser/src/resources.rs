use crate::chunk::{
    read_chunk, u16_at, u32_at, u8_at, ChunkIter, RawChunk, RES_STRING_POOL_TYPE,
    RES_TABLE_PACKAGE_TYPE, RES_TABLE_TYPE, RES_TABLE_TYPE_SPEC_TYPE, RES_TABLE_TYPE_TYPE,
};
use crate::string_pool::StringPool;
use crate::value::{ResValue, TYPE_STRING};
use anyhow::{ensure, Context, Result};
use log::{debug, trace};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

/// Unqualified resources, treated as [DENSITY_MEDIUM]
pub const DENSITY_DEFAULT: u16 = 0;
/// Baseline density (mdpi)
pub const DENSITY_MEDIUM: u16 = 160;
/// `anydpi`, usually vector or adaptive icons
pub const DENSITY_ANY: u16 = 0xfffe;
/// `nodpi`, never scaled
pub const DENSITY_NONE: u16 = 0xffff;

const NO_ENTRY: u32 = 0xffff_ffff;
const NO_ENTRY_16: u16 = 0xffff;

pub(crate) const TYPE_FLAG_SPARSE: u8 = 0x01;
pub(crate) const TYPE_FLAG_OFFSET16: u8 = 0x02;

const ENTRY_FLAG_COMPLEX: u16 = 0x0001;
pub(crate) const ENTRY_FLAG_COMPACT: u16 = 0x0008;

/// Numeric resource id `0xPPTTEEEE`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId(pub u32);

impl ResourceId {
    /// Parse a decoded reference such as `@0x7f080000`
    pub fn from_reference(s: &str) -> Option<Self> {
        let hex = s.strip_prefix('@')?;
        let hex = hex
            .strip_prefix("0x")
            .or_else(|| hex.strip_prefix("0X"))?;
        u32::from_str_radix(hex, 16).ok().map(ResourceId)
    }

    pub fn package_id(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub fn type_id(&self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub fn entry_index(&self) -> u16 {
        self.0 as u16
    }
}

impl Display for ResourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// The parts of `ResTable_config` used for lookups
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResTableConfig {
    pub language: [u8; 2],
    pub country: [u8; 2],
    pub density: u16,
}

impl ResTableConfig {
    fn read(buf: &[u8], pos: usize) -> Result<Self> {
        let size = u32_at(buf, pos)? as usize;
        let mut config = ResTableConfig::default();
        if size >= 12 {
            config.language = [u8_at(buf, pos + 8)?, u8_at(buf, pos + 9)?];
            config.country = [u8_at(buf, pos + 10)?, u8_at(buf, pos + 11)?];
        }
        if size >= 16 {
            config.density = u16_at(buf, pos + 14)?;
        }
        Ok(config)
    }

    pub fn has_locale(&self) -> bool {
        self.language != [0, 0] || self.country != [0, 0]
    }
}

/// One configuration-specific value of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceEntry {
    pub config: ResTableConfig,
    pub value: ResValue,
}

/// Compiled resource table (`resources.arsc`), reduced to simple values
#[derive(Debug, Clone, Default)]
pub struct ResourceTable {
    strings: StringPool,
    entries: HashMap<u32, Vec<ResourceEntry>>,
}

impl ResourceTable {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let table = read_chunk(data, 0).context("Invalid resource table header")?;
        ensure!(
            table.header.ty == RES_TABLE_TYPE,
            "Not a resource table, chunk type 0x{:04x}",
            table.header.ty
        );
        let package_count = u32_at(table.data, 8)?;
        debug!("Resource table with {} package(s)", package_count);

        let mut res = ResourceTable::default();
        let mut have_strings = false;
        for chunk in ChunkIter::new(table.body()) {
            let chunk = chunk?;
            match chunk.header.ty {
                RES_STRING_POOL_TYPE if !have_strings => {
                    res.strings = StringPool::parse(&chunk)?;
                    have_strings = true;
                }
                RES_TABLE_PACKAGE_TYPE => res.read_package(&chunk)?,
                t => debug!("Skipping table chunk 0x{:04x}", t),
            }
        }
        Ok(res)
    }

    fn read_package(&mut self, chunk: &RawChunk) -> Result<()> {
        let package_id = u32_at(chunk.data, 8)?;
        trace!("package 0x{:02x}", package_id);
        for child in ChunkIter::new(chunk.body()) {
            let child = child?;
            match child.header.ty {
                RES_TABLE_TYPE_TYPE => self.read_type(&child, package_id)?,
                // type/key name pools and specs are not needed for id lookups
                RES_STRING_POOL_TYPE | RES_TABLE_TYPE_SPEC_TYPE => {}
                t => debug!("Skipping package chunk 0x{:04x}", t),
            }
        }
        Ok(())
    }

    fn read_type(&mut self, chunk: &RawChunk, package_id: u32) -> Result<()> {
        let d = chunk.data;
        let type_id = u8_at(d, 8)?;
        let flags = u8_at(d, 9)?;
        let entry_count = u32_at(d, 12)? as usize;
        let entries_start = u32_at(d, 16)? as usize;
        let config = ResTableConfig::read(d, 20)?;
        let offsets = chunk.header.header_size as usize;

        let offset_size = if flags & TYPE_FLAG_OFFSET16 != 0 && flags & TYPE_FLAG_SPARSE == 0 {
            2
        } else {
            4
        };
        let offsets_end = entry_count
            .checked_mul(offset_size)
            .and_then(|n| n.checked_add(offsets));
        ensure!(
            offsets_end.is_some_and(|end| end <= d.len()) && entries_start <= d.len(),
            "Type chunk 0x{:02x} declares {} entries at {}, chunk is {} bytes",
            type_id,
            entry_count,
            entries_start,
            d.len()
        );

        let mut located = Vec::with_capacity(entry_count);
        for i in 0..entry_count {
            if flags & TYPE_FLAG_SPARSE != 0 {
                let idx = u16_at(d, offsets + i * 4)? as u32;
                let off = u16_at(d, offsets + i * 4 + 2)? as usize * 4;
                located.push((idx, off));
            } else if flags & TYPE_FLAG_OFFSET16 != 0 {
                let off = u16_at(d, offsets + i * 2)?;
                if off != NO_ENTRY_16 {
                    located.push((i as u32, off as usize * 4));
                }
            } else {
                let off = u32_at(d, offsets + i * 4)?;
                if off != NO_ENTRY {
                    located.push((i as u32, off as usize));
                }
            }
        }

        for (idx, off) in located {
            let pos = entries_start + off;
            let size = u16_at(d, pos)? as usize;
            let entry_flags = u16_at(d, pos + 2)?;
            let value = if entry_flags & ENTRY_FLAG_COMPACT != 0 {
                ResValue {
                    data_type: (entry_flags >> 8) as u8,
                    data: u32_at(d, pos + 4)?,
                }
            } else if entry_flags & ENTRY_FLAG_COMPLEX != 0 {
                // styles, arrays and plurals: not needed here
                continue;
            } else {
                ResValue::read(d, pos + size)?
            };
            let id = (package_id << 24) | ((type_id as u32) << 16) | idx;
            self.entries
                .entry(id)
                .or_default()
                .push(ResourceEntry { config, value });
        }
        Ok(())
    }

    /// All configuration variants of a resource, in table order
    pub fn entries(&self, id: ResourceId) -> &[ResourceEntry] {
        self.entries.get(&id.0).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn string(&self, idx: u32) -> Option<&str> {
        self.strings.get(idx)
    }

    /// Resolve a string resource (e.g. the application label), preferring
    /// the variant without locale qualifiers. A value that is itself a
    /// reference is followed once.
    pub fn resolve_string(&self, id: ResourceId) -> Option<String> {
        self.resolve_string_depth(id, 1)
    }

    fn resolve_string_depth(&self, id: ResourceId, depth: u8) -> Option<String> {
        let entries = self.entries(id);
        let entry = entries
            .iter()
            .find(|e| !e.config.has_locale())
            .or_else(|| entries.first())?;
        match entry.value {
            v if v.data_type == TYPE_STRING => self.string(v.data).map(|s| s.to_string()),
            v if v.is_reference() && depth > 0 => {
                self.resolve_string_depth(ResourceId(v.data), depth - 1)
            }
            _ => None,
        }
    }

    /// File paths a (drawable / mipmap) resource resolves to, best match
    /// for `density` first. See [rank_by_density] for the ordering.
    pub fn resolve_files(&self, id: ResourceId, density: Option<u16>) -> Vec<String> {
        let mut files: Vec<String> = vec![];
        for entry in rank_by_density(self.entries(id), density) {
            let path = match entry.value {
                v if v.data_type == TYPE_STRING => self.string(v.data).map(|s| s.to_string()),
                v if v.is_reference() => self
                    .resolve_files_direct(ResourceId(v.data), density)
                    .into_iter()
                    .next(),
                _ => None,
            };
            if let Some(p) = path {
                if !files.contains(&p) {
                    files.push(p);
                }
            }
        }
        files
    }

    fn resolve_files_direct(&self, id: ResourceId, density: Option<u16>) -> Vec<String> {
        rank_by_density(self.entries(id), density)
            .into_iter()
            .filter(|e| e.value.data_type == TYPE_STRING)
            .filter_map(|e| self.string(e.value.data).map(|s| s.to_string()))
            .collect()
    }
}

/// Order resource variants by how well they match the requested density.
///
/// Without a request the baseline [DENSITY_MEDIUM] is the target, and
/// unqualified variants count as [DENSITY_MEDIUM]. `nodpi` matches any
/// target exactly. Then: exact match, closest above, closest below,
/// `anydpi` last. Equal ranks keep table order.
pub fn rank_by_density(entries: &[ResourceEntry], density: Option<u16>) -> Vec<&ResourceEntry> {
    let target = match density {
        None | Some(DENSITY_DEFAULT) => DENSITY_MEDIUM,
        Some(d) => d,
    } as u32;

    let mut ranked: Vec<(u8, u32, &ResourceEntry)> = entries
        .iter()
        .map(|e| {
            let (class, distance) = match e.config.density {
                DENSITY_NONE => (0, 0),
                DENSITY_ANY => (3, 0),
                d => {
                    let d = if d == DENSITY_DEFAULT { DENSITY_MEDIUM } else { d } as u32;
                    if d == target {
                        (0, 0)
                    } else if d > target {
                        (1, d - target)
                    } else {
                        (2, target - d)
                    }
                }
            };
            (class, distance, e)
        })
        .collect();
    // stable, so ties stay in table order
    ranked.sort_by_key(|(class, distance, _)| (*class, *distance));
    ranked.into_iter().map(|(_, _, e)| e).collect()
}
