//! Encoders for compiled Android XML documents and resource tables.
//!
//! Only the subset understood by this crate's decoders is produced: UTF-16
//! string pools and simple (non-complex) entries, laid out in any of the
//! type chunk encodings aapt2 emits.

use crate::chunk::{
    RES_STRING_POOL_TYPE, RES_TABLE_PACKAGE_TYPE, RES_TABLE_TYPE, RES_TABLE_TYPE_SPEC_TYPE,
    RES_TABLE_TYPE_TYPE, RES_XML_END_ELEMENT_TYPE, RES_XML_END_NAMESPACE_TYPE,
    RES_XML_RESOURCE_MAP_TYPE, RES_XML_START_ELEMENT_TYPE, RES_XML_START_NAMESPACE_TYPE,
    RES_XML_TYPE,
};
use crate::resources::{ENTRY_FLAG_COMPACT, TYPE_FLAG_OFFSET16, TYPE_FLAG_SPARSE};
use crate::value::{TYPE_INT_BOOLEAN, TYPE_INT_DEC, TYPE_REFERENCE, TYPE_STRING};
use byteorder::{LittleEndian, WriteBytesExt};
use std::collections::HashMap;

const ANDROID_NS: &str = "http://schemas.android.com/apk/res/android";
const NO_INDEX: u32 = 0xffff_ffff;

#[derive(Debug, Clone)]
enum AttrValue {
    Str(String),
    Int(u32),
    Bool(bool),
    Ref(u32),
}

#[derive(Debug, Clone)]
struct Attr {
    name: String,
    resource_id: Option<u32>,
    value: AttrValue,
}

/// Element of a document to be compiled with [encode_binary_xml]
#[derive(Debug, Clone)]
pub struct XmlElement {
    name: String,
    attrs: Vec<Attr>,
    children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(name: &str) -> Self {
        XmlElement {
            name: name.to_string(),
            attrs: vec![],
            children: vec![],
        }
    }

    /// Plain string attribute without a resource id
    pub fn attr(self, name: &str, value: &str) -> Self {
        self.push(name, None, AttrValue::Str(value.to_string()))
    }

    /// Framework (`android:`) string attribute
    pub fn android_attr(self, name: &str, id: u32, value: &str) -> Self {
        self.push(name, Some(id), AttrValue::Str(value.to_string()))
    }

    pub fn android_int(self, name: &str, id: u32, value: u32) -> Self {
        self.push(name, Some(id), AttrValue::Int(value))
    }

    pub fn android_bool(self, name: &str, id: u32, value: bool) -> Self {
        self.push(name, Some(id), AttrValue::Bool(value))
    }

    pub fn android_ref(self, name: &str, id: u32, target: u32) -> Self {
        self.push(name, Some(id), AttrValue::Ref(target))
    }

    pub fn child(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }

    fn push(mut self, name: &str, resource_id: Option<u32>, value: AttrValue) -> Self {
        self.attrs.push(Attr {
            name: name.to_string(),
            resource_id,
            value,
        });
        self
    }
}

#[derive(Default)]
struct Strings {
    strings: Vec<String>,
    index: HashMap<String, u32>,
}

impl Strings {
    fn id(&mut self, s: &str) -> u32 {
        if let Some(i) = self.index.get(s) {
            return *i;
        }
        let i = self.strings.len() as u32;
        self.strings.push(s.to_string());
        self.index.insert(s.to_string(), i);
        i
    }
}

/// Compile `root` to binary XML. With `strip_names` the names of
/// attributes carrying a resource id are blanked in the string pool, as
/// some obfuscators do.
pub fn encode_binary_xml(root: &XmlElement, strip_names: bool) -> Vec<u8> {
    // attributes with resource ids occupy the first pool slots, in the
    // same order as the resource map
    let mut framework: Vec<(String, u32)> = vec![];
    collect_framework_attrs(root, &mut framework);

    let mut strings = Strings::default();
    let mut framework_index = HashMap::new();
    for (i, (name, id)) in framework.iter().enumerate() {
        strings
            .strings
            .push(if strip_names { String::new() } else { name.clone() });
        framework_index.insert((name.clone(), *id), i as u32);
    }
    if !strip_names {
        for (name, i) in &framework_index {
            strings.index.entry(name.0.clone()).or_insert(*i);
        }
    }

    let prefix = strings.id("android");
    let uri = strings.id(ANDROID_NS);
    let mut body = vec![];
    write_namespace(&mut body, RES_XML_START_NAMESPACE_TYPE, prefix, uri);
    write_element(&mut body, root, &mut strings, &framework_index, uri);
    write_namespace(&mut body, RES_XML_END_NAMESPACE_TYPE, prefix, uri);

    let pool = encode_string_pool(&strings.strings);
    let mut map = vec![];
    map.write_u16::<LittleEndian>(RES_XML_RESOURCE_MAP_TYPE).unwrap();
    map.write_u16::<LittleEndian>(8).unwrap();
    map.write_u32::<LittleEndian>(8 + 4 * framework.len() as u32)
        .unwrap();
    for (_, id) in &framework {
        map.write_u32::<LittleEndian>(*id).unwrap();
    }

    let mut out = vec![];
    let size = 8 + pool.len() + map.len() + body.len();
    out.write_u16::<LittleEndian>(RES_XML_TYPE).unwrap();
    out.write_u16::<LittleEndian>(8).unwrap();
    out.write_u32::<LittleEndian>(size as u32).unwrap();
    out.extend(pool);
    out.extend(map);
    out.extend(body);
    out
}

fn collect_framework_attrs(el: &XmlElement, out: &mut Vec<(String, u32)>) {
    for a in &el.attrs {
        if let Some(id) = a.resource_id {
            if !out.iter().any(|(n, i)| *n == a.name && *i == id) {
                out.push((a.name.clone(), id));
            }
        }
    }
    for c in &el.children {
        collect_framework_attrs(c, out);
    }
}

fn write_namespace(out: &mut Vec<u8>, ty: u16, prefix: u32, uri: u32) {
    out.write_u16::<LittleEndian>(ty).unwrap();
    out.write_u16::<LittleEndian>(16).unwrap();
    out.write_u32::<LittleEndian>(24).unwrap();
    out.write_u32::<LittleEndian>(1).unwrap();
    out.write_u32::<LittleEndian>(NO_INDEX).unwrap();
    out.write_u32::<LittleEndian>(prefix).unwrap();
    out.write_u32::<LittleEndian>(uri).unwrap();
}

fn write_element(
    out: &mut Vec<u8>,
    el: &XmlElement,
    strings: &mut Strings,
    framework: &HashMap<(String, u32), u32>,
    android_ns: u32,
) {
    let name = strings.id(&el.name);
    out.write_u16::<LittleEndian>(RES_XML_START_ELEMENT_TYPE)
        .unwrap();
    out.write_u16::<LittleEndian>(16).unwrap();
    out.write_u32::<LittleEndian>(36 + 20 * el.attrs.len() as u32)
        .unwrap();
    out.write_u32::<LittleEndian>(1).unwrap();
    out.write_u32::<LittleEndian>(NO_INDEX).unwrap();
    out.write_u32::<LittleEndian>(NO_INDEX).unwrap();
    out.write_u32::<LittleEndian>(name).unwrap();
    out.write_u16::<LittleEndian>(20).unwrap();
    out.write_u16::<LittleEndian>(20).unwrap();
    out.write_u16::<LittleEndian>(el.attrs.len() as u16).unwrap();
    out.write_u16::<LittleEndian>(0).unwrap();
    out.write_u16::<LittleEndian>(0).unwrap();
    out.write_u16::<LittleEndian>(0).unwrap();

    for a in &el.attrs {
        let (ns, attr_name) = match a.resource_id {
            Some(id) => (android_ns, framework[&(a.name.clone(), id)]),
            None => (NO_INDEX, strings.id(&a.name)),
        };
        let (raw, data_type, data) = match &a.value {
            AttrValue::Str(s) => {
                let i = strings.id(s);
                (i, TYPE_STRING, i)
            }
            AttrValue::Int(v) => (NO_INDEX, TYPE_INT_DEC, *v),
            AttrValue::Bool(v) => (NO_INDEX, TYPE_INT_BOOLEAN, if *v { NO_INDEX } else { 0 }),
            AttrValue::Ref(v) => (NO_INDEX, TYPE_REFERENCE, *v),
        };
        out.write_u32::<LittleEndian>(ns).unwrap();
        out.write_u32::<LittleEndian>(attr_name).unwrap();
        out.write_u32::<LittleEndian>(raw).unwrap();
        out.write_u16::<LittleEndian>(8).unwrap();
        out.write_u8(0).unwrap();
        out.write_u8(data_type).unwrap();
        out.write_u32::<LittleEndian>(data).unwrap();
    }

    for c in &el.children {
        write_element(out, c, strings, framework, android_ns);
    }

    out.write_u16::<LittleEndian>(RES_XML_END_ELEMENT_TYPE).unwrap();
    out.write_u16::<LittleEndian>(16).unwrap();
    out.write_u32::<LittleEndian>(24).unwrap();
    out.write_u32::<LittleEndian>(1).unwrap();
    out.write_u32::<LittleEndian>(NO_INDEX).unwrap();
    out.write_u32::<LittleEndian>(NO_INDEX).unwrap();
    out.write_u32::<LittleEndian>(name).unwrap();
}

/// Encode a UTF-16 `ResStringPool` chunk
pub fn encode_string_pool(strings: &[String]) -> Vec<u8> {
    let mut data = vec![];
    let mut offsets = vec![];
    for s in strings {
        offsets.push(data.len() as u32);
        let units: Vec<u16> = s.encode_utf16().collect();
        data.write_u16::<LittleEndian>(units.len() as u16).unwrap();
        for u in units {
            data.write_u16::<LittleEndian>(u).unwrap();
        }
        data.write_u16::<LittleEndian>(0).unwrap();
    }
    while data.len() % 4 != 0 {
        data.push(0);
    }

    let strings_start = 28 + 4 * strings.len();
    let mut out = vec![];
    out.write_u16::<LittleEndian>(RES_STRING_POOL_TYPE).unwrap();
    out.write_u16::<LittleEndian>(28).unwrap();
    out.write_u32::<LittleEndian>((strings_start + data.len()) as u32)
        .unwrap();
    out.write_u32::<LittleEndian>(strings.len() as u32).unwrap();
    out.write_u32::<LittleEndian>(0).unwrap();
    out.write_u32::<LittleEndian>(0).unwrap();
    out.write_u32::<LittleEndian>(strings_start as u32).unwrap();
    out.write_u32::<LittleEndian>(0).unwrap();
    for o in offsets {
        out.write_u32::<LittleEndian>(o).unwrap();
    }
    out.extend(data);
    out
}

#[derive(Debug, Clone)]
enum TableValue {
    Str(String),
    Ref(u32),
}

#[derive(Debug, Clone)]
struct TableEntry {
    id: u32,
    density: u16,
    language: [u8; 2],
    value: TableValue,
}

/// Builds a single-package `resources.arsc`
#[derive(Debug, Clone)]
pub struct TableBuilder {
    package_id: u8,
    entries: Vec<TableEntry>,
    layout: EntryLayout,
    compact: bool,
}

/// How a type chunk maps entry indices to entry offsets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EntryLayout {
    /// One 32-bit offset per index
    #[default]
    Dense,
    /// One 16-bit offset (in 4 byte units) per index
    Offset16,
    /// (index, 16-bit offset) pairs for present entries only
    Sparse,
}

impl TableBuilder {
    pub fn new(package_id: u8) -> Self {
        TableBuilder {
            package_id,
            entries: vec![],
            layout: EntryLayout::Dense,
            compact: false,
        }
    }

    pub fn layout(mut self, layout: EntryLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Write 8 byte compact entries instead of entry header + value
    pub fn compact_entries(mut self) -> Self {
        self.compact = true;
        self
    }

    /// String value for resource `id` under the given density / language
    pub fn string(self, id: u32, density: u16, language: Option<&str>, value: &str) -> Self {
        self.push(id, density, language, TableValue::Str(value.to_string()))
    }

    /// Reference value pointing at `target`
    pub fn reference(self, id: u32, density: u16, language: Option<&str>, target: u32) -> Self {
        self.push(id, density, language, TableValue::Ref(target))
    }

    fn push(mut self, id: u32, density: u16, language: Option<&str>, value: TableValue) -> Self {
        let mut lang = [0u8; 2];
        if let Some(l) = language {
            for (d, s) in lang.iter_mut().zip(l.bytes()) {
                *d = s;
            }
        }
        self.entries.push(TableEntry {
            id,
            density,
            language: lang,
            value,
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut strings = Strings::default();
        for e in &self.entries {
            if let TableValue::Str(s) = &e.value {
                strings.id(s);
            }
        }

        let type_ids: Vec<u8> = {
            let mut ids: Vec<u8> = self.entries.iter().map(|e| (e.id >> 16) as u8).collect();
            ids.sort_unstable();
            ids.dedup();
            ids
        };
        let max_type = type_ids.last().copied().unwrap_or(0);
        let type_names: Vec<String> = (1..=max_type).map(|i| format!("type{}", i)).collect();

        let mut chunks = vec![];
        for type_id in &type_ids {
            let of_type: Vec<&TableEntry> = self
                .entries
                .iter()
                .filter(|e| (e.id >> 16) as u8 == *type_id)
                .collect();
            let entry_count = of_type
                .iter()
                .map(|e| (e.id & 0xffff) + 1)
                .max()
                .unwrap_or(0);

            chunks.write_u16::<LittleEndian>(RES_TABLE_TYPE_SPEC_TYPE)
                .unwrap();
            chunks.write_u16::<LittleEndian>(16).unwrap();
            chunks
                .write_u32::<LittleEndian>(16 + 4 * entry_count)
                .unwrap();
            chunks.write_u8(*type_id).unwrap();
            chunks.write_u8(0).unwrap();
            chunks.write_u16::<LittleEndian>(0).unwrap();
            chunks.write_u32::<LittleEndian>(entry_count).unwrap();
            for _ in 0..entry_count {
                chunks.write_u32::<LittleEndian>(0).unwrap();
            }

            let mut configs: Vec<(u16, [u8; 2])> = vec![];
            for e in &of_type {
                if !configs.contains(&(e.density, e.language)) {
                    configs.push((e.density, e.language));
                }
            }
            for (density, language) in configs {
                let in_config: Vec<&&TableEntry> = of_type
                    .iter()
                    .filter(|e| e.density == density && e.language == language)
                    .collect();
                let chunk = TypeChunk {
                    type_id: *type_id,
                    entry_count,
                    density,
                    language,
                    layout: self.layout,
                    compact: self.compact,
                };
                chunk.write(&mut chunks, &in_config, &mut strings);
            }
        }

        let type_pool = encode_string_pool(&type_names);
        let key_pool = encode_string_pool(&["k".to_string()]);
        let mut package = vec![];
        let package_size = 288 + type_pool.len() + key_pool.len() + chunks.len();
        package
            .write_u16::<LittleEndian>(RES_TABLE_PACKAGE_TYPE)
            .unwrap();
        package.write_u16::<LittleEndian>(288).unwrap();
        package.write_u32::<LittleEndian>(package_size as u32).unwrap();
        package.write_u32::<LittleEndian>(self.package_id as u32).unwrap();
        let mut name: Vec<u16> = "com.example".encode_utf16().collect();
        name.resize(128, 0);
        for u in name {
            package.write_u16::<LittleEndian>(u).unwrap();
        }
        package.write_u32::<LittleEndian>(288).unwrap();
        package.write_u32::<LittleEndian>(0).unwrap();
        package
            .write_u32::<LittleEndian>(288 + type_pool.len() as u32)
            .unwrap();
        package.write_u32::<LittleEndian>(0).unwrap();
        package.write_u32::<LittleEndian>(0).unwrap();
        package.extend(type_pool);
        package.extend(key_pool);
        package.extend(chunks);

        let global_pool = encode_string_pool(&strings.strings);
        let mut out = vec![];
        out.write_u16::<LittleEndian>(RES_TABLE_TYPE).unwrap();
        out.write_u16::<LittleEndian>(12).unwrap();
        out.write_u32::<LittleEndian>((12 + global_pool.len() + package.len()) as u32)
            .unwrap();
        out.write_u32::<LittleEndian>(1).unwrap();
        out.extend(global_pool);
        out.extend(package);
        out
    }
}

struct TypeChunk {
    type_id: u8,
    entry_count: u32,
    density: u16,
    language: [u8; 2],
    layout: EntryLayout,
    compact: bool,
}

impl TypeChunk {
    fn write(&self, out: &mut Vec<u8>, entries: &[&&TableEntry], strings: &mut Strings) {
        const CONFIG_SIZE: u32 = 64;
        let entry_size: u32 = if self.compact { 8 } else { 16 };
        let header_size = 20 + CONFIG_SIZE;

        let mut present: Vec<(u32, u32)> = entries
            .iter()
            .enumerate()
            .map(|(p, e)| (e.id & 0xffff, p as u32 * entry_size))
            .collect();
        present.sort_unstable();

        let mut offsets = vec![];
        let (flags, count) = match self.layout {
            EntryLayout::Dense => {
                for i in 0..self.entry_count {
                    let off = present.iter().find(|(idx, _)| *idx == i).map(|(_, o)| *o);
                    offsets
                        .write_u32::<LittleEndian>(off.unwrap_or(NO_INDEX))
                        .unwrap();
                }
                (0, self.entry_count)
            }
            EntryLayout::Offset16 => {
                for i in 0..self.entry_count {
                    let off = present.iter().find(|(idx, _)| *idx == i).map(|(_, o)| *o / 4);
                    offsets
                        .write_u16::<LittleEndian>(off.map_or(0xffff, |o| o as u16))
                        .unwrap();
                }
                (TYPE_FLAG_OFFSET16, self.entry_count)
            }
            EntryLayout::Sparse => {
                for (idx, off) in &present {
                    offsets.write_u16::<LittleEndian>(*idx as u16).unwrap();
                    offsets.write_u16::<LittleEndian>((*off / 4) as u16).unwrap();
                }
                (TYPE_FLAG_SPARSE, present.len() as u32)
            }
        };
        // entries start 4 byte aligned
        offsets.resize((offsets.len() + 3) & !3, 0);

        let entries_start = header_size + offsets.len() as u32;
        let size = entries_start + entry_size * entries.len() as u32;

        out.write_u16::<LittleEndian>(RES_TABLE_TYPE_TYPE).unwrap();
        out.write_u16::<LittleEndian>(header_size as u16).unwrap();
        out.write_u32::<LittleEndian>(size).unwrap();
        out.write_u8(self.type_id).unwrap();
        out.write_u8(flags).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u32::<LittleEndian>(count).unwrap();
        out.write_u32::<LittleEndian>(entries_start).unwrap();

        let mut config = vec![0u8; CONFIG_SIZE as usize];
        config[..4].copy_from_slice(&CONFIG_SIZE.to_le_bytes());
        config[8..10].copy_from_slice(&self.language);
        config[14..16].copy_from_slice(&self.density.to_le_bytes());
        out.extend(config);
        out.extend(offsets);

        for e in entries {
            let (data_type, data) = match &e.value {
                TableValue::Str(s) => (TYPE_STRING, strings.id(s)),
                TableValue::Ref(r) => (TYPE_REFERENCE, *r),
            };
            if self.compact {
                // key index, then flags carrying the value type
                out.write_u16::<LittleEndian>(0).unwrap();
                out.write_u16::<LittleEndian>(ENTRY_FLAG_COMPACT | (data_type as u16) << 8)
                    .unwrap();
                out.write_u32::<LittleEndian>(data).unwrap();
            } else {
                out.write_u16::<LittleEndian>(8).unwrap();
                out.write_u16::<LittleEndian>(0).unwrap();
                out.write_u32::<LittleEndian>(0).unwrap();
                out.write_u16::<LittleEndian>(8).unwrap();
                out.write_u8(0).unwrap();
                out.write_u8(data_type).unwrap();
                out.write_u32::<LittleEndian>(data).unwrap();
            }
        }
    }
}
