use crate::chunk::{
    read_chunk, u16_at, u32_at, ChunkIter, RawChunk, RES_STRING_POOL_TYPE,
    RES_XML_CDATA_TYPE, RES_XML_END_ELEMENT_TYPE, RES_XML_END_NAMESPACE_TYPE,
    RES_XML_RESOURCE_MAP_TYPE, RES_XML_START_ELEMENT_TYPE, RES_XML_START_NAMESPACE_TYPE,
    RES_XML_TYPE,
};
use crate::string_pool::StringPool;
use crate::value::ResValue;
use anyhow::{bail, ensure, Context, Result};
use log::{debug, trace, warn};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use std::collections::HashSet;

const NO_INDEX: u32 = 0xffff_ffff;
const ATTRIBUTE_MIN_SIZE: usize = 20;

/// Framework attribute names by resource id, used when a build tool has
/// blanked the attribute names in the string pool.
const FRAMEWORK_ATTRS: [(u32, &str); 7] = [
    (0x0101_0001, "label"),
    (0x0101_0002, "icon"),
    (0x0101_0003, "name"),
    (0x0101_020c, "minSdkVersion"),
    (0x0101_021b, "versionCode"),
    (0x0101_021c, "versionName"),
    (0x0101_0270, "targetSdkVersion"),
];

/// Element of a decoded binary XML document.
///
/// Attribute values are already converted to their canonical string form,
/// attribute order is the order of the binary stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinaryXmlNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<BinaryXmlNode>,
}

impl BinaryXmlNode {
    /// Value of the first attribute called `name`
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First direct child element called `name`
    pub fn child(&self, name: &str) -> Option<&BinaryXmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All direct children called `name`, in document order
    pub fn children_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a BinaryXmlNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Render the tree as textual XML.
    ///
    /// Attributes without a usable name are dropped, as are repeated
    /// attribute names (an attribute can exist once per namespace in the
    /// binary form but only the local name is kept).
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::with_capacity(4096));
        self.write_xml(&mut writer)?;
        Ok(String::from_utf8(writer.into_inner())?)
    }

    fn write_xml(&self, writer: &mut Writer<Vec<u8>>) -> Result<()> {
        let mut start = BytesStart::new(self.name.as_str());
        let mut seen = HashSet::new();
        for (k, v) in &self.attributes {
            if k.is_empty() || !seen.insert(k.as_str()) {
                continue;
            }
            start.push_attribute((k.as_str(), v.as_str()));
        }
        if self.children.is_empty() {
            writer.write_event(Event::Empty(start))?;
        } else {
            writer.write_event(Event::Start(start))?;
            for child in &self.children {
                child.write_xml(writer)?;
            }
            writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))?;
        }
        Ok(())
    }
}

/// Decode a compiled binary XML document (e.g. `AndroidManifest.xml`) into
/// its element tree.
pub fn parse_binary_xml(data: &[u8]) -> Result<BinaryXmlNode> {
    let doc = read_chunk(data, 0).context("Invalid binary XML header")?;
    ensure!(
        doc.header.ty == RES_XML_TYPE,
        "Not a binary XML document, chunk type 0x{:04x}",
        doc.header.ty
    );
    if (doc.header.size as usize) < data.len() {
        warn!(
            "{} trailing bytes after binary XML document",
            data.len() - doc.header.size as usize
        );
    }

    let mut strings: Option<StringPool> = None;
    let mut resource_map: Vec<u32> = vec![];
    let mut stack: Vec<BinaryXmlNode> = vec![];
    let mut root: Option<BinaryXmlNode> = None;

    for chunk in ChunkIter::new(doc.body()) {
        let chunk = chunk?;
        match chunk.header.ty {
            RES_STRING_POOL_TYPE => {
                if strings.is_some() {
                    bail!("Binary XML contains more than one string pool");
                }
                strings = Some(StringPool::parse(&chunk)?);
            }
            RES_XML_RESOURCE_MAP_TYPE => resource_map = read_resource_map(&chunk)?,
            RES_XML_START_NAMESPACE_TYPE | RES_XML_END_NAMESPACE_TYPE | RES_XML_CDATA_TYPE => {
                trace!("Skipping chunk: 0x{:04x}", chunk.header.ty)
            }
            RES_XML_START_ELEMENT_TYPE => {
                let strings = strings
                    .as_ref()
                    .context("Element found before string pool")?;
                ensure!(
                    !(stack.is_empty() && root.is_some()),
                    "Binary XML has more than one root element"
                );
                stack.push(read_start_element(&chunk, strings, &resource_map)?);
            }
            RES_XML_END_ELEMENT_TYPE => {
                let strings = strings
                    .as_ref()
                    .context("Element found before string pool")?;
                let name = element_name(&chunk, strings)?;
                let node = match stack.pop() {
                    Some(n) => n,
                    None => bail!("End of element <{}> without matching start", name),
                };
                ensure!(
                    node.name == name,
                    "End of element <{}> does not close <{}>",
                    name,
                    node.name
                );
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root = Some(node),
                }
            }
            t => debug!("Unknown binary XML chunk type 0x{:04x}", t),
        }
    }

    ensure!(
        stack.is_empty(),
        "{} element(s) still open at end of document",
        stack.len()
    );
    root.context("Binary XML document has no root element")
}

fn read_resource_map(chunk: &RawChunk) -> Result<Vec<u32>> {
    let body = chunk.body();
    ensure!(
        body.len() % 4 == 0,
        "Resource map length {} is not a multiple of 4",
        body.len()
    );
    (0..body.len() / 4).map(|i| u32_at(body, i * 4)).collect()
}

/// Resolve the (namespace, name) pair that starts the extension of start
/// and end element chunks.
fn element_name(chunk: &RawChunk, strings: &StringPool) -> Result<String> {
    let ext = chunk.body();
    let idx = u32_at(ext, 4)?;
    strings
        .get(idx)
        .map(|s| s.to_string())
        .with_context(|| format!("Element name index {} not in string pool", idx))
}

fn read_start_element(
    chunk: &RawChunk,
    strings: &StringPool,
    resource_map: &[u32],
) -> Result<BinaryXmlNode> {
    let ext = chunk.body();
    let name = element_name(chunk, strings)?;
    let attribute_start = u16_at(ext, 8)? as usize;
    let attribute_size = u16_at(ext, 10)? as usize;
    let attribute_count = u16_at(ext, 12)? as usize;
    ensure!(
        attribute_count == 0 || attribute_size >= ATTRIBUTE_MIN_SIZE,
        "Attribute size {} too small in <{}>",
        attribute_size,
        name
    );

    let mut attributes = Vec::with_capacity(attribute_count);
    for i in 0..attribute_count {
        let pos = attribute_start + i * attribute_size;
        let name_idx = u32_at(ext, pos + 4)?;
        let raw_value = u32_at(ext, pos + 8)?;
        let typed_value = ResValue::read(ext, pos + 12)
            .with_context(|| format!("Truncated attribute {} of <{}>", i, name))?;

        let attr_name = attribute_name(name_idx, strings, resource_map);
        let value = if typed_value.is_string() {
            strings
                .get(if raw_value != NO_INDEX {
                    raw_value
                } else {
                    typed_value.data
                })
                .unwrap_or_default()
                .to_string()
        } else {
            typed_value.to_string_with(strings)
        };
        trace!("<{} {}={:?}> {:?}", name, attr_name, value, typed_value);
        attributes.push((attr_name, value));
    }

    Ok(BinaryXmlNode {
        name,
        attributes,
        children: vec![],
    })
}

fn attribute_name(idx: u32, strings: &StringPool, resource_map: &[u32]) -> String {
    match strings.get(idx) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => resource_map
            .get(idx as usize)
            .and_then(|id| FRAMEWORK_ATTRS.iter().find(|(k, _)| k == id))
            .map(|(_, n)| n.to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{encode_binary_xml, XmlElement};

    fn sample() -> XmlElement {
        XmlElement::new("manifest")
            .attr("package", "com.example.helloworld")
            .android_int("versionCode", 0x0101_021b, 1)
            .android_attr("versionName", 0x0101_021c, "1.0")
            .child(
                XmlElement::new("uses-sdk")
                    .android_int("minSdkVersion", 0x0101_020c, 21)
                    .android_int("targetSdkVersion", 0x0101_0270, 34),
            )
            .child(
                XmlElement::new("application")
                    .android_ref("icon", 0x0101_0002, 0x7f08_0000)
                    .android_bool("debuggable", 0x0101_000f, true),
            )
    }

    #[test]
    fn decodes_tree_and_attribute_values() {
        let root = parse_binary_xml(&encode_binary_xml(&sample(), false)).unwrap();
        assert_eq!(root.name, "manifest");
        assert_eq!(root.attr("package"), Some("com.example.helloworld"));
        assert_eq!(root.attr("versionCode"), Some("1"));
        assert_eq!(root.attr("versionName"), Some("1.0"));

        let sdk = root.child("uses-sdk").unwrap();
        assert_eq!(sdk.attr("minSdkVersion"), Some("21"));
        assert_eq!(sdk.attr("targetSdkVersion"), Some("34"));

        let app = root.child("application").unwrap();
        assert_eq!(app.attr("icon"), Some("@0x7f080000"));
        assert_eq!(app.attr("debuggable"), Some("true"));
    }

    #[test]
    fn keeps_attribute_order() {
        let root = parse_binary_xml(&encode_binary_xml(&sample(), false)).unwrap();
        let names: Vec<&str> = root.attributes.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["package", "versionCode", "versionName"]);
    }

    #[test]
    fn recovers_stripped_framework_attribute_names() {
        let root = parse_binary_xml(&encode_binary_xml(&sample(), true)).unwrap();
        assert_eq!(root.attr("versionCode"), Some("1"));
        assert_eq!(root.attr("versionName"), Some("1.0"));
        let app = root.child("application").unwrap();
        assert_eq!(app.attr("icon"), Some("@0x7f080000"));
        // debuggable is not in the framework table, so its name stays blank
        assert!(app.attributes.iter().any(|(k, v)| k.is_empty() && v == "true"));
    }

    #[test]
    fn decoding_is_deterministic() {
        let bytes = encode_binary_xml(&sample(), false);
        assert_eq!(
            parse_binary_xml(&bytes).unwrap(),
            parse_binary_xml(&bytes).unwrap()
        );
    }

    #[test]
    fn rejects_wrong_magic() {
        let mut bytes = encode_binary_xml(&sample(), false);
        bytes[0] = 0x02;
        assert!(parse_binary_xml(&bytes).is_err());
    }

    #[test]
    fn rejects_size_larger_than_buffer() {
        let mut bytes = encode_binary_xml(&sample(), false);
        bytes.truncate(bytes.len() - 4);
        assert!(parse_binary_xml(&bytes).is_err());
    }

    #[test]
    fn rejects_unbalanced_elements() {
        let bytes = encode_binary_xml(&sample(), false);
        // drop the final end-element (manifest) and namespace end chunks
        let end_ns = 24;
        let end_el = 24;
        let cut = bytes.len() - end_ns - end_el;
        let mut truncated = bytes[..cut].to_vec();
        truncated.extend_from_slice(&bytes[bytes.len() - end_ns..]);
        let size = truncated.len() as u32;
        truncated[4..8].copy_from_slice(&size.to_le_bytes());
        let err = parse_binary_xml(&truncated).unwrap_err();
        assert!(err.to_string().contains("still open"), "{}", err);
    }

    #[test]
    fn renders_textual_xml() {
        let root = parse_binary_xml(&encode_binary_xml(&sample(), false)).unwrap();
        let xml = root.to_xml().unwrap();
        assert!(xml.starts_with("<manifest package=\"com.example.helloworld\""));
        assert!(xml.contains("<uses-sdk minSdkVersion=\"21\" targetSdkVersion=\"34\"/>"));
        assert!(xml.ends_with("</manifest>"));
    }
}
