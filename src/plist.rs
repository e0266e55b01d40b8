use crate::error::{Error, Result};
use log::debug;
use ::plist::{Dictionary, Value};
use std::io::Cursor;

/// The `Info.plist` keys an inspection reads
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyListRecord {
    /// `CFBundleDisplayName`, or `CFBundleName` when that is empty
    pub name: String,
    pub bundle_id: String,
    pub version: String,
    pub build: String,
    pub icon_file_name: Option<String>,
    pub executable: Option<String>,
    pub minimum_os_version: Option<String>,
}

/// Decode an `Info.plist` in either its binary or XML serialization
pub fn parse_property_list(data: &[u8]) -> Result<PropertyListRecord> {
    let value = Value::from_reader(Cursor::new(data))
        .map_err(|e| Error::MalformedPropertyList(e.to_string()))?;
    let dict = value
        .into_dictionary()
        .ok_or_else(|| Error::MalformedPropertyList("root is not a dictionary".to_string()))?;

    let string = |key: &str| {
        dict.get(key)
            .and_then(Value::as_string)
            .map(str::to_string)
    };

    let name = string("CFBundleDisplayName")
        .filter(|s| !s.is_empty())
        .or_else(|| string("CFBundleName"))
        .unwrap_or_default();
    let icon_file_name = primary_icon_file(&dict);
    debug!("primary icon file: {:?}", icon_file_name);

    Ok(PropertyListRecord {
        name,
        bundle_id: string("CFBundleIdentifier").unwrap_or_default(),
        version: string("CFBundleShortVersionString").unwrap_or_default(),
        build: string("CFBundleVersion").unwrap_or_default(),
        icon_file_name,
        executable: string("CFBundleExecutable"),
        minimum_os_version: string("MinimumOSVersion"),
    })
}

/// `CFBundleIcons.CFBundlePrimaryIcon.CFBundleIconFiles[0]`, falling back to
/// the pre iOS 5 top level `CFBundleIconFiles[0]`
fn primary_icon_file(dict: &Dictionary) -> Option<String> {
    let first_file = |d: &Dictionary| {
        d.get("CFBundleIconFiles")
            .and_then(Value::as_array)
            .and_then(|files| files.first())
            .and_then(Value::as_string)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    dict.get("CFBundleIcons")
        .and_then(Value::as_dictionary)
        .and_then(|icons| icons.get("CFBundlePrimaryIcon"))
        .and_then(Value::as_dictionary)
        .and_then(first_file)
        .or_else(|| first_file(dict))
}
