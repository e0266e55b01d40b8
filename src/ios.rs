//! Icon lookup for iOS application archives.

use crate::cgbi;
use crate::container::ContainerEntry;
use crate::error::{Error, Result};
use crate::icon;
use log::debug;

/// Pick the icon entry for an app bundle.
///
/// With an icon file name from `Info.plist`, `.png` files next to the plist
/// whose name starts with it are preferred, `@3x` over `@2x` over the plain
/// file. Otherwise, or when nothing matches, `candidate` is used.
pub fn select_icon_entry<'a>(
    entries: &'a [ContainerEntry],
    property_list: &ContainerEntry,
    icon_file_name: Option<&str>,
    candidate: Option<&'a ContainerEntry>,
) -> Option<&'a ContainerEntry> {
    let Some(base) = icon_file_name else {
        return candidate;
    };
    let base = base.strip_suffix(".png").unwrap_or(base);
    let dir = property_list
        .name
        .strip_suffix("Info.plist")
        .unwrap_or(&property_list.name);

    let found = entries
        .iter()
        .filter_map(|e| {
            let file = e.name.strip_prefix(dir)?;
            let matches = !file.contains('/')
                && file.starts_with(base)
                && file.to_ascii_lowercase().ends_with(".png");
            matches.then_some((scale_rank(file), e))
        })
        .min_by_key(|(rank, _)| *rank)
        .map(|(_, e)| e);
    if found.is_none() {
        debug!("no {}*.png in {}, using the icon candidate", base, dir);
    }
    found.or(candidate)
}

fn scale_rank(file: &str) -> u8 {
    if file.contains("@3x") {
        0
    } else if file.contains("@2x") {
        1
    } else {
        2
    }
}

/// Turn the bytes of the selected icon into a standard PNG
pub fn load_icon(data: Option<&[u8]>) -> Result<Vec<u8>> {
    let data = data.ok_or_else(|| Error::IconNotFound("no icon in the bundle".to_string()))?;
    let png = cgbi::revert(data)?;
    icon::normalize(&png)
}
