use crate::error::{Error, Result};
use lazy_static::lazy_static;
use log::{debug, trace};
use regex::Regex;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

pub const ANDROID_MANIFEST: &str = "AndroidManifest.xml";
pub const RESOURCE_TABLE: &str = "resources.arsc";
pub const IOS_ICON_MARKER: &str = "AppIcon60x60";

/// Upper bound for pre-allocating an entry buffer from its declared size
const MAX_PREALLOC: u64 = 16 * 1024 * 1024;

lazy_static! {
    static ref INFO_PLIST: Regex = Regex::new(r"^Payload/[^/]+/Info\.plist$").unwrap();
}

/// A member of the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerEntry {
    /// Position in the zip central directory
    pub index: usize,
    pub name: String,
    /// Uncompressed size
    pub size: u64,
}

/// The archive members an inspection cares about
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedMembers {
    pub manifest: Option<ContainerEntry>,
    pub property_list: Option<ContainerEntry>,
    pub icon_candidate: Option<ContainerEntry>,
}

/// Sort entries into the manifest / property list / icon slots in a
/// single pass. The first qualifying entry of each slot wins.
pub fn classify<'a, I>(entries: I) -> ClassifiedMembers
where
    I: IntoIterator<Item = &'a ContainerEntry>,
{
    let mut members = ClassifiedMembers::default();
    for entry in entries {
        let slot = if entry.name == ANDROID_MANIFEST {
            &mut members.manifest
        } else if INFO_PLIST.is_match(&entry.name) {
            &mut members.property_list
        } else if entry.name.contains(IOS_ICON_MARKER) {
            &mut members.icon_candidate
        } else {
            continue;
        };
        if slot.is_none() {
            trace!("classified {}", entry.name);
            *slot = Some(entry.clone());
        }
    }
    members
}

/// An open zip archive. The file handle is released when this is dropped.
pub struct Container {
    archive: ZipArchive<File>,
    entries: Vec<ContainerEntry>,
    size: u64,
}

impl Container {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(Error::container)?;
        let size = file.metadata().map_err(Error::container)?.len();
        let mut archive = ZipArchive::new(file).map_err(Error::container)?;

        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let f = archive.by_index_raw(index).map_err(Error::container)?;
            entries.push(ContainerEntry {
                index,
                name: f.name().to_string(),
                size: f.size(),
            });
        }
        debug!(
            "Opened {} ({} bytes, {} entries)",
            path.display(),
            size,
            entries.len()
        );
        Ok(Container {
            archive,
            entries,
            size,
        })
    }

    pub fn entries(&self) -> &[ContainerEntry] {
        &self.entries
    }

    /// Length of the archive file in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Read a whole entry into memory. A corrupt member (bad deflate
    /// stream or checksum) is reported as [Error::ContainerOpen].
    pub fn read(&mut self, entry: &ContainerEntry) -> Result<Vec<u8>> {
        let mut f = self
            .archive
            .by_index(entry.index)
            .map_err(Error::container)?;
        let mut buf = Vec::with_capacity(entry.size.min(MAX_PREALLOC) as usize);
        f.read_to_end(&mut buf)
            .map_err(|e| Error::container(format!("{}: {}", entry.name, e)))?;
        Ok(buf)
    }

    /// Read the entry with exactly this name, if there is one
    pub fn read_by_name(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        match self.entries.iter().find(|e| e.name == name).cloned() {
            Some(entry) => self.read(&entry).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(names: &[&str]) -> Vec<ContainerEntry> {
        names
            .iter()
            .enumerate()
            .map(|(index, name)| ContainerEntry {
                index,
                name: name.to_string(),
                size: 0,
            })
            .collect()
    }

    fn names(m: &ClassifiedMembers) -> (Option<&str>, Option<&str>, Option<&str>) {
        (
            m.manifest.as_ref().map(|e| e.name.as_str()),
            m.property_list.as_ref().map(|e| e.name.as_str()),
            m.icon_candidate.as_ref().map(|e| e.name.as_str()),
        )
    }

    #[test]
    fn classifies_each_slot() {
        let m = classify(&entries(&[
            "META-INF/MANIFEST.MF",
            "AndroidManifest.xml",
            "Payload/App.app/Info.plist",
            "Payload/App.app/AppIcon60x60@2x.png",
        ]));
        assert_eq!(
            names(&m),
            (
                Some("AndroidManifest.xml"),
                Some("Payload/App.app/Info.plist"),
                Some("Payload/App.app/AppIcon60x60@2x.png")
            )
        );
    }

    #[test]
    fn manifest_must_be_at_root() {
        let m = classify(&entries(&["res/AndroidManifest.xml", "AndroidManifest.xml.bak"]));
        assert_eq!(m.manifest, None);
    }

    #[test]
    fn plist_needs_exactly_one_directory_level() {
        let m = classify(&entries(&[
            "Payload/Info.plist",
            "Payload/App.app/Frameworks/X.framework/Info.plist",
            "Payload/App.app/PlugIns/Ext.appex/Info.plist",
            "Other/App.app/Info.plist",
        ]));
        assert_eq!(m.property_list, None);
    }

    #[test]
    fn first_match_wins() {
        let m = classify(&entries(&[
            "Payload/App.app/AppIcon60x60@2x.png",
            "Payload/App.app/AppIcon60x60@3x.png",
            "Payload/App.app/Info.plist",
            "Payload/Other.app/Info.plist",
        ]));
        assert_eq!(
            names(&m).1.zip(names(&m).2),
            Some((
                "Payload/App.app/Info.plist",
                "Payload/App.app/AppIcon60x60@2x.png"
            ))
        );
    }

    #[test]
    fn irrelevant_entries_do_not_change_selection() {
        let relevant = [
            "AndroidManifest.xml",
            "Payload/App.app/Info.plist",
            "Payload/App.app/AppIcon60x60@2x.png",
        ];
        let noise = ["classes.dex", "res/layout/main.xml", "Payload/App.app/App"];
        let baseline = classify(&entries(&relevant));
        let expected = names(&baseline);

        for pos in 0..=relevant.len() {
            let mut listing: Vec<&str> = relevant.to_vec();
            for n in noise.iter().rev() {
                listing.insert(pos, *n);
            }
            let m = classify(&entries(&listing));
            assert_eq!(names(&m), expected, "noise inserted at {}", pos);
        }
    }

    #[test]
    fn an_entry_fills_at_most_one_slot() {
        // matches the icon marker too, but the plist slot takes precedence
        let m = classify(&entries(&["Payload/AppIcon60x60.app/Info.plist"]));
        assert!(m.property_list.is_some());
        assert_eq!(m.icon_candidate, None);
    }
}
