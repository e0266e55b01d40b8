//! Icon and label resolution for Android packages.

use crate::container::{Container, RESOURCE_TABLE};
use crate::error::{Error, Result};
use crate::icon;
use apk_parser::{AndroidManifest, ResourceId, ResourceTable};
use log::{debug, warn};
use std::path::Path;
use std::process::Command;

/// Supplies a label that takes precedence over the resource table, usually
/// from an external introspection tool. Returning `None` is never an error.
pub trait LabelOverride {
    fn resolve_label_override(&self, archive: &Path) -> Option<String>;
}

/// Never overrides anything
pub struct NoLabelOverride;

impl LabelOverride for NoLabelOverride {
    fn resolve_label_override(&self, _archive: &Path) -> Option<String> {
        None
    }
}

/// Reads the launchable activity label from `aapt dump badging`
pub struct AaptBadging {
    pub program: String,
}

impl Default for AaptBadging {
    fn default() -> Self {
        AaptBadging {
            program: "aapt".to_string(),
        }
    }
}

impl LabelOverride for AaptBadging {
    fn resolve_label_override(&self, archive: &Path) -> Option<String> {
        let output = match Command::new(&self.program)
            .args(["dump", "badging"])
            .arg(archive)
            .output()
        {
            Ok(o) => o,
            Err(e) => {
                debug!("{} is not available: {}", self.program, e);
                return None;
            }
        };
        if !output.status.success() {
            debug!("{} exited with {}", self.program, output.status);
        }
        parse_badging_label(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Pull `label='...'` out of the first `launchable-activity` section of a
/// badging report
pub fn parse_badging_label(report: &str) -> Option<String> {
    let (_, section) = report.split_once("launchable-activity")?;
    let section = section
        .split_once("launchable-activity")
        .map_or(section, |(s, _)| s);
    let (_, rest) = section.split_once("label='")?;
    let (label, _) = rest.split_once('\'')?;
    Some(label.to_string()).filter(|l| !l.is_empty())
}

/// Load `resources.arsc`. A missing or unreadable table only costs the icon
/// and label, so it is reported as [Error::IconNotFound].
pub fn load_resource_table(container: &mut Container) -> Result<ResourceTable> {
    let data = container
        .read_by_name(RESOURCE_TABLE)?
        .ok_or_else(|| Error::IconNotFound(format!("{} is not found", RESOURCE_TABLE)))?;
    ResourceTable::parse(&data)
        .map_err(|e| Error::IconNotFound(format!("unreadable {}: {:#}", RESOURCE_TABLE, e)))
}

/// Resolve `application@icon` to the best raster variant for `density` and
/// return it as PNG
pub fn resolve_icon(
    container: &mut Container,
    table: &ResourceTable,
    manifest: &AndroidManifest,
    density: Option<u16>,
) -> Result<Vec<u8>> {
    let reference = manifest
        .application_icon
        .as_deref()
        .ok_or_else(|| Error::IconNotFound("application declares no icon".to_string()))?;
    let id = ResourceId::from_reference(reference)
        .ok_or_else(|| Error::IconNotFound(format!("{} is not a resource reference", reference)))?;

    let files = table.resolve_files(id, density);
    if files.is_empty() {
        return Err(Error::IconNotFound(format!("{} resolves to nothing", id)));
    }
    for path in files.iter().filter(|p| icon::is_raster_path(p)) {
        match container.read_by_name(path)? {
            Some(data) => {
                debug!("Using icon {} for {}", path, id);
                return icon::normalize(&data);
            }
            None => warn!("Icon {} is listed in the resource table but not packaged", path),
        }
    }
    Err(Error::IconNotFound(format!(
        "no raster variant of {} among {:?}",
        id, files
    )))
}

/// Resolve `application@label`: a literal is used as-is, a reference is
/// looked up in the table
pub fn resolve_label(table: Option<&ResourceTable>, manifest: &AndroidManifest) -> Option<String> {
    let label = manifest.application_label.as_deref()?;
    match ResourceId::from_reference(label) {
        Some(id) => {
            let resolved = table.and_then(|t| t.resolve_string(id));
            if resolved.is_none() {
                debug!("label {} did not resolve", id);
            }
            resolved
        }
        None => Some(label.to_string()),
    }
}
