use crate::android::{self, LabelOverride};
use crate::container::{classify, Container};
use crate::error::{Error, Result};
use crate::ios;
use crate::plist::parse_property_list;
use apk_parser::parse_android_manifest;
use log::{debug, info, warn};
use serde::{Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
}

impl Platform {
    /// Pick the platform from the file extension (case-insensitive)
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "apk" => Ok(Platform::Android),
            "ipa" | "zip" => Ok(Platform::Ios),
            _ => Err(Error::UnknownPlatform(path.display().to_string())),
        }
    }
}

impl Display for Platform {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Android => write!(f, "android"),
            Platform::Ios => write!(f, "ios"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PlatformDetails {
    Android {
        min_sdk: Option<u32>,
        target_sdk: Option<u32>,
        permissions: Vec<String>,
        activities: Vec<String>,
        launcher_activity: Option<String>,
    },
    Ios {
        executable: Option<String>,
        minimum_os_version: Option<String>,
        icon_file_name: Option<String>,
    },
}

/// What an inspection found out about an app archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppMetadata {
    pub platform: Platform,
    pub name: String,
    pub bundle_id: String,
    /// User facing version (`versionName` / `CFBundleShortVersionString`)
    pub version: String,
    /// Internal build (`versionCode` / `CFBundleVersion`)
    pub build: String,
    /// PNG encoded
    #[serde(serialize_with = "icon_len")]
    pub icon: Option<Vec<u8>>,
    /// Archive size in bytes
    pub size: u64,
    pub details: PlatformDetails,
}

fn icon_len<S: Serializer>(icon: &Option<Vec<u8>>, s: S) -> std::result::Result<S::Ok, S::Error> {
    match icon {
        Some(b) => s.serialize_some(&b.len()),
        None => s.serialize_none(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct InspectOptions {
    /// Preferred icon density in dpi, `None` for the 160 dpi baseline
    pub density: Option<u16>,
}

/// Read identity metadata and icon from an `.apk`, `.ipa` or `.zip` archive.
///
/// Missing or malformed identity data fails the call. Icon and label
/// problems are logged and leave those fields empty.
pub fn inspect(
    path: &Path,
    options: &InspectOptions,
    label_override: &dyn LabelOverride,
) -> Result<AppMetadata> {
    let platform = Platform::from_path(path)?;
    let mut container = Container::open(path)?;
    let metadata = match platform {
        Platform::Android => inspect_android(path, &mut container, options, label_override)?,
        Platform::Ios => inspect_ios(&mut container)?,
    };
    info!(
        "Inspected {} [{}] {} v{} ({})",
        path.display(),
        metadata.platform,
        metadata.bundle_id,
        metadata.version,
        metadata.build
    );
    Ok(metadata)
}

fn inspect_android(
    path: &Path,
    container: &mut Container,
    options: &InspectOptions,
    label_override: &dyn LabelOverride,
) -> Result<AppMetadata> {
    let members = classify(container.entries());
    let entry = members.manifest.ok_or(Error::ManifestNotFound)?;
    let data = container.read(&entry)?;
    let manifest = parse_android_manifest(&data).map_err(Error::malformed_xml)?;
    debug!("manifest: {:?}", manifest);

    let table = match android::load_resource_table(container) {
        Ok(t) => Some(t),
        Err(e) => {
            warn!("{}: {}", path.display(), e);
            None
        }
    };

    let icon = match &table {
        Some(t) => match android::resolve_icon(container, t, &manifest, options.density) {
            Ok(icon) => Some(icon),
            Err(e) => {
                warn!("{}: {}", path.display(), e);
                None
            }
        },
        None => None,
    };

    let name = label_override
        .resolve_label_override(path)
        .or_else(|| android::resolve_label(table.as_ref(), &manifest))
        .unwrap_or_else(|| {
            warn!("{}: application label is not resolvable", path.display());
            String::new()
        });

    Ok(AppMetadata {
        platform: Platform::Android,
        name,
        bundle_id: manifest.package,
        version: manifest.version_name,
        build: manifest.version_code,
        icon,
        size: container.size(),
        details: PlatformDetails::Android {
            min_sdk: manifest.min_sdk_version,
            target_sdk: manifest.target_sdk_version,
            permissions: manifest.uses_permissions,
            activities: manifest.activities,
            launcher_activity: manifest.launcher_activity,
        },
    })
}

fn inspect_ios(container: &mut Container) -> Result<AppMetadata> {
    let members = classify(container.entries());
    let plist_entry = members.property_list.ok_or(Error::PropertyListNotFound)?;
    let record = parse_property_list(&container.read(&plist_entry)?)?;

    let icon_entry = ios::select_icon_entry(
        container.entries(),
        &plist_entry,
        record.icon_file_name.as_deref(),
        members.icon_candidate.as_ref(),
    )
    .cloned();
    let data = match &icon_entry {
        Some(e) => match container.read(e) {
            Ok(d) => Some(d),
            Err(err) => {
                warn!("{}: {}", e.name, err);
                None
            }
        },
        None => None,
    };
    let icon = match ios::load_icon(data.as_deref()) {
        Ok(icon) => Some(icon),
        Err(e) => {
            warn!("{}", e);
            None
        }
    };

    Ok(AppMetadata {
        platform: Platform::Ios,
        name: record.name,
        bundle_id: record.bundle_id,
        version: record.version,
        build: record.build,
        icon,
        size: container.size(),
        details: PlatformDetails::Ios {
            executable: record.executable,
            minimum_os_version: record.minimum_os_version,
            icon_file_name: record.icon_file_name,
        },
    })
}
