use crate::binary_xml::{parse_binary_xml, BinaryXmlNode};
use anyhow::{ensure, Context, Result};
use log::debug;
use serde::Deserialize;

const ACTION_MAIN: &str = "android.intent.action.MAIN";
const CATEGORY_LAUNCHER: &str = "android.intent.category.LAUNCHER";

/// Package identity and entry points read from `AndroidManifest.xml`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AndroidManifest {
    pub package: String,
    pub version_name: String,
    pub version_code: String,
    pub min_sdk_version: Option<u32>,
    pub target_sdk_version: Option<u32>,
    pub uses_permissions: Vec<String>,
    pub activities: Vec<String>,
    /// First activity with a MAIN / LAUNCHER intent filter
    pub launcher_activity: Option<String>,
    /// `application@label`, a literal or a `@0x...` reference
    pub application_label: Option<String>,
    /// `application@icon`, normally a `@0x...` reference
    pub application_icon: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ManifestXml {
    #[serde(rename = "@package")]
    package: String,
    #[serde(rename = "@versionName")]
    version_name: String,
    #[serde(rename = "@versionCode")]
    version_code: String,
    #[serde(rename = "uses-sdk")]
    uses_sdk: Option<UsesSdkXml>,
    #[serde(rename = "uses-permission")]
    uses_permissions: Vec<NamedXml>,
    application: Option<ApplicationXml>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct UsesSdkXml {
    #[serde(rename = "@minSdkVersion")]
    min_sdk_version: Option<String>,
    #[serde(rename = "@targetSdkVersion")]
    target_sdk_version: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct NamedXml {
    #[serde(rename = "@name")]
    name: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ApplicationXml {
    #[serde(rename = "@label")]
    label: Option<String>,
    #[serde(rename = "@icon")]
    icon: Option<String>,
    #[serde(rename = "activity")]
    activities: Vec<ActivityXml>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ActivityXml {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "intent-filter")]
    intent_filters: Vec<IntentFilterXml>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct IntentFilterXml {
    #[serde(rename = "action")]
    actions: Vec<NamedXml>,
    #[serde(rename = "category")]
    categories: Vec<NamedXml>,
}

impl IntentFilterXml {
    fn is_launcher(&self) -> bool {
        self.actions.iter().any(|a| a.name == ACTION_MAIN)
            && self.categories.iter().any(|c| c.name == CATEGORY_LAUNCHER)
    }
}

/// Parse android manifest from AndroidManifest.xml file data
pub fn parse_android_manifest(data: &[u8]) -> Result<AndroidManifest> {
    let root = parse_binary_xml(data)?;
    manifest_from_tree(&root)
}

/// Extract the manifest fields from an already decoded document.
///
/// The tree is rendered back to XML and read with a regular XML
/// deserializer, so tag paths are declared on the structs above.
pub fn manifest_from_tree(root: &BinaryXmlNode) -> Result<AndroidManifest> {
    ensure!(
        root.name == "manifest",
        "Root element is <{}>, expected <manifest>",
        root.name
    );
    let xml = root.to_xml()?;
    let doc: ManifestXml =
        quick_xml::de::from_str(&xml).context("Failed to read decoded manifest")?;

    let application = doc.application.unwrap_or_default();
    let launcher_activity = application
        .activities
        .iter()
        .find(|a| a.intent_filters.iter().any(|f| f.is_launcher()))
        .map(|a| a.name.clone());
    debug!("launcher activity: {:?}", launcher_activity);

    let sdk = doc.uses_sdk.unwrap_or_default();
    Ok(AndroidManifest {
        package: doc.package,
        version_name: doc.version_name,
        version_code: doc.version_code,
        min_sdk_version: sdk.min_sdk_version.and_then(|v| v.parse().ok()),
        target_sdk_version: sdk.target_sdk_version.and_then(|v| v.parse().ok()),
        uses_permissions: doc.uses_permissions.into_iter().map(|p| p.name).collect(),
        activities: application
            .activities
            .iter()
            .map(|a| a.name.clone())
            .collect(),
        launcher_activity,
        application_label: application.label.filter(|v| !v.is_empty()),
        application_icon: application.icon.filter(|v| !v.is_empty()),
    })
}
