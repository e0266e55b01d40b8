//! Readers for the compiled resource formats found inside an APK: binary
//! XML documents (`AndroidManifest.xml`) and the resource table
//! (`resources.arsc`).

mod binary_xml;
mod chunk;
mod manifest;
mod resources;
mod string_pool;
mod value;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use binary_xml::{parse_binary_xml, BinaryXmlNode};
pub use manifest::{manifest_from_tree, parse_android_manifest, AndroidManifest};
pub use resources::{
    rank_by_density, ResTableConfig, ResourceEntry, ResourceId, ResourceTable, DENSITY_ANY,
    DENSITY_DEFAULT, DENSITY_MEDIUM, DENSITY_NONE,
};
pub use string_pool::StringPool;
pub use value::ResValue;
