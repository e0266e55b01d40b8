//! Read the name, bundle id, version, build and icon of Android (`.apk`) and
//! iOS (`.ipa`) app archives without installing them.

pub mod android;
pub mod cgbi;
pub mod container;
pub mod error;
pub mod icon;
pub mod inspect;
pub mod ios;
pub mod plist;

pub use android::{AaptBadging, LabelOverride, NoLabelOverride};
pub use error::{Error, Result};
pub use inspect::{inspect, AppMetadata, InspectOptions, Platform, PlatformDetails};
