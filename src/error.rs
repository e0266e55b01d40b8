use thiserror::Error;

/// Reasons an inspection fails.
///
/// Only identity failures abort an inspection; icon and label problems are
/// logged and surface as absent values in the result.
#[derive(Debug, Error)]
pub enum Error {
    /// File extension is not `.apk`, `.ipa` or `.zip`
    #[error("unknown platform: {0}")]
    UnknownPlatform(String),

    /// Archive missing, unreadable, or not a zip
    #[error("unable to open archive: {0}")]
    ContainerOpen(String),

    #[error("AndroidManifest.xml is not found")]
    ManifestNotFound,

    #[error("Info.plist is not found")]
    PropertyListNotFound,

    #[error("malformed binary XML: {0}")]
    MalformedBinaryXml(String),

    #[error("malformed property list: {0}")]
    MalformedPropertyList(String),

    #[error("icon is not found: {0}")]
    IconNotFound(String),

    /// An icon was found but could not be decoded as an image
    #[error("unable to decode icon: {0}")]
    IconDecode(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn malformed_xml(e: anyhow::Error) -> Self {
        Error::MalformedBinaryXml(format!("{:#}", e))
    }

    pub(crate) fn container(e: impl std::fmt::Display) -> Self {
        Error::ContainerOpen(e.to_string())
    }

    pub(crate) fn icon_decode(e: impl std::fmt::Display) -> Self {
        Error::IconDecode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
