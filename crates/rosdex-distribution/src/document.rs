use std::fmt::{Display, Formatter};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::Value;
use tracing::debug;
use url::Url;

/// The location of an index, distribution or cache document.
///
/// Relative locations inside a document are resolved against the URL of that document, so that
/// a checked-out index directory can be used as-is via `file://`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentUrl(Url);

impl DocumentUrl {
    /// Create a [`DocumentUrl`] from a local path, which may be relative to the working directory.
    pub fn from_path(path: &Path) -> Result<Self, FetchError> {
        let path = std::path::absolute(path)
            .map_err(|_| FetchError::InvalidPath(path.to_path_buf()))?;
        Url::from_file_path(&path)
            .map(Self)
            .map_err(|()| FetchError::InvalidPath(path))
    }

    /// Resolve a location found inside this document.
    pub fn join(&self, location: &str) -> Result<Self, url::ParseError> {
        self.0.join(location).map(Self)
    }

    /// Return the underlying [`Url`].
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// Return the local path of a `file://` URL.
    pub fn to_file_path(&self) -> Option<PathBuf> {
        if self.0.scheme() == "file" {
            self.0.to_file_path().ok()
        } else {
            None
        }
    }

    /// Read the document.
    pub fn read(&self) -> Result<String, FetchError> {
        debug!("Reading document: {self}");
        match self.0.scheme() {
            "file" => {
                let path = self
                    .to_file_path()
                    .ok_or_else(|| FetchError::UnsupportedScheme(self.clone()))?;
                fs_err::read_to_string(path).map_err(|err| FetchError::Io(self.clone(), err))
            }
            "http" | "https" => reqwest::blocking::get(self.0.clone())
                .and_then(reqwest::blocking::Response::error_for_status)
                .and_then(reqwest::blocking::Response::text)
                .map_err(|err| FetchError::Http(self.clone(), err)),
            _ => Err(FetchError::UnsupportedScheme(self.clone())),
        }
    }
}

impl From<Url> for DocumentUrl {
    fn from(url: Url) -> Self {
        Self(url)
    }
}

impl FromStr for DocumentUrl {
    type Err = FetchError;

    /// Parse a URL, or fall back to interpreting the value as a local path.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Url::parse(s) {
            // Windows drive letters (`C:\...`) parse as single-letter schemes.
            Ok(url) if url.scheme().len() > 1 => Ok(Self(url)),
            _ => Self::from_path(Path::new(s)),
        }
    }
}

impl Display for DocumentUrl {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Serialize for DocumentUrl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.as_str().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DocumentUrl {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let url = String::deserialize(deserializer)?;
        Url::parse(&url).map(Self).map_err(serde::de::Error::custom)
    }
}

/// A document could not be read.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Failed to read `{0}`")]
    Io(DocumentUrl, #[source] std::io::Error),
    #[error("Failed to fetch `{0}`")]
    Http(DocumentUrl, #[source] reqwest::Error),
    #[error("Unsupported URL scheme in `{0}` (expected one of `file:`, `http:`, or `https:`)")]
    UnsupportedScheme(DocumentUrl),
    #[error("Not a valid document location: `{}`", .0.display())]
    InvalidPath(PathBuf),
}

/// A document was read but is malformed or of an unsupported kind or version.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("Failed to parse `{0}`")]
    Yaml(DocumentUrl, #[source] serde_yaml::Error),
    #[error("Expected a document of type `{expected}` at `{url}`, found {}", found.as_deref().map_or_else(|| "none".to_string(), |found| format!("`{found}`")))]
    WrongType {
        url: DocumentUrl,
        expected: &'static str,
        found: Option<String>,
    },
    #[error("The {kind} at `{url}` is missing a `version`")]
    MissingVersion { url: DocumentUrl, kind: &'static str },
    #[error("Unsupported {kind} format version {version} at `{url}` (expected {}..={})", supported.start(), supported.end())]
    UnsupportedVersion {
        url: DocumentUrl,
        kind: &'static str,
        version: u64,
        supported: RangeInclusive<u64>,
    },
    #[error("Invalid location `{location}` in `{url}`")]
    InvalidLocation {
        url: DocumentUrl,
        location: String,
        #[source]
        err: url::ParseError,
    },
}

/// Parse a YAML document, validating its `type` and `version` before interpreting the rest.
pub fn parse_document<T: DeserializeOwned>(
    content: &str,
    url: &DocumentUrl,
    kind: &'static str,
    supported: RangeInclusive<u64>,
) -> Result<(T, u64), FormatError> {
    let value: Value =
        serde_yaml::from_str(content).map_err(|err| FormatError::Yaml(url.clone(), err))?;

    let found = value.get("type").and_then(Value::as_str);
    if found != Some(kind) {
        return Err(FormatError::WrongType {
            url: url.clone(),
            expected: kind,
            found: found.map(ToString::to_string),
        });
    }

    let version = value
        .get("version")
        .and_then(Value::as_u64)
        .ok_or_else(|| FormatError::MissingVersion {
            url: url.clone(),
            kind,
        })?;
    if !supported.contains(&version) {
        return Err(FormatError::UnsupportedVersion {
            url: url.clone(),
            kind,
            version,
            supported,
        });
    }

    let document =
        serde_yaml::from_value(value).map_err(|err| FormatError::Yaml(url.clone(), err))?;
    Ok((document, version))
}
