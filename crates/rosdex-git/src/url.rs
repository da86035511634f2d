use std::fmt::{Display, Formatter};
use std::hash::Hasher;

use seahash::SeaHasher;
use url::Url;

/// A wrapper around [`Url`] which represents a "canonical" version of a repository URL.
///
/// Used to key persistent Git databases, so that `github.com/ros/foo` and
/// `github.com/ros/foo.git/` share one database. Fetching always uses the original URL.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RepositoryUrl(Url);

impl RepositoryUrl {
    pub fn new(url: &Url) -> Self {
        let mut url = url.clone();

        // Strip credentials, query parameters and fragments.
        let _ = url.set_username("");
        let _ = url.set_password(None);
        url.set_query(None);
        url.set_fragment(None);

        // Strip a trailing slash.
        if url.path().ends_with('/') {
            if let Ok(mut segments) = url.path_segments_mut() {
                segments.pop_if_empty();
            }
        }

        // GitHub treats paths case-insensitively.
        if url.host_str() == Some("github.com") {
            let path = url.path().to_lowercase();
            url.set_path(&path);
        }

        // Repositories can generally be accessed with or without the `.git` extension.
        if let Some(stripped) = url.path().strip_suffix(".git") {
            if !stripped.is_empty() && !stripped.ends_with('/') {
                let stripped = stripped.to_string();
                url.set_path(&stripped);
            }
        }

        Self(url)
    }

    /// Return the canonical URL as a string.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Compute a stable hex digest of the canonical URL, for use as a directory name.
    ///
    /// The value must be stable across releases and platforms, as it names directories that
    /// outlive the process.
    pub fn digest(&self) -> String {
        let mut hasher = SeaHasher::new();
        hasher.write(self.0.as_str().as_bytes());
        hex::encode(hasher.finish().to_le_bytes())
    }
}

impl Display for RepositoryUrl {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}
