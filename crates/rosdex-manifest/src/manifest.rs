use std::fmt::{Display, Formatter};
use std::str::FromStr;

use roxmltree::{Document, Node, ParsingOptions};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::name::{GroupName, InvalidNameError, PackageName};

/// Elements whose text names a package dependency.
///
/// Format 1 manifests use `run_depend`; formats 2 and 3 split it into the `exec_depend` and
/// `build_export_depend` pair and add the `depend` shorthand.
const DEPENDENCY_ELEMENTS: &[&str] = &[
    "depend",
    "build_depend",
    "build_export_depend",
    "buildtool_depend",
    "buildtool_export_depend",
    "exec_depend",
    "run_depend",
    "test_depend",
    "doc_depend",
];

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Package manifest is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("Package manifest is not well-formed XML")]
    Xml(#[from] roxmltree::Error),
    #[error("Expected a `<package>` root element, found `<{0}>`")]
    UnexpectedRoot(String),
    #[error("Unsupported package format `{0}` (expected one of `1`, `2`, or `3`)")]
    UnsupportedFormat(String),
    #[error("Package manifest is missing the required `<{0}>` element")]
    MissingField(&'static str),
    #[error("Invalid value in `<{0}>`")]
    InvalidName(&'static str, #[source] InvalidNameError),
}

/// The `format` attribute of a `package.xml` (REP 127, REP 140, REP 149).
#[derive(
    Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ManifestFormat {
    /// Manifests without a `format` attribute are format 1.
    #[default]
    #[serde(rename = "1")]
    One,
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
}

impl FromStr for ManifestFormat {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(Self::One),
            "2" => Ok(Self::Two),
            "3" => Ok(Self::Three),
            other => Err(ManifestError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl Display for ManifestFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::One => write!(f, "1"),
            Self::Two => write!(f, "2"),
            Self::Three => write!(f, "3"),
        }
    }
}

/// A parsed `package.xml`.
///
/// Only the fields needed to resolve a distribution are retained; descriptions, maintainers,
/// licenses, exports and other elements are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageManifest {
    pub name: PackageName,
    pub version: String,
    pub format: ManifestFormat,
    /// Direct dependencies of every kind, deduplicated in document order.
    pub dependencies: Vec<PackageName>,
    /// Groups this package is a member of.
    pub member_of_groups: Vec<GroupName>,
    /// Groups whose members this package depends on.
    pub group_depends: Vec<GroupName>,
}

impl PackageManifest {
    /// Parse a manifest from raw bytes, as read from a Git object.
    pub fn from_slice(content: &[u8]) -> Result<Self, ManifestError> {
        Self::from_str(std::str::from_utf8(content)?)
    }
}

impl FromStr for PackageManifest {
    type Err = ManifestError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        // Released manifests occasionally carry a `<!DOCTYPE>`; it is never needed to read them.
        let options = ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        };
        let document = Document::parse_with_options(content, options)?;

        let root = document.root_element();
        if root.tag_name().name() != "package" {
            return Err(ManifestError::UnexpectedRoot(
                root.tag_name().name().to_string(),
            ));
        }

        let format = root
            .attribute("format")
            .map(ManifestFormat::from_str)
            .transpose()?
            .unwrap_or_default();

        let name = required_text(root, "name")?;
        let name = PackageName::from_str(name)
            .map_err(|err| ManifestError::InvalidName("name", err))?;
        let version = required_text(root, "version")?.to_string();

        let mut dependencies = Vec::new();
        let mut member_of_groups = Vec::new();
        let mut group_depends = Vec::new();
        let mut seen_dependencies = FxHashSet::default();
        let mut seen_members = FxHashSet::default();
        let mut seen_group_depends = FxHashSet::default();

        for child in root.children().filter(Node::is_element) {
            let element = child.tag_name().name();
            let Some(text) = element_text(child) else {
                trace!("Skipping empty `<{element}>` in `{name}`");
                continue;
            };

            if let Some(&kind) = DEPENDENCY_ELEMENTS.iter().find(|kind| **kind == element) {
                let dependency = PackageName::from_str(text)
                    .map_err(|err| ManifestError::InvalidName(kind, err))?;
                if seen_dependencies.insert(dependency.clone()) {
                    dependencies.push(dependency);
                }
            } else if element == "member_of_group" {
                let group = GroupName::from_str(text)
                    .map_err(|err| ManifestError::InvalidName("member_of_group", err))?;
                if seen_members.insert(group.clone()) {
                    member_of_groups.push(group);
                }
            } else if element == "group_depend" {
                let group = GroupName::from_str(text)
                    .map_err(|err| ManifestError::InvalidName("group_depend", err))?;
                if seen_group_depends.insert(group.clone()) {
                    group_depends.push(group);
                }
            }
        }

        Ok(Self {
            name,
            version,
            format,
            dependencies,
            member_of_groups,
            group_depends,
        })
    }
}

/// Return the trimmed text of an element, or `None` if it is empty.
fn element_text<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    node.text().map(str::trim).filter(|text| !text.is_empty())
}

/// Return the text of the first child element named `field`.
fn required_text<'a>(root: Node<'a, '_>, field: &'static str) -> Result<&'a str, ManifestError> {
    root.children()
        .filter(Node::is_element)
        .find(|child| child.tag_name().name() == field)
        .and_then(element_text)
        .ok_or(ManifestError::MissingField(field))
}
