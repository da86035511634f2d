use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};

/// A YAML scalar read as text.
///
/// Unquoted values such as `version: 1.0` or `release: 2` are numbers to a YAML parser, but
/// distribution files treat every such field as a string.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    String(String),
    Bool(bool),
    Unsigned(u64),
    Integer(i64),
    Float(f64),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Self::String(string) => string,
            Self::Bool(bool) => bool.to_string(),
            Self::Unsigned(number) => number.to_string(),
            Self::Integer(number) => number.to_string(),
            // `Debug` keeps the fractional part, so `1.0` stays `1.0` rather than `1`.
            Self::Float(number) => format!("{number:?}"),
        }
    }
}

/// Deserialize an optional scalar as a string.
pub(crate) fn deserialize_optional_string<'de, D>(
    deserializer: D,
) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let scalar: Option<Scalar> = Option::deserialize(deserializer)?;
    Ok(scalar.map(Scalar::into_string))
}

/// Deserialize a mapping whose values are scalars as a mapping of strings.
pub(crate) fn deserialize_string_map<'de, D>(
    deserializer: D,
) -> Result<IndexMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let map: IndexMap<String, Scalar> = IndexMap::deserialize(deserializer)?;
    Ok(map
        .into_iter()
        .map(|(key, value)| (key, value.into_string()))
        .collect())
}
