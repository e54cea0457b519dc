//! Lenient field decoders for hand-edited store files.

use super::RowStatus;
use serde::{Deserialize, Deserializer};

/// Decode `null` as the type's default value.
pub(super) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListOrCsv {
    List(Vec<String>),
    Csv(String),
}

/// Decode either a list of strings or one comma-separated string.
///
/// List entries are kept verbatim; entries of the comma-separated form are
/// trimmed and blank ones dropped.
pub(super) fn list_or_csv<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: From<String>,
{
    let items = match Option::<ListOrCsv>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(ListOrCsv::List(items)) => items,
        Some(ListOrCsv::Csv(text)) => text
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
    };

    Ok(items.into_iter().map(T::from).collect())
}

/// Decode a status, treating unknown values as absent.
pub(super) fn lenient_status<'de, D>(deserializer: D) -> Result<Option<RowStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| serde_json::from_value(value).ok()))
}
