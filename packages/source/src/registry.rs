//! Dataset registry: loads dataset definitions from embedded TOML configs.
//!
//! Each `.toml` file in `packages/source/sources/` is baked into the binary
//! at compile time via [`include_str!`].

use crate::SourceError;
use crate::source_def::{DatasetDefinition, parse_dataset_toml};

/// Identifier of the dataset used when none is requested.
pub const DEFAULT_DATASET: &str = "nyc311";

/// TOML configs embedded at compile time.
const DATASET_TOMLS: &[(&str, &str)] = &[("nyc311", include_str!("../sources/nyc311.toml"))];

/// Returns all configured dataset definitions.
///
/// # Errors
///
/// Returns [`SourceError`] if any embedded TOML is malformed.
pub fn all_datasets() -> Result<Vec<DatasetDefinition>, SourceError> {
    DATASET_TOMLS
        .iter()
        .map(|(name, toml)| {
            parse_dataset_toml(toml).map_err(|e| SourceError::Config {
                message: format!("failed to parse {name}.toml: {e}"),
            })
        })
        .collect()
}

/// Looks up a dataset by id, falling back to [`DEFAULT_DATASET`].
///
/// # Errors
///
/// Returns [`SourceError::Config`] if the id is unknown or a TOML is
/// malformed.
pub fn resolve_dataset(id: Option<&str>) -> Result<DatasetDefinition, SourceError> {
    let wanted = id.unwrap_or(DEFAULT_DATASET);

    let all = all_datasets()?;
    let available = all
        .iter()
        .map(|d| d.id().to_string())
        .collect::<Vec<_>>()
        .join(", ");

    all.into_iter()
        .find(|d| d.id() == wanted)
        .ok_or_else(|| SourceError::Config {
            message: format!("unknown dataset {wanted:?}; available: {available}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_all_datasets() {
        let datasets = all_datasets().unwrap();
        assert_eq!(datasets.len(), DATASET_TOMLS.len());
    }

    #[test]
    fn resolves_explicit_id() {
        assert_eq!(resolve_dataset(Some("nyc311")).unwrap().id(), "nyc311");
    }

    #[test]
    fn missing_id_uses_default() {
        assert_eq!(resolve_dataset(None).unwrap().id(), DEFAULT_DATASET);
    }

    #[test]
    fn unknown_id_lists_available() {
        let err = resolve_dataset(Some("nope")).unwrap_err();
        assert!(err.to_string().contains("available: nyc311"));
    }
}
