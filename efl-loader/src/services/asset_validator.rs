//! Batch asset validation
//!
//! Checks that asset identifiers exist on the gateway before anything
//! is submitted, fanning the lookups out concurrently. One bad id must
//! not sink the batch, so per-id failures are captured as data.

use crate::models::{AssetLookup, AssetMetadata};
use crate::services::esploro_client::{EsploroClient, EsploroError};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Looks up every unique id and returns the outcome per id.
///
/// Blank ids are skipped. A missing asset and a transport failure are
/// reported separately so callers can word row errors accordingly.
pub async fn validate_assets(
    client: &EsploroClient,
    asset_ids: &[String],
) -> HashMap<String, AssetLookup> {
    let unique = unique_ids(asset_ids);
    debug!("Validating {} unique asset id(s)", unique.len());

    let lookups = unique.into_iter().map(|id| async move {
        let lookup = match client.fetch_asset(&id).await {
            Ok(metadata) => AssetLookup::Found(metadata),
            Err(EsploroError::AssetNotFound(_)) => {
                warn!("Asset {} not found", id);
                AssetLookup::NotFound
            }
            Err(e) => {
                warn!("Asset {} lookup failed: {}", id, e);
                AssetLookup::Failed(e.to_string())
            }
        };
        (id, lookup)
    });

    futures::future::join_all(lookups).await.into_iter().collect()
}

/// Metadata for the ids that resolved, keyed by id
pub fn found_assets(lookups: &HashMap<String, AssetLookup>) -> HashMap<String, &AssetMetadata> {
    lookups
        .iter()
        .filter_map(|(id, lookup)| match lookup {
            AssetLookup::Found(metadata) => Some((id.clone(), metadata)),
            _ => None,
        })
        .collect()
}

/// Row-facing error message for a lookup that did not resolve
pub fn failure_message(asset_id: &str, lookup: &AssetLookup) -> String {
    match lookup {
        AssetLookup::Found(_) => String::new(),
        AssetLookup::NotFound => format!("Asset {} not found", asset_id),
        AssetLookup::Failed(reason) => reason.clone(),
    }
}

/// Distinct non-blank ids in first-seen order
pub fn unique_ids(asset_ids: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    asset_ids
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .filter(|id| seen.insert(id.to_string()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_ids_skips_blanks_and_duplicates() {
        let ids = vec![
            "991".to_string(),
            " ".to_string(),
            "992".to_string(),
            "991 ".to_string(),
            String::new(),
        ];
        assert_eq!(unique_ids(&ids), vec!["991", "992"]);
    }

    #[test]
    fn test_failure_messages() {
        assert_eq!(
            failure_message("991", &AssetLookup::NotFound),
            "Asset 991 not found"
        );
        assert_eq!(
            failure_message("991", &AssetLookup::Failed("API error 500: boom".to_string())),
            "API error 500: boom"
        );
    }
}
