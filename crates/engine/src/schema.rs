//! Schema merging and resolution.
//!
//! The effective schema is computed in two steps: the optional override
//! list is shallow-merged over the base items by matching `name`, then every
//! dictionary reference is resolved through the injected cache into a
//! literal option list. Resolution runs in schema order; affected fields are
//! not rendered until the whole pass settles.

use formflow_types::FormItem;
use tracing::debug;

use crate::dict::{DEFAULT_ROW_KEY, DictionaryCache};
use crate::error::FormError;

/// Merges `overrides` over `base` by `name`.
///
/// Present-in-both items are shallow-merged (override wins per key),
/// override-only items are appended, and the combined list is stable-sorted
/// ascending by sort order (default 99, ties keep relative order).
pub fn merge_overrides(base: &[FormItem], overrides: &[FormItem]) -> Vec<FormItem> {
    let mut merged: Vec<FormItem> = base
        .iter()
        .map(|item| {
            let matching = item
                .name
                .as_ref()
                .and_then(|name| overrides.iter().find(|candidate| candidate.name.as_ref() == Some(name)));
            match matching {
                Some(overriding) => item.merged_with(overriding),
                None => item.clone(),
            }
        })
        .collect();

    let base_names: Vec<&String> = base.iter().filter_map(|item| item.name.as_ref()).collect();
    merged.extend(
        overrides
            .iter()
            .filter(|item| item.name.as_ref().is_none_or(|name| !base_names.contains(&name)))
            .cloned(),
    );

    merged.sort_by_key(FormItem::sort_order);
    merged
}

/// Resolves every dictionary reference into a literal option list, in
/// schema order. Items that already carry literal options are untouched.
pub async fn resolve_dictionaries(mut items: Vec<FormItem>, cache: &DictionaryCache) -> Result<Vec<FormItem>, FormError> {
    for item in &mut items {
        if item.options.is_some() {
            continue;
        }
        let Some(dictionary) = &item.dictionary else { continue };
        let row_key = dictionary.row_key.as_deref().unwrap_or(DEFAULT_ROW_KEY);
        let options = cache.resolve(&dictionary.name, row_key).await?;
        debug!(
            field = item.name.as_deref().unwrap_or("<custom>"),
            dictionary = dictionary.name.as_str(),
            options = options.len(),
            "resolved dictionary options"
        );
        item.options = Some((*options).clone());
    }
    Ok(items)
}
