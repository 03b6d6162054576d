//! Record kind inference
//!
//! Kind comes from the file extension alone. An extension shared by several
//! kinds is disambiguated by the containing collection's declared kind;
//! content is never inspected.

use pilotsync_config::LocalStoreConfig;
use pilotsync_core::RecordKind;
use std::path::Path;

/// Infers the kind of the file at `path`
pub fn infer_kind(
    config: &LocalStoreConfig,
    path: &Path,
    collection_kind: Option<RecordKind>,
) -> RecordKind {
    let Some(extension) = path.extension().and_then(|e| e.to_str()) else {
        return RecordKind::Unknown;
    };

    let candidates = config.kinds_for_extension(extension);
    match (candidates, collection_kind) {
        ([], _) => RecordKind::Unknown,
        ([only], _) => *only,
        (many, Some(kind)) if many.contains(&kind) => kind,
        (many, _) => many[0],
    }
}

/// Picks the extension for a new record
///
/// Order: the record's kind, the collection's kind, the hint identity's own
/// extension, then `dat`.
pub fn extension_for(
    config: &LocalStoreConfig,
    kind: RecordKind,
    collection_kind: RecordKind,
    hint: &Path,
) -> String {
    config
        .extension_for_kind(kind)
        .or_else(|| config.extension_for_kind(collection_kind))
        .map(str::to_string)
        .or_else(|| {
            hint.extension()
                .and_then(|e| e.to_str())
                .filter(|e| !e.is_empty())
                .map(str::to_ascii_lowercase)
        })
        .unwrap_or_else(|| "dat".to_string())
}
