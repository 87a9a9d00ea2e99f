//! Display-name derivation for imported copies.

use crate::models::SourceMediaItem;

/// Prefix marking an item as an imported copy so the destination never
/// silently overwrites a pre-existing item of the same name.
pub const COPY_PREFIX: &str = "Copy of ";

/// Derive the display name used at stage and commit time.
///
/// Deterministic: the same item always yields the same name. Falls back to
/// the source-native id when the title is empty or whitespace.
pub fn derive_display_name(item: &SourceMediaItem) -> String {
    let title = item.title.trim();
    if title.is_empty() {
        format!("{}{}", COPY_PREFIX, item.id)
    } else {
        format!("{}{}", COPY_PREFIX, title)
    }
}
