use std::collections::BTreeMap;

use super::tags::{decode_embedded, tag_label, DecodedTagSet, Directory};
use super::text::walk_embedded;

/// Human-labeled tag values ready for storage or display.
pub type FlatMetadata = BTreeMap<String, String>;

/// `"{directory}.{label}"` entries for every decoded tag.
pub fn flatten_tags(tags: &DecodedTagSet) -> FlatMetadata {
    tags.iter()
        .map(|(dir, number, value)| (format!("{}.{}", dir.name(), tag_label(dir, number)), value.to_string()))
        .collect()
}

/// Flattens the metadata embedded in image bytes.
///
/// The strict decode writes namespaced keys (`0th.Make`, `GPS.GPSLatitude`).
/// The tolerant walk then contributes bare primary-directory names (`Make`)
/// without overwriting anything already present.
pub fn flatten_metadata(bytes: &[u8]) -> FlatMetadata {
    let mut flat = decode_embedded(bytes).map(|tags| flatten_tags(&tags)).unwrap_or_default();

    if let Some(tags) = walk_embedded(bytes) {
        for (number, value) in tags.directory(Directory::Primary) {
            flat.entry(tag_label(Directory::Primary, number))
                .or_insert_with(|| value.to_string());
        }
    }
    flat
}
