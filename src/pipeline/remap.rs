use std::collections::BTreeMap;

use crate::model::PageOrder;

/// Re-key a source-indexed map into output positions.
///
/// An entry whose source index appears in `order` moves to the position of
/// its first occurrence; an entry whose page was dropped from the order is
/// silently discarded.
pub fn remap<V: Clone>(by_source: &BTreeMap<usize, V>, order: &PageOrder) -> BTreeMap<usize, V> {
    by_source
        .iter()
        .filter_map(|(&source_index, value)| {
            order
                .position_of(source_index)
                .map(|position| (position, value.clone()))
        })
        .collect()
}
