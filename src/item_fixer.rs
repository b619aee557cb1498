use crate::data_source::{self, RecordReader};
use crate::item_set::SetRecord;
use crate::MaxsetError;
use rustc_hash::FxHashMap;
use std::fs::File;
use std::hash::Hash;
use std::io::{BufWriter, Read, Seek, Write};
use std::path::Path;

/// Re-keys item IDs by ascending frequency, then sorts and writes the
/// dataset in packed binary form. Each output record's id is its input
/// ordinal.
pub fn fix_items<R: Read + Seek>(
    data: &mut RecordReader<R>,
    output_path: &Path,
    by_cardinality: bool,
) -> Result<(), MaxsetError> {
    eprintln!("[item-fixer] reading data...");
    let mut raw_sets: Vec<Vec<u32>> = Vec::new();
    while let Some(record) = data.next()? {
        raw_sets.push(record.items().to_vec());
    }
    eprintln!("[item-fixer] done reading data");

    relabel_sort_and_write(raw_sets, output_path, by_cardinality)
}

/// Shared relabel tail: counts how often each raw key occurs, assigns
/// item ids 1..=n in ascending frequency order, remaps every set, sorts
/// the collection, and writes it out. Duplicate keys within one set
/// collapse to a single item.
pub fn relabel_sort_and_write<K>(
    raw_sets: Vec<Vec<K>>,
    output_path: &Path,
    by_cardinality: bool,
) -> Result<(), MaxsetError>
where
    K: Copy + Eq + Ord + Hash,
{
    let file = File::create(output_path).map_err(MaxsetError::Io)?;
    let mut writer = BufWriter::new(file);

    let mut frequencies: FxHashMap<K, u32> = FxHashMap::default();
    for set in &raw_sets {
        for key in set {
            *frequencies.entry(*key).or_insert(0) += 1;
        }
    }

    // Assign each raw key an item id by replacing its frequency with
    // its position in the ascending-frequency order. Ties break on the
    // raw key so the mapping is deterministic.
    let mut frequency_to_key: Vec<(u32, K)> =
        frequencies.iter().map(|(k, f)| (*f, *k)).collect();
    frequency_to_key.sort_unstable();
    let item_ids: FxHashMap<K, u32> = frequency_to_key
        .into_iter()
        .zip(1u32..)
        .map(|((_, key), item_id)| (key, item_id))
        .collect();

    let mut sort_us: Vec<SetRecord> = Vec::with_capacity(raw_sets.len());
    for (ordinal, raw) in raw_sets.into_iter().enumerate() {
        let mut items: Vec<u32> = raw.iter().map(|key| item_ids[key]).collect();
        items.sort_unstable();
        items.dedup();
        sort_us.push(SetRecord::new(ordinal as u32, items));
    }

    eprintln!(
        "[item-fixer] sorting ({})...",
        if by_cardinality {
            "by cardinality"
        } else {
            "lexicographic"
        }
    );
    if by_cardinality {
        sort_us.sort_unstable_by(SetRecord::cmp_cardinality);
    } else {
        sort_us.sort_unstable_by(SetRecord::cmp_lex);
    }

    eprintln!("[item-fixer] writing {} itemsets to file...", sort_us.len());
    for set in &sort_us {
        data_source::write_record(&mut writer, set.id(), set.items())?;
    }
    writer.flush().map_err(MaxsetError::Io)
}
