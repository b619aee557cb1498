use crate::data_source::{self, RecordReader};
use crate::item_set::SetRecord;
use crate::MaxsetError;
use std::fs::File;
use std::io::{BufWriter, Read, Seek, Write};
use std::path::Path;

/// Reads every record from `data`, sorts lexicographically (default) or
/// by cardinality, and writes the packed binary result to `output_path`.
pub fn sort_dataset<R: Read + Seek>(
    data: &mut RecordReader<R>,
    output_path: &Path,
    by_cardinality: bool,
) -> Result<(), MaxsetError> {
    let file = File::create(output_path).map_err(MaxsetError::Io)?;
    let mut writer = BufWriter::new(file);

    eprintln!("[sorter] reading data...");
    let mut sort_us: Vec<SetRecord> = Vec::new();
    while let Some(record) = data.next()? {
        sort_us.push(record);
    }

    eprintln!(
        "[sorter] sorting ({})...",
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

    eprintln!("[sorter] writing {} itemsets to file...", sort_us.len());
    for set in &sort_us {
        data_source::write_record(&mut writer, set.id(), set.items())?;
    }
    writer.flush().map_err(MaxsetError::Io)
}
