use crate::data_source::RecordReader;
use crate::item_set::{does_subsume, SetRecord};
use crate::output::{self, OutputMode};
use crate::MaxsetError;
use std::io::{Read, Seek, Write};

type CandidateList = Vec<Option<SetRecord>>;

/// Streaming maximal-set discovery over input sorted by non-decreasing
/// cardinality. Candidates are indexed by their first (rarest) item;
/// deleted slots are tombstoned in place so each bucket stays in
/// cardinality order. When the item budget is exhausted mid-pass the
/// engine stops retaining, finishes the pass in check-only mode, and
/// runs another pass from the recorded offset.
pub struct CardinalityEngine {
    maximal_sets_count: u64,
    input_sets_count: u64,
    subsumption_checks_count: u64,
    candidates: Vec<CandidateList>,
}

impl Default for CardinalityEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CardinalityEngine {
    pub fn new() -> Self {
        CardinalityEngine {
            maximal_sets_count: 0,
            input_sets_count: 0,
            subsumption_checks_count: 0,
            candidates: Vec::new(),
        }
    }

    /// Number of maximal sets found by the last run.
    pub fn maximal_sets_count(&self) -> u64 {
        self.maximal_sets_count
    }

    /// Number of records retained for indexing by the last run. Records
    /// scanned in check-only mode are not counted.
    pub fn input_sets_count(&self) -> u64 {
        self.input_sets_count
    }

    /// Number of explicit subsumption checks performed by the last run.
    pub fn subsumption_checks_count(&self) -> u64 {
        self.subsumption_checks_count
    }

    /// Finds every maximal set in `data` and emits each one to `out` per
    /// `output_mode`. `max_item_id` pre-sizes the candidate index;
    /// `max_items_in_ram` bounds retained item occurrences per pass.
    pub fn find_all_maximal_sets<R: Read + Seek, W: Write>(
        &mut self,
        data: &mut RecordReader<R>,
        max_item_id: u32,
        max_items_in_ram: u64,
        output_mode: OutputMode,
        out: &mut W,
    ) -> Result<(), MaxsetError> {
        self.maximal_sets_count = 0;
        self.input_sets_count = 0;
        self.subsumption_checks_count = 0;

        // Sets of the cardinality bracket currently being read. Their
        // indexing is deferred until the bracket closes, so sets of equal
        // cardinality are never checked against each other.
        let mut index_us: Vec<SetRecord> = Vec::new();

        let mut resume_offset = 0u64;
        loop {
            self.prepare_for_scan(data, max_item_id, resume_offset)?;
            resume_offset = 0;
            let mut items_in_ram = 0u64;
            let mut bracket_size: Option<usize> = None;
            let mut prev_size = 0usize;

            while let Some(current_set) = data.next()? {
                if current_set.size() < prev_size {
                    return Err(MaxsetError::Malformed(format!(
                        "input violates cardinality order: set {} has {} items after one with {}",
                        current_set.id(),
                        current_set.size(),
                        prev_size
                    )));
                }
                prev_size = current_set.size();

                // Close the previous bracket before pruning, so the first
                // set of a new cardinality checks the bracket that just
                // ended.
                if bracket_size != Some(current_set.size()) {
                    self.index_sets(&mut index_us);
                    bracket_size = Some(current_set.size());
                }

                self.delete_subsumed_candidates(&current_set);

                if resume_offset == 0 {
                    items_in_ram += current_set.size() as u64;
                    index_us.push(current_set);
                    self.input_sets_count += 1;

                    if items_in_ram >= max_items_in_ram {
                        // The rest of this pass only checks; the next
                        // pass resumes here. index_us flushes as soon as
                        // a strictly larger record arrives, which then
                        // checks the staged bracket; an equal-size record
                        // cannot properly subsume it.
                        resume_offset = data.tell();
                        eprintln!(
                            "[cardinality] halting indexing at input set number {}",
                            self.input_sets_count
                        );
                    }
                }
            }

            // Everything still indexed, and everything still staged in
            // index_us, is maximal over the retained sets: every later
            // record was scanned against it.
            self.dump_maximal_sets(&mut index_us, output_mode, out)?;

            if resume_offset == 0 {
                return Ok(());
            }
        }
    }

    fn prepare_for_scan<R: Read + Seek>(
        &mut self,
        data: &mut RecordReader<R>,
        max_item_id: u32,
        resume_offset: u64,
    ) -> Result<(), MaxsetError> {
        self.candidates.clear();
        self.candidates
            .resize_with(max_item_id as usize, Vec::new);
        eprintln!(
            "[cardinality] starting dataset scan at offset {}",
            resume_offset
        );
        data.seek(resume_offset)
    }

    // Moves every staged set into the bucket of its first item,
    // preserving arrival (cardinality) order within each bucket.
    fn index_sets(&mut self, index_us: &mut Vec<SetRecord>) {
        for set in index_us.drain(..) {
            let bucket = set.first_item() as usize;
            if bucket >= self.candidates.len() {
                self.candidates.resize_with(bucket + 1, Vec::new);
            }
            self.candidates[bucket].push(Some(set));
        }
    }

    // Tombstones every indexed candidate subsumed by `current_set`.
    fn delete_subsumed_candidates(&mut self, current_set: &SetRecord) {
        let items = current_set.items();
        let mut checks = 0u64;
        for (i, &item) in items.iter().enumerate() {
            // Items ascend, so once one is past the index all are.
            if item as usize >= self.candidates.len() {
                break;
            }
            let remaining = items.len() - i;
            let bucket = &mut self.candidates[item as usize];
            for slot in bucket.iter_mut() {
                let candidate = match slot {
                    Some(candidate) => candidate,
                    None => continue,
                };
                if candidate.size() > remaining {
                    // Buckets are cardinality sorted; the rest are bigger.
                    break;
                }
                // The candidate's first item equals items[i], and a
                // candidate indexed here contains none of items[..i], so
                // both prefixes can be skipped.
                checks += 1;
                if does_subsume(&items[i..], &candidate.items()[1..]) {
                    *slot = None;
                }
            }
        }
        self.subsumption_checks_count += checks;
    }

    fn dump_maximal_sets<W: Write>(
        &mut self,
        index_us: &mut Vec<SetRecord>,
        output_mode: OutputMode,
        out: &mut W,
    ) -> Result<(), MaxsetError> {
        for set in index_us.drain(..) {
            self.found_maximal_set(&set, output_mode, out)?;
        }
        for bucket in &mut self.candidates {
            for slot in bucket.drain(..) {
                if let Some(set) = slot {
                    self.maximal_sets_count += 1;
                    output::emit(out, output_mode, &set)?;
                }
            }
        }
        self.candidates.clear();
        out.flush().map_err(MaxsetError::Io)
    }

    fn found_maximal_set<W: Write>(
        &mut self,
        set: &SetRecord,
        output_mode: OutputMode,
        out: &mut W,
    ) -> Result<(), MaxsetError> {
        self.maximal_sets_count += 1;
        output::emit(out, output_mode, set)
    }
}
