use crate::data_source::RecordReader;
use crate::item_set::SetRecord;
use crate::output::{self, OutputMode};
use crate::MaxsetError;
use std::io::{Read, Seek, Write};

/// Chunk-based maximal-set discovery over input sorted in strict
/// lexicographic order. Each chunk is loaded up to the item budget,
/// pruned of trivial prefixes, compacted behind a dense first-item
/// index, then swept by a recursive prefix descent; records from
/// earlier chunks are replayed against the chunk before it is emitted.
pub struct LexicographicEngine {
    maximal_sets_count: u64,
    input_sets_count: u64,
    candidate_seek_count: u64,
    candidates: Vec<Option<SetRecord>>,
    // index[v] = position of the first chunk entry whose first item is >= v.
    index: Vec<usize>,
    items_in_ram: u64,
}

impl Default for LexicographicEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LexicographicEngine {
    pub fn new() -> Self {
        LexicographicEngine {
            maximal_sets_count: 0,
            input_sets_count: 0,
            candidate_seek_count: 0,
            candidates: Vec::new(),
            index: Vec::new(),
            items_in_ram: 0,
        }
    }

    /// Number of maximal sets found by the last run.
    pub fn maximal_sets_count(&self) -> u64 {
        self.maximal_sets_count
    }

    /// Number of records read across all chunk loads by the last run.
    /// Cross-chunk replays do not re-count.
    pub fn input_sets_count(&self) -> u64 {
        self.input_sets_count
    }

    /// Number of candidate range-bound computations performed by the
    /// last run.
    pub fn candidate_seek_count(&self) -> u64 {
        self.candidate_seek_count
    }

    /// Finds every maximal set in `data` and emits each one to `out` per
    /// `output_mode`. `_max_item_id` is accepted for interface symmetry
    /// with the cardinality engine; the prefix index is sized from each
    /// chunk's contents.
    pub fn find_all_maximal_sets<R: Read + Seek, W: Write>(
        &mut self,
        data: &mut RecordReader<R>,
        _max_item_id: u32,
        max_items_in_ram: u64,
        output_mode: OutputMode,
        out: &mut W,
    ) -> Result<(), MaxsetError> {
        self.maximal_sets_count = 0;
        self.input_sets_count = 0;
        self.candidate_seek_count = 0;
        self.candidates.clear();
        self.index.clear();

        let mut resume_offset = 0u64;
        loop {
            eprintln!("[lex] starting dataset scan at offset {}", resume_offset);
            data.seek(resume_offset)?;
            let start_offset = resume_offset;

            resume_offset = self.read_next_chunk(data, max_items_in_ram)?;

            if self.candidates.is_empty() {
                // EOF with nothing buffered.
                break;
            }

            self.delete_trivially_subsumed();
            self.build_index();

            eprintln!(
                "[lex] {} potential maximal sets; beginning subsumption scan",
                self.candidates.len()
            );
            for i in 0..self.candidates.len().saturating_sub(1) {
                if self.candidates[i].is_some() {
                    self.delete_subsumed_by_position(i);
                }
            }

            if start_offset != 0 {
                data.seek(0)?;
                while data.tell() < start_offset {
                    match data.next()? {
                        Some(record) => self.delete_subsumed_by_probe(record.items()),
                        None => break,
                    }
                }
            }

            if resume_offset != 0 {
                self.prune_tail_prefix(data, resume_offset)?;
            }

            eprintln!("[lex] dumping maximal sets");
            self.dump_maximal_sets(output_mode, out)?;

            if resume_offset == 0 {
                break;
            }
        }
        Ok(())
    }

    // Loads records into the chunk array until EOF or the item budget is
    // reached. Returns the resume offset for the next chunk, 0 at EOF.
    fn read_next_chunk<R: Read + Seek>(
        &mut self,
        data: &mut RecordReader<R>,
        max_items_in_ram: u64,
    ) -> Result<u64, MaxsetError> {
        self.items_in_ram = 0;
        while let Some(record) = data.next()? {
            if let Some(Some(prev)) = self.candidates.last() {
                if record.items() <= prev.items() {
                    return Err(MaxsetError::Malformed(format!(
                        "input violates strict lexicographic order at set {}",
                        record.id()
                    )));
                }
            }
            self.items_in_ram += record.size() as u64;
            self.input_sets_count += 1;
            self.candidates.push(Some(record));

            if self.items_in_ram >= max_items_in_ram {
                let resume = data.tell();
                eprintln!(
                    "[lex] halted chunk load at input set number {}",
                    self.input_sets_count
                );
                return Ok(resume);
            }
        }
        Ok(0)
    }

    // Back-to-front scan deleting every entry that is a proper prefix of
    // its nearest surviving successor. Runs on a freshly loaded chunk,
    // so every entry, in particular the last, is live.
    fn delete_trivially_subsumed(&mut self) {
        let n = self.candidates.len();
        let mut keeper = n - 1;
        for i in (0..n - 1).rev() {
            let (subsumed, size) = {
                let candidate = self.candidates[i].as_ref().expect("fresh chunk entry");
                let keeper_set = self.candidates[keeper].as_ref().expect("keeper is live");
                (
                    candidate.size() < keeper_set.size()
                        && keeper_set.items()[..candidate.size()] == *candidate.items(),
                    candidate.size(),
                )
            };
            if subsumed {
                self.items_in_ram -= size as u64;
                self.candidates[i] = None;
            } else {
                keeper = i;
            }
        }
    }

    // Compacts tombstones out of the chunk and rebuilds the dense
    // first-item index over the survivors.
    fn build_index(&mut self) {
        self.candidates.retain(|c| c.is_some());
        let last_first = self
            .candidates
            .last()
            .and_then(|c| c.as_ref())
            .expect("chunk is non-empty")
            .first_item() as usize;
        self.index.clear();
        self.index.resize(last_first + 1, 0);

        let mut block_start = 0usize;
        let mut block_first = self.candidates[0]
            .as_ref()
            .expect("compacted entry")
            .first_item();
        let mut previous_item = 0u32;
        for i in 1..self.candidates.len() {
            let first = self.candidates[i]
                .as_ref()
                .expect("compacted entry")
                .first_item();
            if first != block_first {
                for item in (previous_item + 1)..=block_first {
                    self.index[item as usize] = block_start;
                }
                previous_item = block_first;
                block_first = first;
                block_start = i;
            }
        }
        for item in (previous_item + 1)..=block_first {
            self.index[item as usize] = block_start;
        }
    }

    // Uses the entry at `i` as a probe over everything that follows it.
    // A probe of one item cannot properly subsume any lex follower.
    fn delete_subsumed_by_position(&mut self, i: usize) {
        let probe = self.candidates[i].take().expect("caller checked live");
        if probe.size() > 1 {
            self.delete_subsumed_from_range(i + 1, self.candidates.len(), probe.items(), 0, 0);
        }
        self.candidates[i] = Some(probe);
    }

    // Replays an external record as a read-only probe over the whole chunk.
    fn delete_subsumed_by_probe(&mut self, probe: &[u32]) {
        if probe.len() <= 1 {
            return;
        }
        self.delete_subsumed_from_range(0, self.candidates.len(), probe, 0, 0);
    }

    // A chunk's final entry may be a proper prefix of the record that
    // starts the next chunk (its immediate lex successor, which is also
    // the only later record that could prefix-subsume it). Peek at it
    // before emitting.
    fn prune_tail_prefix<R: Read + Seek>(
        &mut self,
        data: &mut RecordReader<R>,
        resume_offset: u64,
    ) -> Result<(), MaxsetError> {
        data.seek(resume_offset)?;
        let next_set = match data.next()? {
            Some(record) => record,
            None => return Ok(()),
        };
        if let Some(last) = self.candidates.iter_mut().rev().find(|c| c.is_some()) {
            let tail = last.as_ref().expect("just matched Some");
            if tail.size() < next_set.size()
                && next_set.items()[..tail.size()] == *tail.items()
            {
                self.items_in_ram -= tail.size() as u64;
                *last = None;
            }
        }
        Ok(())
    }

    // Recursive prefix descent. Preconditions: every live entry in
    // [begin, end) shares the same length-`depth` prefix, and
    // probe[cursor..] holds every probe item that can still match an
    // entry item at `depth` or beyond.
    fn delete_subsumed_from_range(
        &mut self,
        mut begin: usize,
        end: usize,
        probe: &[u32],
        mut cursor: usize,
        depth: usize,
    ) {
        self.delete_prefix_matches(&mut begin, end, probe.len(), depth);
        if begin == end || cursor == probe.len() {
            return;
        }

        loop {
            let head_item = self.candidates[begin]
                .as_ref()
                .expect("range head is live")
                .items()[depth];
            if probe[cursor] < head_item {
                cursor += probe[cursor..].partition_point(|&v| v < head_item);
                if cursor == probe.len() {
                    return;
                }
            }

            if probe[cursor] == head_item {
                // The prefix extends by one item; bound the equal-item
                // block and descend into it.
                let new_end = self.new_end_range(begin, end, head_item, depth);
                if begin != new_end {
                    self.delete_subsumed_from_range(begin, new_end, probe, cursor + 1, depth + 1);
                }
                begin = new_end;
                while begin != end && self.candidates[begin].is_none() {
                    begin += 1;
                }
            } else {
                begin = self.new_begin_range(begin, end, probe[cursor], depth);
            }
            if begin == end {
                return;
            }
        }
    }

    // Deletes and advances over live entries whose whole item run equals
    // the current prefix; they are properly subsumed whenever the probe
    // is longer than the prefix. Also skips tombstones either way.
    fn delete_prefix_matches(
        &mut self,
        begin: &mut usize,
        end: usize,
        probe_len: usize,
        depth: usize,
    ) {
        if probe_len > depth {
            while *begin != end {
                match &self.candidates[*begin] {
                    None => *begin += 1,
                    Some(c) if c.size() == depth => {
                        self.items_in_ram -= c.size() as u64;
                        self.candidates[*begin] = None;
                        *begin += 1;
                    }
                    Some(_) => break,
                }
            }
        } else {
            while *begin != end && self.candidates[*begin].is_none() {
                *begin += 1;
            }
        }
    }

    // First live position in [begin, end) whose item at `depth` is >=
    // `current_item`, or `end`. At depth 0 the first-item index answers
    // directly; deeper levels binary search.
    fn new_begin_range(
        &mut self,
        begin: usize,
        end: usize,
        current_item: u32,
        depth: usize,
    ) -> usize {
        self.candidate_seek_count += 1;
        if depth == 0 {
            if current_item as usize >= self.index.len() {
                return end;
            }
            let mut new_begin = begin.max(self.index[current_item as usize]);
            while new_begin != end && self.candidates[new_begin].is_none() {
                new_begin += 1;
            }
            new_begin
        } else {
            self.find_first(begin, end, current_item, depth, |probe_item, entry_item| {
                probe_item > entry_item
            })
        }
    }

    // First live position in [begin, end) whose item at `depth` differs
    // from `current_item`, or `end`; bounds the equal-item block.
    fn new_end_range(
        &mut self,
        begin: usize,
        end: usize,
        current_item: u32,
        depth: usize,
    ) -> usize {
        self.candidate_seek_count += 1;
        if depth == 0 {
            let next = current_item as usize + 1;
            if next < self.index.len() {
                self.index[next]
            } else {
                end
            }
        } else {
            self.find_first(begin, end, current_item, depth, |probe_item, entry_item| {
                probe_item == entry_item
            })
        }
    }

    // Tombstone-aware binary search: first live position where
    // `keep_advancing(current_item, entry[depth])` no longer holds. A
    // tombstoned midpoint is resolved by scanning right for the next
    // live entry, halving when the scan exhausts the half-interval.
    fn find_first<F>(
        &self,
        mut first: usize,
        last: usize,
        current_item: u32,
        depth: usize,
        keep_advancing: F,
    ) -> usize
    where
        F: Fn(u32, u32) -> bool,
    {
        while first != last && self.candidates[first].is_none() {
            first += 1;
        }
        let mut len = (last - first) as isize;
        while len > 0 {
            let half = len >> 1;
            let mut current = first + half as usize;
            while current < last && self.candidates[current].is_none() {
                current += 1;
            }
            if current == last {
                len = half;
            } else if keep_advancing(
                current_item,
                self.candidates[current].as_ref().expect("live entry").items()[depth],
            ) {
                first += half as usize + 1;
                len -= half + 1;
                while first < last && self.candidates[first].is_none() {
                    first += 1;
                    len -= 1;
                }
                if first == last {
                    return last;
                }
            } else {
                len = half;
            }
        }
        first
    }

    fn dump_maximal_sets<W: Write>(
        &mut self,
        output_mode: OutputMode,
        out: &mut W,
    ) -> Result<(), MaxsetError> {
        for slot in std::mem::take(&mut self.candidates) {
            if let Some(set) = slot {
                self.maximal_sets_count += 1;
                output::emit(out, output_mode, &set)?;
            }
        }
        out.flush().map_err(MaxsetError::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::{write_record, DataFormat};
    use std::io::Cursor;

    fn dataset(records: &[(u32, &[u32])]) -> RecordReader<Cursor<Vec<u8>>> {
        let mut bytes = Vec::new();
        for (id, items) in records {
            write_record(&mut bytes, *id, items).unwrap();
        }
        RecordReader::new(Cursor::new(bytes), DataFormat::Binary)
    }

    fn run(records: &[(u32, &[u32])], max_items_in_ram: u64) -> (LexicographicEngine, Vec<u32>) {
        let mut engine = LexicographicEngine::new();
        let mut data = dataset(records);
        let mut out = Vec::new();
        engine
            .find_all_maximal_sets(&mut data, 64, max_items_in_ram, OutputMode::Id, &mut out)
            .unwrap();
        let ids = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| l.parse().unwrap())
            .collect();
        (engine, ids)
    }

    #[test]
    fn test_mixed_prefix_and_containment() {
        // {1,2} and {1,2,3} fall to trivial prefix pruning; {2,3} is
        // caught by the descent from {1,2,3,4}.
        let (engine, mut ids) = run(
            &[
                (10, &[1, 2]),
                (20, &[1, 2, 3]),
                (40, &[1, 2, 3, 4]),
                (30, &[2, 3]),
            ],
            u64::MAX,
        );
        ids.sort_unstable();
        assert_eq!(ids, vec![40]);
        assert_eq!(engine.input_sets_count(), 4);
        assert_eq!(engine.maximal_sets_count(), 1);
    }

    #[test]
    fn test_overlapping_but_incomparable_survive() {
        let (engine, mut ids) = run(
            &[(10, &[1, 2, 4]), (20, &[1, 3, 4]), (30, &[2, 3])],
            u64::MAX,
        );
        ids.sort_unstable();
        assert_eq!(ids, vec![10, 20, 30]);
        assert_eq!(engine.maximal_sets_count(), 3);
    }

    #[test]
    fn test_trivial_prefix_chain() {
        let (_, mut ids) = run(
            &[
                (1, &[1, 2, 3]),
                (2, &[1, 2, 3, 4]),
                (3, &[1, 2, 3, 4, 5]),
                (4, &[1, 2, 4]),
            ],
            u64::MAX,
        );
        ids.sort_unstable();
        assert_eq!(ids, vec![3, 4]);
    }

    #[test]
    fn test_descent_skips_probe_gaps() {
        // {1,3} and {1,4} are not prefixes of {1,2,3,4} but are subsumed
        // by it; only the recursive descent can find them.
        let (engine, mut ids) = run(
            &[(1, &[1, 2, 3, 4]), (2, &[1, 3]), (3, &[1, 4]), (4, &[1, 5])],
            u64::MAX,
        );
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 4]);
        assert!(engine.candidate_seek_count() > 0);
    }

    #[test]
    fn test_empty_input() {
        let (engine, ids) = run(&[], u64::MAX);
        assert!(ids.is_empty());
        assert_eq!(engine.maximal_sets_count(), 0);
        assert_eq!(engine.input_sets_count(), 0);
    }

    #[test]
    fn test_single_record() {
        let (engine, ids) = run(&[(9, &[4, 5, 6])], u64::MAX);
        assert_eq!(ids, vec![9]);
        assert_eq!(engine.maximal_sets_count(), 1);
    }

    #[test]
    fn test_cross_chunk_replay() {
        // {2,3} lands in the second chunk and is subsumed only by the
        // lex-earlier {1,2,3} from the first chunk.
        let (engine, mut ids) = run(&[(1, &[1, 2, 3]), (2, &[2, 3]), (3, &[3, 4])], 3);
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(engine.input_sets_count(), 3);
    }

    #[test]
    fn test_chunk_tail_prefix_of_next_chunk() {
        // With a budget of 2 items the first chunk is exactly {1,2},
        // which is a proper prefix of the next chunk's first record.
        let (_, mut ids) = run(&[(1, &[1, 2]), (2, &[1, 2, 3])], 2);
        ids.sort_unstable();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn test_chunked_matches_unbounded() {
        let records: Vec<(u32, Vec<u32>)> = vec![
            (1, vec![1, 2, 3, 4]),
            (2, vec![1, 2, 4]),
            (3, vec![1, 3, 5]),
            (4, vec![1, 4]),
            (5, vec![2, 3, 4, 5]),
            (6, vec![2, 4]),
            (7, vec![3, 5]),
            (8, vec![4, 5]),
        ];
        let borrowed: Vec<(u32, &[u32])> =
            records.iter().map(|(id, v)| (*id, v.as_slice())).collect();

        let (_, mut unbounded) = run(&borrowed, u64::MAX);
        unbounded.sort_unstable();
        for budget in 1..=8 {
            let (_, mut bounded) = run(&borrowed, budget);
            bounded.sort_unstable();
            assert_eq!(bounded, unbounded, "budget {}", budget);
        }
    }

    #[test]
    fn test_rejects_lex_order_violation() {
        let mut engine = LexicographicEngine::new();
        let mut data = dataset(&[(1, &[2, 3]), (2, &[1, 2])]);
        let mut out = Vec::new();
        let result =
            engine.find_all_maximal_sets(&mut data, 64, u64::MAX, OutputMode::CountOnly, &mut out);
        assert!(matches!(result, Err(MaxsetError::Malformed(_))));
    }

    #[test]
    fn test_equal_sets_rejected_as_order_violation() {
        let mut engine = LexicographicEngine::new();
        let mut data = dataset(&[(1, &[1, 2]), (2, &[1, 2])]);
        let mut out = Vec::new();
        let result =
            engine.find_all_maximal_sets(&mut data, 64, u64::MAX, OutputMode::CountOnly, &mut out);
        assert!(matches!(result, Err(MaxsetError::Malformed(_))));
    }

    #[test]
    fn test_id_and_items_output() {
        let mut engine = LexicographicEngine::new();
        let mut data = dataset(&[(7, &[1, 2]), (8, &[1, 2, 9])]);
        let mut out = Vec::new();
        engine
            .find_all_maximal_sets(&mut data, 64, u64::MAX, OutputMode::IdAndItems, &mut out)
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "8 1 2 9\n");
    }
}
