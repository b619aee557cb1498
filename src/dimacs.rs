use crate::item_fixer;
use crate::MaxsetError;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Clause iterator over DIMACS CNF text. Lines whose first token is not
/// an integer (comments, the `p cnf` header) are skipped whole; a `0`
/// token terminates a clause; positive and negative literals are
/// distinct values.
pub struct DimacsReader<R> {
    input: BufReader<R>,
    clauses_read: u64,
}

impl DimacsReader<File> {
    pub fn from_path(path: &Path) -> Result<Self, MaxsetError> {
        let file = File::open(path).map_err(MaxsetError::Io)?;
        Ok(Self::new(file))
    }
}

impl<R: Read> DimacsReader<R> {
    pub fn new(inner: R) -> Self {
        DimacsReader {
            input: BufReader::new(inner),
            clauses_read: 0,
        }
    }

    /// Reads the next clause. `Ok(None)` at end of input.
    pub fn next(&mut self) -> Result<Option<Vec<i32>>, MaxsetError> {
        let mut clause: Vec<i32> = Vec::new();
        loop {
            let mut line = String::new();
            let n = self.input.read_line(&mut line).map_err(MaxsetError::Io)?;
            if n == 0 {
                if clause.is_empty() {
                    return Ok(None);
                }
                return Err(MaxsetError::Malformed(format!(
                    "clause {}: unterminated clause at end of input",
                    self.clauses_read + 1
                )));
            }

            for token in line.split_whitespace() {
                match token.parse::<i32>() {
                    Ok(0) => {
                        if clause.is_empty() {
                            return Err(MaxsetError::Malformed(format!(
                                "clause {}: empty clause encountered",
                                self.clauses_read + 1
                            )));
                        }
                        self.clauses_read += 1;
                        return Ok(Some(clause));
                    }
                    Ok(literal) => clause.push(literal),
                    Err(_) => {
                        if clause.is_empty() {
                            // Comment or header line; drop the rest of it.
                            break;
                        }
                        return Err(MaxsetError::Malformed(format!(
                            "clause {}: unexpected non-integer token '{}'",
                            self.clauses_read + 1,
                            token
                        )));
                    }
                }
            }
        }
    }
}

/// Parses DIMACS CNF from `data`, relabels literals to frequency-ordered
/// item ids, and writes the clause collection as a packed binary dataset
/// sorted lexicographically (default) or by cardinality.
pub fn dimacs_to_apriori<R: Read>(
    data: &mut DimacsReader<R>,
    output_path: &Path,
    by_cardinality: bool,
) -> Result<(), MaxsetError> {
    eprintln!("[dimacs] reading data...");
    let mut clauses: Vec<Vec<i32>> = Vec::new();
    while let Some(clause) = data.next()? {
        clauses.push(clause);
    }
    eprintln!("[dimacs] done reading {} clauses", clauses.len());

    item_fixer::relabel_sort_and_write(clauses, output_path, by_cardinality)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::{DataFormat, RecordReader};
    use std::io::Cursor;

    fn reader(text: &str) -> DimacsReader<Cursor<Vec<u8>>> {
        DimacsReader::new(Cursor::new(text.as_bytes().to_vec()))
    }

    #[test]
    fn test_parses_clauses_and_skips_preamble() {
        let mut dimacs = reader(
            "c a comment line\n\
             p cnf 3 2\n\
             1 -2 3 0\n\
             -1 2 0\n",
        );
        assert_eq!(dimacs.next().unwrap().unwrap(), vec![1, -2, 3]);
        assert_eq!(dimacs.next().unwrap().unwrap(), vec![-1, 2]);
        assert!(dimacs.next().unwrap().is_none());
    }

    #[test]
    fn test_clause_may_span_lines() {
        let mut dimacs = reader("p cnf 3 1\n1 2\n3 0\n");
        assert_eq!(dimacs.next().unwrap().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_empty_clause_is_error() {
        let mut dimacs = reader("p cnf 1 1\n0\n");
        assert!(matches!(dimacs.next(), Err(MaxsetError::Malformed(_))));
    }

    #[test]
    fn test_garbage_mid_clause_is_error() {
        let mut dimacs = reader("1 2 x 0\n");
        assert!(matches!(dimacs.next(), Err(MaxsetError::Malformed(_))));
    }

    #[test]
    fn test_unterminated_clause_is_error() {
        let mut dimacs = reader("1 2 3\n");
        assert!(matches!(dimacs.next(), Err(MaxsetError::Malformed(_))));
    }

    #[test]
    fn test_conversion_produces_engine_ready_binary() {
        let mut dimacs = reader(
            "p cnf 3 3\n\
             1 -2 0\n\
             1 -2 3 0\n\
             -2 0\n",
        );
        let dir = tempfile::tempdir().unwrap();
        let out_path = dir.path().join("clauses.bin");
        dimacs_to_apriori(&mut dimacs, &out_path, false).unwrap();

        let mut reader = RecordReader::from_path(&out_path, DataFormat::Binary).unwrap();
        let mut records = Vec::new();
        while let Some(rec) = reader.next().unwrap() {
            records.push((rec.id(), rec.items().to_vec()));
        }
        // Frequencies: -2 three times, 1 twice, 3 once, so 3 -> 1,
        // 1 -> 2, -2 -> 3. Clauses become {2,3}, {1,2,3}, {3}; lex
        // sorted with input-ordinal ids.
        assert_eq!(
            records,
            vec![(1, vec![1, 2, 3]), (0, vec![2, 3]), (2, vec![3])]
        );
    }
}
