use crate::item_set::SetRecord;
use crate::MaxsetError;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

// Upper bound on a single record's item count, so a corrupt length word
// cannot trigger a multi-gigabyte allocation before the read fails.
const MAX_RECORD_ITEMS: u32 = 1 << 28;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataFormat {
    /// Sequence of `{ id: u32le, size: u32le, items: u32le * size }`, no framing.
    Binary,
    /// Whitespace separated `id item1 ... itemN 0` per record.
    Text,
}

/// Sequential reader over a sorted record stream. `tell` after a
/// successful `next` is a valid resume point for `seek` in both formats.
pub struct RecordReader<R> {
    input: BufReader<R>,
    format: DataFormat,
    offset: u64,
    records_read: u64,
}

impl RecordReader<File> {
    pub fn from_path(path: &Path, format: DataFormat) -> Result<Self, MaxsetError> {
        let file = File::open(path).map_err(MaxsetError::Io)?;
        Ok(Self::new(file, format))
    }
}

impl<R: Read + Seek> RecordReader<R> {
    pub fn new(inner: R, format: DataFormat) -> Self {
        RecordReader {
            input: BufReader::new(inner),
            format,
            offset: 0,
            records_read: 0,
        }
    }

    /// Reads the next record. `Ok(None)` on a clean end of stream.
    pub fn next(&mut self) -> Result<Option<SetRecord>, MaxsetError> {
        match self.format {
            DataFormat::Binary => self.next_binary(),
            DataFormat::Text => self.next_text(),
        }
    }

    pub fn seek(&mut self, offset: u64) -> Result<(), MaxsetError> {
        self.input
            .seek(SeekFrom::Start(offset))
            .map_err(MaxsetError::Io)?;
        self.offset = offset;
        Ok(())
    }

    /// Byte offset of the first record not yet returned by `next`.
    pub fn tell(&self) -> u64 {
        self.offset
    }

    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    fn next_binary(&mut self) -> Result<Option<SetRecord>, MaxsetError> {
        let set_id = match self.read_u32_or_eof()? {
            Some(id) => id,
            None => return Ok(None),
        };
        let size = match self.read_u32_or_eof()? {
            Some(size) => size,
            None => return Err(self.malformed("truncated record header")),
        };
        if size == 0 {
            return Err(self.malformed("record with zero items"));
        }
        if size > MAX_RECORD_ITEMS {
            return Err(self.malformed(&format!("implausible record size {}", size)));
        }

        let mut raw = vec![0u8; size as usize * 4];
        self.input.read_exact(&mut raw).map_err(|e| {
            if e.kind() == ErrorKind::UnexpectedEof {
                self.malformed("truncated record body")
            } else {
                MaxsetError::Io(e)
            }
        })?;
        self.offset += raw.len() as u64;

        let items: Vec<u32> = raw
            .chunks_exact(4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        self.validate_items(&items)?;
        self.records_read += 1;
        Ok(Some(SetRecord::new(set_id, items)))
    }

    fn next_text(&mut self) -> Result<Option<SetRecord>, MaxsetError> {
        let set_id = match self.read_text_token()? {
            Some(id) => id,
            None => return Ok(None),
        };
        let mut items = Vec::new();
        loop {
            match self.read_text_token()? {
                None => return Err(self.malformed("end of input inside record")),
                Some(0) => break,
                Some(item) => items.push(item),
            }
        }
        if items.is_empty() {
            return Err(self.malformed("record with zero items"));
        }
        self.validate_items(&items)?;
        self.records_read += 1;
        Ok(Some(SetRecord::new(set_id, items)))
    }

    // Reads a little-endian u32, distinguishing clean EOF (None) from a
    // partial read (error).
    fn read_u32_or_eof(&mut self) -> Result<Option<u32>, MaxsetError> {
        let mut buf = [0u8; 4];
        let mut filled = 0;
        while filled < 4 {
            let n = self.input.read(&mut buf[filled..]).map_err(MaxsetError::Io)?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(self.malformed("truncated record header"));
            }
            filled += n;
        }
        self.offset += 4;
        Ok(Some(u32::from_le_bytes(buf)))
    }

    // Next whitespace-delimited unsigned decimal token. None on EOF
    // before any token byte.
    fn read_text_token(&mut self) -> Result<Option<u32>, MaxsetError> {
        if !self.skip_whitespace()? {
            return Ok(None);
        }
        let record_number = self.records_read + 1;
        let mut value: u64 = 0;
        loop {
            let buf = self.input.fill_buf().map_err(MaxsetError::Io)?;
            if buf.is_empty() {
                break;
            }
            let mut consumed = 0;
            let mut at_boundary = false;
            for &b in buf {
                if b.is_ascii_digit() {
                    value = value * 10 + u64::from(b - b'0');
                    if value > u64::from(u32::MAX) {
                        return Err(MaxsetError::Malformed(format!(
                            "record {}: numeric token overflows 32 bits",
                            record_number
                        )));
                    }
                    consumed += 1;
                } else if b.is_ascii_whitespace() {
                    at_boundary = true;
                    break;
                } else {
                    return Err(MaxsetError::Malformed(format!(
                        "record {}: unexpected byte {:#04x}",
                        record_number, b
                    )));
                }
            }
            self.input.consume(consumed);
            self.offset += consumed as u64;
            if at_boundary {
                break;
            }
        }
        Ok(Some(value as u32))
    }

    // Returns false when the stream ends before a non-whitespace byte.
    fn skip_whitespace(&mut self) -> Result<bool, MaxsetError> {
        loop {
            let buf = self.input.fill_buf().map_err(MaxsetError::Io)?;
            if buf.is_empty() {
                return Ok(false);
            }
            let n = buf
                .iter()
                .take_while(|b| b.is_ascii_whitespace())
                .count();
            let exhausted = n == buf.len();
            self.input.consume(n);
            self.offset += n as u64;
            if !exhausted {
                return Ok(true);
            }
        }
    }

    fn validate_items(&self, items: &[u32]) -> Result<(), MaxsetError> {
        for w in items.windows(2) {
            if w[0] >= w[1] {
                return Err(self.malformed(&format!(
                    "items not strictly increasing ({} then {})",
                    w[0], w[1]
                )));
            }
        }
        Ok(())
    }

    fn malformed(&self, reason: &str) -> MaxsetError {
        MaxsetError::Malformed(format!("record {}: {}", self.records_read + 1, reason))
    }
}

/// Writes one record in the packed binary wire format.
pub fn write_record<W: Write>(
    out: &mut W,
    set_id: u32,
    items: &[u32],
) -> Result<(), MaxsetError> {
    out.write_all(&set_id.to_le_bytes()).map_err(MaxsetError::Io)?;
    out.write_all(&(items.len() as u32).to_le_bytes())
        .map_err(MaxsetError::Io)?;
    for &item in items {
        out.write_all(&item.to_le_bytes()).map_err(MaxsetError::Io)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn binary_dataset(records: &[(u32, &[u32])]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for (id, items) in records {
            write_record(&mut bytes, *id, items).unwrap();
        }
        bytes
    }

    #[test]
    fn test_binary_read_back() {
        let bytes = binary_dataset(&[(1, &[1, 2, 3]), (2, &[5]), (9, &[2, 4, 6, 8])]);
        let mut reader = RecordReader::new(Cursor::new(bytes), DataFormat::Binary);

        let rec = reader.next().unwrap().unwrap();
        assert_eq!(rec.id(), 1);
        assert_eq!(rec.items(), &[1, 2, 3]);

        let rec = reader.next().unwrap().unwrap();
        assert_eq!(rec.id(), 2);
        assert_eq!(rec.items(), &[5]);

        let rec = reader.next().unwrap().unwrap();
        assert_eq!(rec.id(), 9);
        assert_eq!(rec.items(), &[2, 4, 6, 8]);

        assert!(reader.next().unwrap().is_none());
        assert!(reader.next().unwrap().is_none());
        assert_eq!(reader.records_read(), 3);
    }

    #[test]
    fn test_binary_tell_is_resume_point() {
        let bytes = binary_dataset(&[(1, &[1, 2]), (2, &[3, 4]), (3, &[5, 6])]);
        let mut reader = RecordReader::new(Cursor::new(bytes), DataFormat::Binary);

        reader.next().unwrap().unwrap();
        let offset = reader.tell();
        reader.next().unwrap().unwrap();
        reader.next().unwrap().unwrap();

        reader.seek(offset).unwrap();
        let rec = reader.next().unwrap().unwrap();
        assert_eq!(rec.id(), 2);
        assert_eq!(reader.tell(), offset + 16);
    }

    #[test]
    fn test_binary_truncated_body() {
        let mut bytes = binary_dataset(&[(1, &[1, 2, 3])]);
        bytes.truncate(bytes.len() - 2);
        let mut reader = RecordReader::new(Cursor::new(bytes), DataFormat::Binary);
        match reader.next() {
            Err(MaxsetError::Malformed(msg)) => assert!(msg.contains("truncated")),
            other => panic!("expected malformed error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_binary_zero_size() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&7u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        let mut reader = RecordReader::new(Cursor::new(bytes), DataFormat::Binary);
        assert!(matches!(reader.next(), Err(MaxsetError::Malformed(_))));
    }

    #[test]
    fn test_binary_unsorted_items() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&3u32.to_le_bytes());
        for item in [4u32, 2, 9] {
            bytes.extend_from_slice(&item.to_le_bytes());
        }
        let mut reader = RecordReader::new(Cursor::new(bytes), DataFormat::Binary);
        match reader.next() {
            Err(MaxsetError::Malformed(msg)) => assert!(msg.contains("strictly increasing")),
            other => panic!("expected malformed error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_binary_duplicate_items() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&2u32.to_le_bytes());
        for item in [4u32, 4] {
            bytes.extend_from_slice(&item.to_le_bytes());
        }
        let mut reader = RecordReader::new(Cursor::new(bytes), DataFormat::Binary);
        assert!(matches!(reader.next(), Err(MaxsetError::Malformed(_))));
    }

    #[test]
    fn test_text_read_back() {
        let text = "1 1 2 3 0\n2 1 2 3 4 0\n3 2 3 0\n";
        let mut reader = RecordReader::new(Cursor::new(text.as_bytes().to_vec()), DataFormat::Text);

        let rec = reader.next().unwrap().unwrap();
        assert_eq!(rec.id(), 1);
        assert_eq!(rec.items(), &[1, 2, 3]);

        let rec = reader.next().unwrap().unwrap();
        assert_eq!(rec.id(), 2);
        assert_eq!(rec.items(), &[1, 2, 3, 4]);

        let rec = reader.next().unwrap().unwrap();
        assert_eq!(rec.id(), 3);
        assert_eq!(rec.items(), &[2, 3]);

        assert!(reader.next().unwrap().is_none());
    }

    #[test]
    fn test_text_newlines_optional() {
        let text = "1 1 2 0 2 2 3 0";
        let mut reader = RecordReader::new(Cursor::new(text.as_bytes().to_vec()), DataFormat::Text);
        assert_eq!(reader.next().unwrap().unwrap().items(), &[1, 2]);
        assert_eq!(reader.next().unwrap().unwrap().items(), &[2, 3]);
        assert!(reader.next().unwrap().is_none());
    }

    #[test]
    fn test_text_tell_is_resume_point() {
        let text = "1 1 2 0\n2 2 3 0\n3 3 4 0\n";
        let mut reader = RecordReader::new(Cursor::new(text.as_bytes().to_vec()), DataFormat::Text);
        reader.next().unwrap().unwrap();
        let offset = reader.tell();
        reader.next().unwrap().unwrap();

        reader.seek(offset).unwrap();
        let rec = reader.next().unwrap().unwrap();
        assert_eq!(rec.id(), 2);
    }

    #[test]
    fn test_text_unterminated_record() {
        let text = "1 1 2 3";
        let mut reader = RecordReader::new(Cursor::new(text.as_bytes().to_vec()), DataFormat::Text);
        assert!(matches!(reader.next(), Err(MaxsetError::Malformed(_))));
    }

    #[test]
    fn test_text_garbage_token() {
        let text = "1 1 x 0\n";
        let mut reader = RecordReader::new(Cursor::new(text.as_bytes().to_vec()), DataFormat::Text);
        assert!(matches!(reader.next(), Err(MaxsetError::Malformed(_))));
    }

    #[test]
    fn test_empty_input() {
        let mut reader = RecordReader::new(Cursor::new(Vec::new()), DataFormat::Binary);
        assert!(reader.next().unwrap().is_none());
        let mut reader = RecordReader::new(Cursor::new(Vec::new()), DataFormat::Text);
        assert!(reader.next().unwrap().is_none());
    }
}
