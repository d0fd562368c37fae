//! Incremental reader for the continuously-appended client log.
//!
//! Tracks the byte offset already consumed and hands out complete
//! newline-terminated lines only. A trailing partial line stays unread until
//! the client finishes writing it. When the file shrinks below the tracked
//! offset (truncation or rotation) reading restarts at byte zero, skipping
//! any re-read prefix that was already handed out.

use crate::timestamp::parse_line_time;
use crate::{Result, WatchContext};
use chrono::NaiveDateTime;
use std::collections::HashSet;
use std::fs::File;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::io::{BufRead, BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};

/// Tails one log file from a tracked byte offset.
#[derive(Debug)]
pub struct TailReader {
    path: PathBuf,
    offset: u64,
    max_line_bytes: usize,
    consumed: ConsumedMark,
    /// Set after a truncation until the re-read prefix has been passed.
    skipping_replay: bool,
}

impl TailReader {
    /// Open the log and start at its current end, skipping history.
    pub fn open(path: impl Into<PathBuf>, ctx: &WatchContext) -> Result<Self> {
        let path = path.into();
        let file = File::open(&path)?;
        let offset = file.metadata()?.len();

        debug!(
            target: "tradelog::tail",
            "Opened {} at offset {}",
            path.display(),
            offset
        );

        Ok(Self {
            path,
            offset,
            max_line_bytes: ctx.settings.max_line_bytes,
            consumed: ConsumedMark::default(),
            skipping_replay: false,
        })
    }

    /// Open the log at byte zero so existing content is emitted on the first poll.
    pub fn open_from_start(path: impl Into<PathBuf>, ctx: &WatchContext) -> Result<Self> {
        let path = path.into();
        File::open(&path)?;

        Ok(Self {
            path,
            offset: 0,
            max_line_bytes: ctx.settings.max_line_bytes,
            consumed: ConsumedMark::default(),
            skipping_replay: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes consumed so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Return the complete lines appended since the last poll.
    ///
    /// Never fails: a missing or unreadable file yields no lines and is
    /// retried on the next call.
    pub fn poll(&mut self) -> Vec<String> {
        match self.read_new_lines() {
            Ok(lines) => lines,
            Err(e) => {
                warn!(
                    target: "tradelog::tail",
                    "Log {} unavailable, retrying next poll: {}",
                    self.path.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    fn read_new_lines(&mut self) -> Result<Vec<String>> {
        let mut file = File::open(&self.path)?;
        let file_len = file.metadata()?.len();

        if file_len < self.offset {
            info!(
                target: "tradelog::tail",
                "Log {} shrank from {} to {} bytes, reading from start",
                self.path.display(),
                self.offset,
                file_len
            );
            self.offset = 0;
            self.skipping_replay = self.consumed.mark.is_some();
        }

        if file_len == self.offset {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(self.offset))?;
        let mut reader = BufReader::new(file.take(file_len - self.offset));

        let mut lines = Vec::new();
        let mut record = Vec::new();
        loop {
            record.clear();
            let (read, terminated) =
                match read_capped_line(&mut reader, &mut record, self.max_line_bytes + 1) {
                    Ok(result) => result,
                    Err(e) => {
                        warn!(
                            target: "tradelog::tail",
                            "Read error in {} at offset {}: {}",
                            self.path.display(),
                            self.offset,
                            e
                        );
                        break;
                    }
                };
            if read == 0 {
                break;
            }
            if !terminated {
                trace!(
                    target: "tradelog::tail",
                    "Partial line of {} bytes left for next poll",
                    read
                );
                break;
            }

            self.offset += read as u64;
            let line = self.decode(&record, read);
            if self.skipping_replay {
                if self.consumed.covers(&line) {
                    trace!(target: "tradelog::tail", "Skipping already consumed line");
                    continue;
                }
                self.skipping_replay = false;
            }
            self.consumed.record(&line);
            lines.push(line);
        }

        Ok(lines)
    }

    fn decode(&self, record: &[u8], read: usize) -> String {
        let mut bytes = record.strip_suffix(b"\n").unwrap_or(record);
        bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);

        if bytes.len() > self.max_line_bytes {
            warn!(
                target: "tradelog::tail",
                "Line of {} bytes truncated to {}",
                read,
                self.max_line_bytes
            );
            bytes = &bytes[..self.max_line_bytes];
        }

        String::from_utf8_lossy(bytes).into_owned()
    }
}

/// Read one `\n`-terminated record, keeping at most `cap` bytes of it.
///
/// The rest of an overlong record is consumed and dropped. Returns the bytes
/// consumed and whether a newline ended the record.
fn read_capped_line(
    reader: &mut impl BufRead,
    buf: &mut Vec<u8>,
    cap: usize,
) -> std::io::Result<(usize, bool)> {
    let mut consumed = 0;
    loop {
        let available = match reader.fill_buf() {
            Ok(available) => available,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if available.is_empty() {
            return Ok((consumed, false));
        }

        let (len, terminated) = match available.iter().position(|&b| b == b'\n') {
            Some(pos) => (pos + 1, true),
            None => (available.len(), false),
        };
        let room = cap.saturating_sub(buf.len()).min(len);
        buf.extend_from_slice(&available[..room]);
        reader.consume(len);
        consumed += len;

        if terminated {
            return Ok((consumed, true));
        }
    }
}

/// Where consumption stopped: the newest line time seen and the hashes of
/// the lines emitted at that time.
///
/// After a truncation the re-read prefix is checked against it, so content
/// that was already handed out is not emitted a second time.
#[derive(Debug, Default)]
struct ConsumedMark {
    mark: Option<NaiveDateTime>,
    at_mark: HashSet<u64>,
}

impl ConsumedMark {
    fn record(&mut self, line: &str) {
        let Some(time) = parse_line_time(line) else {
            return;
        };
        if self.mark.is_none_or(|mark| time > mark) {
            self.mark = Some(time);
            self.at_mark.clear();
        }
        if self.mark == Some(time) {
            self.at_mark.insert(line_hash(line));
        }
    }

    /// Whether `line` belongs to content consumed before the truncation.
    ///
    /// Untimestamped lines inside the re-read prefix count as consumed.
    fn covers(&self, line: &str) -> bool {
        let Some(mark) = self.mark else {
            return false;
        };
        match parse_line_time(line) {
            None => true,
            Some(time) if time < mark => true,
            Some(time) if time == mark => self.at_mark.contains(&line_hash(line)),
            Some(_) => false,
        }
    }
}

fn line_hash(line: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    line.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WatchSettings;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn append(file: &mut NamedTempFile, text: &str) {
        file.write_all(text.as_bytes()).unwrap();
        file.flush().unwrap();
    }

    #[test]
    fn test_open_skips_existing_content() {
        let mut file = NamedTempFile::new().unwrap();
        append(&mut file, "old line\n");

        let mut reader = TailReader::open(file.path(), &WatchContext::default()).unwrap();
        assert_eq!(reader.offset(), 9);
        assert!(reader.poll().is_empty());

        append(&mut file, "new line\n");
        assert_eq!(reader.poll(), vec!["new line".to_string()]);
    }

    #[test]
    fn test_open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = TailReader::open(dir.path().join("absent.txt"), &WatchContext::default());
        assert!(matches!(result, Err(crate::TradelogError::Io(_))));
    }

    #[test]
    fn test_poll_is_idempotent_without_growth() {
        let mut file = NamedTempFile::new().unwrap();
        let mut reader = TailReader::open(file.path(), &WatchContext::default()).unwrap();

        append(&mut file, "a\nb\n");
        assert_eq!(reader.poll(), vec!["a".to_string(), "b".to_string()]);
        let offset = reader.offset();

        for _ in 0..3 {
            assert!(reader.poll().is_empty());
            assert_eq!(reader.offset(), offset);
        }
    }

    #[test]
    fn test_partial_line_waits_for_newline() {
        let mut file = NamedTempFile::new().unwrap();
        let mut reader = TailReader::open(file.path(), &WatchContext::default()).unwrap();

        append(&mut file, "complete\nhalf");
        assert_eq!(reader.poll(), vec!["complete".to_string()]);
        assert_eq!(reader.offset(), 9);

        append(&mut file, " done\r\n");
        assert_eq!(reader.poll(), vec!["half done".to_string()]);
    }

    #[test]
    fn test_truncation_restarts_from_zero() {
        let mut file = NamedTempFile::new().unwrap();
        let mut reader = TailReader::open(file.path(), &WatchContext::default()).unwrap();

        append(&mut file, "first long line\nsecond long line\n");
        assert_eq!(reader.poll().len(), 2);

        std::fs::write(file.path(), "fresh\n").unwrap();
        assert_eq!(reader.poll(), vec!["fresh".to_string()]);
        assert_eq!(reader.offset(), 6);
    }

    #[test]
    fn test_consumed_lines_are_not_replayed_on_rewrite() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "line one\n").unwrap();

        let mut reader =
            TailReader::open_from_start(file.path(), &WatchContext::default()).unwrap();
        assert_eq!(reader.poll(), vec!["line one".to_string()]);

        // Same bytes written again: size never drops below the offset.
        std::fs::write(file.path(), "line one\n").unwrap();
        assert!(reader.poll().is_empty());
    }

    #[test]
    fn test_missing_file_yields_nothing_then_recovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Client.txt");
        std::fs::write(&path, "").unwrap();

        let mut reader = TailReader::open(&path, &WatchContext::default()).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(reader.poll().is_empty());

        std::fs::write(&path, "back\n").unwrap();
        assert_eq!(reader.poll(), vec!["back".to_string()]);
    }

    #[test]
    fn test_overlong_line_is_truncated() {
        let ctx = WatchContext {
            settings: WatchSettings {
                max_line_bytes: 4,
                ..WatchSettings::default()
            },
            ..WatchContext::default()
        };
        let mut file = NamedTempFile::new().unwrap();
        let mut reader = TailReader::open(file.path(), &ctx).unwrap();

        append(&mut file, "abcdefgh\nok\n");
        assert_eq!(reader.poll(), vec!["abcd".to_string(), "ok".to_string()]);
    }

    #[test]
    fn test_truncation_to_consumed_prefix_emits_nothing() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            "2025/01/18 10:00:05 A\n2025/01/18 10:00:06 B\n",
        )
        .unwrap();
        let mut reader =
            TailReader::open_from_start(file.path(), &WatchContext::default()).unwrap();
        assert_eq!(reader.poll().len(), 2);

        std::fs::write(file.path(), "2025/01/18 10:00:05 A\n").unwrap();
        assert!(reader.poll().is_empty());
        assert_eq!(reader.offset(), 22);

        let mut file = std::fs::OpenOptions::new().append(true).open(file.path()).unwrap();
        file.write_all(b"2025/01/18 10:00:07 C\n").unwrap();
        assert_eq!(reader.poll(), vec!["2025/01/18 10:00:07 C".to_string()]);
    }

    #[test]
    fn test_truncation_keeps_new_lines_in_the_last_second() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            "2025/01/18 10:00:05 A\n2025/01/18 10:00:06 B\n2025/01/18 10:00:06 C\n",
        )
        .unwrap();
        let mut reader =
            TailReader::open_from_start(file.path(), &WatchContext::default()).unwrap();
        assert_eq!(reader.poll().len(), 3);

        std::fs::write(
            file.path(),
            "2025/01/18 10:00:06 B\n2025/01/18 10:00:06 D\n",
        )
        .unwrap();
        assert_eq!(reader.poll(), vec!["2025/01/18 10:00:06 D".to_string()]);
    }

    #[test]
    fn test_overlong_line_is_not_buffered_whole() {
        let mut record = Vec::new();
        let mut input = std::io::Cursor::new(format!("{}\nnext\n", "x".repeat(10_000)));

        let (read, terminated) = read_capped_line(&mut input, &mut record, 8).unwrap();
        assert_eq!((read, terminated), (10_001, true));
        assert_eq!(record, b"xxxxxxxx");

        record.clear();
        assert_eq!(read_capped_line(&mut input, &mut record, 8).unwrap(), (5, true));
        assert_eq!(record, b"next\n");
    }
}
