//! Line timestamp parsing for the client log format.

use chrono::NaiveDateTime;

/// Layout of the timestamp every client log line starts with.
pub const LINE_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

const LINE_TIME_LEN: usize = "2025/01/18 10:00:00".len();

/// Parse the leading `YYYY/MM/DD HH:MM:SS` of a log line.
///
/// Returns `None` for lines that are too short, partial, or not timestamped.
pub fn parse_line_time(line: &str) -> Option<NaiveDateTime> {
    let head = line.get(..LINE_TIME_LEN)?;
    NaiveDateTime::parse_from_str(head, LINE_TIME_FORMAT).ok()
}
