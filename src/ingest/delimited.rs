//! Delimited-text reading on top of the `csv` crate.
//!
//! The whole upload is read as records, header included, with flexible
//! widths so that a short or long row surfaces as a width mismatch on that
//! row alone. Fields are trimmed; blank lines are skipped. A quoted field
//! may span lines.

use csv::{ReaderBuilder, StringRecord, Trim};

/// Delimiters considered by [`detect_delimiter`], in tie-break order.
const CANDIDATE_DELIMITERS: [u8; 3] = [b',', b';', b'\t'];

/// Picks the delimiter of a header line: the candidate occurring most often
/// outside quotes, defaulting to a comma.
#[must_use]
pub fn detect_delimiter(header: &str) -> u8 {
    let mut counts = [0_usize; CANDIDATE_DELIMITERS.len()];
    let mut in_quotes = false;
    for byte in header.bytes() {
        if byte == b'"' {
            in_quotes = !in_quotes;
        } else if !in_quotes {
            for (count, candidate) in counts.iter_mut().zip(CANDIDATE_DELIMITERS) {
                if byte == candidate {
                    *count += 1;
                }
            }
        }
    }
    counts
        .iter()
        .zip(CANDIDATE_DELIMITERS)
        .filter(|(count, _)| **count > 0)
        .fold(None, |best: Option<(usize, u8)>, (count, candidate)| match best {
            Some((top, _)) if top >= *count => best,
            _ => Some((*count, candidate)),
        })
        .map_or(b',', |(_, delimiter)| delimiter)
}

/// Reads the trimmed, unquoted fields of every non-blank record of
/// `text`, the header first.
///
/// The delimiter is detected from the first non-blank line. A leading
/// byte-order mark is ignored.
pub fn read_rows(text: &str) -> impl Iterator<Item = Result<Vec<String>, csv::Error>> + '_ {
    let text = text.trim_start_matches('\u{feff}');
    let header = text
        .lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or_default();

    ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .delimiter(detect_delimiter(header))
        .from_reader(text.as_bytes())
        .into_records()
        .filter_map(|result| match result {
            Ok(record) if is_blank(&record) => None,
            Ok(record) => Some(Ok(record.iter().map(str::to_owned).collect())),
            Err(err) => Some(Err(err)),
        })
}

fn is_blank(record: &StringRecord) -> bool {
    record.len() <= 1 && record.get(0).is_none_or(str::is_empty)
}
