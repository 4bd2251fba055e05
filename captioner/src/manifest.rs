//! Tab-separated manifest parsing.
//!
//! Each line is either
//! `item_id, language, title, item_url, media_master_url` or the same plus a
//! trailing `media_stream_url`. With five fields the stream URL defaults to
//! the master URL.

use std::path::Path;

use tracing::warn;

use crate::error::Result;
use crate::types::ManifestItem;

/// A manifest line with the wrong number of fields.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed manifest line {line_number} ({fields} fields): {raw:?}")]
pub struct MalformedLine {
    pub line_number: usize,
    pub fields: usize,
    pub raw: String,
}

pub type ManifestLine = std::result::Result<ManifestItem, MalformedLine>;

/// Parse a single line. `line_number` is 1-based and only used for diagnostics.
pub fn parse_line(line: &str, line_number: usize) -> ManifestLine {
    let line = line.trim_end_matches(['\r', '\n']);
    let fields: Vec<&str> = line.split('\t').map(str::trim).collect();

    let (item_id, language, title, item_url, master, stream) = match fields.as_slice() {
        [id, lang, title, url, master] => (id, lang, title, url, master, master),
        [id, lang, title, url, master, stream] => (id, lang, title, url, master, stream),
        _ => {
            return Err(MalformedLine {
                line_number,
                fields: fields.len(),
                raw: line.to_string(),
            })
        }
    };

    Ok(ManifestItem {
        item_id: item_id.to_string(),
        language: language.to_string(),
        title: title.to_string(),
        item_url: item_url.to_string(),
        media_master_url: master.to_string(),
        media_stream_url: stream.to_string(),
    })
}

/// Parse manifest text. Blank lines are ignored.
pub fn parse_manifest(text: &str) -> Vec<ManifestLine> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| parse_line(line, i + 1))
        .collect()
}

/// Read and parse manifest files, in order.
pub fn read_manifests<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<ManifestLine>> {
    let mut lines = Vec::new();
    for path in paths {
        let text = std::fs::read_to_string(path.as_ref())?;
        lines.extend(parse_manifest(&text));
    }
    Ok(lines)
}

/// Drop malformed lines, logging each one.
pub fn valid_items(lines: Vec<ManifestLine>) -> Vec<ManifestItem> {
    lines
        .into_iter()
        .filter_map(|line| match line {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("skipping {e}");
                None
            }
        })
        .collect()
}
