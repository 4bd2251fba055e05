//! Turn word-level ASR items into subtitle cues.
//!
//! A new cue starts whenever the next word begins more than [`CUE_GAP_SECS`]
//! after the current cue ends. There is no length or duration cap.

use std::path::Path;

use tracing::{info, warn};

use crate::artifacts::{write_atomic, ArtifactStore};
use crate::error::{Error, Result};
use crate::types::{AsrItem, Captions, SubtitleCue, TranscriptDocument};

/// Silence (in seconds) that splits two cues.
pub const CUE_GAP_SECS: f64 = 1.0;

/// Segment a transcript's items into cues.
///
/// Punctuation attaches to the preceding word without a space and, having no
/// timing of its own, inherits the last known item times.
pub fn segment(items: &[AsrItem]) -> Result<Captions> {
    if items.is_empty() {
        return Err(Error::EmptyTranscript);
    }

    let mut cues = Vec::new();
    let mut text = String::new();
    let (mut cue_start, mut cue_end) = (0.0_f64, 0.0_f64);
    let (mut item_start, mut item_end) = (0.0_f64, 0.0_f64);

    for item in items {
        let Some(first) = item.alternatives.first() else {
            warn!(?item, "skipping item with no alternatives");
            continue;
        };
        if item.alternatives.len() > 1 {
            warn!(?item, "multiple alternatives; using the first");
        }

        if let Some(start) = item.start_time {
            item_start = start;
            item_end = item.end_time.unwrap_or(start);
        }

        if item_start - cue_end > CUE_GAP_SECS {
            flush(&mut cues, cue_start, cue_end, &mut text);
            cue_start = item_start;
        }

        if !item.is_punctuation() && !text.is_empty() {
            text.push(' ');
        }
        text.push_str(&first.content);
        cue_end = item_end;
    }

    flush(&mut cues, cue_start, cue_end, &mut text);
    if cues.is_empty() {
        // every item was skipped
        return Err(Error::EmptyTranscript);
    }
    Ok(Captions { cues })
}

fn flush(cues: &mut Vec<SubtitleCue>, start: f64, end: f64, text: &mut String) {
    // A gap before the very first word would otherwise produce an empty cue.
    if text.is_empty() {
        return;
    }
    cues.push(SubtitleCue {
        index: cues.len() + 1,
        start,
        end,
        text: std::mem::take(text),
    });
}

/// What happened to one transcript file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertOutcome {
    Converted { cues: usize },
    AlreadyConverted,
}

/// Convert a downloaded transcript (`results/<id>.json`) into WebVTT at `output`.
/// An existing output is left alone; a failed conversion leaves nothing behind.
pub fn convert_file(input: &Path, output: &Path) -> Result<ConvertOutcome> {
    if output.exists() {
        return Ok(ConvertOutcome::AlreadyConverted);
    }

    info!(input = %input.display(), output = %output.display(), "converting transcript");

    let raw = std::fs::read(input)?;
    let doc: TranscriptDocument = serde_json::from_slice(&raw)
        .map_err(|e| Error::MalformedTranscript(format!("{}: {e}", input.display())))?;

    let captions = segment(doc.items())?;
    write_atomic(output, captions.to_vtt().as_bytes())?;

    Ok(ConvertOutcome::Converted {
        cues: captions.cues.len(),
    })
}

/// Tally of a batch conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertSummary {
    pub converted: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Convert each transcript to the subtitle path of the item id its file stem
/// names. A file that fails is logged and counted; the rest of the batch still runs.
pub fn convert_files<P: AsRef<Path>>(inputs: &[P], artifacts: &ArtifactStore) -> ConvertSummary {
    let mut summary = ConvertSummary::default();
    for input in inputs {
        let input = input.as_ref();
        let output = match input
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| Error::InvalidOption(format!("no item id in {}", input.display())))
            .and_then(|item_id| artifacts.webvtt_path(item_id))
        {
            Ok(output) => output,
            Err(e) => {
                warn!(input = %input.display(), error = %e, "skipping");
                summary.failed += 1;
                continue;
            }
        };

        match convert_file(input, &output) {
            Ok(ConvertOutcome::Converted { cues }) => {
                info!(output = %output.display(), cues, "converted");
                summary.converted += 1;
            }
            Ok(ConvertOutcome::AlreadyConverted) => summary.skipped += 1,
            Err(e) => {
                warn!(input = %input.display(), error = %e, "failed to convert");
                summary.failed += 1;
            }
        }
    }
    summary
}
