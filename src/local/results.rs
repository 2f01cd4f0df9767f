//! Flat text form of a classification: one `<confidence> <label>` line per class.

use super::Classification;
use crate::{error::ResultsError, prediction::Prediction};
use std::{io::Write, path::Path};

/// Writes one line per class, in classifier order.
///
/// Labels are written trimmed, matching what [`parse`] reads back.
pub fn write<W: Write>(mut out: W, classification: &Classification) -> std::io::Result<()> {
    for class in &classification.classes {
        writeln!(out, "{} {}", class.confidence, class.label.trim())?;
    }
    Ok(())
}

pub fn write_file(path: &Path, classification: &Classification) -> std::io::Result<()> {
    let file = std::fs::File::create(path)?;
    let mut out = std::io::BufWriter::new(file);
    write(&mut out, classification)?;
    out.flush()
}

/// Parses results text into a percentage mapping (confidence × 100).
///
/// The first whitespace-delimited token is the confidence; the rest of the
/// line, trimmed, is the label and may contain spaces. Blank lines are skipped.
pub fn parse(text: &str) -> Result<Prediction, ResultsError> {
    let mut prediction = Prediction::new();

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some((confidence, label)) = line.split_once(char::is_whitespace) else {
            return Err(ResultsError::MissingLabel { line: line_no });
        };

        let confidence: f64 = confidence
            .parse()
            .map_err(|_| ResultsError::InvalidConfidence {
                line: line_no,
                value: confidence.to_string(),
            })?;

        let (label, percent) = entry(line_no, label, confidence)?;
        prediction.insert(label, percent);
    }

    Ok(prediction)
}

/// The label and confidence rules shared by the in-memory and file paths.
///
/// `line` is the 1-based position of the class, which is also its line in a
/// results file. Returns the trimmed label and the confidence as a percentage.
pub(crate) fn entry(
    line: usize,
    label: &str,
    confidence: f64,
) -> Result<(String, f64), ResultsError> {
    let label = label.trim();
    if label.is_empty() {
        return Err(ResultsError::MissingLabel { line });
    }
    if label.contains(['\n', '\r']) {
        return Err(ResultsError::MultilineLabel { line });
    }
    if !confidence.is_finite() {
        return Err(ResultsError::InvalidConfidence {
            line,
            value: confidence.to_string(),
        });
    }
    Ok((label.to_string(), confidence * 100.0))
}
