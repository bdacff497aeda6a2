//! Conversion driver — classifies inputs by extension and produces the
//! sibling artifact next to each one.
//!
//! Every file is an independent unit of work: one failure is recorded in
//! its [`FileOutcome`] and the batch continues.  Outputs go to a temporary
//! sibling first and are renamed into place, so an interrupted conversion
//! never leaves a half-written file at the destination.  Converting `a.ct`
//! and `a.xlsx` in the same batch targets the same outputs; avoiding that
//! collision is the caller's job.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use thiserror::Error;

use crate::{csv, ct, xlsx};

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("unsupported extension: {}", .0.display())]
    UnsupportedExtension(PathBuf),
    #[error(transparent)]
    Ct(#[from] ct::CtError),
    #[error(transparent)]
    Xlsx(#[from] xlsx::XlsxError),
    #[error(transparent)]
    Csv(#[from] csv::CsvError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Per-file result of a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub input:  PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error:  Option<String>,
}

impl FileOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Descend into subdirectories when the input is a directory.
    pub recurse: bool,
}

/// Per-file progress sink, called once per finished file.
pub type ProgressFn<'a> = dyn FnMut(&FileOutcome) + 'a;

// ── Classification ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    CtToXlsx,
    XlsxToCt,
    CsvToCt,
}

fn classify(path: &Path) -> Option<Direction> {
    let ext = path.extension()?.to_str()?;
    if ext.eq_ignore_ascii_case("ct") {
        Some(Direction::CtToXlsx)
    } else if ext.eq_ignore_ascii_case("xlsx") {
        Some(Direction::XlsxToCt)
    } else if ext.eq_ignore_ascii_case("csv") {
        Some(Direction::CsvToCt)
    } else {
        None
    }
}

/// Sibling output path for a convertible input, `None` otherwise.
pub fn output_path(input: &Path) -> Option<PathBuf> {
    let target = match classify(input)? {
        Direction::CtToXlsx => "xlsx",
        Direction::XlsxToCt | Direction::CsvToCt => "ct",
    };
    Some(input.with_extension(target))
}

// ── Single file ──────────────────────────────────────────────────────────────

/// Convert one file to its sibling format, returning the output path.
pub fn convert_file(input: &Path) -> Result<PathBuf, ConvertError> {
    let direction = classify(input)
        .ok_or_else(|| ConvertError::UnsupportedExtension(input.to_path_buf()))?;
    let output = input.with_extension(match direction {
        Direction::CtToXlsx => "xlsx",
        Direction::XlsxToCt | Direction::CsvToCt => "ct",
    });

    let bytes = match direction {
        Direction::CtToXlsx => xlsx::to_bytes(&ct::read_file(input)?)?,
        Direction::XlsxToCt => ct::to_bytes(&xlsx::read_file(input)?)?,
        Direction::CsvToCt => ct::to_bytes(&csv::read_file(input)?)?,
    };

    write_atomic(&output, &bytes)?;
    Ok(output)
}

/// Write to a temporary sibling and rename into place on success.
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let mut tmp = tempfile::Builder::new().prefix(".ro2ct-").tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

// ── Batch ────────────────────────────────────────────────────────────────────

/// Convert a file or directory; see [`convert_path_with`].
pub fn convert_path(path: &Path, opts: &ConvertOptions) -> Result<Vec<FileOutcome>, ConvertError> {
    convert_path_with(path, opts, None, None)
}

/// Convert a file or every convertible entry of a directory.
///
/// `cancel` is checked between files; setting it stops the batch after the
/// file in flight.  `progress` receives each [`FileOutcome`] as it lands,
/// letting hosts stream per-file status without any global logger.
pub fn convert_path_with(
    path: &Path,
    opts: &ConvertOptions,
    cancel: Option<&AtomicBool>,
    mut progress: Option<&mut ProgressFn<'_>>,
) -> Result<Vec<FileOutcome>, ConvertError> {
    let inputs = collect_inputs(path, opts)?;

    let mut outcomes = Vec::with_capacity(inputs.len());
    for input in inputs {
        if let Some(flag) = cancel {
            if flag.load(Ordering::Relaxed) {
                break;
            }
        }
        let outcome = match convert_file(&input) {
            Ok(output) => FileOutcome { input, output: Some(output), error: None },
            Err(e) => FileOutcome { input, output: None, error: Some(e.to_string()) },
        };
        if let Some(ref mut sink) = progress {
            sink(&outcome);
        }
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

/// Convert an explicit file list with one rayon task per file.  Files are
/// independent and touch only their own paths, so no synchronization is
/// needed beyond collecting the outcomes.
#[cfg(feature = "parallel")]
pub fn convert_batch_parallel(inputs: &[PathBuf]) -> Vec<FileOutcome> {
    use rayon::prelude::*;

    inputs
        .par_iter()
        .map(|input| match convert_file(input) {
            Ok(output) => {
                FileOutcome { input: input.clone(), output: Some(output), error: None }
            }
            Err(e) => {
                FileOutcome { input: input.clone(), output: None, error: Some(e.to_string()) }
            }
        })
        .collect()
}

fn collect_inputs(path: &Path, opts: &ConvertOptions) -> Result<Vec<PathBuf>, ConvertError> {
    if path.is_dir() {
        let mut inputs = Vec::new();
        walk(path, opts.recurse, &mut inputs)?;
        inputs.sort();
        Ok(inputs)
    } else if classify(path).is_some() {
        Ok(vec![path.to_path_buf()])
    } else {
        Err(ConvertError::UnsupportedExtension(path.to_path_buf()))
    }
}

fn walk(dir: &Path, recurse: bool, inputs: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if recurse {
                walk(&path, recurse, inputs)?;
            }
        } else if classify(&path).is_some() {
            inputs.push(path);
        }
    }
    Ok(())
}
