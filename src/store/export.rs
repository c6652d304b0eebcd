//! Export of locally buffered records
//!
//! Writes every record a local store can read into a zip archive holding one
//! folder with one JSON array per record kind:
//!
//! ```text
//! study_1_Data_20240501_1200/
//!     Location.json
//!     Speed.json
//! ```
//!
//! Each kind is first staged to its own file next to the archive, so records
//! arriving in any order never have to be held in memory.

use super::{is_cancelled, CancellationSignal};
use crate::domain::{DatumType, StoreError};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Records written per kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub by_type: BTreeMap<&'static str, usize>,
}

impl ExportSummary {
    pub fn records(&self) -> usize {
        self.by_type.values().sum()
    }
}

/// Writes `lines` into a zip archive at `zip_path`, under `folder`
///
/// Cancellation is checked per record and per archive entry. On any error,
/// cancellation included, no archive is left behind.
pub fn export_to_zip<I>(
    lines: I,
    zip_path: &Path,
    folder: &str,
    cancel: &CancellationSignal,
) -> Result<ExportSummary, StoreError>
where
    I: IntoIterator<Item = (DatumType, String)>,
{
    let staging = staging_directory(zip_path);
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }
    fs::create_dir_all(&staging)?;

    let result = stage(lines, &staging, cancel)
        .and_then(|summary| pack(&summary, &staging, zip_path, folder, cancel).map(|()| summary));

    if let Err(e) = fs::remove_dir_all(&staging) {
        tracing::warn!(path = %staging.display(), error = %e, "Failed to remove export staging directory");
    }

    match result {
        Ok(summary) => {
            tracing::info!(
                path = %zip_path.display(),
                records = summary.records(),
                kinds = summary.by_type.len(),
                "Exported local data"
            );
            Ok(summary)
        }
        Err(e) => {
            let _ = fs::remove_file(zip_path);
            Err(e)
        }
    }
}

fn staging_directory(zip_path: &Path) -> PathBuf {
    let name = zip_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    zip_path.with_file_name(format!(".{name}.parts"))
}

fn part_name(kind: &str) -> String {
    format!("{kind}.json")
}

/// Writes one `[ ... ]` file per record kind
fn stage<I>(
    lines: I,
    staging: &Path,
    cancel: &CancellationSignal,
) -> Result<ExportSummary, StoreError>
where
    I: IntoIterator<Item = (DatumType, String)>,
{
    let mut parts: BTreeMap<&'static str, BufWriter<File>> = BTreeMap::new();
    let mut summary = ExportSummary::default();

    for (datum_type, json) in lines {
        if is_cancelled(cancel) {
            return Err(StoreError::Cancelled);
        }

        let kind = datum_type.name();
        let part = match parts.entry(kind) {
            Entry::Occupied(entry) => {
                let part = entry.into_mut();
                part.write_all(b",\n")?;
                part
            }
            Entry::Vacant(entry) => {
                let mut part = BufWriter::new(File::create(staging.join(part_name(kind)))?);
                part.write_all(b"[\n")?;
                entry.insert(part)
            }
        };
        part.write_all(json.as_bytes())?;
        *summary.by_type.entry(kind).or_default() += 1;
    }

    for (_, mut part) in parts {
        part.write_all(b"\n]\n")?;
        part.flush()?;
    }
    Ok(summary)
}

fn pack(
    summary: &ExportSummary,
    staging: &Path,
    zip_path: &Path,
    folder: &str,
    cancel: &CancellationSignal,
) -> Result<(), StoreError> {
    let mut zip = ZipWriter::new(File::create(zip_path)?);
    zip.add_directory(format!("{folder}/"), SimpleFileOptions::default())
        .map_err(zip_error)?;

    for kind in summary.by_type.keys() {
        if is_cancelled(cancel) {
            return Err(StoreError::Cancelled);
        }

        let name = part_name(kind);
        zip.start_file(
            format!("{folder}/{name}"),
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated),
        )
        .map_err(zip_error)?;
        let mut part = File::open(staging.join(&name))?;
        io::copy(&mut part, &mut zip)?;
    }

    zip.finish().map_err(zip_error)?.sync_all()?;
    Ok(())
}

fn zip_error(e: zip::result::ZipError) -> StoreError {
    StoreError::Io(format!("Failed to write zip archive: {e}"))
}
