use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info, warn};
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::block::replace_in_block;
use crate::{paths, MizError, ReplaceSettings, Result};

/// Entries at or above this size need the Zip64 extension.
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

/// What happened to the archive during one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TranscodeReport {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub entries: usize,
    pub target_found: bool,
    pub block_found: bool,
    pub replacements: usize,
    pub changed: bool,
}

/// Target entry and the substitution to apply to it.
#[derive(Debug, Clone, Copy)]
pub struct EntryEdit<'a> {
    pub target_entry: &'a str,
    pub marker: &'a [u8],
    pub find: &'a [u8],
    pub replace: &'a [u8],
}

impl<'a> From<&'a ReplaceSettings> for EntryEdit<'a> {
    fn from(settings: &'a ReplaceSettings) -> Self {
        EntryEdit {
            target_entry: &settings.target_entry,
            marker: settings.marker.as_bytes(),
            find: settings.search.as_bytes(),
            replace: settings.replace.as_bytes(),
        }
    }
}

struct Entry {
    name: String,
    data: Vec<u8>,
    is_dir: bool,
    last_modified: DateTime,
    unix_mode: Option<u32>,
}

impl Entry {
    fn options(&self) -> FileOptions {
        let mut options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(self.last_modified)
            .large_file(self.data.len() as u64 >= ZIP64_THRESHOLD);
        if let Some(mode) = self.unix_mode {
            options = options.unix_permissions(mode);
        }
        options
    }
}

/// Copy `settings.input_path` to `settings.output_path`, editing the target
/// entry on the way through.
///
/// Fails before any file is opened or created when both paths resolve to the
/// same file.
pub fn transcode(settings: &ReplaceSettings) -> Result<TranscodeReport> {
    let input_path = &settings.input_path;
    let output_path = &settings.output_path;

    if paths::same_file(input_path, output_path)? {
        return Err(MizError::SamePath(paths::resolve_absolute(input_path)?));
    }

    let reader = File::open(input_path).map_err(|e| MizError::OpenInput {
        path: input_path.clone(),
        source: ZipError::from(e),
    })?;
    let archive = ZipArchive::new(reader).map_err(|source| MizError::OpenInput {
        path: input_path.clone(),
        source,
    })?;

    let out = File::create(output_path).map_err(|source| MizError::CreateOutput {
        path: output_path.clone(),
        source,
    })?;

    let mut report = rewrite_archive(archive, out, EntryEdit::from(settings))?;
    report.input_path = input_path.clone();
    report.output_path = output_path.clone();

    info!(
        entries = report.entries,
        changed = report.changed,
        output = %output_path.display(),
        "archive written"
    );
    Ok(report)
}

/// Stream every entry of `archive` into a new zip written to `out`, in order,
/// recompressing everything with Deflate.
pub fn rewrite_archive<R, W>(
    mut archive: ZipArchive<R>,
    out: W,
    edit: EntryEdit<'_>,
) -> Result<TranscodeReport>
where
    R: Read + Seek,
    W: Write + Seek,
{
    let mut writer = ZipWriter::new(out);
    let mut report = TranscodeReport::default();

    for index in 0..archive.len() {
        let mut entry = read_entry(&mut archive, index)?;
        debug!(name = %entry.name, size = entry.data.len(), "copying entry");

        if entry.name == edit.target_entry {
            let outcome = replace_in_block(&entry.data, edit.marker, edit.find, edit.replace);
            report.target_found = true;
            report.block_found = outcome.block.is_some();
            report.replacements = outcome.replacements;
            report.changed = outcome.changed;

            match outcome.block {
                Some(block) => info!(
                    entry = %entry.name,
                    open = block.open,
                    close = block.close,
                    replacements = outcome.replacements,
                    "located marker block"
                ),
                None => warn!(entry = %entry.name, "marker block not found"),
            }

            if outcome.changed {
                entry.data = outcome.content.into_owned();
            }
        }

        write_entry(&mut writer, &entry)?;
        report.entries += 1;
    }

    if !report.target_found {
        warn!(entry = edit.target_entry, "target entry not present in archive");
    }

    writer
        .finish()
        .map_err(|source| MizError::Finalize { source })?;
    Ok(report)
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, index: usize) -> Result<Entry> {
    let mut file = archive.by_index(index).map_err(|source| MizError::ReadEntry {
        name: format!("#{index}"),
        source,
    })?;

    let name = file.name().to_string();
    let mut data = Vec::new();
    file.read_to_end(&mut data).map_err(|e| MizError::ReadEntry {
        name: name.clone(),
        source: ZipError::from(e),
    })?;

    Ok(Entry {
        is_dir: file.is_dir(),
        last_modified: file.last_modified(),
        unix_mode: file.unix_mode(),
        name,
        data,
    })
}

fn write_entry<W: Write + Seek>(writer: &mut ZipWriter<W>, entry: &Entry) -> Result<()> {
    let write_err = |source: ZipError| MizError::WriteEntry {
        name: entry.name.clone(),
        source,
    };

    if entry.is_dir {
        // Directory records carry no data and are always stored.
        return writer
            .add_directory(entry.name.as_str(), entry.options())
            .map_err(write_err);
    }

    writer
        .start_file(entry.name.as_str(), entry.options())
        .map_err(write_err)?;
    writer
        .write_all(&entry.data)
        .map_err(|e| write_err(ZipError::from(e)))
}
