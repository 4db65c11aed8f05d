//! Export writer
//!
//! Writes normalized klines to `<output_dir>/<symbol>_<first>_to_<last>_<interval>.<ext>`.
//! Confirmation before replacing an existing file goes through
//! [`OverwritePrompt`], so the writer itself never touches the terminal.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::ExportConfig;
use crate::error::{ExportError, ExportResult};
use crate::types::{KlineRecord, OutputFormat};

/// Decides whether an existing export file may be replaced
pub trait OverwritePrompt {
    fn confirm_overwrite(&mut self, path: &Path) -> io::Result<bool>;
}

impl<F> OverwritePrompt for F
where
    F: FnMut(&Path) -> bool,
{
    fn confirm_overwrite(&mut self, path: &Path) -> io::Result<bool> {
        Ok(self(path))
    }
}

/// Replace existing files without asking
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOverwrite;

impl OverwritePrompt for AlwaysOverwrite {
    fn confirm_overwrite(&mut self, _path: &Path) -> io::Result<bool> {
        Ok(true)
    }
}

/// Result of an export attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Written { path: PathBuf, records: usize },
    /// Target existed and the prompt declined
    Skipped { path: PathBuf },
}

impl ExportOutcome {
    pub fn path(&self) -> &Path {
        match self {
            ExportOutcome::Written { path, .. } | ExportOutcome::Skipped { path } => path,
        }
    }
}

/// File name for `records`, e.g. `BTCUSDT_2018-01-15_to_2018-01-16_1h.json`
pub fn export_file_name(config: &ExportConfig, records: &[KlineRecord]) -> ExportResult<String> {
    let (first, last) = match (records.first(), records.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(ExportError::NoData),
    };

    Ok(format!(
        "{}_{}_to_{}_{}.{}",
        config.symbol,
        first.day(),
        last.day(),
        config.interval,
        config.format.extension()
    ))
}

/// Full path the export of `records` would be written to
pub fn export_path(config: &ExportConfig, records: &[KlineRecord]) -> ExportResult<PathBuf> {
    Ok(config.output_dir.join(export_file_name(config, records)?))
}

/// Write `records` in the configured format.
///
/// Creates the output directory if needed. An existing file is only replaced
/// when `prompt` agrees; otherwise nothing is written and
/// [`ExportOutcome::Skipped`] is returned.
pub fn export_records(
    records: &[KlineRecord],
    config: &ExportConfig,
    prompt: &mut dyn OverwritePrompt,
) -> ExportResult<ExportOutcome> {
    let path = export_path(config, records)?;

    if path.exists() && !prompt.confirm_overwrite(&path)? {
        info!("Keeping existing file {}", path.display());
        return Ok(ExportOutcome::Skipped { path });
    }

    fs::create_dir_all(&config.output_dir)?;

    match config.format {
        OutputFormat::Json => write_json(&path, records)?,
        OutputFormat::Csv => write_csv(&path, records)?,
    }

    debug!(records = records.len(), path = %path.display(), "export written");
    Ok(ExportOutcome::Written {
        path,
        records: records.len(),
    })
}

fn write_json(path: &Path, records: &[KlineRecord]) -> ExportResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.flush()?;
    Ok(())
}

fn write_csv(path: &Path, records: &[KlineRecord]) -> ExportResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}
