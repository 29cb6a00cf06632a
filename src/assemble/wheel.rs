//! Wheel archive writing.
//!
//! Entries are deflate-compressed with a normalized modification time,
//! payload first in tree order, then the `.dist-info` directory with
//! `RECORD` as the very last entry. The archive is written through a
//! temporary file and renamed into place, so rebuilding with identical
//! inputs produces a byte-identical wheel and a failed build leaves no
//! partial archive.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Timelike};
use miette::Diagnostic;
use tempfile::NamedTempFile;
use thiserror::Error;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::assemble::record::Record;
use crate::core::metadata::{render_core_metadata, render_wheel_metadata, ProjectId};
use crate::core::plan::{DestCategory, InstallPlanEntry};
use crate::core::pyproject::ProjectTable;
use crate::mapper::MappedArtifacts;

/// Failure writing an output archive.
#[derive(Debug, Error, Diagnostic)]
#[error("failed to write `{path}`: {source}")]
#[diagnostic(code(slipway::assemble::io))]
pub struct AssemblyIoError {
    pub path: String,
    #[source]
    pub source: std::io::Error,
}

impl AssemblyIoError {
    fn new(path: &Path, source: std::io::Error) -> Self {
        AssemblyIoError {
            path: path.display().to_string(),
            source,
        }
    }
}

fn zip_io(error: zip::result::ZipError) -> std::io::Error {
    match error {
        zip::result::ZipError::Io(io) => io,
        other => std::io::Error::other(other),
    }
}

/// Fallback archive timestamp (2020-02-02 00:00:00 UTC) used when
/// `SOURCE_DATE_EPOCH` is not set. Fixed so rebuilds are identical.
pub const DEFAULT_EPOCH: i64 = 1_580_601_600;

// the zip format cannot represent times before 1980
const ZIP_EPOCH_FLOOR: i64 = 315_532_800;

/// Resolve the normalized archive timestamp.
pub fn archive_epoch() -> i64 {
    std::env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_EPOCH)
}

fn zip_time(epoch: i64) -> zip::DateTime {
    let clamped = epoch.max(ZIP_EPOCH_FLOOR);
    let Some(dt) = chrono::DateTime::from_timestamp(clamped, 0) else {
        return zip::DateTime::default();
    };
    zip::DateTime::from_date_and_time(
        dt.year() as u16,
        dt.month() as u8,
        dt.day() as u8,
        dt.hour() as u8,
        dt.minute() as u8,
        dt.second() as u8,
    )
    .unwrap_or_default()
}

/// Streams payload files into a wheel, then finishes with the metadata
/// directory and manifest.
pub struct WheelWriter {
    zip: ZipWriter<NamedTempFile>,
    record: Record,
    options: FileOptions,
    final_path: PathBuf,
}

impl WheelWriter {
    /// Start a wheel in `out_dir`. The archive only appears under its
    /// final name once [`WheelWriter::finish`] succeeds.
    pub fn create(out_dir: &Path, id: &ProjectId, tag: &str) -> Result<Self, AssemblyIoError> {
        std::fs::create_dir_all(out_dir).map_err(|e| AssemblyIoError::new(out_dir, e))?;
        let final_path = out_dir.join(id.wheel_filename(tag));
        let tmp = tempfile::Builder::new()
            .prefix(".slipway-")
            .suffix(".whl")
            .tempfile_in(out_dir)
            .map_err(|e| AssemblyIoError::new(&final_path, e))?;
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip_time(archive_epoch()));
        Ok(WheelWriter {
            zip: ZipWriter::new(tmp),
            record: Record::new(),
            options,
            final_path,
        })
    }

    /// Add one staged file under its archive path.
    pub fn add_file(&mut self, archive_path: &str, source: &Path) -> Result<(), AssemblyIoError> {
        let data = std::fs::read(source).map_err(|e| AssemblyIoError::new(source, e))?;
        let executable = source
            .metadata()
            .map(|m| is_executable(&m))
            .unwrap_or(false);
        self.add_bytes(archive_path, &data, executable)
    }

    /// Add one in-memory entry under its archive path.
    pub fn add_bytes(
        &mut self,
        archive_path: &str,
        data: &[u8],
        executable: bool,
    ) -> Result<(), AssemblyIoError> {
        let mode = if executable { 0o755 } else { 0o644 };
        self.zip
            .start_file(archive_path, self.options.unix_permissions(mode))
            .map_err(|e| AssemblyIoError::new(&self.final_path, zip_io(e)))?;
        self.zip
            .write_all(data)
            .map_err(|e| AssemblyIoError::new(&self.final_path, e))?;
        self.record.push(archive_path, data);
        Ok(())
    }

    /// Write the `.dist-info` directory, close the archive and rename
    /// it into place.
    pub fn finish(
        mut self,
        id: &ProjectId,
        metadata: &str,
        wheel_metadata: &str,
    ) -> Result<PathBuf, AssemblyIoError> {
        let info = id.dist_info_dir();
        self.add_bytes(&format!("{}/METADATA", info), metadata.as_bytes(), false)?;
        self.add_bytes(&format!("{}/WHEEL", info), wheel_metadata.as_bytes(), false)?;

        let record_path = format!("{}/RECORD", info);
        let rendered = self.record.render(&record_path);
        self.zip
            .start_file(&record_path, self.options.unix_permissions(0o644))
            .map_err(|e| AssemblyIoError::new(&self.final_path, zip_io(e)))?;
        self.zip
            .write_all(rendered.as_bytes())
            .map_err(|e| AssemblyIoError::new(&self.final_path, e))?;

        let tmp = self
            .zip
            .finish()
            .map_err(|e| AssemblyIoError::new(&self.final_path, zip_io(e)))?;
        tmp.persist(&self.final_path)
            .map_err(|e| AssemblyIoError::new(&self.final_path, e.error))?;
        Ok(self.final_path)
    }
}

/// Archive path of a mapped entry: code lands at the root, everything
/// else under the `.data` directory, with headers and data namespaced
/// by project so wheels cannot fight over shared directories.
pub fn archive_path(id: &ProjectId, entry: &InstallPlanEntry) -> String {
    match entry.category {
        DestCategory::PureCode | DestCategory::PlatformCode => entry.dest.clone(),
        DestCategory::Scripts => format!("{}/scripts/{}", id.data_dir(), entry.dest),
        DestCategory::Headers => format!(
            "{}/headers/{}/{}",
            id.data_dir(),
            id.escaped_name(),
            entry.dest
        ),
        DestCategory::Data => format!(
            "{}/data/{}/{}",
            id.data_dir(),
            id.escaped_name(),
            entry.dest
        ),
    }
}

/// Assemble the mapped tree into a wheel in `out_dir`.
pub fn write_wheel(
    out_dir: &Path,
    id: &ProjectId,
    project: &ProjectTable,
    source_dir: &Path,
    artifacts: &MappedArtifacts,
) -> anyhow::Result<PathBuf> {
    let mut writer = WheelWriter::create(out_dir, id, &artifacts.tag)?;
    for entry in artifacts.tree.iter() {
        writer.add_file(&archive_path(id, entry), &entry.source)?;
    }
    let metadata = render_core_metadata(project, id, source_dir)?;
    let wheel_metadata = render_wheel_metadata(&artifacts.tag, artifacts.root_is_purelib());
    let path = writer.finish(id, &metadata, &wheel_metadata)?;
    tracing::debug!("wrote {}", path.display());
    Ok(path)
}

#[cfg(unix)]
fn is_executable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &std::fs::Metadata) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn sample_id() -> ProjectId {
        ProjectId::new("demo-pkg", "1.0.0")
    }

    fn entry(category: DestCategory, dest: &str) -> InstallPlanEntry {
        InstallPlanEntry {
            source: PathBuf::from("/unused"),
            category,
            dest: dest.to_string(),
            tag: None,
            subproject: None,
            group: "targets".to_string(),
            native: false,
        }
    }

    #[test]
    fn test_archive_paths() {
        let id = sample_id();
        assert_eq!(
            archive_path(&id, &entry(DestCategory::PureCode, "demo/__init__.py")),
            "demo/__init__.py"
        );
        assert_eq!(
            archive_path(&id, &entry(DestCategory::Scripts, "demo-cli")),
            "demo_pkg-1.0.0.data/scripts/demo-cli"
        );
        assert_eq!(
            archive_path(&id, &entry(DestCategory::Headers, "demo.h")),
            "demo_pkg-1.0.0.data/headers/demo_pkg/demo.h"
        );
        assert_eq!(
            archive_path(&id, &entry(DestCategory::Data, "share/demo/x.dat")),
            "demo_pkg-1.0.0.data/data/demo_pkg/share/demo/x.dat"
        );
    }

    #[test]
    fn test_zip_time_clamps_to_1980() {
        let dt = zip_time(0);
        assert_eq!(dt.year(), 1980);
        let dt = zip_time(DEFAULT_EPOCH);
        assert_eq!(dt.year(), 2020);
        assert_eq!(dt.month(), 2);
        assert_eq!(dt.day(), 2);
    }

    #[test]
    fn test_wheel_has_record_last() {
        let dir = tempfile::tempdir().unwrap();
        let id = sample_id();
        let mut writer = WheelWriter::create(dir.path(), &id, "py3-none-any").unwrap();
        writer
            .add_bytes("demo/__init__.py", b"x = 1\n", false)
            .unwrap();
        let path = writer
            .finish(&id, "Metadata-Version: 2.1\n", "Wheel-Version: 1.0\n")
            .unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "demo_pkg-1.0.0-py3-none-any.whl"
        );

        let mut archive = zip::ZipArchive::new(std::fs::File::open(&path).unwrap()).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "demo/__init__.py",
                "demo_pkg-1.0.0.dist-info/METADATA",
                "demo_pkg-1.0.0.dist-info/WHEEL",
                "demo_pkg-1.0.0.dist-info/RECORD",
            ]
        );

        let mut record_text = String::new();
        archive
            .by_name("demo_pkg-1.0.0.dist-info/RECORD")
            .unwrap()
            .read_to_string(&mut record_text)
            .unwrap();
        let rows = Record::parse(&record_text);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].path, "demo/__init__.py");
        assert_eq!(rows[0].size, 6);
        assert_eq!(rows[3].path, "demo_pkg-1.0.0.dist-info/RECORD");
        assert!(rows[3].digest.is_empty());
    }

    #[test]
    fn test_record_digests_match_content() {
        let dir = tempfile::tempdir().unwrap();
        let id = sample_id();
        let payload = b"print('hi')\n";
        let mut writer = WheelWriter::create(dir.path(), &id, "py3-none-any").unwrap();
        writer.add_bytes("demo/cli.py", payload, false).unwrap();
        let path = writer.finish(&id, "M\n", "W\n").unwrap();

        let mut archive = zip::ZipArchive::new(std::fs::File::open(&path).unwrap()).unwrap();
        let mut record_text = String::new();
        archive
            .by_name("demo_pkg-1.0.0.dist-info/RECORD")
            .unwrap()
            .read_to_string(&mut record_text)
            .unwrap();
        let rows = Record::parse(&record_text);
        assert_eq!(
            rows[0].digest,
            format!("sha256={}", crate::util::hash::record_digest(payload))
        );
    }

    #[test]
    fn test_rebuild_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let id = sample_id();
        let mut bytes = Vec::new();
        for _ in 0..2 {
            let mut writer = WheelWriter::create(dir.path(), &id, "py3-none-any").unwrap();
            writer.add_bytes("demo/__init__.py", b"", false).unwrap();
            writer.add_bytes("demo/core.py", b"x = 1\n", false).unwrap();
            let path = writer.finish(&id, "M\n", "W\n").unwrap();
            bytes.push(std::fs::read(&path).unwrap());
        }
        assert_eq!(bytes[0], bytes[1]);
    }

    #[cfg(unix)]
    #[test]
    fn test_executable_bit_preserved() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("tool");
        std::fs::write(&script, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let id = sample_id();
        let mut writer = WheelWriter::create(dir.path(), &id, "py3-none-any").unwrap();
        writer
            .add_file("demo_pkg-1.0.0.data/scripts/tool", &script)
            .unwrap();
        let path = writer.finish(&id, "M\n", "W\n").unwrap();

        let mut archive = zip::ZipArchive::new(std::fs::File::open(&path).unwrap()).unwrap();
        let entry = archive.by_name("demo_pkg-1.0.0.data/scripts/tool").unwrap();
        assert_eq!(entry.unix_mode().map(|m| m & 0o777), Some(0o755));
    }
}
