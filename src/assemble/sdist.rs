//! Source archive (`.tar.gz`) writing.
//!
//! Every selected file lands under a single `{name}-{version}/` top
//! directory with normalized tar headers: uid and gid zero, mode 0644
//! or 0755, and the shared archive timestamp. `PKG-INFO` is written
//! first, then the files in sorted order, so rebuilds are
//! byte-identical. The gzip stream carries no timestamp.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Builder, Header};

use crate::assemble::sources::SourceSelector;
use crate::assemble::wheel::archive_epoch;
use crate::core::metadata::{render_core_metadata, ProjectId};
use crate::core::pyproject::ProjectTable;
use crate::util::fs::forward_slashes;

/// Assemble a source archive in `out_dir`.
pub fn write_sdist(
    out_dir: &Path,
    id: &ProjectId,
    project: &ProjectTable,
    source_dir: &Path,
    selector: &SourceSelector,
) -> Result<PathBuf> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    let final_path = out_dir.join(id.sdist_filename());
    let stem = id.sdist_stem();
    let epoch = archive_epoch().max(0) as u64;

    let files = selector.select(source_dir)?;
    let metadata = render_core_metadata(project, id, source_dir)?;

    let tmp = tempfile::Builder::new()
        .prefix(".slipway-")
        .suffix(".tar.gz")
        .tempfile_in(out_dir)
        .with_context(|| format!("failed to create temporary file in {}", out_dir.display()))?;

    let encoder = GzEncoder::new(tmp, Compression::default());
    let mut builder = Builder::new(encoder);

    append_entry(
        &mut builder,
        &format!("{}/PKG-INFO", stem),
        metadata.as_bytes(),
        0o644,
        epoch,
    )?;

    for rel in &files {
        let path = source_dir.join(rel);
        let data =
            std::fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
        let mode = file_mode(&path);
        let name = format!("{}/{}", stem, forward_slashes(rel));
        append_entry(&mut builder, &name, &data, mode, epoch)?;
    }

    let encoder = builder
        .into_inner()
        .context("failed to finish the tar stream")?;
    let tmp = encoder
        .finish()
        .context("failed to finish the gzip stream")?;
    tmp.persist(&final_path)
        .map_err(|e| e.error)
        .with_context(|| format!("failed to persist {}", final_path.display()))?;

    tracing::debug!("wrote {}", final_path.display());
    Ok(final_path)
}

fn append_entry<W: std::io::Write>(
    builder: &mut Builder<W>,
    name: &str,
    data: &[u8],
    mode: u32,
    epoch: u64,
) -> Result<()> {
    let mut header = Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(mode);
    header.set_mtime(epoch);
    header.set_uid(0);
    header.set_gid(0);
    builder
        .append_data(&mut header, name, data)
        .with_context(|| format!("failed to archive {}", name))?;
    Ok(())
}

#[cfg(unix)]
fn file_mode(path: &Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    match path.metadata() {
        Ok(meta) if meta.permissions().mode() & 0o111 != 0 => 0o755,
        _ => 0o644,
    }
}

#[cfg(not(unix))]
fn file_mode(_path: &Path) -> u32 {
    0o644
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use tar::Archive;

    fn fixture() -> (tempfile::TempDir, ProjectTable, ProjectId) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::write(
            root.join("pyproject.toml"),
            "[project]\nname = \"demo\"\nversion = \"1.0.0\"\n",
        )
        .unwrap();
        std::fs::write(root.join("meson.build"), "project('demo')\n").unwrap();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::write(root.join("src/demo.c"), "int x;\n").unwrap();

        let project: ProjectTable = toml::from_str(
            r#"
            name = "demo"
            version = "1.0.0"
            "#,
        )
        .unwrap();
        let id = ProjectId::new("demo", "1.0.0");
        (dir, project, id)
    }

    fn entry_names(path: &Path) -> Vec<String> {
        let file = std::fs::File::open(path).unwrap();
        let mut archive = Archive::new(GzDecoder::new(file));
        archive
            .entries()
            .unwrap()
            .map(|e| {
                e.unwrap()
                    .path()
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }

    #[test]
    fn test_sdist_layout() {
        let (dir, project, id) = fixture();
        let out = dir.path().join("dist");
        let selector = SourceSelector::new(&[], &[]).unwrap();
        let path = write_sdist(&out, &id, &project, dir.path(), &selector).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "demo-1.0.0.tar.gz"
        );
        assert_eq!(
            entry_names(&path),
            vec![
                "demo-1.0.0/PKG-INFO",
                "demo-1.0.0/meson.build",
                "demo-1.0.0/pyproject.toml",
                "demo-1.0.0/src/demo.c",
            ]
        );
    }

    #[test]
    fn test_pkg_info_body() {
        let (dir, project, id) = fixture();
        let out = dir.path().join("dist");
        let selector = SourceSelector::new(&[], &[]).unwrap();
        let path = write_sdist(&out, &id, &project, dir.path(), &selector).unwrap();

        let file = std::fs::File::open(&path).unwrap();
        let mut archive = Archive::new(GzDecoder::new(file));
        let mut body = String::new();
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            if entry.path().unwrap().ends_with("PKG-INFO") {
                entry.read_to_string(&mut body).unwrap();
            }
        }
        assert!(body.contains("Metadata-Version: 2.1"));
        assert!(body.contains("Name: demo"));
        assert!(body.contains("Version: 1.0.0"));
    }

    #[test]
    fn test_normalized_headers() {
        let (dir, project, id) = fixture();
        let out = dir.path().join("dist");
        let selector = SourceSelector::new(&[], &[]).unwrap();
        let path = write_sdist(&out, &id, &project, dir.path(), &selector).unwrap();

        let file = std::fs::File::open(&path).unwrap();
        let mut archive = Archive::new(GzDecoder::new(file));
        for entry in archive.entries().unwrap() {
            let entry = entry.unwrap();
            let header = entry.header();
            assert_eq!(header.uid().unwrap(), 0);
            assert_eq!(header.gid().unwrap(), 0);
            let mode = header.mode().unwrap();
            assert!(mode == 0o644 || mode == 0o755, "mode {:o}", mode);
        }
    }

    #[test]
    fn test_rebuild_is_byte_identical() {
        let (dir, project, id) = fixture();
        let out = dir.path().join("dist");
        let selector = SourceSelector::new(&[], &[]).unwrap();
        let first = write_sdist(&out, &id, &project, dir.path(), &selector).unwrap();
        let first_bytes = std::fs::read(&first).unwrap();
        let second = write_sdist(&out, &id, &project, dir.path(), &selector).unwrap();
        let second_bytes = std::fs::read(&second).unwrap();
        assert_eq!(first_bytes, second_bytes);
    }
}
