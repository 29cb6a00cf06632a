//! Mapping staged install-plan files onto the wheel layout.
//!
//! Each plan destination starts with an installation-path placeholder
//! (`{py_platlib}`, `{bindir}`, ...) that picks the wheel category;
//! the rest of the destination is validated and kept as the path
//! inside that category. Native-or-not is decided by the owning build
//! target's kind when there is one, and by magic-number sniffing
//! otherwise.

pub mod tags;

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use miette::Diagnostic;
use thiserror::Error;

use crate::core::plan::{ArtifactTree, DestCategory, InstallPlanEntry};
use crate::core::target::{BuildTarget, TargetKind};
use crate::meson::introspect::StagedFile;

/// A plan destination slipway cannot express in a wheel.
#[derive(Debug, Error, Diagnostic)]
#[error("cannot map install destination `{destination}` onto a wheel directory")]
#[diagnostic(
    code(slipway::mapper::unmapped_anchor),
    help(
        "only {{bindir}}, {{py_purelib}}, {{py_platlib}}, {{moduledir_shared}}, \
         {{includedir}} and {{datadir}} destinations can be packaged"
    )
)]
pub struct UnmappedAnchorError {
    pub destination: String,
}

/// A destination that would escape the wheel root when unpacked.
#[derive(Debug, Error, Diagnostic)]
#[error("install destination `{destination}` escapes the wheel root")]
#[diagnostic(
    code(slipway::mapper::unsafe_path),
    help("destinations must be relative paths without `.`, `..` or drive segments")
)]
pub struct UnsafePathError {
    pub destination: String,
}

/// Pure and platform-specific code in the same install plan.
#[derive(Debug, Error, Diagnostic)]
#[error(
    "the install plan mixes pure (`{purelib_example}`) and platform-specific \
     (`{platlib_example}`) code; a `pure: false` argument may be missing in \
     meson.build"
)]
#[diagnostic(
    code(slipway::mapper::mixed_layout),
    help("pass `pure: false` to import('python').find_installation()")
)]
pub struct MixedLayoutError {
    pub purelib_example: String,
    pub platlib_example: String,
}

/// The mapped install plan plus the facts archive naming needs.
#[derive(Debug)]
pub struct MappedArtifacts {
    pub tree: ArtifactTree,
    /// Full wheel tag, e.g. `cp312-cp312-linux_x86_64`.
    pub tag: String,
    /// Architecture independence of the whole wheel.
    pub is_pure: bool,
}

impl MappedArtifacts {
    /// Whether the archive root unpacks into purelib.
    pub fn root_is_purelib(&self) -> bool {
        !self.tree.has(DestCategory::PlatformCode)
    }
}

pub struct ArtifactMapper<'a> {
    targets: &'a [BuildTarget],
    limited_api: bool,
}

impl<'a> ArtifactMapper<'a> {
    pub fn new(targets: &'a [BuildTarget], limited_api: bool) -> Self {
        ArtifactMapper {
            targets,
            limited_api,
        }
    }

    /// Map every staged file, enforce the layout policies, and derive
    /// the wheel tag.
    pub fn map(&self, files: Vec<StagedFile>) -> Result<MappedArtifacts> {
        let mut tree = ArtifactTree::new();
        for file in files {
            let (anchor, rest) = split_destination(&file.destination);
            let Some(category) = category_for_anchor(anchor) else {
                return Err(UnmappedAnchorError {
                    destination: file.destination,
                }
                .into());
            };
            let dest = normalize_dest(rest, &file.destination)?;
            let native = match category {
                DestCategory::PlatformCode => true,
                DestCategory::Scripts => match self.target_kind_for(&file) {
                    Some(kind) if kind.is_compiled() => true,
                    Some(_) => false,
                    None => is_native_file(&file.staged)?,
                },
                _ => false,
            };
            tree.insert(InstallPlanEntry {
                source: file.staged,
                category,
                dest,
                tag: file.tag,
                subproject: file.subproject,
                group: file.group,
                native,
            })?;
        }

        if let (Some(pure), Some(plat)) = (
            tree.category(DestCategory::PureCode).next(),
            tree.category(DestCategory::PlatformCode).next(),
        ) {
            return Err(MixedLayoutError {
                purelib_example: pure.dest.clone(),
                platlib_example: plat.dest.clone(),
            }
            .into());
        }

        let is_pure = tree.is_pure();
        let tag = tags::wheel_tag(&tree, self.limited_api)?;
        Ok(MappedArtifacts { tree, tag, is_pure })
    }

    /// Kind of the build target that produced this file, if the plan
    /// entry came from the `targets` group.
    fn target_kind_for(&self, file: &StagedFile) -> Option<TargetKind> {
        if file.group != "targets" {
            return None;
        }
        let name = Path::new(&file.build_path).file_name()?;
        self.targets
            .iter()
            .find(|t| {
                t.installed
                    && t.filename
                        .iter()
                        .any(|f| Path::new(f).file_name() == Some(name))
            })
            .map(|t| t.kind)
    }
}

/// Installation-path placeholder to wheel category.
fn category_for_anchor(anchor: &str) -> Option<DestCategory> {
    match anchor {
        "{bindir}" => Some(DestCategory::Scripts),
        "{py_purelib}" => Some(DestCategory::PureCode),
        "{py_platlib}" | "{moduledir_shared}" => Some(DestCategory::PlatformCode),
        "{includedir}" => Some(DestCategory::Headers),
        "{datadir}" => Some(DestCategory::Data),
        _ => None,
    }
}

fn split_destination(destination: &str) -> (&str, &str) {
    match destination.split_once('/') {
        Some((anchor, rest)) => (anchor, rest),
        None => (destination, ""),
    }
}

/// Validate a destination path and normalize its separators.
fn normalize_dest(rest: &str, full: &str) -> Result<String, UnsafePathError> {
    let cleaned = rest.replace('\\', "/");
    if cleaned.is_empty() || cleaned.starts_with('/') {
        return Err(UnsafePathError {
            destination: full.to_string(),
        });
    }
    let mut parts = Vec::new();
    for part in cleaned.split('/') {
        match part {
            "" | "." | ".." => {
                return Err(UnsafePathError {
                    destination: full.to_string(),
                })
            }
            // `:` covers drive prefixes and NTFS streams
            _ if part.contains(':') => {
                return Err(UnsafePathError {
                    destination: full.to_string(),
                })
            }
            _ => parts.push(part),
        }
    }
    Ok(parts.join("/"))
}

/// Magic-number check for native executables and libraries (ELF,
/// Mach-O, PE).
fn is_native_file(path: &Path) -> Result<bool> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let (head, len) =
        read_head(file).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(native_magic(&head, len))
}

/// Fill the magic buffer. `read` may return fewer bytes than the file
/// holds, so keep reading until the buffer is full or the stream ends.
fn read_head(mut reader: impl Read) -> std::io::Result<([u8; 4], usize)> {
    let mut head = [0u8; 4];
    let mut filled = 0;
    while filled < head.len() {
        let n = reader.read(&mut head[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok((head, filled))
}

fn native_magic(head: &[u8; 4], len: usize) -> bool {
    if len >= 2 && &head[..2] == b"MZ" {
        return true;
    }
    if len < 4 {
        return false;
    }
    matches!(
        head,
        b"\x7fELF" | b"\xfe\xed\xfa\xce" | b"\xfe\xed\xfa\xcf" | b"\xcf\xfa\xed\xfe" | b"\xca\xfe\xba\xbe"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staged(destination: &str, path: &Path) -> StagedFile {
        StagedFile {
            staged: path.to_path_buf(),
            destination: destination.to_string(),
            tag: None,
            subproject: None,
            group: "targets".to_string(),
            build_path: path.display().to_string(),
        }
    }

    fn touch(dir: &Path, name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_anchor_mapping() {
        assert_eq!(category_for_anchor("{bindir}"), Some(DestCategory::Scripts));
        assert_eq!(
            category_for_anchor("{py_purelib}"),
            Some(DestCategory::PureCode)
        );
        assert_eq!(
            category_for_anchor("{py_platlib}"),
            Some(DestCategory::PlatformCode)
        );
        assert_eq!(
            category_for_anchor("{moduledir_shared}"),
            Some(DestCategory::PlatformCode)
        );
        assert_eq!(
            category_for_anchor("{includedir}"),
            Some(DestCategory::Headers)
        );
        assert_eq!(category_for_anchor("{datadir}"), Some(DestCategory::Data));
        assert_eq!(category_for_anchor("{libdir}"), None);
    }

    #[test]
    fn test_unmapped_anchor_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let lib = touch(dir.path(), "libdemo.a", b"!<arch>");
        let mapper = ArtifactMapper::new(&[], false);
        let err = mapper
            .map(vec![staged("{libdir}/libdemo.a", &lib)])
            .unwrap_err();
        assert!(err.to_string().contains("{libdir}/libdemo.a"));
    }

    #[test]
    fn test_unsafe_destinations_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = touch(dir.path(), "x", b"data");
        let mapper = ArtifactMapper::new(&[], false);

        for dest in [
            "{datadir}/../escape",
            "{datadir}//double",
            "{datadir}/./dot",
            "{datadir}",
            "{datadir}/C:/windows",
        ] {
            let err = mapper.map(vec![staged(dest, &file)]).unwrap_err();
            assert!(
                err.to_string().contains("escapes the wheel root")
                    || err.to_string().contains("cannot map"),
                "expected rejection for {dest}"
            );
        }
    }

    #[test]
    fn test_mixed_layout_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let pure = touch(dir.path(), "util.py", b"x = 1\n");
        let ext = touch(dir.path(), "demo.so", b"\x7fELFdata");
        let mapper = ArtifactMapper::new(&[], false);
        let err = mapper
            .map(vec![
                staged("{py_purelib}/demo/util.py", &pure),
                staged("{py_platlib}/demo/demo.so", &ext),
            ])
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("mixes pure"));
        assert!(text.contains("pure: false"));
    }

    #[test]
    fn test_pure_tree_maps_and_tags() {
        let dir = tempfile::tempdir().unwrap();
        let init = touch(dir.path(), "__init__.py", b"");
        let mapper = ArtifactMapper::new(&[], false);
        let mut file = staged("{py_purelib}/demo/__init__.py", &init);
        file.group = "python".to_string();
        let artifacts = mapper.map(vec![file]).unwrap();
        assert!(artifacts.is_pure);
        assert!(artifacts.root_is_purelib());
        assert_eq!(artifacts.tag, "py3-none-any");
    }

    #[test]
    fn test_script_native_by_target_kind() {
        use crate::core::target::TargetKind;

        let dir = tempfile::tempdir().unwrap();
        // plain text content: only the target kind can mark it native
        let exe = touch(dir.path(), "demo-cli", b"#!placeholder");
        let targets = vec![BuildTarget {
            name: "demo-cli".to_string(),
            id: "demo-cli@exe".to_string(),
            kind: TargetKind::Executable,
            installed: true,
            filename: vec![exe.display().to_string()],
            subproject: None,
        }];
        let mapper = ArtifactMapper::new(&targets, false);
        let artifacts = mapper.map(vec![staged("{bindir}/demo-cli", &exe)]).unwrap();
        assert!(!artifacts.is_pure);
        let entry = artifacts
            .tree
            .category(DestCategory::Scripts)
            .next()
            .unwrap();
        assert!(entry.native);
    }

    #[test]
    fn test_script_native_by_magic() {
        let dir = tempfile::tempdir().unwrap();
        let elf = touch(dir.path(), "tool", b"\x7fELF\x02\x01\x01");
        let script = touch(dir.path(), "helper", b"#!/bin/sh\n");
        let mapper = ArtifactMapper::new(&[], false);
        let mut a = staged("{bindir}/tool", &elf);
        a.group = "custom".to_string();
        let mut b = staged("{bindir}/helper", &script);
        b.group = "custom".to_string();
        let artifacts = mapper.map(vec![a, b]).unwrap();
        let natives: Vec<bool> = artifacts
            .tree
            .category(DestCategory::Scripts)
            .map(|e| e.native)
            .collect();
        // sorted by dest: helper, tool
        assert_eq!(natives, vec![false, true]);
    }

    #[test]
    fn test_is_native_file_magics() {
        let dir = tempfile::tempdir().unwrap();
        for (name, contents, expect) in [
            ("elf", b"\x7fELF\x02".as_slice(), true),
            ("macho", b"\xcf\xfa\xed\xfe\x07".as_slice(), true),
            ("pe", b"MZ\x90\x00".as_slice(), true),
            ("script", b"#!/bin/sh".as_slice(), false),
            ("tiny", b"a".as_slice(), false),
        ] {
            let path = touch(dir.path(), name, contents);
            assert_eq!(is_native_file(&path).unwrap(), expect, "{name}");
        }
    }

    /// Yields one byte per `read` call, like a pipe under load.
    struct OneByteReads<'a>(&'a [u8]);

    impl Read for OneByteReads<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match (self.0.split_first(), buf.first_mut()) {
                (Some((byte, rest)), Some(slot)) => {
                    *slot = *byte;
                    self.0 = rest;
                    Ok(1)
                }
                _ => Ok(0),
            }
        }
    }

    #[test]
    fn test_read_head_fills_across_short_reads() {
        let (head, len) = read_head(OneByteReads(b"\x7fELF\x02\x01")).unwrap();
        assert_eq!(len, 4);
        assert!(native_magic(&head, len));

        let (head, len) = read_head(OneByteReads(b"MZ")).unwrap();
        assert_eq!(len, 2);
        assert!(native_magic(&head, len));

        let (head, len) = read_head(OneByteReads(b"#!x")).unwrap();
        assert_eq!(len, 3);
        assert!(!native_magic(&head, len));
    }
}
