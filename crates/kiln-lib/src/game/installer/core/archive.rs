//! Zip and tar.gz extraction with entry path sanitisation.

use crate::error::{IoResultExt, LauncherError, Result};
use crate::utils::fs::{is_present, part_path, promote_part};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};

const META_INF: &str = "META-INF/";

/// Result of a full extraction.
#[derive(Debug, Default)]
pub struct FullExtraction {
    /// First top-level directory seen, relative to the base directory
    pub top_level: Option<PathBuf>,
    pub files: Vec<PathBuf>,
}

/// Turn an entry name into a relative path that stays below the destination.
///
/// Absolute names, drive prefixes and any `..` segment are rejected; `.`
/// segments are dropped. Returns `None` for rejected or empty names.
pub fn sanitize_entry_path(name: &str) -> Option<PathBuf> {
    let normalized = name.replace('\\', "/");
    let mut out = PathBuf::new();
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}

enum ArchiveFormat {
    Zip,
    TarGz,
}

fn detect_format(archive: &Path) -> Result<ArchiveFormat> {
    let mut magic = [0u8; 4];
    let mut file = File::open(archive).fs_context(archive)?;
    let n = file.read(&mut magic).fs_context(archive)?;
    match &magic[..n] {
        [b'P', b'K', 0x03, 0x04] => Ok(ArchiveFormat::Zip),
        [0x1f, 0x8b, ..] => Ok(ArchiveFormat::TarGz),
        _ => Err(LauncherError::archive(archive, "unrecognised archive format")),
    }
}

/// Copy `reader` into `dest` through a `.part` file so an interrupted entry
/// never lands at the final path.
fn write_entry(reader: &mut dyn Read, dest: &Path, archive: &Path) -> Result<()> {
    let tmp_path = part_path(dest);
    let copied = File::create(&tmp_path)
        .fs_context(&tmp_path)
        .and_then(|mut out| {
            std::io::copy(reader, &mut out).map_err(|e| LauncherError::archive(archive, e))?;
            out.flush().fs_context(&tmp_path)
        });
    if let Err(e) = copied {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e);
    }
    promote_part(&tmp_path, dest)
}

#[cfg(unix)]
fn apply_unix_mode(path: &Path, mode: Option<u32>) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    if let Some(mode) = mode {
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).fs_context(path)?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn apply_unix_mode(_path: &Path, _mode: Option<u32>) -> Result<()> {
    Ok(())
}

/// Pull every entry ending in `extension` out of `archives` into the flat
/// directory `dest`.
///
/// Directory entries and `META-INF/` are skipped, names are flattened to
/// their file name, and a destination that is already present is left alone.
/// Returns the files written by this call.
pub fn extract_selective(
    archives: &[PathBuf],
    extension: &str,
    dest: &Path,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dest).fs_context(dest)?;
    let mut extracted = Vec::new();

    for archive_path in archives {
        log::debug!("Extracting *{} from {:?}", extension, archive_path);
        let file = File::open(archive_path).fs_context(archive_path)?;
        let mut archive =
            zip::ZipArchive::new(file).map_err(|e| LauncherError::archive(archive_path, e))?;

        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| LauncherError::archive(archive_path, e))?;
            let name = entry.name().to_string();

            if entry.is_dir() || name.starts_with(META_INF) || !name.ends_with(extension) {
                continue;
            }

            let Some(relative) = sanitize_entry_path(&name) else {
                log::warn!("Skipping unsafe entry {:?} in {:?}", name, archive_path);
                continue;
            };
            let Some(file_name) = relative.file_name() else {
                continue;
            };

            let outpath = dest.join(file_name);
            if is_present(&outpath) {
                log::trace!("Native already extracted: {:?}", outpath);
                continue;
            }

            write_entry(&mut entry, &outpath, archive_path)?;
            log::debug!("Extracted {} -> {:?}", name, outpath);
            extracted.push(outpath);
        }
    }

    Ok(extracted)
}

/// Unpack a whole zip or tar.gz archive below `base`, keeping its layout.
pub fn extract_full(archive_path: &Path, base: &Path) -> Result<FullExtraction> {
    std::fs::create_dir_all(base).fs_context(base)?;
    let result = match detect_format(archive_path)? {
        ArchiveFormat::Zip => extract_full_zip(archive_path, base)?,
        ArchiveFormat::TarGz => extract_full_tar_gz(archive_path, base)?,
    };
    log::debug!(
        "Extracted {} files from {:?} (top level: {:?})",
        result.files.len(),
        archive_path,
        result.top_level
    );
    Ok(result)
}

fn note_top_level(result: &mut FullExtraction, relative: &Path, is_dir: bool) {
    if result.top_level.is_some() {
        return;
    }
    let mut components = relative.components();
    if let Some(Component::Normal(first)) = components.next() {
        if is_dir || components.next().is_some() {
            result.top_level = Some(PathBuf::from(first));
        }
    }
}

fn extract_full_zip(archive_path: &Path, base: &Path) -> Result<FullExtraction> {
    let file = File::open(archive_path).fs_context(archive_path)?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| LauncherError::archive(archive_path, e))?;
    let mut result = FullExtraction::default();

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| LauncherError::archive(archive_path, e))?;
        let name = entry.name().to_string();
        let Some(relative) = sanitize_entry_path(&name) else {
            log::warn!("Skipping unsafe entry {:?} in {:?}", name, archive_path);
            continue;
        };
        note_top_level(&mut result, &relative, entry.is_dir());

        let outpath = base.join(&relative);
        if entry.is_dir() {
            std::fs::create_dir_all(&outpath).fs_context(&outpath)?;
            continue;
        }
        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent).fs_context(parent)?;
        }
        let mode = entry.unix_mode();
        write_entry(&mut entry, &outpath, archive_path)?;
        apply_unix_mode(&outpath, mode)?;
        result.files.push(outpath);
    }

    Ok(result)
}

/// True when some directory between `base` and `base/relative` is a symlink.
/// Entries are never written through links planted by earlier entries.
fn has_symlink_ancestor(base: &Path, relative: &Path) -> bool {
    let mut current = base.to_path_buf();
    let mut components = relative.components().peekable();
    while let Some(component) = components.next() {
        if components.peek().is_none() {
            break;
        }
        current.push(component);
        if std::fs::symlink_metadata(&current)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false)
        {
            return true;
        }
    }
    false
}

/// Resolve a symlink target against the directory holding the link and
/// check that it stays below the extraction root.
fn symlink_target_is_contained(relative: &Path, target: &Path) -> bool {
    let mut depth = relative.parent().map_or(0, |p| p.components().count());
    for component in target.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return false;
                }
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    true
}

fn extract_full_tar_gz(archive_path: &Path, base: &Path) -> Result<FullExtraction> {
    use flate2::read::GzDecoder;
    use tar::{Archive, EntryType};

    let file = File::open(archive_path).fs_context(archive_path)?;
    let mut archive = Archive::new(GzDecoder::new(file));
    let mut result = FullExtraction::default();

    let entries = archive
        .entries()
        .map_err(|e| LauncherError::archive(archive_path, e))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| LauncherError::archive(archive_path, e))?;
        let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        let Some(relative) = sanitize_entry_path(&name) else {
            log::warn!("Skipping unsafe entry {:?} in {:?}", name, archive_path);
            continue;
        };
        if has_symlink_ancestor(base, &relative) {
            log::warn!("Skipping entry {:?} below a symlink in {:?}", name, archive_path);
            continue;
        }
        let entry_type = entry.header().entry_type();
        note_top_level(&mut result, &relative, entry_type == EntryType::Directory);

        let outpath = base.join(&relative);
        match entry_type {
            EntryType::Directory => {
                std::fs::create_dir_all(&outpath).fs_context(&outpath)?;
            }
            EntryType::Regular | EntryType::Continuous | EntryType::GNUSparse => {
                if let Some(parent) = outpath.parent() {
                    std::fs::create_dir_all(parent).fs_context(parent)?;
                }
                let mode = entry.header().mode().ok();
                write_entry(&mut entry, &outpath, archive_path)?;
                apply_unix_mode(&outpath, mode)?;
                result.files.push(outpath);
            }
            EntryType::Symlink | EntryType::Link => {
                let target = entry
                    .link_name()
                    .map_err(|e| LauncherError::archive(archive_path, e))?
                    .map(|t| t.into_owned());
                // Symlink targets are relative to the link, hard link targets
                // to the archive root.
                let contained = match &target {
                    Some(t) if entry_type == EntryType::Symlink => {
                        symlink_target_is_contained(&relative, t)
                    }
                    Some(t) => sanitize_entry_path(&t.to_string_lossy()).is_some(),
                    None => false,
                };
                if !contained {
                    log::warn!(
                        "Skipping link {:?} -> {:?} escaping {:?}",
                        name,
                        target,
                        base
                    );
                    continue;
                }
                if let Some(parent) = outpath.parent() {
                    std::fs::create_dir_all(parent).fs_context(parent)?;
                }
                entry
                    .unpack_in(base)
                    .map_err(|e| LauncherError::archive(archive_path, e))?;
            }
            _ => log::trace!("Skipping tar entry {:?} of type {:?}", name, entry_type),
        }
    }

    Ok(result)
}
