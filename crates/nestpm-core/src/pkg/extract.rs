//! Archive extraction.
//!
//! Accepts gzip-compressed tar (including concatenated gzip members) or a
//! plain tar stream. The first path component of every entry is stripped,
//! so `package/lib/index.js` lands at `<dest>/lib/index.js`.

use super::error::PkgError;
use flate2::read::{GzDecoder, MultiGzDecoder};
use std::fs::{self, File};
use std::io::{self, Cursor, Read};
use std::path::{Component, Path, PathBuf};
use tar::Archive;
use tracing::trace;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const USTAR_OFFSET: usize = 257;
const USTAR_MAGIC: &[u8] = b"ustar";
const SNIFF_LEN: u64 = 512;

/// Extract an archive stream into `dest`, creating it if needed.
///
/// Returns the number of entries written.
///
/// # Errors
/// Returns `PKG_EXTRACT_FAILED` for a corrupt or empty stream, an entry
/// with an absolute or `..` path, or a filesystem failure while writing.
pub fn extract_archive<R: Read>(mut reader: R, dest: &Path) -> Result<usize, PkgError> {
    let mut head = Vec::new();
    reader
        .by_ref()
        .take(SNIFF_LEN)
        .read_to_end(&mut head)
        .map_err(|e| PkgError::extract_failed(format!("Failed to read archive: {e}")))?;

    if head.is_empty() {
        return Err(PkgError::extract_failed("Archive is empty"));
    }

    let is_plain_tar = head.len() >= USTAR_OFFSET + USTAR_MAGIC.len()
        && &head[USTAR_OFFSET..USTAR_OFFSET + USTAR_MAGIC.len()] == USTAR_MAGIC;
    let is_gzip = head.starts_with(&GZIP_MAGIC);
    let stream = Cursor::new(head).chain(reader);

    fs::create_dir_all(dest).map_err(|e| {
        PkgError::extract_failed(format!("Failed to create {}: {e}", dest.display()))
    })?;

    let count = if is_gzip {
        unpack(MultiGzDecoder::new(stream), dest)?
    } else if is_plain_tar {
        unpack(stream, dest)?
    } else {
        // Unknown magic: let the gzip decoder report the corruption.
        unpack(GzDecoder::new(stream), dest)?
    };

    if count == 0 {
        return Err(PkgError::extract_failed("Archive contains no entries"));
    }
    Ok(count)
}

fn unpack<R: Read>(stream: R, dest: &Path) -> Result<usize, PkgError> {
    let mut archive = Archive::new(stream);
    let mut count = 0;

    for entry in archive
        .entries()
        .map_err(|e| PkgError::extract_failed(format!("Failed to read archive entries: {e}")))?
    {
        let mut entry = entry
            .map_err(|e| PkgError::extract_failed(format!("Failed to read archive entry: {e}")))?;

        let path = entry
            .path()
            .map_err(|e| PkgError::extract_failed(format!("Failed to read entry path: {e}")))?
            .into_owned();

        let Some(relative) = strip_first_component(&path)? else {
            continue;
        };
        let dest_path = dest.join(&relative);

        let entry_type = entry.header().entry_type();
        if entry_type.is_dir() {
            fs::create_dir_all(&dest_path).map_err(|e| write_error(&dest_path, &e))?;
        } else if entry_type.is_file() {
            if let Some(parent) = dest_path.parent() {
                fs::create_dir_all(parent).map_err(|e| write_error(parent, &e))?;
            }
            let mut file = File::create(&dest_path).map_err(|e| write_error(&dest_path, &e))?;
            io::copy(&mut entry, &mut file).map_err(|e| {
                PkgError::extract_failed(format!(
                    "Failed to extract {}: {e}",
                    relative.display()
                ))
            })?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Ok(mode) = entry.header().mode() {
                    let perms = fs::Permissions::from_mode(mode & 0o7777);
                    let _ = fs::set_permissions(&dest_path, perms);
                }
            }
        } else {
            trace!(path = %path.display(), "Skipping non-file entry");
            continue;
        }

        trace!(path = %relative.display(), "Extracted");
        count += 1;
    }

    Ok(count)
}

/// Drop the first normal component of an entry path.
///
/// Returns `None` when nothing remains (the top-level directory itself).
fn strip_first_component(path: &Path) -> Result<Option<PathBuf>, PkgError> {
    let mut normals = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => normals.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(PkgError::extract_failed(format!(
                    "Archive contains path traversal: {}",
                    path.display()
                )))
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(PkgError::extract_failed(format!(
                    "Archive contains absolute path: {}",
                    path.display()
                )))
            }
        }
    }

    if normals.len() < 2 {
        return Ok(None);
    }
    Ok(Some(normals[1..].iter().collect()))
}

fn write_error(path: &Path, e: &io::Error) -> PkgError {
    PkgError::extract_failed(format!("Failed to write {}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkg::error::codes;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tar::{Builder, EntryType, Header};
    use tempfile::tempdir;

    fn tar_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = Builder::new(Vec::new());
        for (path, data) in entries {
            let mut header = Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    /// Raw ustar header with an arbitrary path, bypassing Builder's checks.
    fn raw_entry(path: &str, data: &[u8]) -> Vec<u8> {
        let mut header = Header::new_ustar();
        header.as_old_mut().name[..path.len()].copy_from_slice(path.as_bytes());
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(EntryType::Regular);
        header.set_cksum();

        let mut out = header.as_bytes().to_vec();
        out.extend_from_slice(data);
        out.resize(out.len().div_ceil(512) * 512, 0);
        out.extend_from_slice(&[0; 1024]);
        out
    }

    #[test]
    fn test_extract_gzip_strips_first_component() {
        let dir = tempdir().unwrap();
        let archive = gzip(&tar_bytes(&[
            ("package/package.json", br#"{"name":"file"}"#),
            ("package/lib/index.js", b"module.exports = 1;"),
        ]));

        let count = extract_archive(archive.as_slice(), dir.path()).unwrap();
        assert_eq!(count, 2);
        assert!(dir.path().join("package.json").is_file());
        assert_eq!(
            fs::read_to_string(dir.path().join("lib/index.js")).unwrap(),
            "module.exports = 1;"
        );
        assert!(!dir.path().join("package").exists());
    }

    #[test]
    fn test_extract_plain_tar() {
        let dir = tempdir().unwrap();
        let archive = tar_bytes(&[("node/index.d.ts", b"export {};")]);
        extract_archive(archive.as_slice(), dir.path()).unwrap();
        assert!(dir.path().join("index.d.ts").is_file());
    }

    #[test]
    fn test_extract_concatenated_gzip_members() {
        let dir = tempdir().unwrap();
        let tar = tar_bytes(&[("package/a.txt", b"aaaa"), ("package/b.txt", b"bbbb")]);
        let (first, second) = tar.split_at(1024);
        let mut archive = gzip(first);
        archive.extend(gzip(second));

        extract_archive(archive.as_slice(), dir.path()).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("b.txt")).unwrap(), "bbbb");
    }

    #[test]
    fn test_skips_bare_top_level_entry() {
        let dir = tempdir().unwrap();
        let archive = gzip(&tar_bytes(&[("README", b"top"), ("pkg/README", b"inner")]));
        let count = extract_archive(archive.as_slice(), dir.path()).unwrap();
        assert_eq!(count, 1);
        assert_eq!(fs::read_to_string(dir.path().join("README")).unwrap(), "inner");
    }

    #[test]
    fn test_reject_corrupt_stream() {
        let dir = tempdir().unwrap();
        let err = extract_archive(&b"this is not an archive at all"[..], dir.path()).unwrap_err();
        assert_eq!(err.code(), codes::PKG_EXTRACT_FAILED);
    }

    #[test]
    fn test_reject_empty() {
        let dir = tempdir().unwrap();
        let err = extract_archive(&b""[..], dir.path()).unwrap_err();
        assert_eq!(err.code(), codes::PKG_EXTRACT_FAILED);

        let empty_tar = gzip(&Builder::new(Vec::new()).into_inner().unwrap());
        let err = extract_archive(empty_tar.as_slice(), dir.path()).unwrap_err();
        assert_eq!(err.code(), codes::PKG_EXTRACT_FAILED);
    }

    #[test]
    fn test_reject_path_traversal() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("out");
        let archive = gzip(&raw_entry("package/../../evil.txt", b"x"));

        let err = extract_archive(archive.as_slice(), &dest).unwrap_err();
        assert_eq!(err.code(), codes::PKG_EXTRACT_FAILED);
        assert!(!dir.path().join("evil.txt").exists());
    }

    #[test]
    fn test_reject_absolute_path() {
        let dir = tempdir().unwrap();
        let archive = gzip(&raw_entry("/package/evil.txt", b"x"));
        let err = extract_archive(archive.as_slice(), dir.path()).unwrap_err();
        assert_eq!(err.code(), codes::PKG_EXTRACT_FAILED);
    }

    #[cfg(unix)]
    #[test]
    fn test_preserves_executable_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let mut builder = Builder::new(Vec::new());
        let mut header = Header::new_gnu();
        header.set_size(2);
        header.set_mode(0o755);
        header.set_cksum();
        builder.append_data(&mut header, "package/bin/cli", &b"#!"[..]).unwrap();
        let archive = gzip(&builder.into_inner().unwrap());

        extract_archive(archive.as_slice(), dir.path()).unwrap();
        let mode = fs::metadata(dir.path().join("bin/cli")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_strip_first_component() {
        assert_eq!(
            strip_first_component(Path::new("./package/a/b")).unwrap(),
            Some(PathBuf::from("a/b"))
        );
        assert_eq!(strip_first_component(Path::new("package/")).unwrap(), None);
    }
}
