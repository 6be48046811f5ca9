//! Filesystem helpers for build directories

use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

pub fn directory_exists(path: &Path) -> bool {
    path.is_dir()
}

/// True when the directory is missing or holds no file besides the top-level
/// names in `ignore`. Empty subdirectories do not count.
pub fn directory_empty_except(path: &Path, ignore: &[&str]) -> io::Result<bool> {
    if !directory_exists(path) {
        return Ok(true);
    }
    for entry in WalkDir::new(path).min_depth(1) {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_dir() {
            continue;
        }
        let ignored = entry.depth() == 1 && ignore.iter().any(|name| entry.file_name() == *name);
        if !ignored {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Copies `src` to `dst`, creating parent directories. Returns bytes copied.
pub fn copy_file(src: &Path, dst: &Path) -> io::Result<u64> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(src, dst)
}

pub fn write_file_with_content(dir: &Path, name: &str, content: &[u8]) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    fs::write(dir.join(name), content)
}

/// `sha256:<hex>` of the file content
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("sha256:{}", hex::encode(hasher.finalize())))
}

/// Packs the directory content as a gzip-compressed tarball rooted at `.`
pub fn tar_gz_dir(dir: &Path) -> io::Result<Vec<u8>> {
    let mut archive = Vec::new();
    {
        let encoder = GzEncoder::new(&mut archive, Compression::default());
        let mut tar = tar::Builder::new(encoder);
        tar.append_dir_all(".", dir)?;
        tar.into_inner()?.finish()?;
    }
    debug!(dir = %dir.display(), bytes = archive.len(), "Packed directory");
    Ok(archive)
}

/// Removes every entry of a directory but keeps the directory itself
pub fn clean_dir(dir: &Path) -> io::Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_directory_empty_except() {
        let temp = TempDir::new().unwrap();
        assert!(directory_empty_except(temp.path(), &[]).unwrap());
        assert!(directory_empty_except(&temp.path().join("missing"), &["Dockerfile"]).unwrap());

        fs::create_dir_all(temp.path().join("dependencies")).unwrap();
        fs::write(temp.path().join("Dockerfile"), b"FROM base").unwrap();
        assert!(directory_empty_except(temp.path(), &["Dockerfile"]).unwrap());
        assert!(!directory_empty_except(temp.path(), &[]).unwrap());

        // only top-level names are ignored
        fs::write(temp.path().join("dependencies/Dockerfile"), b"x").unwrap();
        assert!(!directory_empty_except(temp.path(), &["Dockerfile"]).unwrap());
    }

    #[test]
    fn test_copy_and_checksum() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("lib.jar");
        fs::write(&src, b"hello").unwrap();

        let dst = temp.path().join("context/dependencies/lib.jar");
        assert_eq!(copy_file(&src, &dst).unwrap(), 5);
        assert_eq!(
            sha256_file(&dst).unwrap(),
            "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_tar_gz_dir_roundtrip() {
        let temp = TempDir::new().unwrap();
        write_file_with_content(&temp.path().join("dependencies"), "a.jar", b"jar").unwrap();

        let archive = tar_gz_dir(temp.path()).unwrap();
        let out = TempDir::new().unwrap();
        let decoder = flate2::read::GzDecoder::new(std::io::Cursor::new(archive));
        tar::Archive::new(decoder).unpack(out.path()).unwrap();

        assert_eq!(fs::read(out.path().join("dependencies/a.jar")).unwrap(), b"jar");
    }

    #[test]
    fn test_clean_dir_keeps_root() {
        let temp = TempDir::new().unwrap();
        write_file_with_content(&temp.path().join("sub"), "f", b"1").unwrap();
        fs::write(temp.path().join("g"), b"2").unwrap();

        clean_dir(temp.path()).unwrap();
        assert!(temp.path().exists());
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    }
}
