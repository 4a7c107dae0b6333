//! Collision-free output paths.
//!
//! The base name comes from [`derive_base_name`]; when the path is taken,
//! `_1`, `_2`, … is inserted before the extension until a free name is found.
//! Resolution happens when a transfer starts writing, so files created by
//! earlier jobs of the same run (in any completion order) are seen.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use crate::url_model::derive_base_name;

/// Absolute form of `dir` (relative paths are joined onto the current directory).
pub fn absolute_dir(dir: &Path) -> io::Result<PathBuf> {
    if dir.is_absolute() {
        Ok(dir.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(dir))
    }
}

/// Splits `name` into stem and extension (with its dot) as used for suffixing.
/// `archive.tar.gz` → (`archive.tar`, `.gz`); `.bashrc` → (`.bashrc`, ``).
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) if pos > 0 => name.split_at(pos),
        _ => (name, ""),
    }
}

/// Candidate paths for `base` in `dir`: `base`, then `stem_1.ext`, `stem_2.ext`, ...
fn candidates<'a>(dir: &'a Path, base: &'a str) -> impl Iterator<Item = PathBuf> + 'a {
    let (stem, ext) = split_extension(base);
    std::iter::once(dir.join(base))
        .chain((1u64..).map(move |i| dir.join(format!("{}_{}{}", stem, i, ext))))
}

/// Returns the first candidate path that does not exist yet. Only probes; creates nothing.
pub fn resolve(requested_name: Option<&str>, url: &str, output_dir: &Path) -> io::Result<PathBuf> {
    let dir = absolute_dir(output_dir)?;
    let base = derive_base_name(requested_name, url);
    for path in candidates(&dir, &base) {
        match path.try_exists() {
            Ok(false) => return Ok(path),
            Ok(true) => continue,
            Err(e) => return Err(e),
        }
    }
    unreachable!("candidate sequence is unbounded")
}

/// Claims the first free candidate by creating it with `create_new`, so the
/// existence check and creation cannot interleave with another job.
pub fn create_unique(
    requested_name: Option<&str>,
    url: &str,
    output_dir: &Path,
) -> io::Result<(PathBuf, File)> {
    let dir = absolute_dir(output_dir)?;
    let base = derive_base_name(requested_name, url);
    for path in candidates(&dir, &base) {
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
    unreachable!("candidate sequence is unbounded")
}
