//! Turning command line arguments into the list of files to upload.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use walkdir::WalkDir;

/// Expands `args` into absolute file paths, in argument order.
///
/// Directories are walked only with `recursive`; anything else that is not a
/// regular file is an error.
pub fn collect(args: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for arg in args {
        let meta = std::fs::metadata(arg)
            .with_context(|| format!("cannot upload {}", arg.display()))?;
        if meta.is_dir() {
            if !recursive {
                bail!("{} is a directory; use --recursive", arg.display());
            }
            walk(arg, &mut files)?;
        } else if meta.is_file() {
            files.push(absolute(arg)?);
        } else {
            bail!("{} is not a regular file", arg.display());
        }
    }
    Ok(files)
}

fn walk(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", dir.display()))?;
        if entry.file_type().is_file() {
            files.push(absolute(entry.path())?);
        }
    }
    Ok(())
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("invalid path {}", path.display()))
}
