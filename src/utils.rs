use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
};

const FILE_PREFIX: &str = "mrtmp.";

/// Name of the intermediate file written by map task `map_task` for reduce
/// task `reduce_task`. Shared with the map-side writer.
pub fn reduce_name(job_name: &str, map_task: u32, reduce_task: u32) -> PathBuf {
    PathBuf::from(format!("{FILE_PREFIX}{job_name}-{map_task}-{reduce_task}"))
}

/// Conventional name of the output file of reduce task `reduce_task`.
pub fn merge_name(job_name: &str, reduce_task: u32) -> PathBuf {
    PathBuf::from(format!("{FILE_PREFIX}{job_name}-res-{reduce_task}"))
}

/// Creates (or truncates) `path`, creating missing parent directories first.
pub fn create_file_ensured(path: impl AsRef<Path>) -> io::Result<File> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new()
        .write(true)
        .truncate(true)
        .create(true)
        .open(path)
}

/// Directory an output file lives in. A bare file name resolves to `.`.
pub(crate) fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
