use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use log::{debug, info};
use tempfile::NamedTempFile;
use tokio::task::JoinHandle;

use crate::{
    codec::{RecordReader, RecordWriter},
    error::{ReduceError, Result},
    kv::KeyValue,
    utils,
};

/// Application reduce function: called once per distinct key with every
/// value observed for it, returns the aggregated value.
pub trait ReduceFn: Fn(&str, &[&str]) -> String {}

impl<T> ReduceFn for T where T: Fn(&str, &[&str]) -> String + ?Sized {}

/// One reduce task: consumes the partition addressed to `reduce_task` from
/// each of the `n_map` map tasks and writes a single output file.
#[derive(Debug, Clone)]
pub struct ReduceTask {
    /// Directory the intermediate files live in.
    work_dir: PathBuf,
    job_name: String,
    reduce_task: u32,
    /// Number of map tasks that ran, "M" in the paper.
    n_map: u32,
    out_file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReduceSummary {
    pub reduce_task: u32,
    /// Records decoded across all partitions.
    pub input_records: usize,
    /// Distinct keys, which is also the number of output records.
    pub keys: usize,
    pub out_file: PathBuf,
}

impl ReduceTask {
    pub fn new(
        job_name: impl Into<String>,
        reduce_task: u32,
        n_map: u32,
        out_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            work_dir: PathBuf::from("."),
            job_name: job_name.into(),
            reduce_task,
            n_map,
            out_file: out_file.into(),
        }
    }

    pub fn work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    pub fn reduce_task(&self) -> u32 {
        self.reduce_task
    }

    pub fn out_file(&self) -> &Path {
        &self.out_file
    }

    /// Intermediate files this task reads, in map task order.
    pub fn partition_paths(&self) -> Vec<PathBuf> {
        (0..self.n_map)
            .map(|map_task| {
                self.work_dir
                    .join(utils::reduce_name(&self.job_name, map_task, self.reduce_task))
            })
            .collect()
    }

    /// Runs the task to completion. Either every key is reduced and the
    /// output file is moved into place, or an error is returned and the
    /// output path is left as it was.
    pub fn run<F>(&self, reducef: &F) -> Result<ReduceSummary>
    where
        F: ReduceFn + ?Sized,
    {
        let mut intermediates = self.read_intermediates()?;
        let input_records = intermediates.len();

        // Stable, so values of one key stay in file order.
        intermediates.sort_by(|a, b| a.key.cmp(&b.key));

        let mut output = Vec::new();
        let mut i = 0;
        while i < intermediates.len() {
            let mut j = i + 1;
            while j < intermediates.len() && intermediates[i].key == intermediates[j].key {
                j += 1;
            }

            let values: Vec<&str> = intermediates[i..j]
                .iter()
                .map(|kv| kv.value.as_str())
                .collect();
            let reduced: String = reducef(&intermediates[i].key, &values);
            output.push(KeyValue::new(intermediates[i].key.as_str(), reduced));

            i = j;
        }

        self.commit_output(&output)?;

        let summary = ReduceSummary {
            reduce_task: self.reduce_task,
            input_records,
            keys: output.len(),
            out_file: self.out_file.clone(),
        };
        info!(
            "reduce task {} of job {} done: {} records, {} keys -> {}.",
            self.reduce_task,
            self.job_name,
            summary.input_records,
            summary.keys,
            self.out_file.display()
        );
        Ok(summary)
    }

    /// Runs the task on tokio's blocking pool.
    pub fn spawn<F>(self, reducef: Arc<F>) -> JoinHandle<Result<ReduceSummary>>
    where
        F: ReduceFn + Send + Sync + 'static,
    {
        tokio::task::spawn_blocking(move || self.run(&*reducef))
    }

    fn read_intermediates(&self) -> Result<Vec<KeyValue>> {
        let mut intermediates = Vec::new();
        for path in self.partition_paths() {
            let reader = RecordReader::open(&path)?;
            let before = intermediates.len();
            for kv in reader {
                intermediates.push(kv?);
            }
            debug!(
                "read {} records from {}.",
                intermediates.len() - before,
                path.display()
            );
        }
        Ok(intermediates)
    }

    /// Writes `output` to a temporary file next to the output path and
    /// renames it into place once it is fully flushed.
    fn commit_output(&self, output: &[KeyValue]) -> Result<()> {
        let out_dir = utils::parent_dir(&self.out_file);
        let create_error = |source| ReduceError::OutputCreate {
            path: self.out_file.clone(),
            source,
        };

        fs::create_dir_all(out_dir).map_err(create_error)?;
        let prefix = self.tmp_prefix();
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix).suffix(".tmp");
        // Same mode a plain create would give, so other users can read results.
        #[cfg(unix)]
        builder.permissions(fs::Permissions::from_mode(0o666));
        let tmp = builder.tempfile_in(out_dir).map_err(create_error)?;
        debug!(
            "writing {} records to {}.",
            output.len(),
            tmp.path().display()
        );

        let mut writer = RecordWriter::new(&self.out_file, tmp);
        for kv in output {
            writer.write(kv)?;
        }
        let tmp: NamedTempFile = writer.finish()?;
        tmp.as_file()
            .sync_all()
            .map_err(|source| ReduceError::Encode {
                path: self.out_file.clone(),
                source,
            })?;

        tmp.persist(&self.out_file)
            .map_err(|e| ReduceError::OutputCommit {
                path: self.out_file.clone(),
                source: e.error,
            })?;
        Ok(())
    }

    fn tmp_prefix(&self) -> OsString {
        let mut prefix = OsString::from(".");
        prefix.push(self.out_file.file_name().unwrap_or_default());
        prefix.push(".");
        prefix
    }
}
