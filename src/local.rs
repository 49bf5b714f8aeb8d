use std::{path::PathBuf, sync::Arc};

use futures::future::join_all;
use log::info;
use thiserror::Error;
use tokio::task::JoinError;

use crate::{
    error::{ReduceError, Stage},
    reduce::{ReduceFn, ReduceSummary, ReduceTask},
    utils,
};

/// Runs every reduce task of a job in this process.
///
/// Each task reads its own `(map, reduce)` partitions and writes its own
/// output file, so tasks run side by side without any coordination.
#[derive(Debug, Clone)]
pub struct LocalJob {
    work_dir: PathBuf,
    out_dir: PathBuf,
    job_name: String,
    n_map: u32,
    n_reduce: u32,
}

#[derive(Debug, Error)]
pub enum LocalTaskError {
    #[error(transparent)]
    Reduce(#[from] ReduceError),
    #[error("reduce task {reduce_task} did not complete: {source}.")]
    Join {
        reduce_task: u32,
        #[source]
        source: JoinError,
    },
}

impl LocalTaskError {
    /// Stage the task failed in. `None` when the task itself panicked.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            LocalTaskError::Reduce(e) => Some(e.stage()),
            LocalTaskError::Join { .. } => None,
        }
    }
}

impl LocalJob {
    pub fn new(job_name: impl Into<String>, n_map: u32, n_reduce: u32) -> Self {
        Self {
            work_dir: PathBuf::from("."),
            out_dir: PathBuf::from("."),
            job_name: job_name.into(),
            n_map,
            n_reduce,
        }
    }

    /// Directory holding the intermediate files.
    pub fn work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    /// Directory the per-task output files are written to.
    pub fn out_dir(mut self, out_dir: impl Into<PathBuf>) -> Self {
        self.out_dir = out_dir.into();
        self
    }

    pub fn tasks(&self) -> Vec<ReduceTask> {
        (0..self.n_reduce)
            .map(|reduce_task| {
                let out_file = self
                    .out_dir
                    .join(utils::merge_name(&self.job_name, reduce_task));
                ReduceTask::new(self.job_name.as_str(), reduce_task, self.n_map, out_file)
                    .work_dir(&self.work_dir)
            })
            .collect()
    }

    /// Runs all reduce tasks concurrently. Results come back in reduce task
    /// order; a failed task does not stop the others.
    pub async fn reduce_all<F>(&self, reducef: F) -> Vec<Result<ReduceSummary, LocalTaskError>>
    where
        F: ReduceFn + Send + Sync + 'static,
    {
        let reducef = Arc::new(reducef);
        let tasks = self.tasks();
        let ids: Vec<u32> = tasks.iter().map(ReduceTask::reduce_task).collect();

        info!(
            "running {} reduce tasks for job {} over {} map outputs.",
            tasks.len(),
            self.job_name,
            self.n_map
        );
        let handles = tasks.into_iter().map(|task| task.spawn(reducef.clone()));

        join_all(handles)
            .await
            .into_iter()
            .zip(ids)
            .map(|(joined, reduce_task)| match joined {
                Ok(result) => result.map_err(LocalTaskError::from),
                Err(source) => Err(LocalTaskError::Join {
                    reduce_task,
                    source,
                }),
            })
            .collect()
    }
}
