use std::{fmt, io, path::PathBuf};

use thiserror::Error;

/// Pipeline stage a reduce task was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Acquire,
    Decode,
    CreateOutput,
    Encode,
    Commit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Acquire => "acquire",
            Stage::Decode => "decode",
            Stage::CreateOutput => "create-output",
            Stage::Encode => "encode",
            Stage::Commit => "commit",
        };
        f.write_str(name)
    }
}

/// Fatal reduce task errors. None of them are recovered inside the task; the
/// caller decides whether the whole task is retried.
#[derive(Debug, Error)]
pub enum ReduceError {
    #[error("cannot open intermediate file: {path}, err: {source}.")]
    InputUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed record in intermediate file: {path}, err: {source}.")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("cannot create output file in: {path}, err: {source}.")]
    OutputCreate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("error writing output file: {path}, err: {source}.")]
    Encode {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("error moving output into place: {path}, err: {source}.")]
    OutputCommit {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ReduceError {
    pub fn stage(&self) -> Stage {
        match self {
            ReduceError::InputUnavailable { .. } => Stage::Acquire,
            ReduceError::Decode { .. } => Stage::Decode,
            ReduceError::OutputCreate { .. } => Stage::CreateOutput,
            ReduceError::Encode { .. } => Stage::Encode,
            ReduceError::OutputCommit { .. } => Stage::Commit,
        }
    }

    /// File the failing stage was operating on.
    pub fn path(&self) -> &PathBuf {
        match self {
            ReduceError::InputUnavailable { path, .. }
            | ReduceError::Decode { path, .. }
            | ReduceError::OutputCreate { path, .. }
            | ReduceError::Encode { path, .. }
            | ReduceError::OutputCommit { path, .. } => path,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReduceError>;
