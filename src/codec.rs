//! Record stream shared by intermediate and output files: one JSON object per
//! record, newline terminated, no surrounding container.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use serde_json::{de::IoRead, StreamDeserializer};

use crate::{
    error::{ReduceError, Result},
    kv::KeyValue,
    utils,
};

/// Streams records out of a single file.
///
/// The reader owns the file handle, so dropping it releases the handle
/// whether decoding finished, failed, or was abandoned halfway.
pub struct RecordReader {
    path: PathBuf,
    records: StreamDeserializer<'static, IoRead<BufReader<File>>, KeyValue>,
    failed: bool,
}

impl RecordReader {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::open(&path).map_err(|source| ReduceError::InputUnavailable {
            path: path.clone(),
            source,
        })?;
        let records =
            serde_json::Deserializer::from_reader(BufReader::new(file)).into_iter::<KeyValue>();

        Ok(Self {
            path,
            records,
            failed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Iterator for RecordReader {
    type Item = Result<KeyValue>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.records.next()? {
            Ok(kv) => Some(Ok(kv)),
            Err(source) => {
                // The stream position is unreliable after a syntax error.
                self.failed = true;
                Some(Err(ReduceError::Decode {
                    path: self.path.clone(),
                    source,
                }))
            }
        }
    }
}

/// Appends records to any writer, one per `write` call.
pub struct RecordWriter<W: Write> {
    path: PathBuf,
    inner: BufWriter<W>,
}

impl<W: Write> RecordWriter<W> {
    /// `path` is only used to label errors.
    pub fn new(path: impl Into<PathBuf>, inner: W) -> Self {
        Self {
            path: path.into(),
            inner: BufWriter::new(inner),
        }
    }

    pub fn write(&mut self, kv: &KeyValue) -> Result<()> {
        serde_json::to_writer(&mut self.inner, kv)
            .map_err(io::Error::from)
            .and_then(|_| self.inner.write_all(b"\n"))
            .map_err(|source| self.encode_error(source))
    }

    /// Flushes buffered records and hands back the underlying writer.
    pub fn finish(self) -> Result<W> {
        let path = self.path;
        self.inner
            .into_inner()
            .map_err(|e| ReduceError::Encode {
                path,
                source: e.into_error(),
            })
    }

    fn encode_error(&self, source: io::Error) -> ReduceError {
        ReduceError::Encode {
            path: self.path.clone(),
            source,
        }
    }
}

/// Writes a complete record file, replacing whatever was at `path`.
pub fn write_records<'a>(
    path: impl AsRef<Path>,
    records: impl IntoIterator<Item = &'a KeyValue>,
) -> Result<()> {
    let path = path.as_ref();
    let file = utils::create_file_ensured(path).map_err(|source| ReduceError::OutputCreate {
        path: path.to_path_buf(),
        source,
    })?;

    let mut writer = RecordWriter::new(path, file);
    for kv in records {
        writer.write(kv)?;
    }
    writer.finish()?;
    Ok(())
}

/// Reads every record of a file, failing on the first malformed one.
pub fn read_records(path: impl Into<PathBuf>) -> Result<Vec<KeyValue>> {
    RecordReader::open(path)?.collect()
}
