pub mod apps;
pub mod codec;
pub mod error;
pub mod kv;
pub mod local;
pub mod reduce;
pub mod utils;

pub use error::{ReduceError, Result, Stage};
pub use kv::KeyValue;
pub use local::LocalJob;
pub use reduce::{ReduceFn, ReduceSummary, ReduceTask};
