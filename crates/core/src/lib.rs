//! Atomic, reader-safe output files with standard-stream passthrough.
//! 原子化輸出檔案：讀取端只會看到完整的舊內容或新內容。

pub mod atomic;
pub mod error;
pub mod output;
pub mod target;

pub use atomic::{AtomicFileWriter, DEFAULT_MODE};
pub use error::WriterError;
pub use output::{write_atomic, SafeOutput};
pub use target::{Destination, STDERR_NAMES, STDOUT_NAMES};
