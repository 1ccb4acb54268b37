use std::io::{self, Write};
use std::path::Path;

use tracing::debug;

use crate::atomic::AtomicFileWriter;
use crate::error::WriterError;
use crate::target::Destination;

/// 依路徑選擇標準串流或原子檔案寫入的輸出控制代碼。
/// Output handle routed by path: standard streams pass straight through,
/// everything else goes through an [`AtomicFileWriter`].
#[derive(Debug)]
pub enum SafeOutput {
    Stdout(io::Stdout),
    Stderr(io::Stderr),
    File(AtomicFileWriter),
}

impl SafeOutput {
    /// `""`, `-` and `/dev/stdout` select standard output, `/dev/stderr`
    /// selects standard error. Nothing touches the filesystem until the
    /// first write.
    pub fn new(path: impl AsRef<Path>, mode: u32) -> Self {
        let path = path.as_ref();
        match Destination::classify(path) {
            Destination::Stdout => SafeOutput::Stdout(io::stdout()),
            Destination::Stderr => SafeOutput::Stderr(io::stderr()),
            Destination::File => SafeOutput::File(AtomicFileWriter::new(path, mode)),
        }
    }

    pub fn destination(&self) -> Destination {
        match self {
            SafeOutput::Stdout(_) => Destination::Stdout,
            SafeOutput::Stderr(_) => Destination::Stderr,
            SafeOutput::File(_) => Destination::File,
        }
    }

    /// 若為檔案輸出則回傳底層寫入器。 / Returns the atomic writer for file destinations.
    pub fn as_file(&self) -> Option<&AtomicFileWriter> {
        match self {
            SafeOutput::File(writer) => Some(writer),
            _ => None,
        }
    }

    /// Forces the file destination to stage a (possibly empty) replacement.
    /// No-op for standard streams.
    pub fn begin(&self) -> Result<(), WriterError> {
        match self {
            SafeOutput::File(writer) => writer.begin(),
            _ => Ok(()),
        }
    }

    /// 提交輸出。標準串流不會被關閉，且永遠回傳成功。
    /// Commits the output. Standard streams are never closed and always report
    /// success; a best-effort flush failure is only traced.
    pub fn close(&self) -> Result<(), WriterError> {
        let flushed = match self {
            SafeOutput::Stdout(stdout) => {
                let mut stream: &io::Stdout = stdout;
                stream.flush()
            }
            SafeOutput::Stderr(stderr) => {
                let mut stream: &io::Stderr = stderr;
                stream.flush()
            }
            SafeOutput::File(writer) => return writer.close(),
        };
        if let Err(err) = flushed {
            debug!("writer: flushing {} failed: {}", self.destination().name(), err);
        }
        Ok(())
    }
}

impl Write for SafeOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            SafeOutput::Stdout(stdout) => stdout.write(buf),
            SafeOutput::Stderr(stderr) => stderr.write(buf),
            SafeOutput::File(writer) => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            SafeOutput::Stdout(stdout) => stdout.flush(),
            SafeOutput::Stderr(stderr) => stderr.flush(),
            SafeOutput::File(writer) => writer.flush(),
        }
    }
}

/// 一次寫入全部位元組並提交。 / Routes `path`, writes `data` in full and commits it.
///
/// Unlike a writer that is closed without writes, this always replaces a file
/// target, truncating it when `data` is empty.
pub fn write_atomic(path: impl AsRef<Path>, mode: u32, data: &[u8]) -> io::Result<()> {
    let mut output = SafeOutput::new(path, mode);
    output.begin()?;
    output.write_all(data)?;
    output.close()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atomic::DEFAULT_MODE;
    use std::fs;

    #[test]
    fn sentinel_paths_route_to_streams() {
        assert_eq!(SafeOutput::new("", DEFAULT_MODE).destination(), Destination::Stdout);
        assert_eq!(SafeOutput::new("-", DEFAULT_MODE).destination(), Destination::Stdout);
        assert_eq!(
            SafeOutput::new("/dev/stdout", DEFAULT_MODE).destination(),
            Destination::Stdout
        );
        assert_eq!(
            SafeOutput::new("/dev/stderr", DEFAULT_MODE).destination(),
            Destination::Stderr
        );
        assert!(SafeOutput::new("-", DEFAULT_MODE).destination().is_stream());
        assert!(!SafeOutput::new("out.txt", DEFAULT_MODE).destination().is_stream());
    }

    #[test]
    fn stream_close_always_succeeds_and_is_repeatable() {
        for path in ["-", "/dev/stderr"] {
            let mut output = SafeOutput::new(path, DEFAULT_MODE);
            output.write_all(b"").unwrap();
            assert!(output.close().is_ok());
            assert!(output.close().is_ok());
            assert!(output.as_file().is_none());
        }
    }

    #[test]
    fn file_paths_defer_filesystem_access() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("deferred.txt");

        let output = SafeOutput::new(&target, 0o600);
        assert_eq!(output.destination(), Destination::File);
        let writer = output.as_file().unwrap();
        assert_eq!(writer.target(), target.as_path());
        assert_eq!(writer.mode(), 0o600);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn file_output_commits_written_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("routed.txt");

        let mut output = SafeOutput::new(&target, DEFAULT_MODE);
        write!(output, "hello {}", 42).unwrap();
        output.flush().unwrap();
        output.close().unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "hello 42");
    }

    #[test]
    fn write_atomic_replaces_existing_contents() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("settings.json");
        fs::write(&target, "{\"old\":true}").unwrap();

        write_atomic(&target, DEFAULT_MODE, b"{\"new\":true}").unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "{\"new\":true}");
    }

    #[test]
    fn write_atomic_truncates_on_empty_payload() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("cleared.txt");
        fs::write(&target, "stale").unwrap();

        write_atomic(&target, DEFAULT_MODE, b"").unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"");
    }

    #[test]
    fn write_atomic_reports_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing").join("out.txt");

        let err = write_atomic(&target, DEFAULT_MODE, b"data").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
