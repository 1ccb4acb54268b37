//! Classifies output paths into standard streams or real files.
//! 判斷輸出路徑應導向標準串流或實體檔案。

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// 導向標準輸出的路徑字串。 / Path strings that select standard output.
pub const STDOUT_NAMES: [&str; 3] = ["", "-", "/dev/stdout"];

/// 導向標準錯誤的路徑字串。 / Path strings that select standard error.
pub const STDERR_NAMES: [&str; 1] = ["/dev/stderr"];

/// 輸出目的地的種類。 / Where a safe output handle sends its bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Stdout,
    Stderr,
    File,
}

impl Destination {
    /// 以完全比對的方式分類路徑。 / Classifies a path by exact, case-sensitive match.
    pub fn classify(path: impl AsRef<Path>) -> Self {
        let raw = path.as_ref().as_os_str();
        if matches_any(raw, &STDOUT_NAMES) {
            Destination::Stdout
        } else if matches_any(raw, &STDERR_NAMES) {
            Destination::Stderr
        } else {
            Destination::File
        }
    }

    /// 是否為標準串流（不經暫存檔）。 / Whether this destination bypasses the temporary file.
    pub fn is_stream(self) -> bool {
        !matches!(self, Destination::File)
    }

    /// 用於訊息的簡短名稱。 / Short label used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Destination::Stdout => "stdout",
            Destination::Stderr => "stderr",
            Destination::File => "file",
        }
    }
}

fn matches_any(raw: &OsStr, names: &[&str]) -> bool {
    names.iter().any(|name| raw == OsStr::new(name))
}

/// Splits a target into the directory that will hold its temporary sibling and
/// its final component. A bare file name resolves to the current directory.
pub(crate) fn split_target(target: &Path) -> Option<(PathBuf, &OsStr)> {
    let base = target.file_name()?;
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Some((dir, base))
}

/// `.<base>.`; the random suffix is appended by the temp-file factory.
pub(crate) fn temp_prefix(base: &OsStr) -> OsString {
    let mut prefix = OsString::with_capacity(base.len() + 2);
    prefix.push(".");
    prefix.push(base);
    prefix.push(".");
    prefix
}
