//! Train / eval split by file-name convention.
//!
//! IV-2a names session files `A01T.gdf` (training) and `A01E.gdf`
//! (evaluation).  A file whose name contains [`EVAL_MARKER`] is eval,
//! everything else is train; a file lacking the marker is silently train.
use std::fmt;
use std::path::{Path, PathBuf};

/// Substring marking an evaluation-session file.
pub const EVAL_MARKER: char = 'E';

/// Dataset split a recording belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Eval,
}

impl Split {
    pub fn from_flag(is_eval: bool) -> Self {
        if is_eval { Split::Eval } else { Split::Train }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Eval => "eval",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Number of files per split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitCounts {
    pub train: usize,
    pub eval: usize,
}

/// One eval flag per file, parallel to the file set, plus per-split counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitLabels {
    pub flags: Vec<bool>,
    pub counts: SplitCounts,
}

impl SplitLabels {
    /// Human label for a flag value.
    pub fn label(is_eval: bool) -> &'static str {
        Split::from_flag(is_eval).as_str()
    }

    pub fn split(&self, i: usize) -> Split {
        Split::from_flag(self.flags[i])
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

/// True when the file name (not the directory) carries the eval marker.
pub fn is_eval(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().contains(EVAL_MARKER))
        .unwrap_or(false)
}

/// Classify every file in `files`.
pub fn classify(files: &[PathBuf]) -> SplitLabels {
    let flags: Vec<bool> = files.iter().map(|f| is_eval(f)).collect();
    let eval = flags.iter().filter(|&&b| b).count();
    SplitLabels {
        counts: SplitCounts { train: flags.len() - eval, eval },
        flags,
    }
}
