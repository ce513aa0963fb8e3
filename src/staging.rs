//! Staged-file selection.
//!
//! The repository's working tree and index are treated as a read-only
//! collaborator queried through the [`StagingContext`] trait. [`GitContext`]
//! is the production implementation and shells out to `git`; tests can supply
//! their own implementation without touching a repository.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::{debug, warn};

/// Hook stage the gate is running under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    PreCommit,
    PrePush,
    Manual,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::PreCommit => "pre-commit",
            Stage::PrePush => "pre-push",
            Stage::Manual => "manual",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a selected file relates to the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StagingState {
    /// In the index, will be part of the next commit.
    Staged,
    /// Tracked and differs from the remote ref being pushed.
    Modified,
    /// Tracked in the working tree (manual runs).
    Tracked,
}

/// A file eligible for scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub path: PathBuf,
    pub state: StagingState,
}

impl StagedFile {
    pub fn new(path: impl Into<PathBuf>, state: StagingState) -> Self {
        Self {
            path: path.into(),
            state,
        }
    }

    /// Read the file content relative to the repository root.
    pub fn read_content(&self, root: &Path) -> std::io::Result<Vec<u8>> {
        std::fs::read(root.join(&self.path))
    }
}

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("git command not found. Please install git.")]
    GitNotFound,

    #[error("not inside a git repository: {0}")]
    NotARepository(String),

    #[error("git {command} failed: {message}")]
    GitCommand { command: String, message: String },
}

/// Read-only view of the version-control staging state.
pub trait StagingContext {
    /// List the files eligible for scanning at the given stage.
    ///
    /// An empty list is a valid outcome, not an error. Ordering follows the
    /// collaborator's output and is stable across identical invocations.
    fn files_for_stage(
        &self,
        stage: Stage,
        explicit: &[PathBuf],
    ) -> Result<Vec<StagedFile>, StagingError>;

    /// Repository root all returned paths are relative to.
    fn root(&self) -> &Path;
}

/// Production [`StagingContext`] backed by the `git` CLI.
pub struct GitContext {
    root: PathBuf,
}

impl GitContext {
    /// Locate the repository containing `dir`.
    pub fn discover(dir: &Path) -> Result<Self, StagingError> {
        let output = Command::new("git")
            .args(["rev-parse", "--show-toplevel"])
            .current_dir(dir)
            .output()
            .map_err(|_| StagingError::GitNotFound)?;

        if !output.status.success() {
            return Err(StagingError::NotARepository(dir.display().to_string()));
        }

        let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Self {
            root: PathBuf::from(root),
        })
    }

    /// Run a git subcommand in the repository root and return stdout lines.
    fn git_lines(&self, args: &[&str]) -> Result<Vec<String>, StagingError> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
            .map_err(|_| StagingError::GitNotFound)?;

        if !output.status.success() {
            return Err(StagingError::GitCommand {
                command: args.join(" "),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|l| !l.is_empty())
            .map(|l| l.to_string())
            .collect())
    }

    /// Files in the index, exactly what the next commit will contain.
    fn staged_files(&self) -> Result<Vec<String>, StagingError> {
        self.git_lines(&["diff", "--staged", "--name-only", "--diff-filter=ACMR"])
    }

    /// Files that differ between the local HEAD and the ref being pushed to.
    ///
    /// Tries `@{push}` first, then `@{upstream}`. A branch with no remote
    /// counterpart pushes everything, so all tracked files are eligible.
    /// Only an unresolvable ref falls through; a failing diff against a
    /// resolvable ref is a real git error and surfaces as such.
    fn push_files(&self) -> Result<Vec<String>, StagingError> {
        for remote_ref in ["@{push}", "@{upstream}"] {
            if !self.ref_resolvable(remote_ref) {
                debug!(remote_ref, "remote ref not resolvable, trying next");
                continue;
            }
            let range = format!("{remote_ref}..HEAD");
            return self.git_lines(&["diff", "--name-only", "--diff-filter=ACMR", &range]);
        }

        debug!("no remote ref found, selecting all tracked files");
        self.tracked_files()
    }

    fn ref_resolvable(&self, git_ref: &str) -> bool {
        Command::new("git")
            .args(["rev-parse", "--verify", "--quiet"])
            .arg(git_ref)
            .current_dir(&self.root)
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// All tracked files in the working tree.
    fn tracked_files(&self) -> Result<Vec<String>, StagingError> {
        self.git_lines(&["ls-files"])
    }

    fn is_tracked(&self, path: &Path) -> bool {
        Command::new("git")
            .args(["ls-files", "--error-unmatch"])
            .arg(path)
            .current_dir(&self.root)
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

impl StagingContext for GitContext {
    fn files_for_stage(
        &self,
        stage: Stage,
        explicit: &[PathBuf],
    ) -> Result<Vec<StagedFile>, StagingError> {
        let files = match stage {
            Stage::PreCommit => to_staged(self.staged_files()?, StagingState::Staged),
            Stage::PrePush => to_staged(self.push_files()?, StagingState::Modified),
            Stage::Manual => {
                if explicit.is_empty() {
                    to_staged(self.tracked_files()?, StagingState::Tracked)
                } else {
                    // Caller-supplied list: untracked entries are dropped, the
                    // gate only vouches for what the repository will carry.
                    explicit
                        .iter()
                        .filter(|p| {
                            let tracked = self.is_tracked(p);
                            if !tracked {
                                warn!(path = %p.display(), "skipping untracked file");
                            }
                            tracked
                        })
                        .map(|p| StagedFile::new(p.clone(), StagingState::Tracked))
                        .collect()
                }
            }
        };

        Ok(filter_eligible(files, &self.root))
    }

    fn root(&self) -> &Path {
        &self.root
    }
}

fn to_staged(paths: Vec<String>, state: StagingState) -> Vec<StagedFile> {
    paths
        .into_iter()
        .map(|p| StagedFile::new(p, state))
        .collect()
}

/// Drop entries that cannot be scanned: files missing from the working tree
/// and binary content. Order of the remaining entries is preserved.
fn filter_eligible(files: Vec<StagedFile>, root: &Path) -> Vec<StagedFile> {
    files
        .into_iter()
        .filter(|f| {
            let full = root.join(&f.path);
            if !full.is_file() {
                debug!(path = %f.path.display(), "skipping missing file");
                return false;
            }
            if is_binary(&full) {
                debug!(path = %f.path.display(), "skipping binary file");
                return false;
            }
            true
        })
        .collect()
}

/// Heuristic binary check: a NUL byte in the first 8 KiB.
fn is_binary(path: &Path) -> bool {
    use std::io::Read;

    let Ok(mut file) = std::fs::File::open(path) else {
        return true;
    };
    let mut buf = [0u8; 8192];
    match file.read(&mut buf) {
        Ok(n) => buf[..n].contains(&0),
        Err(_) => true,
    }
}
