//! Best-effort repository metadata for the `_git` key.
//!
//! Collection shells out to `git` in the configured directory. Any failure
//! (no repository, no `origin` remote, detached HEAD, missing binary, a
//! command exceeding its timeout) makes [`collect`] return `None`; the reason
//! is only logged at debug level.

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Snapshot of the repository the process runs from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GitInfo {
    pub remote: String,
    pub branch: String,
    pub commit: CommitInfo,
    pub status: StatusInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitInfo {
    pub hash: String,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusInfo {
    /// Working-tree changes not yet staged.
    pub diff: Vec<DiffEntry>,
    pub untracked: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffEntry {
    /// Single-letter change type as reported by git (`M`, `D`, `A`, `R`, ...).
    #[serde(rename = "type")]
    pub change_type: String,
    pub path: String,
}

#[derive(Debug, Error)]
enum GitError {
    #[error("failed to run git {args}: {source}")]
    Spawn {
        args: String,
        source: std::io::Error,
    },

    #[error("git {args} exited with {status}")]
    Failed { args: String, status: String },

    #[error("git {args} timed out after {timeout:?}")]
    Timeout { args: String, timeout: Duration },
}

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Collect repository metadata from `dir`, or `None` if anything goes wrong.
pub fn collect(dir: &Path, timeout: Duration) -> Option<GitInfo> {
    match try_collect(dir, timeout) {
        Ok(info) => Some(info),
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "git metadata unavailable");
            None
        }
    }
}

fn try_collect(dir: &Path, timeout: Duration) -> Result<GitInfo, GitError> {
    let git = |args: &[&str]| run_git(dir, args, timeout);

    let remote = git(&["remote", "get-url", "origin"])?.trim().to_string();
    let branch = git(&["symbolic-ref", "--short", "HEAD"])?.trim().to_string();
    let hash = git(&["log", "-1", "--format=%H"])?.trim().to_string();
    let comment = git(&["log", "-1", "--format=%B"])?.trim_end().to_string();
    let diff = parse_name_status(&git(&["diff", "--name-status"])?);
    let untracked = parse_lines(&git(&["ls-files", "--others", "--exclude-standard"])?);

    Ok(GitInfo {
        remote,
        branch,
        commit: CommitInfo { hash, comment },
        status: StatusInfo { diff, untracked },
    })
}

/// Run one git command, killing it if it outlives `timeout`.
fn run_git(dir: &Path, args: &[&str], timeout: Duration) -> Result<String, GitError> {
    let joined = args.join(" ");
    let mut child = Command::new("git")
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| GitError::Spawn {
            args: joined.clone(),
            source: e,
        })?;

    // Drain stdout on a separate thread so a full pipe cannot stall the child.
    let reader = child.stdout.take().map(|mut stdout| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = stdout.read_to_end(&mut buf);
            buf
        })
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(GitError::Timeout {
                    args: joined,
                    timeout,
                });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                return Err(GitError::Spawn {
                    args: joined,
                    source: e,
                });
            }
        }
    };

    let output = reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();

    if !status.success() {
        return Err(GitError::Failed {
            args: joined,
            status: status.to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output).into_owned())
}

/// Parse `git diff --name-status` output. Renames and copies report the
/// destination path.
fn parse_name_status(output: &str) -> Vec<DiffEntry> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split('\t');
            let status = fields.next()?;
            let path = fields.next_back()?;
            let change_type = status.chars().next()?.to_string();
            Some(DiffEntry {
                change_type,
                path: path.to_string(),
            })
        })
        .collect()
}

fn parse_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn name_status_modified_and_deleted() {
        let entries = parse_name_status("M\tsrc/lib.rs\nD\told.txt\n");
        assert_eq!(
            entries,
            vec![
                DiffEntry {
                    change_type: "M".into(),
                    path: "src/lib.rs".into()
                },
                DiffEntry {
                    change_type: "D".into(),
                    path: "old.txt".into()
                },
            ]
        );
    }

    #[test]
    fn name_status_rename_uses_destination() {
        let entries = parse_name_status("R100\ta.txt\tb.txt\n");
        assert_eq!(entries[0].change_type, "R");
        assert_eq!(entries[0].path, "b.txt");
    }

    #[test]
    fn name_status_skips_blank_lines() {
        assert!(parse_name_status("\n").is_empty());
    }

    #[test]
    fn lines_trimmed_and_filtered() {
        assert_eq!(parse_lines("a.txt\n\n b.txt \n"), vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn collect_outside_repository_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(collect(dir.path(), Duration::from_secs(5)).is_none());
    }

    /// Run git in `dir` with a fixed identity, reporting whether it succeeded.
    fn git_in(dir: &Path, args: &[&str]) -> bool {
        Command::new("git")
            .args([
                "-c",
                "user.name=Sample",
                "-c",
                "user.email=sample@example.com",
                "-c",
                "commit.gpgsign=false",
            ])
            .args(args)
            .current_dir(dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// A repository on branch `trunk` with one commit, one modified file and
    /// one untracked file. `None` when no git binary is available.
    fn sample_repository() -> Option<TempDir> {
        let dir = TempDir::new().unwrap();
        if !git_in(dir.path(), &["--version"]) {
            return None;
        }
        let root = dir.path();
        assert!(git_in(root, &["init", "-q"]));
        assert!(git_in(root, &["checkout", "-q", "-b", "trunk"]));
        assert!(git_in(
            root,
            &["remote", "add", "origin", "https://example.com/team/repo.git"]
        ));
        std::fs::write(root.join("tracked.txt"), "one\n").unwrap();
        assert!(git_in(root, &["add", "tracked.txt"]));
        assert!(git_in(root, &["commit", "-q", "-m", "initial commit"]));
        std::fs::write(root.join("tracked.txt"), "two\n").unwrap();
        std::fs::write(root.join("new.txt"), "fresh\n").unwrap();
        Some(dir)
    }

    #[test]
    fn collect_reads_repository_state() {
        let Some(repo) = sample_repository() else {
            return;
        };
        let info = collect(repo.path(), Duration::from_secs(10)).unwrap();

        assert_eq!(info.remote, "https://example.com/team/repo.git");
        assert_eq!(info.branch, "trunk");
        assert_eq!(info.commit.hash.len(), 40);
        assert!(info.commit.hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(info.commit.comment, "initial commit");
        assert_eq!(
            info.status.diff,
            vec![DiffEntry {
                change_type: "M".into(),
                path: "tracked.txt".into(),
            }]
        );
        assert_eq!(info.status.untracked, vec!["new.txt".to_string()]);
    }

    #[test]
    fn builder_stamps_git_mapping() {
        let Some(repo) = sample_repository() else {
            return;
        };
        let config = crate::Config::builder()
            .skip_git_info(false)
            .git_dir(repo.path())
            .git_timeout(Duration::from_secs(10))
            .load()
            .unwrap();

        let git = config.item(crate::types::GIT_KEY).unwrap();
        assert_eq!(git["remote"].as_str(), Some("https://example.com/team/repo.git"));
        assert_eq!(git["branch"].as_str(), Some("trunk"));
        assert_eq!(git["commit"]["comment"].as_str(), Some("initial commit"));
        assert_eq!(git["commit"]["hash"].as_str().map(str::len), Some(40));
        assert_eq!(git["status"]["diff"][0]["type"].as_str(), Some("M"));
        assert_eq!(git["status"]["diff"][0]["path"].as_str(), Some("tracked.txt"));
        assert_eq!(git["status"]["untracked"][0].as_str(), Some("new.txt"));
        assert!(config.flatten(None).unwrap().is_empty());
    }

    #[test]
    fn git_info_serializes_with_type_key() {
        let info = GitInfo {
            remote: "git@example.com:team/repo.git".into(),
            branch: "main".into(),
            commit: CommitInfo {
                hash: "abc123".into(),
                comment: "initial".into(),
            },
            status: StatusInfo {
                diff: vec![DiffEntry {
                    change_type: "M".into(),
                    path: "a.txt".into(),
                }],
                untracked: vec!["new.txt".into()],
            },
        };
        let value = serde_yaml::to_value(&info).unwrap();
        assert_eq!(value["commit"]["hash"].as_str().unwrap(), "abc123");
        assert_eq!(value["status"]["diff"][0]["type"].as_str().unwrap(), "M");
        assert_eq!(value["status"]["untracked"][0].as_str().unwrap(), "new.txt");
    }
}
