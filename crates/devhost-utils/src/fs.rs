//! File helpers that are privilege-aware.
//!
//! Each operation either performs direct filesystem I/O (unprivileged, or the
//! process is already elevated) or routes through the command bridge.
//! Privileged writes buffer content in a temp file owned by the caller and
//! copy it into place, so local buffering never needs elevated rights.

use crate::elevate::{CommandOutput, CommandRunner};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("authentication cancelled by user")]
    Cancelled,
    #[error("`{command}` failed with status {code}: {stderr}")]
    Command {
        command: String,
        code: i32,
        stderr: String,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type FsResult<T> = Result<T, FsError>;

fn check(command: String, out: CommandOutput) -> FsResult<CommandOutput> {
    if out.cancelled() {
        return Err(FsError::Cancelled);
    }
    if !out.success() {
        return Err(FsError::Command {
            command,
            code: out.code,
            stderr: out.stderr,
        });
    }
    Ok(out)
}

fn direct(runner: &dyn CommandRunner, privileged: bool) -> bool {
    !privileged || runner.already_elevated()
}

fn lossy(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Read a file's full contents.
///
/// # Errors
///
/// Returns an error if the file cannot be read, or [`FsError::Cancelled`]
/// when the elevation prompt was dismissed.
pub async fn read_file(runner: &dyn CommandRunner, path: &Path, privileged: bool) -> FsResult<String> {
    if direct(runner, privileged) {
        return Ok(tokio::fs::read_to_string(path).await?);
    }
    let p = lossy(path);
    let out = runner.run_privileged("cat", &[&p]).await;
    Ok(check(format!("cat {p}"), out)?.stdout)
}

/// Write a file's full contents.
///
/// Privileged writes go through temp-file-then-copy: the content is staged in
/// a `NamedTempFile` and `cp`'d into place by the bridge.
///
/// # Errors
///
/// Returns an error if staging or the write/copy fails.
pub async fn write_file(
    runner: &dyn CommandRunner,
    path: &Path,
    content: &str,
    privileged: bool,
) -> FsResult<()> {
    if direct(runner, privileged) {
        tokio::fs::write(path, content).await?;
        return Ok(());
    }

    let mut tmp = NamedTempFile::new()?;
    tmp.write_all(content.as_bytes())?;
    tmp.flush()?;

    let from = lossy(tmp.path());
    let to = lossy(path);
    let out = runner.run_privileged("cp", &[&from, &to]).await;
    check(format!("cp {from} {to}"), out)?;
    Ok(())
}

/// Append to a file, creating it if absent.
///
/// Implemented as read-then-write of the full content; a missing or unreadable
/// file is treated as empty.
///
/// # Errors
///
/// Returns an error if the final write fails, or [`FsError::Cancelled`] if the
/// elevation prompt was dismissed at any point.
pub async fn append_to_file(
    runner: &dyn CommandRunner,
    path: &Path,
    content: &str,
    privileged: bool,
) -> FsResult<()> {
    let existing = match read_file(runner, path, privileged).await {
        Ok(s) => s,
        Err(FsError::Cancelled) => return Err(FsError::Cancelled),
        Err(_) => String::new(),
    };
    write_file(runner, path, &format!("{existing}{content}"), privileged).await
}

/// Copy a file.
///
/// # Errors
///
/// Returns an error if the copy fails.
pub async fn copy_file(
    runner: &dyn CommandRunner,
    from: &Path,
    to: &Path,
    privileged: bool,
) -> FsResult<()> {
    if direct(runner, privileged) {
        tokio::fs::copy(from, to).await?;
        return Ok(());
    }
    let (from, to) = (lossy(from), lossy(to));
    let out = runner.run_privileged("cp", &[&from, &to]).await;
    check(format!("cp {from} {to}"), out)?;
    Ok(())
}

/// Ensure a directory exists.
///
/// # Errors
///
/// Returns an error if creation fails.
pub async fn ensure_dir(runner: &dyn CommandRunner, path: &Path, privileged: bool) -> FsResult<()> {
    if path.exists() {
        return Ok(());
    }
    if direct(runner, privileged) {
        tokio::fs::create_dir_all(path).await?;
        return Ok(());
    }
    let p = lossy(path);
    let out = runner.run_privileged("mkdir", &["-p", &p]).await;
    check(format!("mkdir -p {p}"), out)?;
    Ok(())
}

/// Set permission bits on a file.
///
/// # Errors
///
/// Returns an error if the mode change fails.
pub async fn set_permissions(
    runner: &dyn CommandRunner,
    path: &Path,
    mode: u32,
    privileged: bool,
) -> FsResult<()> {
    if direct(runner, privileged) {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
        return Ok(());
    }
    let p = lossy(path);
    let mode = format!("{mode:o}");
    let out = runner.run_privileged("chmod", &[&mode, &p]).await;
    check(format!("chmod {mode} {p}"), out)?;
    Ok(())
}

/// Delete a file. Deleting a non-existent file is not an error.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be removed.
pub async fn remove_file(runner: &dyn CommandRunner, path: &Path, privileged: bool) -> FsResult<()> {
    if direct(runner, privileged) {
        return match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        };
    }
    let p = lossy(path);
    let out = runner.run_privileged("rm", &["-f", &p]).await;
    check(format!("rm -f {p}"), out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elevate::Elevator;

    #[tokio::test]
    async fn unprivileged_write_then_read_roundtrips() {
        let runner = Elevator::new();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("hello.txt");

        write_file(&runner, &path, "hello\n", false).await.expect("write");
        let content = read_file(&runner, &path, false).await.expect("read");
        assert_eq!(content, "hello\n");
    }

    #[tokio::test]
    async fn append_treats_missing_file_as_empty() {
        let runner = Elevator::new();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("log.txt");

        append_to_file(&runner, &path, "one\n", false).await.expect("append");
        append_to_file(&runner, &path, "two\n", false).await.expect("append");
        let content = read_file(&runner, &path, false).await.expect("read");
        assert_eq!(content, "one\ntwo\n");
    }

    #[tokio::test]
    async fn remove_file_is_idempotent() {
        let runner = Elevator::new();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("gone.txt");

        remove_file(&runner, &path, false).await.expect("first remove");
        write_file(&runner, &path, "x", false).await.expect("write");
        remove_file(&runner, &path, false).await.expect("second remove");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn ensure_dir_creates_nested_paths() {
        let runner = Elevator::new();
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("a/b/c");

        ensure_dir(&runner, &nested, false).await.expect("ensure");
        assert!(nested.is_dir());
        // Second call is a no-op.
        ensure_dir(&runner, &nested, false).await.expect("ensure again");
    }
}
