//! Bounded execution of external converter processes.

use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

use super::{ensure_pdf, ConversionError};

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{killpg, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Longest stderr excerpt carried in an error.
const STDERR_LIMIT: usize = 512;

/// Kills the converter's whole process group when dropped, so helpers it
/// forked (`soffice.bin`, commands under `sh -c`) die with it.
#[cfg(unix)]
struct ProcessGroup(Option<Pid>);

#[cfg(unix)]
impl Drop for ProcessGroup {
    fn drop(&mut self) {
        if let Some(pgid) = self.0 {
            // ESRCH once every member has exited.
            if let Err(errno) = killpg(pgid, Signal::SIGKILL) {
                if errno != Errno::ESRCH {
                    log::warn!("Failed to kill converter process group {}: {}", pgid, errno);
                }
            }
        }
    }
}

/// Run `command` to completion, killing it when `timeout` elapses.
///
/// On unix the child leads its own process group, and the group is killed
/// on every exit path, including timeout and request cancellation. Elsewhere
/// only the direct child is killed (`kill_on_drop`).
pub async fn run_with_timeout(
    mut command: Command,
    program: &str,
    timeout: Duration,
) -> Result<Output, ConversionError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let child = command.spawn().map_err(|source| ConversionError::Spawn {
        program: program.to_string(),
        source,
    })?;
    #[cfg(unix)]
    let _group = ProcessGroup(child.id().map(|pid| Pid::from_raw(pid as i32)));

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(ConversionError::Timeout {
                program: program.to_string(),
                timeout,
            })
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        let excerpt: String = stderr.chars().take(STDERR_LIMIT).collect();
        return Err(ConversionError::Exit {
            program: program.to_string(),
            code: output.status.code(),
            stderr: excerpt,
        });
    }

    Ok(output)
}

/// Read a converter's output file and check that it is a PDF.
pub async fn read_pdf(path: &Path) -> Result<Vec<u8>, ConversionError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConversionError::MissingOutput(path.to_path_buf()))
        }
        Err(err) => return Err(err.into()),
    };
    ensure_pdf(&bytes)?;
    Ok(bytes)
}
