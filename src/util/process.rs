//! External process execution with output forwarded to tracing

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with code {code}")]
    Failed { program: String, code: i32 },

    #[error("{program} cancelled")]
    Cancelled { program: String },

    #[error("I/O error while running {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Runs the command to completion, logging stdout at info and stderr at
/// warn. The child is killed when `cancel` fires.
pub async fn run_and_log(mut cmd: Command, cancel: &CancellationToken) -> Result<(), ProcessError> {
    let program = cmd.as_std().get_program().to_string_lossy().into_owned();
    debug!(command = ?cmd.as_std(), "Spawning process");

    let mut child = cmd
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ProcessError::Spawn {
            program: program.clone(),
            source,
        })?;

    if let Some(stdout) = child.stdout.take() {
        let name = program.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => info!(process = %name, "{}", line),
                    Ok(None) => break,
                    Err(e) => {
                        error!(process = %name, error = %e, "Error reading stdout");
                        break;
                    }
                }
            }
        });
    }

    if let Some(stderr) = child.stderr.take() {
        let name = program.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => warn!(process = %name, "{}", line),
                    Ok(None) => break,
                    Err(e) => {
                        error!(process = %name, error = %e, "Error reading stderr");
                        break;
                    }
                }
            }
        });
    }

    let waited = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        status = child.wait() => Some(status),
    };

    let status = match waited {
        Some(status) => status.map_err(|source| ProcessError::Io {
            program: program.clone(),
            source,
        })?,
        None => {
            warn!(process = %program, "Cancelling process");
            if let Err(e) = child.kill().await {
                warn!(process = %program, error = %e, "Failed to kill process");
            }
            return Err(ProcessError::Cancelled { program });
        }
    };

    let code = status.code().unwrap_or(-1);
    debug!(process = %program, exit_code = code, "Process exited");

    if !status.success() {
        return Err(ProcessError::Failed { program, code });
    }

    Ok(())
}
