//! Running the wrapped binary.

use std::ffi::OsString;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;

use crate::core::DuckError;

/// `[file_flag, link] ++ defaults ++ passthrough`, dropping an empty flag.
#[must_use]
pub fn build_args(
    file_flag: &str,
    link: &Path,
    defaults: &[String],
    passthrough: &[String],
) -> Vec<OsString> {
    let mut args = Vec::with_capacity(2 + defaults.len() + passthrough.len());
    if !file_flag.is_empty() {
        args.push(OsString::from(file_flag));
    }
    args.push(link.as_os_str().to_os_string());
    args.extend(defaults.iter().map(OsString::from));
    args.extend(passthrough.iter().map(OsString::from));
    args
}

/// Spawn `binary` with `args`, inheriting stdio, and wait for it.
///
/// A non-zero exit becomes [`DuckError::ChildExited`]. Interrupts received
/// while the child runs are left to the child, which shares the terminal's
/// process group.
pub async fn execute(binary: &str, args: &[OsString]) -> Result<(), DuckError> {
    let program = which::which(binary).map_err(|e| DuckError::Execution {
        binary: binary.to_string(),
        reason: e.to_string(),
    })?;

    tracing::debug!(
        "Executing {} {}",
        program.display(),
        args.iter().map(|a| a.to_string_lossy()).collect::<Vec<_>>().join(" ")
    );

    let mut child = Command::new(&program)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|e| DuckError::Execution {
            binary: binary.to_string(),
            reason: e.to_string(),
        })?;

    let status = loop {
        tokio::select! {
            status = child.wait() => {
                break status.map_err(|e| DuckError::Execution {
                    binary: binary.to_string(),
                    reason: e.to_string(),
                })?;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::debug!("Interrupt received, waiting for {} to exit", binary);
            }
        }
    };

    match exit_code(status) {
        0 => Ok(()),
        code => Err(DuckError::ChildExited {
            binary: binary.to_string(),
            code,
        }),
    }
}

/// Exit code of `status`; `128 + signal` for a child killed by a signal.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
