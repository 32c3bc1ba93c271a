//! Helper to handle child process stdout/stderr output
//!
//! Child output is always piped. Each line is published on the owning
//! supervisor's broadcast sink (if anyone is listening) and appended to the
//! child's log file when one is configured.

use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::broadcast;

use shared::{component_debug, component_warn, Component};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// One line of child output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub process: String,
    pub stream: OutputStream,
    pub line: String,
}

/// Pipe stdout/stderr so they can be consumed, and close stdin
pub fn configure_child_stdio(cmd: &mut Command) {
    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(Stdio::null());
}

/// Spawn one consumer task per piped stream
///
/// Consumers end on their own once the child closes its end of the pipe.
pub fn spawn_output_consumers(
    child: &mut Child,
    component: Component,
    process_name: &str,
    sink: broadcast::Sender<OutputLine>,
    log_file: Option<PathBuf>,
) {
    if let Some(stdout) = child.stdout.take() {
        spawn_consumer(
            stdout,
            OutputStream::Stdout,
            component,
            process_name.to_string(),
            sink.clone(),
            log_file.clone(),
        );
    }

    if let Some(stderr) = child.stderr.take() {
        spawn_consumer(
            stderr,
            OutputStream::Stderr,
            component,
            process_name.to_string(),
            sink,
            log_file,
        );
    }
}

fn spawn_consumer<R>(
    reader: R,
    stream: OutputStream,
    component: Component,
    process: String,
    sink: broadcast::Sender<OutputLine>,
    log_file: Option<PathBuf>,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut file = match log_file {
            Some(path) => match tokio::fs::OpenOptions::new().create(true).append(true).open(&path).await {
                Ok(file) => Some(file),
                Err(e) => {
                    component_warn!(component, "⚠️ Cannot open log file {}: {}", path.display(), e);
                    None
                }
            },
            None => None,
        };

        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(file) = file.as_mut() {
                if file.write_all(format!("{line}\n").as_bytes()).await.is_ok() {
                    let _ = file.flush().await;
                }
            }
            // no subscribers is fine
            let _ = sink.send(OutputLine {
                process: process.clone(),
                stream,
                line,
            });
        }

        component_debug!(component, "🔌 {:?} of {} closed", stream, process);
    });
}
