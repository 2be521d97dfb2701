use std::process::Stdio;

use compost_frame::Frame;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::stream::StreamTransport;
use crate::traits::Transport;

/// Transport over the stdin/stdout pipes of a child process.
///
/// The child is killed when the transport is dropped. Its stderr is
/// inherited so diagnostics stay visible.
pub struct ProcessTransport {
    stream: StreamTransport<ChildStdout, ChildStdin>,
    child: Mutex<Child>,
}

/// Spawn `program` and talk to it over its standard streams.
pub fn spawn<I, S>(program: &str, args: I) -> Result<ProcessTransport>
where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    let spawn_err = |source| TransportError::Spawn {
        program: program.to_string(),
        source,
    };
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(spawn_err)?;

    let missing = |name: &str| {
        spawn_err(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            format!("child {name} was not captured"),
        ))
    };
    let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
    let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
    debug!(program, pid = ?child.id(), "child process transport ready");

    Ok(ProcessTransport {
        stream: StreamTransport::new(stdout, stdin).with_label(program.to_string()),
        child: Mutex::new(child),
    })
}

impl ProcessTransport {
    /// OS process id, if the child is still running.
    pub async fn id(&self) -> Option<u32> {
        self.child.lock().await.id()
    }

    /// Kill the child and wait for it to exit.
    pub async fn kill(&self) -> Result<()> {
        self.child.lock().await.kill().await?;
        Ok(())
    }
}

impl Transport for ProcessTransport {
    async fn write_frame(&self, frame: &Frame) -> Result<()> {
        self.stream.write_frame(frame).await
    }

    async fn read_frame(&self, cancel: &CancellationToken) -> Result<Frame> {
        self.stream.read_frame(cancel).await
    }
}

impl std::fmt::Debug for ProcessTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessTransport")
            .field("program", &self.stream.label())
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cat_echoes_frames() {
        let transport = spawn("cat", std::iter::empty::<&str>()).unwrap();
        assert!(transport.id().await.is_some());

        let sent = Frame::from_payload(5, 0x0C0, false, &[1, 2, 3]).unwrap();
        transport.write_frame(&sent).await.unwrap();
        let echoed = transport
            .read_frame(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(echoed, sent);

        transport.kill().await.unwrap();
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let err = spawn("compost-no-such-program", ["x"]).unwrap_err();
        assert!(matches!(err, TransportError::Spawn { .. }));
    }
}
