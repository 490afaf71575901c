// AsyncRead over a child process's stdout that checks the exit status at EOF

use std::ffi::OsStr;
use std::future::Future;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio::process::{ChildStdout, Command};
use tokio::task::JoinHandle;

use crate::downloader::utils::tail;

type Exit = io::Result<(ExitStatus, Vec<u8>)>;

enum State {
    Reading,
    Finishing,
    Done,
}

/// Streams a process's stdout.
///
/// End of stdout is only reported as EOF once the process has exited
/// successfully. A non-zero exit turns EOF into an error carrying the tail
/// of stderr, so a truncated transfer never looks complete. Dropping the
/// stream kills the process.
pub struct ProcessStream {
    program: String,
    stdout: ChildStdout,
    exit: JoinHandle<Exit>,
    state: State,
}

impl ProcessStream {
    pub fn spawn<I, S>(program: &Path, args: I) -> io::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("failed to capture stdout"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("failed to capture stderr"))?;

        // Owns the child: aborting this task drops it, which kills the process.
        let exit = tokio::spawn(async move {
            let mut buf = Vec::new();
            stderr.read_to_end(&mut buf).await?;
            let status = child.wait().await?;
            Ok((status, buf))
        });

        Ok(Self {
            program: program.display().to_string(),
            stdout,
            exit,
            state: State::Reading,
        })
    }

    fn poll_exit(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let joined = match Pin::new(&mut self.exit).poll(cx) {
            Poll::Ready(joined) => joined,
            Poll::Pending => return Poll::Pending,
        };
        self.state = State::Done;

        let (status, stderr) = joined.map_err(io::Error::other)??;
        if status.success() {
            return Poll::Ready(Ok(()));
        }

        let stderr = String::from_utf8_lossy(&stderr);
        Poll::Ready(Err(io::Error::other(format!(
            "{} exited with {}: {}",
            self.program,
            status,
            tail(&stderr, 5)
        ))))
    }
}

impl AsyncRead for ProcessStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            match this.state {
                State::Reading => {
                    let before = buf.filled().len();
                    match Pin::new(&mut this.stdout).poll_read(cx, buf) {
                        Poll::Ready(Ok(())) if buf.filled().len() == before => {
                            this.state = State::Finishing;
                        }
                        other => return other,
                    }
                }
                State::Finishing => return this.poll_exit(cx),
                State::Done => return Poll::Ready(Ok(())),
            }
        }
    }
}

impl Drop for ProcessStream {
    fn drop(&mut self) {
        if !matches!(self.state, State::Done) {
            self.exit.abort();
        }
    }
}
