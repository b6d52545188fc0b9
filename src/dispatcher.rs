use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::str;

use thiserror::Error as ThisError;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::operation::{Function, Operation, Value};

/// Upper bound on what a worker may write. The longest valid output is an `i64` in decimal.
const MAX_WORKER_OUTPUT: u64 = 64;

#[derive(Debug, ThisError)]
pub enum DispatchError {
    #[error("failed to start worker {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("worker {pid} started without an output pipe")]
    MissingPipe { pid: u32 },
}

/// The executable launched for every computation. The dispatcher appends
/// `<native tag> <f|g> <index>` to `args`.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> WorkerCommand {
        WorkerCommand {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> WorkerCommand {
        self.args.push(arg.into());
        self
    }
}

/// Starts worker processes, one per computation.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    worker: WorkerCommand,
}

impl Dispatcher {
    pub fn new(worker: WorkerCommand) -> Dispatcher {
        Dispatcher { worker }
    }

    /// Launches `function` of `operation`'s pair on `index` and returns without waiting for it.
    ///
    /// The caller is responsible for checking `index` against [`Operation::domain_size`].
    pub fn submit(
        &self,
        operation: Operation,
        function: Function,
        index: usize,
    ) -> Result<ComputationHandle, DispatchError> {
        let mut child = Command::new(&self.worker.program)
            .args(&self.worker.args)
            .arg(operation.native_tag().to_string())
            .arg(function.to_string())
            .arg(index.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DispatchError::Spawn {
                program: self.worker.program.display().to_string(),
                source,
            })?;

        // A spawned child always has an id until it has been waited on.
        let pid = child.id().unwrap_or_default();

        let Some(stdout) = child.stdout.take() else {
            let _ = child.start_kill();
            return Err(DispatchError::MissingPipe { pid });
        };

        let (tx, rx) = oneshot::channel();
        let reader = tokio::spawn(async move {
            let value = read_result(operation, stdout).await;
            trace!(pid, ?value, "worker output decoded");
            // The handle may already be gone.
            let _ = tx.send(value);
        });

        debug!(pid, %operation, %function, index, "worker started");

        Ok(ComputationHandle {
            pid,
            function,
            child,
            reader,
            slot: Slot::Pending(rx),
            released: false,
        })
    }
}

async fn read_result(operation: Operation, stdout: ChildStdout) -> Option<Value> {
    let mut buf = Vec::new();
    let mut limited = stdout.take(MAX_WORKER_OUTPUT + 1);

    if let Err(e) = limited.read_to_end(&mut buf).await {
        debug!("failed to read worker output: {}", e);
        return None;
    }

    if buf.len() as u64 > MAX_WORKER_OUTPUT {
        debug!("worker output exceeds {} bytes", MAX_WORKER_OUTPUT);
        return None;
    }

    let text = str::from_utf8(&buf).ok()?;
    operation.deserialize(text)
}

#[derive(Debug)]
enum Slot {
    Pending(oneshot::Receiver<Option<Value>>),
    Resolved(Option<Value>),
}

/// One in-flight worker process and its eventual result.
///
/// The result resolves exactly once, to `Some(value)` or to `None` when the worker crashed, its
/// pipe closed abnormally or its output did not decode. Call [`ComputationHandle::release`] once
/// the result is no longer needed: it kills the worker if it is still running and reaps it.
/// Dropping an unreleased handle kills the worker and leaves reaping to the runtime.
#[derive(Debug)]
pub struct ComputationHandle {
    pid: u32,
    function: Function,
    child: Child,
    reader: JoinHandle<()>,
    slot: Slot,
    released: bool,
}

impl ComputationHandle {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn function(&self) -> Function {
        self.function
    }

    /// `None` while the worker is still running.
    pub fn resolution(&self) -> Option<Option<Value>> {
        match self.slot {
            Slot::Pending(_) => None,
            Slot::Resolved(value) => Some(value),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.slot, Slot::Resolved(_))
    }

    /// Checks for a result without waiting.
    pub fn try_resolve(&mut self) -> Option<Option<Value>> {
        if let Slot::Pending(rx) = &mut self.slot {
            match rx.try_recv() {
                Ok(value) => self.slot = Slot::Resolved(value),
                Err(oneshot::error::TryRecvError::Empty) => return None,
                Err(oneshot::error::TryRecvError::Closed) => self.slot = Slot::Resolved(None),
            }
        }

        self.resolution()
    }

    /// Waits for the result. Cancel safe: a cancelled wait can be resumed later.
    pub async fn wait(&mut self) -> Option<Value> {
        if let Slot::Pending(rx) = &mut self.slot {
            // A dropped sender means the reader task died without an answer.
            let value = rx.await.unwrap_or(None);
            self.slot = Slot::Resolved(value);
        }

        match self.slot {
            Slot::Resolved(value) => value,
            Slot::Pending(_) => None,
        }
    }

    /// Kills the worker if it is still running and waits for its exit status. Killing a process
    /// that already exited is a no-op.
    pub async fn release(mut self) -> Option<ExitStatus> {
        self.released = true;
        self.reader.abort();

        if let Err(e) = self.child.start_kill() {
            trace!(pid = self.pid, "worker already exited: {}", e);
        }

        match self.child.wait().await {
            Ok(status) => {
                debug!(pid = self.pid, %status, "worker reaped");
                Some(status)
            }
            Err(e) => {
                warn!(pid = self.pid, "failed to reap worker: {}", e);
                None
            }
        }
    }
}

impl Drop for ComputationHandle {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        self.reader.abort();
        let _ = self.child.start_kill();
        debug!(pid = self.pid, "worker dropped without release");
    }
}
