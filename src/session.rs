use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error as ThisError;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::codec::CodecError;
use crate::config::{Config, SpawnFailurePolicy};
use crate::connection::Connection;
use crate::dispatcher::{ComputationHandle, DispatchError, Dispatcher};
use crate::operation::{Function, Operation, Value};
use crate::reply::Reply;
use crate::request::{self, Input, Request};

/// Lines a client may send ahead while a request is being evaluated.
pub const MAX_HELD_LINES: usize = 64;

#[derive(Debug, ThisError)]
pub enum SessionError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// Workers cannot be started at all. The server is expected to stop.
    #[error("fatal: {0}")]
    Fatal(#[source] DispatchError),
    #[error("client sent more than {max} lines ahead of the current request")]
    TooManyHeldLines { max: usize },
}

/// How a request's evaluation ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    ShortCircuit(Value),
    Combined(Value),
    /// A worker crashed, its pipe broke or its output did not decode.
    Failed,
}

impl From<Outcome> for Reply {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::ShortCircuit(value) => Reply::ShortCircuit(value),
            Outcome::Combined(value) => Reply::Result(value),
            Outcome::Failed => Reply::InternalError,
        }
    }
}

enum Evaluation {
    Done(Outcome),
    Disconnected,
    Broken(CodecError),
    Flooded,
}

/// Decides a request from whatever the two workers have produced so far. `None` for a slot
/// means still running, `Some(None)` means the worker failed. Returns `None` while the outcome
/// is still open.
///
/// A failure wins over everything else, then a short-circuiting operand, then the combination
/// of both operands.
pub fn decide(
    operation: Operation,
    f: Option<Option<Value>>,
    g: Option<Option<Value>>,
) -> Option<Outcome> {
    let resolved = || [f, g].into_iter().flatten();

    if resolved().any(|slot| slot.is_none()) {
        return Some(Outcome::Failed);
    }

    if resolved().flatten().any(|value| operation.is_short_circuit(&value)) {
        return operation.short_circuit_value().map(Outcome::ShortCircuit);
    }

    let (Some(Some(lhs)), Some(Some(rhs))) = (f, g) else {
        return None;
    };

    match operation.combine(lhs, rhs) {
        Ok(value) => Some(Outcome::Combined(value)),
        Err(e) => {
            warn!("{}", e);
            Some(Outcome::Failed)
        }
    }
}

/// Serves one client: greets it, then reads requests line by line and evaluates each of them
/// with two worker processes before reading the next one.
pub struct Session<S> {
    conn: Connection<S>,
    dispatcher: Arc<Dispatcher>,
    on_spawn_failure: SpawnFailurePolicy,
    // Lines the client sent while an earlier request was still being evaluated, oldest first.
    pending: VecDeque<Bytes>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite,
{
    pub fn new(stream: S, dispatcher: Arc<Dispatcher>, config: &Config) -> Session<S> {
        Session {
            conn: Connection::new(stream, config.max_line_length),
            dispatcher,
            on_spawn_failure: config.on_spawn_failure,
            pending: VecDeque::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.conn.id
    }

    /// Runs until the client closes the stream. Returns an error on transport failures, on
    /// abusive input and on fatal worker start failures.
    pub async fn run(mut self) -> Result<(), SessionError> {
        self.conn.write_reply(Reply::Usage).await?;

        loop {
            let line = match self.pending.pop_front() {
                Some(line) => line,
                None => match self.conn.read_line().await? {
                    Some(line) => line,
                    None => return Ok(()),
                },
            };

            let request = match request::parse_bytes(&line) {
                Ok(Input::Empty) => continue,
                Ok(Input::Request(request)) => request,
                Err(e) => {
                    debug!("rejecting {:?}: {}", line, e);
                    self.conn.write_reply(Reply::InvalidInput).await?;
                    continue;
                }
            };

            if !request.in_range() {
                debug!(?request, "index out of range");
                self.conn.write_reply(Reply::OutOfRange).await?;
                continue;
            }

            match self.evaluate(request).await? {
                Some(reply) => {
                    debug!("sending {:?}", reply);
                    self.conn.write_reply(reply).await?;
                }
                None => {
                    info!("client went away while its request was being evaluated");
                    return Ok(());
                }
            }
        }
    }

    /// Evaluates one in-range request. `None` when the client disconnected before the outcome
    /// was known. Both workers are released before this returns.
    async fn evaluate(&mut self, request: Request) -> Result<Option<Reply>, SessionError> {
        let Request { operation, index } = request;

        self.conn.write_reply(Reply::InProgress).await?;

        let (mut f, mut g) = match self.submit_pair(operation, index).await {
            Ok(pair) => pair,
            Err(e) => {
                return match self.on_spawn_failure {
                    SpawnFailurePolicy::Abort => {
                        error!("{}", e);
                        Err(SessionError::Fatal(e))
                    }
                    SpawnFailurePolicy::Report => {
                        warn!("{}", e);
                        Ok(Some(Reply::InternalError))
                    }
                };
            }
        };

        let evaluation = self.await_outcome(operation, &mut f, &mut g).await;

        let (f_status, g_status) = tokio::join!(f.release(), g.release());
        debug!(?f_status, ?g_status, "workers released");

        match evaluation {
            Evaluation::Done(outcome) => {
                debug!(%operation, index, ?outcome, "request evaluated");
                Ok(Some(outcome.into()))
            }
            Evaluation::Disconnected => Ok(None),
            Evaluation::Broken(e) => Err(e.into()),
            Evaluation::Flooded => Err(SessionError::TooManyHeldLines {
                max: MAX_HELD_LINES,
            }),
        }
    }

    async fn submit_pair(
        &self,
        operation: Operation,
        index: usize,
    ) -> Result<(ComputationHandle, ComputationHandle), DispatchError> {
        let f = self.dispatcher.submit(operation, Function::F, index)?;

        match self.dispatcher.submit(operation, Function::G, index) {
            Ok(g) => Ok((f, g)),
            Err(e) => {
                f.release().await;
                Err(e)
            }
        }
    }

    /// Waits until `decide` settles the request, watching the client stream at the same time.
    /// Lines that arrive meanwhile are queued, and the stream stays watched so that a client
    /// leaving after sending ahead is still noticed.
    async fn await_outcome(
        &mut self,
        operation: Operation,
        f: &mut ComputationHandle,
        g: &mut ComputationHandle,
    ) -> Evaluation {
        loop {
            // Whatever finished since the last wake-up counts as finished together.
            let outcome = decide(operation, f.try_resolve(), g.try_resolve());
            if let Some(outcome) = outcome {
                return Evaluation::Done(outcome);
            }

            tokio::select! {
                _ = f.wait(), if !f.is_resolved() => {}
                _ = g.wait(), if !g.is_resolved() => {}
                line = self.conn.read_line() => match line {
                    Ok(Some(_)) if self.pending.len() >= MAX_HELD_LINES => {
                        return Evaluation::Flooded;
                    }
                    Ok(Some(line)) => {
                        debug!("holding back {:?} until the current request finishes", line);
                        self.pending.push_back(line);
                    }
                    Ok(None) => return Evaluation::Disconnected,
                    Err(e) => return Evaluation::Broken(e),
                },
            }
        }
    }
}
