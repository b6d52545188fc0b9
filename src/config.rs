use std::env;
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use clap::ValueEnum;
use strum_macros::Display;

use crate::codec::DEFAULT_MAX_LINE_LENGTH;
use crate::dispatcher::WorkerCommand;

pub const DEFAULT_PORT: u16 = 20_003;
pub const WORKER_BINARY: &str = "splitcalc-worker";

/// What to do when a worker process cannot be started at all.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SpawnFailurePolicy {
    /// Stop the whole server.
    #[default]
    Abort,
    /// Answer the affected request with an internal error and keep serving.
    Report,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub max_line_length: usize,
    pub worker: WorkerCommand,
    pub on_spawn_failure: SpawnFailurePolicy,
}

impl Config {
    pub fn new(worker: WorkerCommand) -> Config {
        Config {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            worker,
            on_spawn_failure: SpawnFailurePolicy::default(),
        }
    }
}

/// The worker binary installed next to the running executable.
pub fn default_worker_path() -> io::Result<PathBuf> {
    let exe = env::current_exe()?;
    let dir = exe.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} has no parent directory", exe.display()),
        )
    })?;

    Ok(dir.join(WORKER_BINARY))
}
