use std::net::SocketAddr;

use serial_test::serial;
use splitcalc::config::{Config, SpawnFailurePolicy};
use splitcalc::dispatcher::WorkerCommand;
use splitcalc::reply::Reply;
use splitcalc::server::serve;
use splitcalc::Result;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration, Instant};

const WORKER: &str = env!("CARGO_BIN_EXE_splitcalc-worker");
const IN_PROGRESS: &str = "Computing, please wait...\n";

struct Server {
    address: SocketAddr,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<Result<()>>,
}

async fn start(config: Config) -> Server {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let (shutdown, rx) = oneshot::channel::<()>();

    let handle = tokio::spawn(serve(listener, config, async {
        let _ = rx.await;
    }));

    Server {
        address,
        shutdown,
        handle,
    }
}

async fn start_default() -> Server {
    start(Config::new(WorkerCommand::new(WORKER))).await
}

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(address: SocketAddr) -> Client {
        let stream = TcpStream::connect(address).await.unwrap();
        let (reader, writer) = stream.into_split();
        let mut client = Client {
            reader: BufReader::new(reader),
            writer,
        };

        let banner = Reply::Usage.to_string();
        let mut buf = vec![0u8; banner.len()];
        client.reader.read_exact(&mut buf).await.unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), banner);

        client
    }

    async fn send(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
    }

    async fn recv(&mut self) -> String {
        let mut line = String::new();
        timeout(Duration::from_secs(10), self.reader.read_line(&mut line))
            .await
            .expect("no reply within 10 seconds")
            .unwrap();
        line
    }

    async fn request(&mut self, line: &str) -> String {
        self.send(line).await;
        assert_eq!(self.recv().await, IN_PROGRESS);
        self.recv().await
    }
}

async fn stop(server: Server) {
    server.shutdown.send(()).unwrap();
    let result = timeout(Duration::from_secs(5), server.handle)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
#[serial]
async fn test_combined_results() {
    let server = start_default().await;
    let mut client = Client::connect(server.address).await;

    assert_eq!(client.request("MUL 0\n").await, "Result: 6\n");
    assert_eq!(client.request("MUL 3\n").await, "Result: -42\n");
    assert_eq!(client.request("OR 2\n").await, "Result: false\n");
    assert_eq!(client.request("AND 2\n").await, "Result: true\n");

    stop(server).await;
}

#[tokio::test]
#[serial]
async fn test_short_circuit_with_hanging_operand() {
    let server = start_default().await;
    let mut client = Client::connect(server.address).await;

    assert_eq!(client.request("OR 3\n").await, "Short circuit: true\n");
    assert_eq!(client.request("OR 4\n").await, "Short circuit: true\n");
    assert_eq!(client.request("AND 3\n").await, "Short circuit: false\n");
    assert_eq!(client.request("AND 4\n").await, "Short circuit: false\n");
    assert_eq!(client.request("MUL 1\n").await, "Short circuit: 0\n");
    assert_eq!(client.request("MUL 2\n").await, "Short circuit: 0\n");

    stop(server).await;
}

#[tokio::test]
#[serial]
async fn test_protocol_errors() {
    let server = start_default().await;
    let mut client = Client::connect(server.address).await;

    client.send("XOR 1\n").await;
    assert_eq!(
        client.recv().await,
        "You have an error in your input, try again!\n"
    );

    client.send("MUL 6\n").await;
    assert_eq!(
        client.recv().await,
        "Provided index is out of allowed range!\n"
    );

    client.send("\n").await;
    assert_eq!(client.request("MUL 0\n").await, "Result: 6\n");

    stop(server).await;
}

#[tokio::test]
#[serial]
async fn test_sessions_do_not_block_each_other() {
    let server = start_default().await;
    let mut slow = Client::connect(server.address).await;
    let mut fast = Client::connect(server.address).await;

    // Both operands of MUL 4 take a second.
    slow.send("MUL 4\n").await;
    assert_eq!(slow.recv().await, IN_PROGRESS);

    let started = Instant::now();
    assert_eq!(fast.request("MUL 0\n").await, "Result: 6\n");
    assert!(started.elapsed() < Duration::from_millis(800));

    assert_eq!(slow.recv().await, "Result: 144\n");

    stop(server).await;
}

#[tokio::test]
#[serial]
async fn test_client_leaving_mid_request() {
    let server = start_default().await;

    let mut leaving = Client::connect(server.address).await;
    leaving.send("MUL 4\n").await;
    assert_eq!(leaving.recv().await, IN_PROGRESS);
    drop(leaving);

    let mut staying = Client::connect(server.address).await;
    assert_eq!(staying.request("AND 0\n").await, "Result: true\n");

    stop(server).await;
}

#[tokio::test]
#[serial]
async fn test_fatal_spawn_failure_stops_server() {
    let mut config = Config::new(WorkerCommand::new("/nonexistent/splitcalc-worker"));
    config.on_spawn_failure = SpawnFailurePolicy::Abort;
    let server = start(config).await;

    let mut client = Client::connect(server.address).await;
    client.send("OR 0\n").await;
    assert_eq!(client.recv().await, IN_PROGRESS);

    let result = timeout(Duration::from_secs(5), server.handle)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_err());
}

#[tokio::test]
#[serial]
async fn test_reported_spawn_failure_keeps_serving() {
    let mut config = Config::new(WorkerCommand::new("/nonexistent/splitcalc-worker"));
    config.on_spawn_failure = SpawnFailurePolicy::Report;
    let server = start(config).await;

    let mut client = Client::connect(server.address).await;
    assert_eq!(
        client.request("OR 0\n").await,
        "Internal error occurred while computing, try again!\n"
    );
    assert_eq!(
        client.request("MUL 0\n").await,
        "Internal error occurred while computing, try again!\n"
    );

    stop(server).await;
}
