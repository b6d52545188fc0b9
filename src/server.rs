use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info, instrument};

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::session::{Session, SessionError};

pub async fn run(config: Config) -> crate::Result<()> {
    let listener = TcpListener::bind((config.host, config.port)).await?;

    serve(listener, config, shutdown_signal()).await
}

/// Accepts clients on `listener` until `shutdown` completes or a session hits a fatal error.
/// Sessions still running at that point are cancelled, which kills their workers.
pub async fn serve(
    listener: TcpListener,
    config: Config,
    shutdown: impl Future<Output = ()>,
) -> crate::Result<()> {
    let config = Arc::new(config);
    let dispatcher = Arc::new(Dispatcher::new(config.worker.clone()));
    let (fatal_tx, mut fatal_rx) = mpsc::channel::<SessionError>(1);
    let mut sessions = JoinSet::new();

    info!("Server listening on {}", listener.local_addr()?);

    tokio::pin!(shutdown);

    let result = loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (socket, client_address) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        continue;
                    }
                };
                info!("Accepted connection from {:?}", client_address);

                let dispatcher = dispatcher.clone();
                let config = config.clone();
                let fatal_tx = fatal_tx.clone();

                sessions.spawn(async move {
                    match handle_connection(socket, client_address, dispatcher, &config).await {
                        Ok(()) => {}
                        Err(e @ SessionError::Fatal(_)) => {
                            let _ = fatal_tx.send(e).await;
                        }
                        Err(e) => error!("{}", e),
                    }
                });
            }
            Some(e) = fatal_rx.recv() => {
                error!("Stopping server: {}", e);
                break Err(e.into());
            }
            // Reap finished session tasks as we go.
            Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
            _ = &mut shutdown => {
                info!("Server asked to stop");
                break Ok(());
            }
        }
    };

    sessions.shutdown().await;
    result
}

#[instrument(
    name = "connection",
    skip(stream, dispatcher, config),
    fields(connection_id, client_address)
)]
async fn handle_connection(
    stream: TcpStream,
    client_address: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    config: &Config,
) -> Result<(), SessionError> {
    let session = Session::new(stream, dispatcher, config);

    tracing::Span::current()
        .record("connection_id", session.id().to_string())
        .record("client_address", client_address.to_string());

    session.run().await?;

    info!("Connection closed");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
