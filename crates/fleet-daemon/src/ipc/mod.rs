//! IPC Control Plane — spec §4.G, §6.
//!
//! A local Unix-domain socket, one JSON request per connection, one JSON
//! response line written back before the server half-closes its write side
//! (`fleet_wire` framing). A request-then-close transport, not a
//! persistent request/response socket.

pub mod audit;
pub mod handlers;
pub mod socket_path;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fleet_core::Clock;
use fleet_store::TaskStore;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::loop_::AgentLoop;
use crate::spawner::AgentSpawner;

/// Bind the control socket at `path`, removing a stale socket file left
/// behind by a prior daemon that didn't shut down cleanly.
pub fn bind(path: &Path) -> io::Result<UnixListener> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    match std::fs::remove_file(path) {
        Ok(()) => info!(path = %path.display(), "removed stale control socket"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    UnixListener::bind(path)
}

/// Accept loop: one spawned task per connection, each handling exactly one
/// request/response exchange (spec §4.G "Transport"). Exits once
/// `shutdown` is cancelled (spec §5 cancellation-abstraction note), letting
/// `main` await this future to know the control plane has stopped
/// accepting new connections.
pub async fn serve<S, P, C>(listener: UnixListener, agent_loop: Arc<AgentLoop<S, P>>, clock: C, shutdown: CancellationToken)
where
    S: TaskStore + 'static,
    P: AgentSpawner + 'static,
    C: Clock,
{
    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                info!("control socket accept loop shutting down");
                return;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _addr)) => {
                        let agent_loop = agent_loop.clone();
                        let clock = clock.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, &agent_loop, &clock).await {
                                warn!(error = %e, "control socket connection error");
                            }
                        });
                    }
                    Err(e) => error!(error = %e, "control socket accept error"),
                }
            }
        }
    }
}

async fn handle_connection<S, P, C>(stream: UnixStream, agent_loop: &AgentLoop<S, P>, clock: &C) -> io::Result<()>
where
    S: TaskStore,
    P: AgentSpawner,
    C: Clock,
{
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let line = match fleet_wire::read_line(&mut reader).await {
        Ok(Some(line)) => line,
        Ok(None) => return Ok(()),
        Err(e) => {
            let response = fleet_wire::err(e.to_string());
            fleet_wire::write_response(&mut write_half, &response).await.map_err(io::Error::other)?;
            write_half.shutdown().await?;
            return Ok(());
        }
    };

    debug!(%line, "received control-plane request");

    let response = match fleet_wire::parse(&line) {
        Ok(msg) => handlers::dispatch(msg, agent_loop, clock).await,
        Err(e) => fleet_wire::err(e.to_string()),
    };

    fleet_wire::write_response(&mut write_half, &response).await.map_err(io::Error::other)?;
    write_half.shutdown().await?;
    Ok(())
}

/// Default control-socket path for `project_path` (spec §6).
pub fn default_socket_path(project_path: &Path) -> PathBuf {
    socket_path::socket_path(project_path)
}
