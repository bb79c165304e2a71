use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::{Mutex, Notify, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::engine::Engine;
use crate::error::{Error, Result};

const RECV_BUFFER_SIZE: usize = 1500;

/// The DHCP server lifecycle: Closed -> Open -> Closed.
///
/// `open()` binds the UDP socket and starts exactly one receive-loop task;
/// `close()` stops it and waits for a clean exit. Transitions are guarded by
/// a mutex, and the open flag is mirrored into a watch channel so the owning
/// process can notice an unexpected stop via [`closed`](Self::closed). The
/// receive loop never leaves the server "open but not listening": a fatal
/// socket error transitions the lifecycle to Closed before the loop exits.
pub struct DhcpServer {
    shared: Arc<Shared>,
}

struct Shared {
    config: Arc<Config>,
    engine: Arc<Engine>,
    state: Mutex<Lifecycle>,
    is_open_tx: watch::Sender<bool>,
    is_open_rx: watch::Receiver<bool>,
}

enum Lifecycle {
    Closed,
    Open(Runtime),
}

struct Runtime {
    socket: Arc<UdpSocket>,
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl DhcpServer {
    /// Creates a closed server from a validated configuration, using the
    /// default single-address allocator.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let engine = Arc::new(Engine::new(Arc::clone(&config)));
        Ok(Self::from_parts(config, engine))
    }

    /// Creates a closed server with an injected address allocator.
    pub fn with_allocator(
        config: Config,
        allocator: Arc<dyn crate::allocator::AddressAllocator>,
    ) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let engine = Arc::new(Engine::with_allocator(Arc::clone(&config), allocator));
        Ok(Self::from_parts(config, engine))
    }

    fn from_parts(config: Arc<Config>, engine: Arc<Engine>) -> Self {
        let (is_open_tx, is_open_rx) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                config,
                engine,
                state: Mutex::new(Lifecycle::Closed),
                is_open_tx,
                is_open_rx,
            }),
        }
    }

    /// Binds the UDP listener and starts the receive loop.
    ///
    /// Returns [`Error::AlreadyOpen`] if called while the server is open.
    pub async fn open(&self) -> Result<()> {
        let mut state = self.shared.state.lock().await;
        if matches!(*state, Lifecycle::Open(_)) {
            return Err(Error::AlreadyOpen);
        }

        let socket = Arc::new(create_socket(self.shared.config.port)?);
        info!(
            "DHCP server listening on 0.0.0.0:{}",
            self.shared.config.port
        );

        let shutdown = Arc::new(Notify::new());
        let task = tokio::spawn(receive_loop(
            Arc::clone(&self.shared),
            Arc::clone(&socket),
            Arc::clone(&shutdown),
        ));

        *state = Lifecycle::Open(Runtime {
            socket,
            shutdown,
            task,
        });
        self.shared.is_open_tx.send_replace(true);
        Ok(())
    }

    /// Stops the receive loop and closes the socket.
    ///
    /// Returns [`Error::AlreadyClosed`] if called while the server is
    /// closed, including after the receive loop closed itself on a fatal
    /// socket error.
    pub async fn close(&self) -> Result<()> {
        let runtime = {
            let mut state = self.shared.state.lock().await;
            match std::mem::replace(&mut *state, Lifecycle::Closed) {
                Lifecycle::Closed => return Err(Error::AlreadyClosed),
                Lifecycle::Open(runtime) => {
                    self.shared.is_open_tx.send_replace(false);
                    runtime
                }
            }
        };

        runtime.shutdown.notify_one();
        if let Err(error) = runtime.task.await {
            warn!("Receive loop ended abnormally: {}", error);
        }

        info!("DHCP server closed");
        Ok(())
    }

    /// True while the receive loop is running.
    pub fn is_open(&self) -> bool {
        *self.shared.is_open_rx.borrow()
    }

    /// Completes when the server is not open, whether it never opened, was
    /// closed, or stopped itself on a fatal socket error.
    pub async fn closed(&self) {
        let mut receiver = self.shared.is_open_rx.clone();
        // wait_for only fails when the sender is dropped, and the sender
        // lives in self.
        let _ = receiver.wait_for(|open| !*open).await;
    }

    /// The bound socket address while open.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        match &*self.shared.state.lock().await {
            Lifecycle::Open(runtime) => runtime.socket.local_addr().ok(),
            Lifecycle::Closed => None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }
}

impl Shared {
    /// Fatal-error path out of the receive loop: the lifecycle must read
    /// Closed before the loop stops listening.
    async fn mark_closed(&self) {
        let mut state = self.state.lock().await;
        if matches!(*state, Lifecycle::Open(_)) {
            *state = Lifecycle::Closed;
            self.is_open_tx.send_replace(false);
        }
    }
}

fn create_socket(port: u16) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|error| Error::Socket(format!("Failed to create socket: {}", error)))?;

    socket
        .set_reuse_address(true)
        .map_err(|error| Error::Socket(format!("Failed to set SO_REUSEADDR: {}", error)))?;

    socket
        .set_broadcast(true)
        .map_err(|error| Error::Socket(format!("Failed to set SO_BROADCAST: {}", error)))?;

    socket
        .set_nonblocking(true)
        .map_err(|error| Error::Socket(format!("Failed to set non-blocking: {}", error)))?;

    let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
    socket
        .bind(&bind_addr.into())
        .map_err(|error| Error::Socket(format!("Failed to bind to {}: {}", bind_addr, error)))?;

    let std_socket: std::net::UdpSocket = socket.into();
    let tokio_socket = UdpSocket::from_std(std_socket)
        .map_err(|error| Error::Socket(format!("Failed to convert to tokio socket: {}", error)))?;

    Ok(tokio_socket)
}

/// Sequential receive loop: one datagram in, at most one reply out.
///
/// Each iteration owns its packet; nothing is shared across iterations.
/// Transient receive errors are logged and skipped. Any other receive error
/// is fatal: the lifecycle transitions to Closed and the loop exits. Send
/// errors only cost the one reply.
async fn receive_loop(shared: Arc<Shared>, socket: Arc<UdpSocket>, shutdown: Arc<Notify>) {
    let mut buffer = [0u8; RECV_BUFFER_SIZE];

    info!("DHCP server ready and listening");

    loop {
        let (size, source) = tokio::select! {
            _ = shutdown.notified() => {
                debug!("Receive loop stopping");
                return;
            }
            received = socket.recv_from(&mut buffer) => match received {
                Ok(pair) => pair,
                Err(error) if is_transient_recv_error(&error) => {
                    debug!("Transient receive error: {}", error);
                    continue;
                }
                Err(error) => {
                    error!("Receive failed, closing server: {}", error);
                    shared.mark_closed().await;
                    return;
                }
            },
        };

        let Some(reply) = shared.engine.handle(&buffer[..size]) else {
            continue;
        };

        let destination = shared.engine.resolve_destination(&reply, source);
        if let Err(error) = socket.send_to(&reply.encode(), destination).await {
            warn!("Failed to send reply to {}: {}", destination, error);
        }
    }
}

/// Receive errors worth retrying.
///
/// ConnectionReset/ConnectionAborted show up on UDP sockets when a prior
/// send drew an ICMP port-unreachable; they say nothing about our listener.
fn is_transient_recv_error(error: &std::io::Error) -> bool {
    matches!(
        error.kind(),
        std::io::ErrorKind::WouldBlock
            | std::io::ErrorKind::Interrupted
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
    )
}
