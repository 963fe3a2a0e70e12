//! Per-worker duplex channels
//!
//! Every worker talks to the coordinator over exactly one [`Channel`]. The
//! coordinator side sends [`Command`]s and receives [`Reply`]s; the worker side
//! is the mirror image. Implementations must deliver in send order, never drop
//! or duplicate, and block (suspend) on receive.
//!
//! - [`LocalChannel`]: in-process, backed by tokio mpsc queues
//! - [`TcpChannel`]: one TCP connection, length-prefixed MessagePack frames

use crate::distributed::protocol::{read_frame, write_frame, Command, Reply};
use crate::error::ChannelError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::marker::PhantomData;
use std::net::SocketAddr;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;

/// Ordered, reliable duplex transport
///
/// `S` is the type this end sends, `R` the type it receives.
pub trait Channel<S, R>: Send {
    /// Send one message
    fn send(&mut self, msg: S) -> impl Future<Output = Result<(), ChannelError>> + Send;

    /// Wait for the next message
    fn recv(&mut self) -> impl Future<Output = Result<R, ChannelError>> + Send;
}

/// Coordinator end of a worker channel
pub trait CoordinatorChannel: Channel<Command, Reply> {}
impl<T: Channel<Command, Reply>> CoordinatorChannel for T {}

/// Worker end of a worker channel
pub trait WorkerChannel: Channel<Reply, Command> {}
impl<T: Channel<Reply, Command>> WorkerChannel for T {}

/// In-process channel end
#[derive(Debug)]
pub struct LocalChannel<S, R> {
    tx: mpsc::UnboundedSender<S>,
    rx: mpsc::UnboundedReceiver<R>,
}

/// Create a connected coordinator/worker pair
pub fn local_pair() -> (LocalChannel<Command, Reply>, LocalChannel<Reply, Command>) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (reply_tx, reply_rx) = mpsc::unbounded_channel();

    let coordinator_end = LocalChannel {
        tx: command_tx,
        rx: reply_rx,
    };
    let worker_end = LocalChannel {
        tx: reply_tx,
        rx: command_rx,
    };
    (coordinator_end, worker_end)
}

impl<S: Send, R: Send> Channel<S, R> for LocalChannel<S, R> {
    async fn send(&mut self, msg: S) -> Result<(), ChannelError> {
        self.tx.send(msg).map_err(|_| ChannelError::Closed)
    }

    async fn recv(&mut self) -> Result<R, ChannelError> {
        self.rx.recv().await.ok_or(ChannelError::Closed)
    }
}

/// Channel end over one TCP connection
///
/// `TcpChannel<Command, Reply>` is the coordinator end and
/// `TcpChannel<Reply, Command>` the worker end.
#[derive(Debug)]
pub struct TcpChannel<S, R> {
    stream: TcpStream,
    peer: SocketAddr,
    _direction: PhantomData<fn(S) -> R>,
}

impl<S, R> TcpChannel<S, R> {
    /// Wrap an accepted or connected stream
    pub fn new(stream: TcpStream) -> Result<Self, ChannelError> {
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        Ok(Self {
            stream,
            peer,
            _direction: PhantomData,
        })
    }

    /// Connect to a node service
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, ChannelError> {
        let stream = TcpStream::connect(addr).await?;
        Self::new(stream)
    }

    /// Remote address
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl<S, R> Channel<S, R> for TcpChannel<S, R>
where
    S: Serialize + Send + Sync,
    R: DeserializeOwned + Send,
{
    async fn send(&mut self, msg: S) -> Result<(), ChannelError> {
        write_frame(&mut self.stream, &msg).await
    }

    async fn recv(&mut self) -> Result<R, ChannelError> {
        read_frame(&mut self.stream).await
    }
}
