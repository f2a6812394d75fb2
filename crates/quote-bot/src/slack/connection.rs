//! RTM socket halves: a single reader and a single writer task

use super::codec::{self, Message, MessageIdAllocator};
use crate::error::{BotError, Result};
use async_trait::async_trait;
use futures::stream::SplitStream;
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{self, Message as Frame};
use tracing::{debug, warn};

/// Pending sends buffered between senders and the writer task
const OUTBOX_CAPACITY: usize = 64;

/// Destination for outbound chat messages
#[async_trait]
pub trait ReplySink: Send + Sync {
    /// Send `message`, returning the id it went out with
    async fn send(&self, message: Message) -> Result<u64>;
}

/// Reading half of the connection
///
/// Only one task may own it; frames are decoded one at a time.
pub struct Inbox<S> {
    stream: S,
    closed: bool,
}

impl<S> Inbox<S>
where
    S: Stream<Item = std::result::Result<Frame, tungstenite::Error>> + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            closed: false,
        }
    }

    /// Wait for the next chat event
    ///
    /// Returns `None` once the peer closed the socket. A transport error is
    /// returned once and then closes the inbox; a decode error leaves it open.
    pub async fn receive(&mut self) -> Option<Result<Message>> {
        while !self.closed {
            let frame = match self.stream.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => {
                    self.closed = true;
                    return Some(Err(e.into()));
                }
                None => {
                    self.closed = true;
                    return None;
                }
            };

            match frame {
                Frame::Text(text) => return Some(codec::decode(&text)),
                Frame::Binary(bytes) => {
                    return Some(
                        std::str::from_utf8(&bytes)
                            .map_err(|e| {
                                BotError::Other(format!("Binary frame is not UTF-8: {e}"))
                            })
                            .and_then(codec::decode),
                    );
                }
                Frame::Close(frame) => {
                    debug!(?frame, "Peer closed the connection");
                    self.closed = true;
                }
                Frame::Ping(_) | Frame::Pong(_) | Frame::Frame(_) => {}
            }
        }

        None
    }
}

struct OutboundRequest {
    message: Message,
    ack: oneshot::Sender<Result<u64>>,
}

/// Writing half of the connection
///
/// Cloneable handle onto the writer task. The writer assigns ids right before
/// writing, so ids appear on the wire in increasing order.
#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::Sender<OutboundRequest>,
    ids: Arc<MessageIdAllocator>,
}

impl Outbox {
    /// Spawn the writer task over `sink`
    pub fn spawn<W>(sink: W, ids: Arc<MessageIdAllocator>) -> (Self, JoinHandle<()>)
    where
        W: Sink<Frame, Error = tungstenite::Error> + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(OUTBOX_CAPACITY);
        let writer = tokio::spawn(run_writer(sink, rx, Arc::clone(&ids)));
        (Self { tx, ids }, writer)
    }

    /// Last id written, 0 if nothing was sent yet
    pub fn last_id(&self) -> u64 {
        self.ids.last_id()
    }
}

#[async_trait]
impl ReplySink for Outbox {
    async fn send(&self, message: Message) -> Result<u64> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(OutboundRequest { message, ack })
            .await
            .map_err(|_| BotError::ConnectionClosed)?;
        done.await.map_err(|_| BotError::ConnectionClosed)?
    }
}

async fn run_writer<W>(
    mut sink: W,
    mut rx: mpsc::Receiver<OutboundRequest>,
    ids: Arc<MessageIdAllocator>,
) where
    W: Sink<Frame, Error = tungstenite::Error> + Unpin,
{
    while let Some(OutboundRequest { message, ack }) = rx.recv().await {
        let result = write_message(&mut sink, &ids, message).await;
        if let Err(e) = &result {
            warn!("Failed to write message: {}", e);
        }
        // The sender may have given up waiting
        let _ = ack.send(result);
    }

    debug!("All senders dropped, closing writer");
    if let Err(e) = sink.close().await {
        debug!("Error while closing socket: {}", e);
    }
}

async fn write_message<W>(
    sink: &mut W,
    ids: &MessageIdAllocator,
    mut message: Message,
) -> Result<u64>
where
    W: Sink<Frame, Error = tungstenite::Error> + Unpin,
{
    message.id = ids.next_id();
    let payload = codec::encode(&message)?;
    sink.send(Frame::Text(payload.into())).await?;
    debug!(id = message.id, channel = %message.channel, "Sent message");
    Ok(message.id)
}

/// An open RTM connection
pub struct SlackConnection<T> {
    pub inbox: Inbox<SplitStream<WebSocketStream<T>>>,
    pub outbox: Outbox,
    pub writer: JoinHandle<()>,
}

impl<T> SlackConnection<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Split `socket` into a reader and a spawned writer
    pub fn new(socket: WebSocketStream<T>, ids: Arc<MessageIdAllocator>) -> Self {
        let (sink, stream) = socket.split();
        let (outbox, writer) = Outbox::spawn(sink, ids);
        Self {
            inbox: Inbox::new(stream),
            outbox,
            writer,
        }
    }
}
