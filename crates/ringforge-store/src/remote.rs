//! A document-store client speaking the wire protocol, and the serve loop
//! exposing a [`DocumentStore`] to such clients.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::io::{AsyncRead, AsyncWrite, WriteHalf};
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::store::{Document, DocumentStore};
use crate::wire::{
    decode_request, decode_response, encode_request, encode_response, read_frame, write_frame,
    StoreOp, StoreReply, StoreRequest, StoreResponse,
};

/// A [`DocumentStore`] backed by a remote store over a byte stream.
///
/// Requests carry fresh 64-bit IDs; a background reader task resolves each
/// response against its pending request. When the connection drops, every
/// in-flight and future request fails with [`StoreError::NotConnected`].
pub struct RemoteDocumentStore<S: AsyncRead + AsyncWrite + Send + 'static> {
    writer: Mutex<WriteHalf<S>>,
    pending: Arc<DashMap<u64, oneshot::Sender<StoreReply>>>,
    next_id: AtomicU64,
}

impl<S: AsyncRead + AsyncWrite + Send + 'static> RemoteDocumentStore<S> {
    /// Take ownership of a connected stream and start the reader task.
    #[must_use]
    pub fn connect(stream: S) -> Arc<Self> {
        let (mut read_half, write_half) = tokio::io::split(stream);
        let pending: Arc<DashMap<u64, oneshot::Sender<StoreReply>>> = Arc::new(DashMap::new());

        let reader_pending = Arc::clone(&pending);
        tokio::spawn(async move {
            loop {
                match read_frame(&mut read_half).await {
                    Ok(Some(payload)) => match decode_response(payload) {
                        Ok(StoreResponse { id, reply }) => {
                            if let Some((_, tx)) = reader_pending.remove(&id) {
                                let _ = tx.send(reply);
                            } else {
                                debug!(id, "response with no pending request");
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "malformed store response, closing");
                            break;
                        }
                    },
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "store connection read failed");
                        break;
                    }
                }
            }
            // Fail everything still waiting.
            reader_pending.clear();
        });

        Arc::new(Self {
            writer: Mutex::new(write_half),
            pending,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call(&self, op: StoreOp) -> StoreResult<StoreReply> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);

        let payload = encode_request(&StoreRequest { id, op });
        {
            let mut writer = self.writer.lock().await;
            if let Err(e) = write_frame(&mut *writer, &payload).await {
                self.pending.remove(&id);
                return Err(e);
            }
        }

        match rx.await {
            Ok(StoreReply::Error(message)) => Err(StoreError::Rejected(message)),
            Ok(reply) => Ok(reply),
            Err(_) => Err(StoreError::NotConnected),
        }
    }
}

#[async_trait]
impl<S: AsyncRead + AsyncWrite + Send + 'static> DocumentStore for RemoteDocumentStore<S> {
    async fn put_document(&self, key: &str, meta: &[u8], body: &[u8]) -> StoreResult<()> {
        match self
            .call(StoreOp::Put {
                key: key.to_owned(),
                meta: meta.to_vec(),
                body: body.to_vec(),
            })
            .await?
        {
            StoreReply::Ack => Ok(()),
            other => Err(StoreError::Protocol(format!("unexpected reply {other:?}"))),
        }
    }

    async fn get_document(&self, key: &str) -> StoreResult<Option<Document>> {
        match self.call(StoreOp::Get { key: key.to_owned() }).await? {
            StoreReply::Document { meta, body } => Ok(Some(Document {
                key: key.to_owned(),
                meta,
                body,
            })),
            StoreReply::NotFound => Ok(None),
            other => Err(StoreError::Protocol(format!("unexpected reply {other:?}"))),
        }
    }

    async fn delete_document(&self, key: &str) -> StoreResult<bool> {
        match self.call(StoreOp::Delete { key: key.to_owned() }).await? {
            StoreReply::Deleted(existed) => Ok(existed),
            other => Err(StoreError::Protocol(format!("unexpected reply {other:?}"))),
        }
    }

    async fn list_documents(&self) -> StoreResult<Vec<String>> {
        match self.call(StoreOp::List).await? {
            StoreReply::Keys(keys) => Ok(keys),
            other => Err(StoreError::Protocol(format!("unexpected reply {other:?}"))),
        }
    }
}

/// Serve a [`DocumentStore`] to one client connection until it closes.
///
/// # Errors
///
/// Returns a [`StoreError`] on transport failure; a clean client close
/// returns `Ok(())`.
pub async fn serve<S: AsyncRead + AsyncWrite + Send + 'static>(
    stream: S,
    store: Arc<dyn DocumentStore>,
) -> StoreResult<()> {
    let (mut read_half, mut write_half) = tokio::io::split(stream);

    while let Some(payload) = read_frame(&mut read_half).await? {
        let response = match decode_request(payload) {
            Ok(StoreRequest { id, op }) => {
                let reply = match op {
                    StoreOp::Put { key, meta, body } => {
                        match store.put_document(&key, &meta, &body).await {
                            Ok(()) => StoreReply::Ack,
                            Err(e) => StoreReply::Error(e.to_string()),
                        }
                    }
                    StoreOp::Get { key } => match store.get_document(&key).await {
                        Ok(Some(doc)) => StoreReply::Document {
                            meta: doc.meta,
                            body: doc.body,
                        },
                        Ok(None) => StoreReply::NotFound,
                        Err(e) => StoreReply::Error(e.to_string()),
                    },
                    StoreOp::Delete { key } => match store.delete_document(&key).await {
                        Ok(existed) => StoreReply::Deleted(existed),
                        Err(e) => StoreReply::Error(e.to_string()),
                    },
                    StoreOp::List => match store.list_documents().await {
                        Ok(keys) => StoreReply::Keys(keys),
                        Err(e) => StoreReply::Error(e.to_string()),
                    },
                };
                StoreResponse { id, reply }
            }
            Err(e) => {
                warn!(error = %e, "malformed store request");
                return Err(e);
            }
        };
        write_frame(&mut write_half, &encode_response(&response)).await?;
    }
    Ok(())
}
