use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::BytesMut;
use futures::future::BoxFuture;
use gcsblob_core::StorageResult;
use tokio::io::AsyncWrite;

use crate::blob::Blob;

enum WriteState {
    Open(BytesMut),
    Uploading(BoxFuture<'static, StorageResult<()>>),
    Closed,
}

/// Buffers written bytes in memory and uploads them to the blob once.
///
/// The upload happens on the first [`close`](BlobWriter::close) or
/// `shutdown`. Later closes are no-ops. A writer dropped while still open
/// hands its buffer to the current tokio runtime for upload.
pub struct BlobWriter {
    blob: Blob,
    state: WriteState,
}

impl BlobWriter {
    pub(crate) fn new(blob: Blob) -> Self {
        Self {
            blob,
            state: WriteState::Open(BytesMut::new()),
        }
    }

    pub fn blob(&self) -> &Blob {
        &self.blob
    }

    /// Bytes buffered so far. Zero once the writer has started uploading.
    pub fn len(&self) -> usize {
        match &self.state {
            WriteState::Open(buf) => buf.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        !matches!(self.state, WriteState::Open(_))
    }

    /// Commit the buffered bytes. Only the first call uploads.
    ///
    /// A cancelled close leaves the upload in flight; the next close or the
    /// drop picks it up again.
    pub async fn close(&mut self) -> StorageResult<()> {
        std::future::poll_fn(|cx| self.poll_close(cx)).await
    }

    fn poll_close(&mut self, cx: &mut Context<'_>) -> Poll<StorageResult<()>> {
        loop {
            match &mut self.state {
                WriteState::Open(buf) => {
                    let buf = std::mem::take(buf);
                    self.state = WriteState::Uploading(self.start_upload(buf));
                }
                WriteState::Uploading(upload) => {
                    let result = ready!(upload.as_mut().poll(cx));
                    self.state = WriteState::Closed;
                    return Poll::Ready(result);
                }
                WriteState::Closed => return Poll::Ready(Ok(())),
            }
        }
    }

    fn start_upload(&self, buf: BytesMut) -> BoxFuture<'static, StorageResult<()>> {
        let blob = self.blob.clone();
        let data = buf.freeze();
        Box::pin(async move { blob.write(data).await })
    }
}

impl AsyncWrite for BlobWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut self.get_mut().state {
            WriteState::Open(buf) => {
                buf.extend_from_slice(data);
                Poll::Ready(Ok(data.len()))
            }
            _ => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "blob writer is closed",
            ))),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().poll_close(cx).map_err(io::Error::other)
    }
}

impl Drop for BlobWriter {
    fn drop(&mut self) {
        let pending = match std::mem::replace(&mut self.state, WriteState::Closed) {
            WriteState::Open(buf) => self.start_upload(buf),
            WriteState::Uploading(upload) => upload,
            WriteState::Closed => return,
        };

        let object = self.blob.object_name().to_string();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = pending.await {
                        tracing::warn!("upload of dropped writer for {object} failed: {e}");
                    }
                });
            }
            Err(_) => {
                tracing::warn!(
                    "blob writer for {object} dropped outside a tokio runtime; buffered bytes discarded"
                );
            }
        }
    }
}
