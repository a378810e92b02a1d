use std::pin::Pin;

use tokio::io::{AsyncRead, AsyncWrite};

/// Readable half of an RPC byte stream.
pub type BoxedReader = Pin<Box<dyn AsyncRead + Send>>;

/// Writable half of an RPC byte stream.
pub type BoxedWriter = Pin<Box<dyn AsyncWrite + Send>>;

/// A connected readable/writable pair, ready to be attached to a session.
///
/// The two halves are independent: the session reads on one task and
/// writes on another, so they must be owned separately.
pub struct StreamPair {
    pub reader: BoxedReader,
    pub writer: BoxedWriter,
}

impl StreamPair {
    /// Pair up two independent halves (e.g. a child's stdout and stdin).
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + 'static,
        W: AsyncWrite + Send + 'static,
    {
        Self {
            reader: Box::pin(reader),
            writer: Box::pin(writer),
        }
    }

    /// Consume the pair into its halves.
    pub fn into_parts(self) -> (BoxedReader, BoxedWriter) {
        (self.reader, self.writer)
    }
}

impl std::fmt::Debug for StreamPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamPair").finish_non_exhaustive()
    }
}

/// Split any duplex stream (socket, in-memory pipe) into a [`StreamPair`].
pub fn split<S>(stream: S) -> StreamPair
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = tokio::io::split(stream);
    StreamPair::new(reader, writer)
}
