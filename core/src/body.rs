//! Payload abstractions consumed by signers.
//!
//! A payload may be read more than once: checksumming reads it a first time
//! and the transport (or a chunk encoder) reads it again. Both traits are
//! therefore factories that hand out a fresh stream on every call.

use std::io;
use std::io::Cursor;
use std::io::Read;
use std::sync::Arc;

use bytes::Bytes;
use futures::stream;
use futures::stream::BoxStream;
use futures::StreamExt;

/// A boxed blocking reader over a payload.
pub type PayloadReader = Box<dyn Read + Send>;

/// A boxed async stream over a payload.
pub type PayloadStream = BoxStream<'static, io::Result<Bytes>>;

/// Hands out fresh blocking readers over the same content.
pub trait ContentStreamProvider: Send + Sync {
    /// Open a new stream positioned at the start of the content.
    fn new_stream(&self) -> io::Result<PayloadReader>;
}

/// Hands out fresh async streams over the same content.
pub trait AsyncContentStreamProvider: Send + Sync {
    /// Open a new stream positioned at the start of the content.
    fn new_stream(&self) -> PayloadStream;
}

impl ContentStreamProvider for Bytes {
    fn new_stream(&self) -> io::Result<PayloadReader> {
        Ok(Box::new(Cursor::new(self.clone())))
    }
}

impl ContentStreamProvider for Vec<u8> {
    fn new_stream(&self) -> io::Result<PayloadReader> {
        Ok(Box::new(Cursor::new(Bytes::copy_from_slice(self))))
    }
}

impl ContentStreamProvider for String {
    fn new_stream(&self) -> io::Result<PayloadReader> {
        Ok(Box::new(Cursor::new(Bytes::copy_from_slice(
            self.as_bytes(),
        ))))
    }
}

impl ContentStreamProvider for &'static str {
    fn new_stream(&self) -> io::Result<PayloadReader> {
        let content: &'static str = self;
        Ok(Box::new(Cursor::new(Bytes::from_static(content.as_bytes()))))
    }
}

impl<T: ContentStreamProvider + ?Sized> ContentStreamProvider for Arc<T> {
    fn new_stream(&self) -> io::Result<PayloadReader> {
        (**self).new_stream()
    }
}

impl AsyncContentStreamProvider for Bytes {
    fn new_stream(&self) -> PayloadStream {
        stream::once(futures::future::ready(Ok(self.clone()))).boxed()
    }
}

impl<T: AsyncContentStreamProvider + ?Sized> AsyncContentStreamProvider for Arc<T> {
    fn new_stream(&self) -> PayloadStream {
        (**self).new_stream()
    }
}

/// An async provider backed by a list of chunks, replayed on every call.
#[derive(Debug, Clone, Default)]
pub struct ChunkedBytes(Vec<Bytes>);

impl ChunkedBytes {
    /// Create a provider that yields the given chunks in order.
    pub fn new(chunks: impl IntoIterator<Item = Bytes>) -> Self {
        Self(chunks.into_iter().collect())
    }
}

impl AsyncContentStreamProvider for ChunkedBytes {
    fn new_stream(&self) -> PayloadStream {
        stream::iter(self.0.clone().into_iter().map(Ok)).boxed()
    }
}

/// Read the whole content of a provider into memory.
pub fn read_to_vec(provider: &dyn ContentStreamProvider) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    provider.new_stream()?.read_to_end(&mut buf)?;
    Ok(buf)
}
