//! Streaming relay of upstream response bodies.

use crate::error::BoxError;
use bytes::Buf;
use http_body::{Body, Frame, SizeHint};
use pin_project_lite::pin_project;
use std::{
    fmt,
    pin::Pin,
    task::{Context, Poll, ready},
};

pin_project! {
    /// Upstream response body on its way to the client.
    ///
    /// Frames are passed on one by one, as soon as they arrive,
    /// which keeps event streams flowing. A relay cut short,
    /// by an upstream failure or by the client going away,
    /// is logged together with the number of bytes relayed so far.
    pub struct RelayBody<B> {
        #[pin]
        inner: B,
        relayed: u64,
        done: bool,
    }

    impl<B> PinnedDrop for RelayBody<B> {
        fn drop(this: Pin<&mut Self>) {
            let this = this.project();
            if !*this.done {
                tracing::debug!(
                    relayed_bytes = *this.relayed,
                    "response relay stopped before the upstream body ended"
                );
            }
        }
    }
}

impl<B: Body> RelayBody<B> {
    /// Wrap an upstream body.
    ///
    /// A body without payload, e.g. the answer to a `HEAD`
    /// or a `204`, counts as relayed from the start.
    pub fn new(inner: B) -> Self {
        let done = inner.is_end_stream();
        Self {
            inner,
            relayed: 0,
            done,
        }
    }
}

impl<B> RelayBody<B> {
    /// Payload bytes passed on so far.
    pub fn relayed(&self) -> u64 {
        self.relayed
    }
}

impl<B> fmt::Debug for RelayBody<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayBody")
            .field("relayed", &self.relayed)
            .field("done", &self.done)
            .finish()
    }
}

impl<B> Body for RelayBody<B>
where
    B: Body<Error: Into<BoxError>>,
{
    type Data = B::Data;
    type Error = StreamRelayError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let mut this = self.project();
        if *this.done {
            return Poll::Ready(None);
        }

        match ready!(this.inner.as_mut().poll_frame(cx)) {
            Some(Ok(frame)) => {
                if let Some(data) = frame.data_ref() {
                    *this.relayed += data.remaining() as u64;
                }
                *this.done = this.inner.is_end_stream();
                Poll::Ready(Some(Ok(frame)))
            }
            Some(Err(err)) => {
                *this.done = true;
                let err = StreamRelayError {
                    relayed: *this.relayed,
                    source: err.into(),
                };
                tracing::debug!(relayed_bytes = err.relayed, "response relay failed: {err}");
                Poll::Ready(Some(Err(err)))
            }
            None => {
                *this.done = true;
                tracing::trace!(relayed_bytes = *this.relayed, "response relay complete");
                Poll::Ready(None)
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.done || self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

#[derive(Debug)]
/// The upstream response body broke off mid-relay.
///
/// Status and headers are out by then,
/// so the client only observes a truncated body.
pub struct StreamRelayError {
    relayed: u64,
    source: BoxError,
}

impl StreamRelayError {
    /// Payload bytes passed on before the failure.
    #[must_use]
    pub fn relayed(&self) -> u64 {
        self.relayed
    }
}

impl fmt::Display for StreamRelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "relay response body after {} bytes", self.relayed)
    }
}

impl std::error::Error for StreamRelayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::{BodyExt, Empty, Full, StreamBody};
    use std::convert::Infallible;
    use tokio_stream::iter;

    #[tokio::test]
    async fn test_relay_counts_bytes() {
        let mut body = RelayBody::new(Full::new(Bytes::from_static(b"hello world")));
        assert_eq!(body.size_hint().exact(), Some(11));

        let frame = body.frame().await.unwrap().unwrap();
        assert_eq!(frame.into_data().unwrap(), "hello world");
        assert!(body.frame().await.is_none());
        assert_eq!(body.relayed(), 11);
        assert!(body.is_end_stream());
    }

    #[tokio::test]
    async fn test_relay_keeps_frame_boundaries() {
        let chunks: Vec<Result<Frame<Bytes>, Infallible>> = vec![
            Ok(Frame::data(Bytes::from_static(b"data: one\n\n"))),
            Ok(Frame::data(Bytes::from_static(b"data: two\n\n"))),
        ];
        let mut body = RelayBody::new(StreamBody::new(iter(chunks)));

        for expected in ["data: one\n\n", "data: two\n\n"] {
            let frame = body.frame().await.unwrap().unwrap();
            assert_eq!(frame.into_data().unwrap(), expected);
        }
        assert!(body.frame().await.is_none());
        assert_eq!(body.relayed(), 22);
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_relay_empty_body_dropped_unpolled() {
        let body = RelayBody::new(Empty::<Bytes>::new());
        assert!(body.is_end_stream());
        drop(body);
        assert!(!logs_contain("response relay stopped"));
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_relay_dropped_midway() {
        let chunks: Vec<Result<Frame<Bytes>, Infallible>> = vec![
            Ok(Frame::data(Bytes::from_static(b"data: one\n\n"))),
            Ok(Frame::data(Bytes::from_static(b"data: two\n\n"))),
        ];
        let mut body = RelayBody::new(StreamBody::new(iter(chunks)));
        body.frame().await.unwrap().unwrap();
        drop(body);
        assert!(logs_contain("response relay stopped"));
    }

    #[tokio::test]
    async fn test_relay_error_after_partial_body() {
        let chunks: Vec<Result<Frame<Bytes>, std::io::Error>> = vec![
            Ok(Frame::data(Bytes::from_static(b"partial"))),
            Err(std::io::Error::from(std::io::ErrorKind::ConnectionReset)),
        ];
        let mut body = RelayBody::new(StreamBody::new(iter(chunks)));

        body.frame().await.unwrap().unwrap();
        let err = body.frame().await.unwrap().unwrap_err();
        assert_eq!(err.relayed(), 7);
        assert_eq!(err.to_string(), "relay response body after 7 bytes");
        assert!(body.frame().await.is_none());
    }
}
