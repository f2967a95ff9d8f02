use bytes::Buf;
use hyper::body::Body;
use pin_project_lite::pin_project;
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

pin_project! {
    /// Collects every data frame of a body into a single buffer, skipping trailers.
    pub struct DrainBodyFuture<B: Body> {
        #[pin]
        body: B,
        buf: Vec<u8>
    }
}

impl<B> DrainBodyFuture<B>
where
    B: Body,
{
    /// `content_length` is only a capacity hint, bodies longer than it still drain fully.
    #[inline]
    #[must_use]
    pub fn new_trusted_length(body: B, content_length: usize) -> Self {
        Self {
            body,
            buf: Vec::with_capacity(content_length),
        }
    }
}

impl<B> Future for DrainBodyFuture<B>
where
    B: Body,
    B::Error: Display,
{
    type Output = Result<Vec<u8>, anyhow::Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slf = self.project();
        loop {
            if slf.body.is_end_stream() {
                return Poll::Ready(Ok(std::mem::take(slf.buf)));
            }
            let Some(next_res) = std::task::ready!(slf.body.as_mut().poll_frame(cx)) else {
                return Poll::Ready(Ok(std::mem::take(slf.buf)));
            };
            let frame = match next_res {
                Ok(frame) => frame,
                Err(e) => {
                    return Poll::Ready(Err(anyhow::anyhow!("Failed to poll next frame: {e}")));
                }
            };
            // Trailers carry no payload
            let Ok(mut data) = frame.into_data() else {
                continue;
            };
            while data.has_remaining() {
                let chunk = data.chunk();
                let len = chunk.len();
                slf.buf.extend_from_slice(chunk);
                data.advance(len);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DrainBodyFuture;
    use crate::{byte_body, empty_body};

    #[tokio::test]
    async fn drains_full_body() {
        let body = byte_body(&b"xx: hello"[..]);
        let out = DrainBodyFuture::new_trusted_length(body, 2).await.unwrap();
        assert_eq!(b"xx: hello".as_slice(), out.as_slice());
    }

    #[tokio::test]
    async fn drains_empty_body() {
        let out = DrainBodyFuture::new_trusted_length(empty_body(), 16)
            .await
            .unwrap();
        assert!(out.is_empty());
    }
}
