//! Pass-through chat stream that stores the assembled answer once the
//! upstream is exhausted.

use crate::cache::CacheWriter;
use crate::types::{CanonicalAnswer, ChatCompletionChunk, ChatStream};
use crate::Result;
use futures::future::BoxFuture;
use futures::{ready, Stream};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Wraps a live chat stream.
///
/// Every chunk is yielded as soon as the upstream produces it, unchanged.
/// The first choice's delta text is appended to a buffer on the way through.
/// When the upstream ends, the buffer is stored through the [`CacheWriter`]
/// before the end of stream is reported.
///
/// Dropping the stream before the end stores nothing, and neither does a
/// stream that produced an error item. Single pass: once finished it stays
/// finished.
pub struct CacheWritingStream {
    inner: ChatStream,
    buffer: String,
    writer: Option<CacheWriter>,
    flush: Option<BoxFuture<'static, ()>>,
    failed: bool,
    finished: bool,
}

impl CacheWritingStream {
    pub fn new(inner: ChatStream, writer: CacheWriter) -> Self {
        Self {
            inner,
            buffer: String::new(),
            writer: Some(writer),
            flush: None,
            failed: false,
            finished: false,
        }
    }

    /// Text seen so far.
    pub fn accumulated(&self) -> &str {
        &self.buffer
    }
}

impl Stream for CacheWritingStream {
    type Item = Result<ChatCompletionChunk>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(flush) = this.flush.as_mut() {
                ready!(flush.as_mut().poll(cx));
                this.flush = None;
                this.finished = true;
            }
            if this.finished {
                return Poll::Ready(None);
            }

            match ready!(this.inner.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) => {
                    this.buffer.push_str(chunk.delta_content());
                    return Poll::Ready(Some(Ok(chunk)));
                }
                Some(Err(e)) => {
                    this.failed = true;
                    return Poll::Ready(Some(Err(e)));
                }
                None => match this.writer.take() {
                    Some(writer) if !this.failed => {
                        let text = std::mem::take(&mut this.buffer);
                        tracing::debug!(chars = text.len(), "stream exhausted, storing answer");
                        this.flush = Some(Box::pin(writer.save(CanonicalAnswer::text(text))));
                    }
                    _ => this.finished = true,
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, CacheCore, ExactMatchCache};
    use futures::StreamExt;
    use serde_json::json;
    use std::sync::Arc;

    fn chunk(text: &str) -> ChatCompletionChunk {
        serde_json::from_value(json!({
            "object": "chat.completion.chunk",
            "created": 1,
            "choices": [{"index": 0, "delta": {"content": text}, "finish_reason": null}]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn accumulates_while_forwarding() {
        let cache = Arc::new(ExactMatchCache::in_memory(CacheConfig::default(), 4));
        let req = json!({"k": 1});
        let inner: ChatStream = Box::pin(futures::stream::iter(
            vec![chunk("a"), chunk("b")].into_iter().map(Ok),
        ));
        let mut s = CacheWritingStream::new(inner, CacheWriter::new(cache.clone(), req.clone()));
        assert_eq!(s.next().await.unwrap().unwrap(), chunk("a"));
        assert_eq!(s.accumulated(), "a");
        assert_eq!(s.next().await.unwrap().unwrap(), chunk("b"));
        assert_eq!(cache.search(&req).await.unwrap(), None);
        assert!(s.next().await.is_none());
        assert!(s.next().await.is_none());
        assert_eq!(
            cache.search(&req).await.unwrap(),
            Some(CanonicalAnswer::text("ab"))
        );
    }
}
