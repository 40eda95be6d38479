//! Idle read timeout for WebSocket streams.
//!
//! A feed that silently stops delivering frames never produces an explicit error, so the
//! read half of every session is wrapped in a [`TimeoutStream`] which ends the stream
//! once no item has been received for the configured period.

use futures::Stream;
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use tokio::time::{Instant, Sleep};

/// Default read timeout for feed sessions (2 minutes).
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(120);

/// Stream wrapper that terminates the inner stream after an idle period.
///
/// With no timeout configured it is a transparent pass-through.
#[derive(Debug)]
pub struct TimeoutStream<S> {
    inner: S,
    timeout: Option<Duration>,
    deadline: Option<Pin<Box<Sleep>>>,
    timed_out: bool,
}

impl<S> TimeoutStream<S> {
    pub fn new(inner: S, timeout: Option<Duration>) -> Self {
        Self {
            inner,
            timeout,
            deadline: timeout.map(|duration| Box::pin(tokio::time::sleep(duration))),
            timed_out: false,
        }
    }

    /// True once the stream was ended by the idle timeout rather than by the inner stream.
    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl<S> Stream for TimeoutStream<S>
where
    S: Stream + Unpin,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.timed_out {
            return Poll::Ready(None);
        }

        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(item)) => {
                if let (Some(deadline), Some(timeout)) = (this.deadline.as_mut(), this.timeout) {
                    deadline.as_mut().reset(Instant::now() + timeout);
                }
                Poll::Ready(Some(item))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => match this.deadline.as_mut() {
                Some(deadline) => match deadline.as_mut().poll(cx) {
                    Poll::Ready(()) => {
                        tracing::warn!(
                            timeout_secs = this.timeout.map(|t| t.as_secs()).unwrap_or_default(),
                            "feed read timeout - no data received, ending session"
                        );
                        this.timed_out = true;
                        Poll::Ready(None)
                    }
                    Poll::Pending => Poll::Pending,
                },
                None => Poll::Pending,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{stream, StreamExt};

    #[tokio::test(start_paused = true)]
    async fn test_idle_stream_times_out() {
        let mut stream = TimeoutStream::new(stream::pending::<u8>(), Some(Duration::from_secs(5)));

        assert_eq!(stream.next().await, None);
        assert!(stream.timed_out());
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_items_pass_through() {
        let mut stream = TimeoutStream::new(stream::iter(vec![1, 2]), Some(Duration::from_secs(5)));

        assert_eq!(stream.next().await, Some(1));
        assert_eq!(stream.next().await, Some(2));
        assert_eq!(stream.next().await, None);
        assert!(!stream.timed_out());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_timeout_configured() {
        let mut stream = TimeoutStream::new(stream::pending::<u8>(), None);

        let result = tokio::time::timeout(Duration::from_secs(3600), stream.next()).await;
        assert!(result.is_err());
        assert!(!stream.timed_out());
    }
}
