//! Latest-wins stream sampling

use futures::Stream;
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior, interval};

/// Extension trait adding latest-wins sampling to any Stream
pub trait SampleExt: Stream {
    /// Emit at most one item per `period`.
    ///
    /// Items arriving between ticks replace each other; only the newest is
    /// emitted. Nothing is emitted for a tick with no new item, so a stalled
    /// source produces no duplicates.
    fn sample_latest(self, period: Duration) -> SampleLatest<Self>
    where
        Self: Sized,
    {
        SampleLatest::new(self, period)
    }
}

impl<T: Stream> SampleExt for T {}

pin_project! {
    /// Stream combinator returned by [`SampleExt::sample_latest`]
    pub struct SampleLatest<S: Stream> {
        #[pin]
        stream: S,
        interval: Interval,
        latest: Option<S::Item>,
        coalesced: u64,
        done: bool,
    }
}

impl<S: Stream> SampleLatest<S> {
    /// Wrap `stream`, emitting at most once per `period`
    pub fn new(stream: S, period: Duration) -> Self {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self { stream, interval, latest: None, coalesced: 0, done: false }
    }

    /// Number of items replaced before they could be emitted
    pub fn coalesced(&self) -> u64 {
        self.coalesced
    }
}

impl<S: Stream> Stream for SampleLatest<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        if !*this.done {
            loop {
                match this.stream.as_mut().poll_next(cx) {
                    Poll::Ready(Some(item)) => {
                        if this.latest.replace(item).is_some() {
                            *this.coalesced += 1;
                        }
                    }
                    Poll::Ready(None) => {
                        *this.done = true;
                        break;
                    }
                    Poll::Pending => break,
                }
            }
        }

        // Flush the final item without waiting for a tick
        if *this.done {
            return Poll::Ready(this.latest.take());
        }

        // Inner stream has registered the waker
        if this.latest.is_none() {
            return Poll::Pending;
        }

        match this.interval.poll_tick(cx) {
            Poll::Ready(_) => Poll::Ready(this.latest.take()),
            Poll::Pending => Poll::Pending,
        }
    }
}
