//! Frame streams built from the hand-off slot

mod sampler;

pub use sampler::{SampleExt, SampleLatest};

use futures::StreamExt;
use futures::stream::BoxStream;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::types::{Frame, UpdateRate};

/// Stream of published frames at `rate`.
///
/// Starts with the current frame, if any. The watch slot already coalesces
/// frames a slow consumer could not take; `rate` bounds how often the
/// consumer is woken. Ends when the ingest task exits.
pub fn frame_stream(
    receiver: watch::Receiver<Option<Arc<Frame>>>,
    rate: UpdateRate,
    source_hz: f64,
) -> BoxStream<'static, Arc<Frame>> {
    let frames = WatchStream::new(receiver).filter_map(|slot| async move { slot });

    match rate.sample_interval(source_hz) {
        Some(period) => frames.sample_latest(period).boxed(),
        None => frames.boxed(),
    }
}
