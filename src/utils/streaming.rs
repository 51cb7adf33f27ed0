//! Async bridge between a transport byte stream and the canonical events.
//!
//! The adapters themselves are synchronous state machines; this module is
//! the one async surface, letting a transport collaborator hand over any
//! `futures::Stream` of text chunks and consume canonical events as a
//! stream. The engine stays single-threaded: the context is moved into the
//! stream and mutated only between polls.

use crate::context::RequestContext;
use crate::providers::ProviderAdapter;
use crate::stream::StreamEvent;
use futures::Stream;
use futures_util::StreamExt;
use std::pin::Pin;

/// Canonical event stream
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Drive an adapter from a stream of raw text chunks.
///
/// Chunks are fed in arrival order; the adapter's framing buffers absorb any
/// chunk boundary. Dropping the returned stream cancels normalization with no
/// further cleanup, per the engine's cancellation contract.
pub fn normalize_chunks<S>(
    adapter: ProviderAdapter,
    mut ctx: RequestContext,
    chunks: S,
) -> EventStream
where
    S: Stream<Item = String> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        futures_util::pin_mut!(chunks);
        while let Some(chunk) = chunks.next().await {
            for event in adapter.feed(&mut ctx, &chunk) {
                yield event;
            }
        }
    })
}
