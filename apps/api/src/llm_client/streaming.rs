//! Fragment relay for streaming completions.
//!
//! Whatever produces the fragments (an SSE body, a test fixture), the caller sees
//! the same channel contract: fragments in upstream order, then exactly one
//! `Done` on success, or one `Failed` and no `Done` on error.

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::LlmError;

/// One event on a streaming completion channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// An incremental piece of text, exactly as the upstream produced it.
    Fragment(String),
    /// Terminal marker carrying the full reassembled text.
    Done { full_text: String },
    /// The stream failed; no `Done` follows.
    Failed(String),
}

/// Drains `fragments` into `tx`, accumulating the full text.
///
/// Empty fragments are skipped. If the receiver goes away the relay stops
/// forwarding and returns `ChannelClosed`.
pub async fn relay_fragments<S>(
    fragments: S,
    tx: &mpsc::Sender<StreamEvent>,
) -> Result<String, LlmError>
where
    S: Stream<Item = Result<String, LlmError>>,
{
    let mut fragments = std::pin::pin!(fragments);
    let mut full_text = String::new();
    let mut count = 0usize;

    while let Some(item) = fragments.next().await {
        match item {
            Ok(fragment) => {
                if fragment.is_empty() {
                    continue;
                }
                full_text.push_str(&fragment);
                count += 1;
                if tx.send(StreamEvent::Fragment(fragment)).await.is_err() {
                    debug!("Stream receiver dropped after {count} fragments; stopping relay");
                    return Err(LlmError::ChannelClosed);
                }
            }
            Err(e) => {
                warn!("Completion stream failed after {count} fragments: {e}");
                let _ = tx.send(StreamEvent::Failed(e.to_string())).await;
                return Err(e);
            }
        }
    }

    debug!(
        "Completion stream finished: {count} fragments, {} chars",
        full_text.len()
    );

    tx.send(StreamEvent::Done {
        full_text: full_text.clone(),
    })
    .await
    .map_err(|_| LlmError::ChannelClosed)?;

    Ok(full_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    async fn drain(mut rx: mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    fn ok_fragments(parts: &[&str]) -> Vec<Result<String, LlmError>> {
        parts.iter().map(|p| Ok(p.to_string())).collect()
    }

    #[tokio::test]
    async fn test_fragments_then_single_done() {
        let (tx, rx) = mpsc::channel(16);
        let full = relay_fragments(stream::iter(ok_fragments(&["Opt", "imized bullet"])), &tx)
            .await
            .unwrap();
        drop(tx);

        assert_eq!(full, "Optimized bullet");
        assert_eq!(
            drain(rx).await,
            vec![
                StreamEvent::Fragment("Opt".to_string()),
                StreamEvent::Fragment("imized bullet".to_string()),
                StreamEvent::Done {
                    full_text: "Optimized bullet".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_concatenated_fragments_equal_done_text() {
        let parts = ["- Led ", "migration", "", " to Rust\n", "- Cut p99 ", "by 40%"];
        let (tx, rx) = mpsc::channel(2);
        let consumer = tokio::spawn(drain(rx));

        relay_fragments(stream::iter(ok_fragments(&parts)), &tx)
            .await
            .unwrap();
        drop(tx);
        let events = consumer.await.unwrap();

        let mut forwarded = String::new();
        let mut done_count = 0;
        for event in &events {
            match event {
                StreamEvent::Fragment(f) => {
                    assert!(!f.is_empty());
                    forwarded.push_str(f);
                }
                StreamEvent::Done { full_text } => {
                    done_count += 1;
                    assert_eq!(full_text, &forwarded);
                }
                StreamEvent::Failed(_) => panic!("unexpected failure"),
            }
        }
        assert_eq!(done_count, 1);
        assert!(matches!(events.last(), Some(StreamEvent::Done { .. })));
    }

    #[tokio::test]
    async fn test_mid_stream_error_emits_failed_and_no_done() {
        let items = vec![
            Ok("partial".to_string()),
            Err(LlmError::Stream("connection reset".to_string())),
            Ok("never seen".to_string()),
        ];
        let (tx, rx) = mpsc::channel(16);
        let result = relay_fragments(stream::iter(items), &tx).await;
        drop(tx);

        assert!(matches!(result, Err(LlmError::Stream(_))));
        let events = drain(rx).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], StreamEvent::Fragment("partial".to_string()));
        assert!(matches!(&events[1], StreamEvent::Failed(msg) if msg.contains("connection reset")));
    }

    #[tokio::test]
    async fn test_closed_receiver_stops_forwarding() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let result = relay_fragments(stream::iter(ok_fragments(&["a", "b"])), &tx).await;
        assert!(matches!(result, Err(LlmError::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_empty_stream_still_terminates() {
        let (tx, rx) = mpsc::channel(4);
        let full = relay_fragments(stream::iter(ok_fragments(&[])), &tx)
            .await
            .unwrap();
        drop(tx);
        assert_eq!(full, "");
        assert_eq!(
            drain(rx).await,
            vec![StreamEvent::Done {
                full_text: String::new()
            }]
        );
    }
}
