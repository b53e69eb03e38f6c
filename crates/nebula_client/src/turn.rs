//! One turn of a conversation: consuming the event stream and accumulating
//! its result.
//!
//! The driver reads the transport's byte stream line by line as it arrives.
//! Identifiers observed mid-stream stay in an in-flight [`TurnIds`] pair and
//! reach the persistent [`ConversationState`](crate::ConversationState) only
//! after the stream closes normally; any earlier termination discards them
//! along with the accumulated text.

use std::io;

use bytes::Bytes;
use futures_util::Stream;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::io::StreamReader;

use crate::error::{ClientError, Result};
use crate::sse::{EventDecoder, StreamEvent};

/// Incremental notification delivered while a turn is streaming, in arrival
/// order, at most once per decoded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnUpdate {
    Status(String),
    Chunk(String),
}

/// Outcome of a completed turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnResult {
    /// Concatenated assistant text, in chunk arrival order.
    pub response: String,
    /// Status notices, in arrival order.
    pub status_updates: Vec<String>,
    pub conversation_id: Option<String>,
    pub segment_id: Option<String>,
}

/// Identifiers observed during one turn, not yet committed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct TurnIds {
    pub(crate) conversation_id: Option<String>,
    pub(crate) segment_id: Option<String>,
}

/// Consume a raw SSE byte stream to completion.
///
/// Returns the accumulated result together with the in-flight ids once the
/// stream closes normally. A transport error mid-stream surfaces as
/// [`ClientError::Stream`]; whatever was accumulated up to that point is
/// dropped with it.
pub(crate) async fn consume_stream<S>(
    byte_stream: S,
    updates: Option<&mpsc::Sender<TurnUpdate>>,
) -> Result<(TurnResult, TurnIds)>
where
    S: Stream<Item = io::Result<Bytes>> + Unpin,
{
    let reader = BufReader::new(StreamReader::new(byte_stream));
    let mut lines = reader.lines();

    let mut decoder = EventDecoder::new();
    let mut result = TurnResult::default();
    let mut ids = TurnIds::default();

    while let Some(line) = lines.next_line().await.map_err(ClientError::Stream)? {
        let Some(event) = decoder.decode_line(&line) else {
            continue;
        };
        match event {
            StreamEvent::ConversationIds {
                conversation_id,
                segment_id,
            } => {
                if let Some(id) = conversation_id {
                    ids.conversation_id = Some(id);
                }
                if let Some(id) = segment_id {
                    ids.segment_id = Some(id);
                }
            }
            StreamEvent::Status(text) => {
                result.status_updates.push(text.clone());
                notify(updates, TurnUpdate::Status(text)).await;
            }
            StreamEvent::Chunk(text) => {
                result.response.push_str(&text);
                notify(updates, TurnUpdate::Chunk(text)).await;
            }
        }
    }

    result.conversation_id = ids.conversation_id.clone();
    result.segment_id = ids.segment_id.clone();
    Ok((result, ids))
}

async fn notify(updates: Option<&mpsc::Sender<TurnUpdate>>, update: TurnUpdate) {
    if let Some(tx) = updates {
        // A consumer that went away must not stall or fail the turn.
        let _ = tx.send(update).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use futures_util::stream;

    fn chunks(parts: &[&str]) -> Vec<io::Result<Bytes>> {
        parts
            .iter()
            .map(|part| Ok(Bytes::from(part.to_string())))
            .collect()
    }

    #[tokio::test]
    async fn accumulates_status_and_chunks_from_a_well_formed_stream() {
        let body = "event: step-update\n\
                    data: VGhpbmtpbmc=\n\
                    \n\
                    event: response-updated\n\
                    data: SGVsbG8=\n\
                    \n";
        let (result, _) = consume_stream(stream::iter(chunks(&[body])), None)
            .await
            .unwrap();

        assert_eq!(result.response, "Hello");
        assert_eq!(result.status_updates, vec!["Thinking".to_string()]);
    }

    #[tokio::test]
    async fn lines_split_across_transport_chunks_are_reassembled() {
        let payload = STANDARD.encode("spread out");
        let (front, back) = payload.split_at(4);
        let parts = [
            "event: response-".to_string(),
            "updated\ndata: ".to_string(),
            front.to_string(),
            format!("{back}\n"),
        ];
        let parts: Vec<io::Result<Bytes>> = parts
            .into_iter()
            .map(|part| Ok(Bytes::from(part)))
            .collect();

        let (result, _) = consume_stream(stream::iter(parts), None).await.unwrap();
        assert_eq!(result.response, "spread out");
    }

    #[tokio::test]
    async fn records_in_flight_ids_without_committing_them() {
        let payload =
            STANDARD.encode(r#"{"ConversationId":"conv-1","ConversationSegmentId":"seg-1"}"#);
        let body = format!("event: conversation-and-segment-id\ndata: {payload}\n\n");
        let (result, ids) = consume_stream(stream::iter(chunks(&[&body])), None)
            .await
            .unwrap();

        assert_eq!(ids.conversation_id.as_deref(), Some("conv-1"));
        assert_eq!(ids.segment_id.as_deref(), Some("seg-1"));
        assert_eq!(result.conversation_id.as_deref(), Some("conv-1"));
        assert_eq!(result.segment_id.as_deref(), Some("seg-1"));
    }

    #[tokio::test]
    async fn mid_stream_error_discards_the_accumulation() {
        let parts: Vec<io::Result<Bytes>> = vec![
            Ok(Bytes::from_static(
                b"event: response-updated\ndata: SGVsbG8=\n",
            )),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "dropped")),
        ];

        let err = consume_stream(stream::iter(parts), None).await.unwrap_err();
        assert!(matches!(err, ClientError::Stream(_)));
    }

    #[tokio::test]
    async fn updates_are_delivered_in_arrival_order() {
        let body = format!(
            "event: step-update\ndata: {}\nevent: response-updated\ndata: {}\ndata: {}\n",
            STANDARD.encode("working"),
            STANDARD.encode("one "),
            STANDARD.encode("two"),
        );
        let (tx, mut rx) = mpsc::channel(8);

        let (result, _) = consume_stream(stream::iter(chunks(&[&body])), Some(&tx))
            .await
            .unwrap();
        drop(tx);

        let mut seen = Vec::new();
        while let Some(update) = rx.recv().await {
            seen.push(update);
        }
        assert_eq!(
            seen,
            vec![
                TurnUpdate::Status("working".to_string()),
                TurnUpdate::Chunk("one ".to_string()),
                TurnUpdate::Chunk("two".to_string()),
            ]
        );
        assert_eq!(result.response, "one two");
    }

    #[tokio::test]
    async fn dropped_update_receiver_does_not_fail_the_turn() {
        let body = format!(
            "event: response-updated\ndata: {}\n",
            STANDARD.encode("still here")
        );
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let (result, _) = consume_stream(stream::iter(chunks(&[&body])), Some(&tx))
            .await
            .unwrap();
        assert_eq!(result.response, "still here");
    }
}
