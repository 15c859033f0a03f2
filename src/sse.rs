//! Server-Sent Events (SSE) processing for streaming responses.
//!
//! This module turns the raw byte stream of a `streamGenerateContent?alt=sse` response into
//! parsed [`GenerateContentResponse`] chunks.  Bytes are buffered until a blank line closes an
//! event, so multi-byte characters split across network reads decode correctly.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::client::error_from_status;
use crate::types::{ApiErrorBody, GenerateContentResponse};
use crate::{Error, Result};

/// Process a stream of bytes into a stream of response chunks.
pub fn process_sse<S>(byte_stream: S) -> impl Stream<Item = Result<GenerateContentResponse>>
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Unpin + 'static,
{
    let stream = byte_stream.map(|result| {
        result
            .map_err(|e| Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e))))
    });

    let buffer: Vec<u8> = Vec::new();

    stream::unfold(
        (stream, buffer, false),
        move |(mut stream, mut buffer, mut eof)| async move {
            loop {
                if let Some(event) = take_event(&mut buffer) {
                    match parse_event(&event) {
                        Some(item) => return Some((item, (stream, buffer, eof))),
                        None => continue,
                    }
                }
                if eof {
                    // A final event may lack its trailing blank line.
                    if buffer.iter().all(u8::is_ascii_whitespace) {
                        return None;
                    }
                    let event = std::mem::take(&mut buffer);
                    match parse_event(&event) {
                        Some(item) => return Some((item, (stream, buffer, eof))),
                        None => return None,
                    }
                }

                match stream.next().await {
                    Some(Ok(bytes)) => {
                        buffer.extend(bytes.iter().copied().filter(|b| *b != b'\r'));
                    }
                    Some(Err(e)) => {
                        return Some((Err(e), (stream, buffer, eof)));
                    }
                    None => {
                        eof = true;
                    }
                }
            }
        },
    )
}

/// Remove one complete event (terminated by a blank line) from the front of `buffer`.
fn take_event(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let end = buffer.windows(2).position(|w| w == b"\n\n")?;
    let mut event: Vec<u8> = buffer.drain(..end + 2).collect();
    event.truncate(end);
    Some(event)
}

/// Parse one event.  Returns `None` for events that carry no data (comments, keep-alives).
fn parse_event(event: &[u8]) -> Option<Result<GenerateContentResponse>> {
    let text = match std::str::from_utf8(event) {
        Ok(text) => text,
        Err(e) => return Some(Err(e.into())),
    };

    let mut data: Option<String> = None;
    for line in text.lines() {
        let Some(value) = line.strip_prefix("data:") else {
            continue;
        };
        let value = value.strip_prefix(' ').unwrap_or(value);
        match data.as_mut() {
            Some(data) => {
                data.push('\n');
                data.push_str(value);
            }
            None => data = Some(value.to_string()),
        }
    }
    let data = data?;
    if data.trim().is_empty() || data.trim() == "[DONE]" {
        return None;
    }

    if let Ok(body) = serde_json::from_str::<ApiErrorBody>(&data) {
        let detail = body.error;
        return Some(Err(error_from_status(
            detail.code.unwrap_or(500),
            detail.status,
            detail.message.unwrap_or(data),
            None,
        )));
    }

    Some(
        serde_json::from_str::<GenerateContentResponse>(&data).map_err(|e| {
            Error::serialization(
                format!("Failed to parse event JSON: {e}"),
                Some(Box::new(e)),
            )
        }),
    )
}
