//! Incremental SSE decoding (Bytes -> JSON Value).
//!
//! - splits frames on a blank line
//! - strips the `data:` prefix
//! - stops on `[DONE]`
//!
//! Frames that are not JSON (comments, keep-alives) are skipped.

use bytes::Bytes;
use futures::{stream, Stream, StreamExt};
use serde_json::Value;

const DONE_SIGNAL: &str = "[DONE]";

enum Frame {
    Payload(Value),
    Done,
    Skip,
}

fn parse_frame(raw: &[u8]) -> Frame {
    let text = String::from_utf8_lossy(raw);
    let mut data = String::new();
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.starts_with(':') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(rest.trim_start());
        }
    }
    if data.is_empty() && text.trim_start().starts_with('{') {
        // bare JSON frame without an SSE field name
        data = text.trim().to_string();
    }
    let payload = data.trim();
    if payload.is_empty() {
        return Frame::Skip;
    }
    if payload == DONE_SIGNAL {
        return Frame::Done;
    }
    match serde_json::from_str(payload) {
        Ok(v) => Frame::Payload(v),
        Err(e) => {
            tracing::debug!(error = %e, "skipping non-json sse frame");
            Frame::Skip
        }
    }
}

fn find_frame_end(buf: &[u8]) -> Option<(usize, usize)> {
    let lf = buf.windows(2).position(|w| w == b"\n\n").map(|i| (i, 2));
    let crlf = buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

/// Decode a byte stream of server-sent events into JSON payloads.
///
/// Bytes are buffered only until a frame is complete, so a multi-byte
/// character split across network chunks is decoded correctly.
pub fn decode<S, E>(input: S) -> impl Stream<Item = Result<Value, E>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin,
    E: Send,
{
    stream::unfold(
        (input, Vec::<u8>::new(), false),
        |(mut input, mut buf, finished)| async move {
            if finished {
                return None;
            }
            loop {
                if let Some((idx, delim)) = find_frame_end(&buf) {
                    let frame: Vec<u8> = buf.drain(..idx + delim).take(idx).collect();
                    match parse_frame(&frame) {
                        Frame::Payload(v) => return Some((Ok(v), (input, buf, false))),
                        Frame::Done => return None,
                        Frame::Skip => continue,
                    }
                }

                match input.next().await {
                    Some(Ok(bytes)) => buf.extend_from_slice(&bytes),
                    Some(Err(e)) => return Some((Err(e), (input, buf, false))),
                    None => {
                        // EOF: the last frame may lack its trailing blank line
                        let rest = std::mem::take(&mut buf);
                        return match parse_frame(&rest) {
                            Frame::Payload(v) => Some((Ok(v), (input, buf, true))),
                            Frame::Done | Frame::Skip => None,
                        };
                    }
                }
            }
        },
    )
}
