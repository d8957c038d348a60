//! Incremental decoder for `text/event-stream` bodies.
//!
//! Network chunks can split a line, or a multi-byte character, anywhere. Bytes are
//! buffered until a full line is available and only then decoded as UTF-8. An
//! unterminated event at end of stream is never emitted.

use bytes::BytesMut;

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: BytesMut,
    data_lines: Vec<String>,
}

impl SseDecoder {
    /// Feeds one network chunk and returns the `data` payload of every event it completed.
    /// Multiple `data:` lines within one event are joined with `\n`.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line = self.buffer.split_to(pos + 1);
            let decoded = String::from_utf8_lossy(&line[..pos]);
            let line = decoded.strip_suffix('\r').unwrap_or(&decoded);

            if line.is_empty() {
                if !self.data_lines.is_empty() {
                    events.push(self.data_lines.join("\n"));
                    self.data_lines.clear();
                }
                continue;
            }

            if line.starts_with(':') {
                continue; // comment / keep-alive
            }

            if let Some(value) = line.strip_prefix("data:") {
                let value = value.strip_prefix(' ').unwrap_or(value);
                self.data_lines.push(value.to_string());
            }
            // event:, id: and retry: carry nothing the completion stream needs
        }

        events
    }
}
