//! Sans-io SSE (server-sent events) splitter.
//!
//! Buffers raw stream text across arbitrary chunk boundaries and yields
//! complete `event:`/`data:` frames. The adapters own one of these per
//! request context, so no chunk boundary is ever assumed to align with an
//! SSE boundary.

/// One complete SSE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// `event:` field value, if the frame carried one
    pub event: Option<String>,
    /// `data:` lines joined with `\n`
    pub data: String,
}

/// Incremental SSE frame splitter.
#[derive(Debug, Default)]
pub struct SseParser {
    pending: String,
    event: Option<String>,
    data_lines: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk and return every frame it completed.
    ///
    /// An unterminated final line stays buffered for the next call.
    pub fn feed(&mut self, chunk: &str) -> Vec<SseFrame> {
        self.pending.push_str(chunk);

        let mut frames = Vec::new();
        while let Some(newline) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=newline).collect();
            let line = line.trim_end_matches(['\n', '\r']);
            self.process_line(line, &mut frames);
        }
        frames
    }

    fn process_line(&mut self, line: &str, frames: &mut Vec<SseFrame>) {
        if line.is_empty() {
            // blank line terminates the frame
            if self.event.is_some() || !self.data_lines.is_empty() {
                frames.push(SseFrame {
                    event: self.event.take(),
                    data: self.data_lines.drain(..).collect::<Vec<_>>().join("\n"),
                });
            }
            return;
        }
        if line.starts_with(':') {
            // comment line
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data_lines.push(value.to_string()),
            // id / retry and unknown fields are not consumed by any adapter
            _ => {}
        }
    }
}
