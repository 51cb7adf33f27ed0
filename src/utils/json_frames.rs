//! Balanced top-level JSON extraction for non-SSE stream framings.
//!
//! Gemini and Cohere stream newline-delimited (or array-wrapped) JSON
//! objects; Bedrock wraps frames in `event{...}`/`exception{...}` envelopes.
//! Chunk boundaries may fall anywhere, so extraction scans for balanced
//! braces with full string/escape awareness and leaves incomplete frames
//! buffered.

/// Incremental extractor of complete top-level JSON objects.
///
/// Bytes between objects (array punctuation, commas, whitespace, stray
/// prefixes) are discarded, which makes the same buffer serve `[{...},{...}]`
/// array framing and plain NDJSON alike.
#[derive(Debug, Default)]
pub struct JsonFrameBuffer {
    pending: String,
}

impl JsonFrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk and return every complete JSON object it finished.
    pub fn feed(&mut self, chunk: &str) -> Vec<String> {
        self.pending.push_str(chunk);

        let mut frames = Vec::new();
        loop {
            let Some(start) = self.pending.find('{') else {
                // nothing openable; drop inter-object noise
                self.pending.clear();
                break;
            };
            match balanced_end(&self.pending, start) {
                Some(end) => {
                    frames.push(self.pending[start..end].to_string());
                    self.pending.drain(..end);
                }
                None => {
                    // incomplete object: keep it (and nothing before it)
                    self.pending.drain(..start);
                    break;
                }
            }
        }
        frames
    }
}

/// Find the byte offset one past the `}` balancing the `{` at `start`.
///
/// Returns `None` when the object is still incomplete.
pub(crate) fn balanced_end(s: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in s[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + i + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

/// Find the next `<label>{...}` envelope in `buf`.
///
/// Returns `(label index, object text, end offset)` for the first complete
/// envelope whose label is in `labels`; `None` when no complete envelope is
/// present yet.
pub(crate) fn next_labeled_object<'a>(
    buf: &'a str,
    labels: &[&str],
) -> Option<(usize, &'a str, usize)> {
    let mut best: Option<(usize, usize, usize)> = None; // (at, label_idx, brace)
    for (label_idx, label) in labels.iter().enumerate() {
        let mut from = 0;
        while let Some(rel) = buf[from..].find(label) {
            let at = from + rel;
            let brace = at + label.len();
            if buf[brace..].starts_with('{') {
                if best.is_none_or(|(seen, _, _)| at < seen) {
                    best = Some((at, label_idx, brace));
                }
                break;
            }
            from = at + label.len();
        }
    }
    let (_, label_idx, brace) = best?;
    let end = balanced_end(buf, brace)?;
    Some((label_idx, &buf[brace..end], end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ndjson_objects_split_across_chunks() {
        let mut buffer = JsonFrameBuffer::new();
        assert!(buffer.feed(r#"{"a":"x"#).is_empty());
        let frames = buffer.feed("y\"}\n{\"b\":2}\n");
        assert_eq!(frames, vec![r#"{"a":"xy"}"#, r#"{"b":2}"#]);
    }

    #[test]
    fn array_framing_is_tolerated() {
        let mut buffer = JsonFrameBuffer::new();
        let frames = buffer.feed(r#"[{"a":1},{"b":2}]"#);
        assert_eq!(frames, vec![r#"{"a":1}"#, r#"{"b":2}"#]);
    }

    #[test]
    fn braces_inside_strings_do_not_close() {
        let mut buffer = JsonFrameBuffer::new();
        let frames = buffer.feed(r#"{"s":"}{\"}"}"#);
        assert_eq!(frames, vec![r#"{"s":"}{\"}"}"#]);
    }

    #[test]
    fn labeled_envelope_extraction() {
        let buf = r#"junk event{"bytes":"QQ=="} exception{"message":"no"}"#;
        let (label, body, end) = next_labeled_object(buf, &["event", "exception"]).unwrap();
        assert_eq!(label, 0);
        assert_eq!(body, r#"{"bytes":"QQ=="}"#);
        let (label, body, _) = next_labeled_object(&buf[end..], &["event", "exception"]).unwrap();
        assert_eq!(label, 1);
        assert_eq!(body, r#"{"message":"no"}"#);
    }

    #[test]
    fn incomplete_envelope_waits() {
        assert!(next_labeled_object(r#"event{"bytes":"QQ"#, &["event"]).is_none());
    }
}
