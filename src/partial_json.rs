//! Restartable incremental JSON parser.
//!
//! Tool-call arguments arrive as string fragments split at arbitrary byte
//! boundaries. This parser accepts those fragments one at a time and
//! maintains a best-effort partial value between calls, so callers can show
//! a tool invocation's arguments growing before the stream finishes sending
//! them.
//!
//! Guarantees:
//! - A chunk boundary may fall anywhere: mid-string, mid-escape, mid-number,
//!   mid-delimiter. Feeding the pieces sequentially produces the same final
//!   value as feeding the concatenated input once.
//! - Strings are revealed live: a string still missing its closing quote
//!   appears in the partial value with the characters received so far.
//! - Numbers and literals (`true`/`false`/`null`) are withheld until a
//!   terminating delimiter (`,`, `}`, `]`, `:` or whitespace) proves them
//!   finished; a chunk ending inside one pauses the parse instead of
//!   guessing.
//! - Closing the top-level value completes the parse; trailing bytes are kept
//!   and consumed by the next `feed`, so one parser can decode a sequence of
//!   independent values.

use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
enum ObjectExpect {
    /// After `{` — a key string or `}`
    KeyOrEnd,
    /// After `,` — a key string
    Key,
    /// After a key — `:`
    Colon,
    /// After `:` — a value
    Value,
    /// After a value — `,` or `}`
    CommaOrEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArrayExpect {
    /// After `[` — a value or `]`
    ValueOrEnd,
    /// After `,` — a value
    Value,
    /// After a value — `,` or `]`
    CommaOrEnd,
}

#[derive(Debug)]
enum Frame {
    Object {
        map: Map<String, Value>,
        /// Pending key: set once the key string closes, consumed when its
        /// value commits
        key: Option<String>,
        expect: ObjectExpect,
    },
    Array {
        items: Vec<Value>,
        expect: ArrayExpect,
    },
}

impl Frame {
    /// Whether an in-progress child scalar sits in value position.
    fn expects_value(&self) -> bool {
        match self {
            Frame::Object { key, expect, .. } => {
                key.is_some() && *expect == ObjectExpect::Value
            }
            Frame::Array { expect, .. } => {
                matches!(expect, ArrayExpect::Value | ArrayExpect::ValueOrEnd)
            }
        }
    }

    /// Clone this frame's contents into a `Value`, grafting an in-progress
    /// child on the end when there is one.
    fn snapshot_with(&self, child: Option<Value>) -> Value {
        match self {
            Frame::Object { map, key, .. } => {
                let mut map = map.clone();
                if let (Some(key), Some(child)) = (key, child) {
                    map.insert(key.clone(), child);
                }
                Value::Object(map)
            }
            Frame::Array { items, .. } => {
                let mut items = items.clone();
                if let Some(child) = child {
                    items.push(child);
                }
                Value::Array(items)
            }
        }
    }
}

#[derive(Debug)]
enum Escape {
    None,
    /// Saw `\`, waiting for the escape character
    Start,
    /// Inside `\uXXXX`, collecting hex digits
    Unicode { digits: String },
}

#[derive(Debug)]
enum Scalar {
    Str {
        buf: String,
        escape: Escape,
        /// High surrogate waiting for its pair
        pending_high: Option<u16>,
    },
    /// Number or literal token, committed only once delimited
    Bare { buf: String },
}

enum Step {
    /// Character consumed, advance
    Consumed,
    /// State changed, reprocess the same character
    Again,
    /// Root value finished; the character was consumed
    CompleteConsumed(Value),
    /// Root value finished; the character was NOT consumed (bare-token
    /// delimiter) and stays in the tail
    CompleteUnconsumed(Value),
}

/// Restartable incremental JSON parser. See the module docs for the contract.
#[derive(Debug, Default)]
pub struct PartialJsonParser {
    stack: Vec<Frame>,
    scalar: Option<Scalar>,
    /// Unconsumed tail bytes, prepended to the next `feed`
    buffer: String,
    finished: bool,
}

impl PartialJsonParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next input fragment.
    ///
    /// Returns `(value, is_complete)`: the best-effort partial value after
    /// consuming the fragment, and whether the top-level value finished on
    /// this call. Once complete, the next `feed` starts an independent parse
    /// from any retained tail bytes.
    pub fn feed(&mut self, chunk: &str) -> (Option<Value>, bool) {
        if self.finished {
            self.stack.clear();
            self.scalar = None;
            self.finished = false;
        }

        let mut input = std::mem::take(&mut self.buffer);
        input.push_str(chunk);

        let mut completed = None;
        let mut it = input.char_indices().peekable();
        'scan: while let Some(&(at, c)) = it.peek() {
            loop {
                match self.step(c) {
                    Step::Consumed => {
                        it.next();
                        break;
                    }
                    Step::Again => continue,
                    Step::CompleteConsumed(value) => {
                        it.next();
                        let rest = it.peek().map(|&(next, _)| next).unwrap_or(input.len());
                        self.buffer = input[rest..].to_string();
                        completed = Some(value);
                        break 'scan;
                    }
                    Step::CompleteUnconsumed(value) => {
                        self.buffer = input[at..].to_string();
                        completed = Some(value);
                        break 'scan;
                    }
                }
            }
        }

        if let Some(value) = completed {
            self.finished = true;
            return (Some(value), true);
        }
        (self.value(), false)
    }

    /// Best-effort snapshot of the value parsed so far.
    ///
    /// In-progress strings are included; in-progress numbers/literals and
    /// key strings are not.
    pub fn value(&self) -> Option<Value> {
        let live_string = match (&self.scalar, self.stack.last()) {
            (Some(Scalar::Str { buf, .. }), None) => Some(Value::String(buf.clone())),
            (Some(Scalar::Str { buf, .. }), Some(frame)) if frame.expects_value() => {
                Some(Value::String(buf.clone()))
            }
            _ => None,
        };

        let mut current = live_string;
        for frame in self.stack.iter().rev() {
            current = Some(frame.snapshot_with(current));
        }
        current
    }

    /// Unconsumed tail bytes left over after a completed parse.
    pub fn remainder(&self) -> &str {
        &self.buffer
    }

    fn step(&mut self, c: char) -> Step {
        match self.scalar.take() {
            Some(Scalar::Str {
                buf,
                escape,
                pending_high,
            }) => self.step_string(c, buf, escape, pending_high),
            Some(Scalar::Bare { buf }) => self.step_bare(c, buf),
            None => self.step_structural(c),
        }
    }

    fn step_structural(&mut self, c: char) -> Step {
        match c {
            _ if c.is_whitespace() => Step::Consumed,
            '{' => {
                self.stack.push(Frame::Object {
                    map: Map::new(),
                    key: None,
                    expect: ObjectExpect::KeyOrEnd,
                });
                Step::Consumed
            }
            '[' => {
                self.stack.push(Frame::Array {
                    items: Vec::new(),
                    expect: ArrayExpect::ValueOrEnd,
                });
                Step::Consumed
            }
            '"' => {
                self.scalar = Some(Scalar::Str {
                    buf: String::new(),
                    escape: Escape::None,
                    pending_high: None,
                });
                Step::Consumed
            }
            '}' => match self.stack.pop() {
                Some(Frame::Object { map, .. }) => self.commit(Value::Object(map), true),
                Some(other) => {
                    // stray `}` inside an array: put the frame back and skip
                    self.stack.push(other);
                    Step::Consumed
                }
                None => Step::Consumed,
            },
            ']' => match self.stack.pop() {
                Some(Frame::Array { items, .. }) => self.commit(Value::Array(items), true),
                Some(other) => {
                    self.stack.push(other);
                    Step::Consumed
                }
                None => Step::Consumed,
            },
            ',' => {
                match self.stack.last_mut() {
                    Some(Frame::Object { expect, .. }) => *expect = ObjectExpect::Key,
                    Some(Frame::Array { expect, .. }) => *expect = ArrayExpect::Value,
                    None => {}
                }
                Step::Consumed
            }
            ':' => {
                if let Some(Frame::Object { expect, .. }) = self.stack.last_mut() {
                    *expect = ObjectExpect::Value;
                }
                Step::Consumed
            }
            _ => {
                self.scalar = Some(Scalar::Bare { buf: c.to_string() });
                Step::Consumed
            }
        }
    }

    fn step_bare(&mut self, c: char, mut buf: String) -> Step {
        let is_delimiter = c.is_whitespace() || matches!(c, ',' | '}' | ']' | ':');
        if !is_delimiter {
            buf.push(c);
            self.scalar = Some(Scalar::Bare { buf });
            return Step::Consumed;
        }

        let value = serde_json::from_str::<Value>(buf.trim()).unwrap_or(Value::Null);
        match self.commit_token(value, buf) {
            Some(root) => Step::CompleteUnconsumed(root),
            // delimiter itself handled structurally on reprocess
            None => Step::Again,
        }
    }

    /// Commit a bare token, routing it to key position when an object is
    /// waiting for one (tolerates unquoted keys).
    fn commit_token(&mut self, value: Value, raw: String) -> Option<Value> {
        if let Some(Frame::Object { key, expect, .. }) = self.stack.last_mut()
            && matches!(expect, ObjectExpect::Key | ObjectExpect::KeyOrEnd)
        {
            *key = Some(raw);
            *expect = ObjectExpect::Colon;
            return None;
        }
        match self.commit(value, false) {
            Step::CompleteUnconsumed(root) => Some(root),
            _ => None,
        }
    }

    fn step_string(
        &mut self,
        c: char,
        mut buf: String,
        escape: Escape,
        mut pending_high: Option<u16>,
    ) -> Step {
        let mut next_escape = Escape::None;
        match escape {
            Escape::Start => {
                match c {
                    'u' => next_escape = Escape::Unicode {
                        digits: String::new(),
                    },
                    other => {
                        flush_pending(&mut buf, &mut pending_high);
                        match other {
                            'n' => buf.push('\n'),
                            't' => buf.push('\t'),
                            'r' => buf.push('\r'),
                            'b' => buf.push('\u{0008}'),
                            'f' => buf.push('\u{000C}'),
                            '"' | '\\' | '/' => buf.push(other),
                            // unrecognized escape: pass the raw character through
                            _ => buf.push(other),
                        }
                    }
                }
            }
            Escape::Unicode { mut digits } => {
                if c.is_ascii_hexdigit() {
                    digits.push(c);
                    if digits.len() == 4 {
                        let unit = u16::from_str_radix(&digits, 16).unwrap_or(0);
                        push_unit(&mut buf, &mut pending_high, unit);
                    } else {
                        next_escape = Escape::Unicode { digits };
                    }
                } else {
                    // malformed \u escape: keep what we saw literally and
                    // reprocess the offending character
                    flush_pending(&mut buf, &mut pending_high);
                    buf.push('u');
                    buf.push_str(&digits);
                    self.scalar = Some(Scalar::Str {
                        buf,
                        escape: Escape::None,
                        pending_high,
                    });
                    return Step::Again;
                }
            }
            Escape::None => match c {
                '\\' => next_escape = Escape::Start,
                '"' => {
                    flush_pending(&mut buf, &mut pending_high);
                    return self.finish_string(buf);
                }
                _ => {
                    flush_pending(&mut buf, &mut pending_high);
                    buf.push(c);
                }
            },
        }

        self.scalar = Some(Scalar::Str {
            buf,
            escape: next_escape,
            pending_high,
        });
        Step::Consumed
    }

    fn finish_string(&mut self, s: String) -> Step {
        if let Some(Frame::Object { key, expect, .. }) = self.stack.last_mut()
            && matches!(expect, ObjectExpect::Key | ObjectExpect::KeyOrEnd)
        {
            *key = Some(s);
            *expect = ObjectExpect::Colon;
            return Step::Consumed;
        }
        self.commit(Value::String(s), true)
    }

    /// Attach a finished value to the enclosing container, or report root
    /// completion when there is none.
    fn commit(&mut self, value: Value, consumed: bool) -> Step {
        match self.stack.last_mut() {
            None => {
                if consumed {
                    Step::CompleteConsumed(value)
                } else {
                    Step::CompleteUnconsumed(value)
                }
            }
            Some(Frame::Object { map, key, expect }) => {
                if let Some(key) = key.take() {
                    map.insert(key, value);
                }
                *expect = ObjectExpect::CommaOrEnd;
                Step::Consumed
            }
            Some(Frame::Array { items, expect }) => {
                items.push(value);
                *expect = ArrayExpect::CommaOrEnd;
                Step::Consumed
            }
        }
    }
}

fn flush_pending(buf: &mut String, pending_high: &mut Option<u16>) {
    if pending_high.take().is_some() {
        buf.push(char::REPLACEMENT_CHARACTER);
    }
}

fn push_unit(buf: &mut String, pending_high: &mut Option<u16>, unit: u16) {
    if let Some(high) = pending_high.take() {
        if (0xDC00..=0xDFFF).contains(&unit) {
            let combined =
                0x10000 + (((high as u32) - 0xD800) << 10) + ((unit as u32) - 0xDC00);
            buf.push(char::from_u32(combined).unwrap_or(char::REPLACEMENT_CHARACTER));
            return;
        }
        buf.push(char::REPLACEMENT_CHARACTER);
    }
    match unit {
        0xD800..=0xDBFF => *pending_high = Some(unit),
        0xDC00..=0xDFFF => buf.push(char::REPLACEMENT_CHARACTER),
        _ => buf.push(char::from_u32(unit as u32).unwrap_or(char::REPLACEMENT_CHARACTER)),
    }
}
