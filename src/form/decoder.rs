//! Incremental `application/x-www-form-urlencoded` decoder.
//!
//! Bytes are fed as they arrive from the connection, in arbitrary pieces. A
//! piece may end in the middle of a key, a value, or a `%XX` escape. The
//! decoder reports each field value as it is decoded, so one field can be
//! delivered as several chunks:
//!
//! ```text
//! feed("apiKey=sec")  -> field("apiKey", "sec", offset 0)
//! feed("ret123&u")    -> field("apiKey", "ret123", offset 3)
//! finish()            -> field("u", "", offset 0)
//! ```
//!
//! A field whose value is empty is reported once with an empty chunk. Keys
//! longer than the configured limit are dropped together with their value.

/// Receiver of decoded field chunks.
pub trait FieldSink {
    /// `offset` is the number of bytes of this field's value already
    /// delivered; `0` marks the start of a new field.
    fn field(&mut self, key: &str, chunk: &[u8], offset: u64);
}

impl<F: FnMut(&str, &[u8], u64)> FieldSink for F {
    fn field(&mut self, key: &str, chunk: &[u8], offset: u64) {
        self(key, chunk, offset)
    }
}

/// Default key length limit.
pub const DEFAULT_MAX_KEY_LEN: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Key,
    Value,
    Skip,
}

#[derive(Debug)]
pub struct FormDecoder {
    state: State,
    key: Vec<u8>,
    value: Vec<u8>,
    /// Raw bytes of an unfinished `%XX` escape, including the `%`
    escape: Vec<u8>,
    offset: u64,
    max_key_len: usize,
}

impl Default for FormDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_KEY_LEN)
    }
}

impl FormDecoder {
    pub fn new(max_key_len: usize) -> Self {
        Self {
            state: State::Key,
            key: Vec::new(),
            value: Vec::new(),
            escape: Vec::with_capacity(3),
            offset: 0,
            max_key_len,
        }
    }

    /// Decode the next piece of the body.
    ///
    /// Value bytes decoded from `data` are delivered before this returns.
    pub fn feed(&mut self, data: &[u8], sink: &mut dyn FieldSink) {
        for &b in data {
            match (self.state, b) {
                (State::Skip, b'&') => self.reset(),
                (State::Skip, _) => {}
                (State::Key, b'=') => {
                    self.flush_escape();
                    if self.state == State::Key {
                        self.state = State::Value;
                    }
                }
                (_, b'&') => {
                    self.flush_escape();
                    self.end_field(sink);
                }
                _ => self.accept(b),
            }
        }
        if self.state == State::Value {
            self.emit(sink);
        }
    }

    /// Signal the end of the body, delivering the last field.
    pub fn finish(&mut self, sink: &mut dyn FieldSink) {
        self.flush_escape();
        self.end_field(sink);
    }

    fn accept(&mut self, b: u8) {
        if self.escape.is_empty() {
            match b {
                b'%' => self.escape.push(b),
                b'+' => self.put(b' '),
                _ => self.put(b),
            }
            return;
        }

        if !b.is_ascii_hexdigit() {
            self.flush_escape();
            self.accept(b);
            return;
        }
        self.escape.push(b);
        if self.escape.len() == 3 {
            let decoded = (hex_val(self.escape[1]) << 4) | hex_val(self.escape[2]);
            self.escape.clear();
            self.put(decoded);
        }
    }

    /// Emit an unfinished escape as literal bytes.
    fn flush_escape(&mut self) {
        let raw = std::mem::take(&mut self.escape);
        for b in raw {
            self.put(b);
        }
    }

    fn put(&mut self, b: u8) {
        match self.state {
            State::Key => {
                if self.key.len() >= self.max_key_len {
                    self.state = State::Skip;
                    self.key.clear();
                    self.escape.clear();
                } else {
                    self.key.push(b);
                }
            }
            State::Value => self.value.push(b),
            State::Skip => {}
        }
    }

    fn emit(&mut self, sink: &mut dyn FieldSink) {
        if self.value.is_empty() {
            return;
        }
        let key = String::from_utf8_lossy(&self.key);
        sink.field(&key, &self.value, self.offset);
        self.offset += self.value.len() as u64;
        self.value.clear();
    }

    fn end_field(&mut self, sink: &mut dyn FieldSink) {
        match self.state {
            State::Skip => {}
            State::Key if self.key.is_empty() => {}
            _ => {
                if self.value.is_empty() && self.offset == 0 {
                    let key = String::from_utf8_lossy(&self.key);
                    sink.field(&key, &[], 0);
                } else {
                    self.emit(sink);
                }
            }
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.state = State::Key;
        self.key.clear();
        self.value.clear();
        self.escape.clear();
        self.offset = 0;
    }
}

fn hex_val(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        b'A'..=b'F' => b - b'A' + 10,
        _ => 0,
    }
}
