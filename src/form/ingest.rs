//! # Form Ingestion Pipeline
//!
//! Receives every decoded field chunk of a POST body and routes it by the
//! purpose the request was classified with:
//!
//! - **Config**: raw bytes are appended to the variable named by the field,
//!   up to [`MAX_VALUE_LEN`] per variable. Unknown fields are dropped.
//! - **Workout**: `t_<leg>_<split>` and `d_<leg>_<split>` fields edit the time
//!   and distance deltas of the addressed split. Anything else, and anything
//!   addressing a split the workout does not have, is dropped.
//! - **Discard**: every field is dropped.
//!
//! Dropped fields are not errors; they are logged at debug level and the body
//! keeps streaming. Nothing is recomputed or written here; that happens when
//! the request finalizes.

use super::decoder::FieldSink;
use crate::config_vars::{ConfigRegistry, MAX_VALUE_LEN};
use crate::workout::{parse_timer, SplitIndex, WorkoutTimer};
use std::sync::Arc;
use tracing::debug;

/// Scratch limit for a distance value, in bytes.
pub const MAX_DISTANCE_LEN: usize = 31;

/// Which delta a workout field edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitField {
    Time,
    Distance,
}

/// Parse a workout field key of the form `<t|d>_<leg>_<split>`.
///
/// Both numbers are runs of ASCII digits; anything else, including trailing
/// characters or numbers that overflow, yields `None`.
pub fn parse_field_key(key: &str) -> Option<(SplitField, u64, u64)> {
    let bytes = key.as_bytes();
    let kind = match bytes.first()? {
        b't' => SplitField::Time,
        b'd' => SplitField::Distance,
        _ => return None,
    };

    let mut pos = 1;
    let leg = parse_segment(bytes, &mut pos)?;
    let split = parse_segment(bytes, &mut pos)?;
    if pos != bytes.len() {
        return None;
    }
    Some((kind, leg, split))
}

/// `_` followed by at least one digit, consumed greedily.
fn parse_segment(bytes: &[u8], pos: &mut usize) -> Option<u64> {
    if bytes.get(*pos) != Some(&b'_') {
        return None;
    }
    *pos += 1;
    let start = *pos;
    let mut n: u64 = 0;
    while let Some(b) = bytes.get(*pos).filter(|b| b.is_ascii_digit()) {
        n = n.checked_mul(10)?.checked_add(u64::from(b - b'0'))?;
        *pos += 1;
    }
    if *pos == start {
        return None;
    }
    Some(n)
}

/// Per-request buffers for a configuration POST.
#[derive(Debug)]
pub struct ConfigIngest {
    registry: Arc<ConfigRegistry>,
    pending: Vec<Vec<u8>>,
}

impl ConfigIngest {
    pub fn new(registry: Arc<ConfigRegistry>) -> Self {
        let pending = vec![Vec::new(); registry.len()];
        Self { registry, pending }
    }

    pub fn registry(&self) -> &ConfigRegistry {
        &self.registry
    }

    /// Bytes collected so far for the variable with form name `key`.
    pub fn pending(&self, key: &str) -> Option<&[u8]> {
        self.registry
            .position(key)
            .and_then(|i| self.pending.get(i))
            .map(Vec::as_slice)
    }

    /// Registry and buffers together, for committing.
    pub fn parts_mut(&mut self) -> (&ConfigRegistry, &mut [Vec<u8>]) {
        (&self.registry, &mut self.pending)
    }
}

impl FieldSink for ConfigIngest {
    fn field(&mut self, key: &str, chunk: &[u8], _offset: u64) {
        let Some(buf) = self
            .registry
            .position(key)
            .and_then(|i| self.pending.get_mut(i))
        else {
            debug!(key, "ignoring unknown configuration field");
            return;
        };
        if buf.len() + chunk.len() <= MAX_VALUE_LEN {
            buf.extend_from_slice(chunk);
        } else {
            debug!(key, len = buf.len(), chunk = chunk.len(), "configuration value cap reached");
        }
    }
}

/// Workout being edited by a POST, with its split index.
#[derive(Debug)]
pub struct WorkoutIngest {
    timer: WorkoutTimer,
    index: SplitIndex,
    current: Option<PendingField>,
}

/// Split field currently streaming.
#[derive(Debug)]
struct PendingField {
    key: String,
    bytes: Vec<u8>,
    /// `(delta_t, delta_d)` before the field started; put back when the
    /// value turns out invalid or too long
    original: (u64, f64),
    overflowed: bool,
}

impl WorkoutIngest {
    /// Takes ownership of the timer and indexes it.
    pub fn new(timer: WorkoutTimer) -> Self {
        let index = timer.build_index();
        Self {
            timer,
            index,
            current: None,
        }
    }

    pub fn timer(&self) -> &WorkoutTimer {
        &self.timer
    }

    pub fn into_timer(self) -> WorkoutTimer {
        self.timer
    }
}

impl FieldSink for WorkoutIngest {
    /// Re-parses the field's accumulated value on every chunk, so the split
    /// always holds either the whole value or what it held before the field.
    fn field(&mut self, key: &str, chunk: &[u8], offset: u64) {
        if chunk.is_empty() {
            return;
        }
        let Some((kind, leg, split)) = parse_field_key(key) else {
            debug!(key, "ignoring non-split field");
            return;
        };
        let Some(loc) = self.index.lookup(leg, split) else {
            debug!(key, leg, split, "split not found");
            return;
        };
        let Some(target) = self.timer.split_mut(loc) else {
            return;
        };

        let fresh = match &self.current {
            Some(p) => offset == 0 || p.key != key,
            None => true,
        };
        if fresh {
            self.current = Some(PendingField {
                key: key.to_string(),
                bytes: Vec::new(),
                original: (target.delta_t, target.delta_d),
                overflowed: false,
            });
        }
        let Some(pending) = self.current.as_mut() else {
            return;
        };
        if pending.overflowed {
            return;
        }

        let cap = match kind {
            SplitField::Time => MAX_VALUE_LEN,
            SplitField::Distance => MAX_DISTANCE_LEN,
        };
        if pending.bytes.len() + chunk.len() > cap {
            debug!(key, len = pending.bytes.len() + chunk.len(), "split value too long");
            pending.overflowed = true;
            (target.delta_t, target.delta_d) = pending.original;
            return;
        }
        pending.bytes.extend_from_slice(chunk);

        let value = String::from_utf8_lossy(&pending.bytes);
        match kind {
            SplitField::Time => match parse_timer(&value) {
                Some(ms) => {
                    debug!(key, value = %value, ms, "split time parsed");
                    target.delta_t = ms;
                }
                None => {
                    debug!(key, value = %value, "unparsable split time");
                    target.delta_t = pending.original.0;
                }
            },
            SplitField::Distance => match value.trim().parse::<f64>() {
                Ok(d) if d.is_finite() => target.delta_d = d,
                _ => {
                    debug!(key, value = %value, "unparsable split distance");
                    target.delta_d = pending.original.1;
                }
            },
        }
    }
}

/// Ingestion target chosen when the request is classified.
#[derive(Debug)]
pub enum Ingest {
    Config(ConfigIngest),
    Workout(WorkoutIngest),
    Discard,
}

impl FieldSink for Ingest {
    fn field(&mut self, key: &str, chunk: &[u8], offset: u64) {
        match self {
            Ingest::Config(c) => c.field(key, chunk, offset),
            Ingest::Workout(w) => w.field(key, chunk, offset),
            Ingest::Discard => debug!(key, "discarding field of unrouted POST"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_vars::ConfigVar;

    #[test]
    fn test_parse_field_key() {
        assert_eq!(parse_field_key("t_2_3"), Some((SplitField::Time, 2, 3)));
        assert_eq!(parse_field_key("d_10_0"), Some((SplitField::Distance, 10, 0)));
        assert_eq!(parse_field_key("t_2"), None);
        assert_eq!(parse_field_key("x_1_1"), None);
        assert_eq!(parse_field_key("t1_1"), None);
        assert_eq!(parse_field_key("t__1"), None);
        assert_eq!(parse_field_key("t_1_1x"), None);
        assert_eq!(parse_field_key("t_99999999999999999999999_1"), None);
        assert_eq!(parse_field_key(""), None);
    }

    #[test]
    fn test_config_chunks_accumulate_until_cap() {
        let reg = Arc::new(ConfigRegistry::new(vec![ConfigVar::new("k", "key", false)]));
        let mut ingest = ConfigIngest::new(reg);
        ingest.field("key", b"ab", 0);
        ingest.field("key", b"cd", 2);
        ingest.field("other", b"zz", 0);
        assert_eq!(ingest.pending("key"), Some(&b"abcd"[..]));

        let filler = vec![b'x'; MAX_VALUE_LEN - 4];
        ingest.field("key", &filler, 4);
        assert_eq!(ingest.pending("key").map(<[u8]>::len), Some(MAX_VALUE_LEN));
        ingest.field("key", b"y", 0);
        assert_eq!(ingest.pending("key").map(<[u8]>::len), Some(MAX_VALUE_LEN));
    }

    #[test]
    fn test_workout_fields_edit_deltas() {
        let timer = WorkoutTimer::from_deltas(vec![vec![(100, 1.0), (150, 1.2)], vec![(200, 0.8)]]);
        let mut ingest = WorkoutIngest::new(timer);
        ingest.field("t_0_1", b"0:20", 0);
        ingest.field("d_1_0", b"1.5", 0);
        ingest.field("t_2", b"9", 0);
        ingest.field("x_1_1", b"9", 0);
        ingest.field("t_5_5", b"9", 0);
        ingest.field("t_0_0", b"", 0);

        let legs = ingest.timer().legs();
        assert_eq!(legs[0].splits()[0].delta_t, 100);
        assert_eq!(legs[0].splits()[1].delta_t, 20_000);
        assert_eq!(legs[1].splits()[0].delta_d, 1.5);
    }

    #[test]
    fn test_workout_value_split_across_chunks() {
        let timer = WorkoutTimer::from_deltas(vec![vec![(100, 1.0)]]);
        let mut ingest = WorkoutIngest::new(timer);
        ingest.field("d_0_0", b"2.", 0);
        ingest.field("d_0_0", b"75", 2);
        assert_eq!(ingest.timer().legs()[0].splits()[0].delta_d, 2.75);
    }

    #[test]
    fn test_overlong_distance_ignored() {
        let timer = WorkoutTimer::from_deltas(vec![vec![(100, 1.0)]]);
        let mut ingest = WorkoutIngest::new(timer);
        let long = "1".repeat(MAX_DISTANCE_LEN + 1);
        ingest.field("d_0_0", long.as_bytes(), 0);
        assert_eq!(ingest.timer().legs()[0].splits()[0].delta_d, 1.0);
    }

    #[test]
    fn test_overlong_distance_in_pieces_restores_previous_value() {
        let timer = WorkoutTimer::from_deltas(vec![vec![(100, 1.0)]]);
        let mut ingest = WorkoutIngest::new(timer);
        ingest.field("d_0_0", b"9000000000", 0);
        assert_eq!(ingest.timer().legs()[0].splits()[0].delta_d, 9e9);
        ingest.field("d_0_0", &[b'0'; 30], 10);
        assert_eq!(ingest.timer().legs()[0].splits()[0].delta_d, 1.0);
        // The rest of an overflowed value is dropped.
        ingest.field("d_0_0", b"1", 40);
        assert_eq!(ingest.timer().legs()[0].splits()[0].delta_d, 1.0);
    }

    #[test]
    fn test_invalid_tail_restores_previous_value() {
        let timer = WorkoutTimer::from_deltas(vec![vec![(100, 1.0)]]);
        let mut ingest = WorkoutIngest::new(timer);
        ingest.field("t_0_0", b"0:02", 0);
        ingest.field("t_0_0", b"x", 4);
        ingest.field("d_0_0", b"1.5", 0);
        ingest.field("d_0_0", b"km", 3);
        let split = &ingest.timer().legs()[0].splits()[0];
        assert_eq!(split.delta_t, 100);
        assert_eq!(split.delta_d, 1.0);
    }
}
