//! # Workout Timer Model
//!
//! One recorded workout as an ordered sequence of legs, each an ordered
//! sequence of splits.
//!
//! ## File format
//!
//! One line per leg. A line is a comma-separated list of `t,d` pairs, one pair
//! per split, where `t` is the cumulative elapsed time in milliseconds and `d`
//! the cumulative distance:
//!
//! ```text
//! 100,1,250,2.2
//! 450,3
//! ```
//!
//! Cumulative values carry across leg boundaries. Each line is terminated by
//! a newline and has no trailing comma.
//!
//! ## Editing
//!
//! Loading derives each split's `delta_t`/`delta_d` from the difference to the
//! previous split (the first split of the workout is measured from zero). Form
//! ingestion edits deltas only; [`WorkoutTimer::finalize_and_persist`] turns
//! them back into cumulative values and rewrites the file. Loading and saving
//! without edits reproduces the file byte for byte.

use super::index::{SplitIndex, SplitLoc};
use crate::error::PersistError;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One sub-segment of a leg.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub leg_index: usize,
    pub split_index: usize,
    /// Cumulative elapsed time (ms)
    pub t: u64,
    /// Cumulative distance
    pub d: f64,
    /// Time since the previous split (ms)
    pub delta_t: u64,
    /// Distance since the previous split
    pub delta_d: f64,
}

/// Portion of a workout between two manual boundaries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Leg {
    splits: Vec<Split>,
}

impl Leg {
    pub fn splits(&self) -> &[Split] {
        &self.splits
    }

    /// Time covered by the leg.
    pub fn total_time(&self) -> u64 {
        self.splits.iter().map(|s| s.delta_t).sum()
    }

    /// Distance covered by the leg.
    pub fn total_distance(&self) -> f64 {
        self.splits.iter().map(|s| s.delta_d).sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkoutTimer {
    legs: Vec<Leg>,
    backing: Option<PathBuf>,
}

impl WorkoutTimer {
    /// Build an in-memory timer from per-split `(delta_t, delta_d)` values.
    ///
    /// Cumulative values are computed immediately. The timer has no backing
    /// file, so [`finalize_and_persist`](Self::finalize_and_persist) fails on
    /// it until [`set_backing`](Self::set_backing) is called.
    pub fn from_deltas(legs: Vec<Vec<(u64, f64)>>) -> Self {
        let legs = legs
            .into_iter()
            .enumerate()
            .map(|(li, splits)| Leg {
                splits: splits
                    .into_iter()
                    .enumerate()
                    .map(|(si, (delta_t, delta_d))| Split {
                        leg_index: li,
                        split_index: si,
                        t: 0,
                        d: 0.0,
                        delta_t,
                        delta_d,
                    })
                    .collect(),
            })
            .collect();
        let mut timer = Self { legs, backing: None };
        timer.recompute();
        timer
    }

    /// Parse the line format described in the module docs.
    pub fn parse(text: &str) -> io::Result<Self> {
        let mut legs = Vec::new();
        let mut prev_t: u64 = 0;
        let mut prev_d: f64 = 0.0;

        for (li, line) in text.lines().enumerate() {
            let mut splits = Vec::new();
            if !line.trim().is_empty() {
                let fields: Vec<&str> = line.split(',').map(str::trim).collect();
                if fields.len() % 2 != 0 {
                    return Err(invalid(li, "odd number of fields"));
                }
                for (si, pair) in fields.chunks(2).enumerate() {
                    let t: u64 = pair[0].parse().map_err(|_| invalid(li, "bad time"))?;
                    let d: f64 = pair[1].parse().map_err(|_| invalid(li, "bad distance"))?;
                    splits.push(Split {
                        leg_index: li,
                        split_index: si,
                        t,
                        d,
                        delta_t: t.saturating_sub(prev_t),
                        delta_d: d - prev_d,
                    });
                    prev_t = t;
                    prev_d = d;
                }
            }
            legs.push(Leg { splits });
        }

        Ok(Self { legs, backing: None })
    }

    /// Read and parse a workout file, remembering it as the backing file.
    pub fn load(path: &Path) -> io::Result<Self> {
        let text = fs::read_to_string(path)?;
        let mut timer = Self::parse(&text)?;
        timer.backing = Some(path.to_path_buf());
        debug!(
            path = %path.display(),
            legs = timer.legs.len(),
            splits = timer.split_count(),
            "workout loaded"
        );
        Ok(timer)
    }

    pub fn set_backing(&mut self, path: impl Into<PathBuf>) {
        self.backing = Some(path.into());
    }

    pub fn backing(&self) -> Option<&Path> {
        self.backing.as_deref()
    }

    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    pub fn split_count(&self) -> usize {
        self.legs.iter().map(|l| l.splits.len()).sum()
    }

    pub fn build_index(&self) -> SplitIndex {
        SplitIndex::build(self)
    }

    pub fn split(&self, loc: SplitLoc) -> Option<&Split> {
        self.legs.get(loc.leg)?.splits.get(loc.split)
    }

    pub fn split_mut(&mut self, loc: SplitLoc) -> Option<&mut Split> {
        self.legs.get_mut(loc.leg)?.splits.get_mut(loc.split)
    }

    /// Recompute cumulative `t`/`d` as running sums of the deltas, in
    /// leg-then-split order, carrying the sums across leg boundaries.
    pub fn recompute(&mut self) {
        let mut cur_t: u64 = 0;
        let mut cur_d: f64 = 0.0;
        for split in self.legs.iter_mut().flat_map(|l| l.splits.iter_mut()) {
            cur_t = cur_t.saturating_add(split.delta_t);
            cur_d += split.delta_d;
            split.t = cur_t;
            split.d = cur_d;
        }
    }

    /// Render the cumulative values in the file format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for leg in &self.legs {
            for (i, split) in leg.splits.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&split.t.to_string());
                out.push(',');
                out.push_str(&format_distance(split.d));
            }
            out.push('\n');
        }
        out
    }

    /// Recompute cumulative values and replace the backing file with them.
    ///
    /// The new content goes to a temporary file in the same directory which
    /// then atomically replaces the original, so the file on disk is always
    /// either the old or the new version and never longer than what was
    /// written. Fails before touching anything when there is no backing file.
    pub fn finalize_and_persist(&mut self) -> Result<(), PersistError> {
        let path = self.backing.clone().ok_or(PersistError::MissingBackingFile)?;
        self.recompute();
        let body = self.render();

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(body.as_bytes())?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| PersistError::Io(e.error))?;

        info!(
            path = %path.display(),
            bytes = body.len(),
            splits = self.split_count(),
            "workout persisted"
        );
        Ok(())
    }
}

fn invalid(line: usize, what: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("workout line {}: {}", line + 1, what),
    )
}

/// Format a distance like C's `%g`: six significant digits, trailing zeros
/// removed, exponent notation outside `1e-4..1e6`.
pub fn format_distance(v: f64) -> String {
    if v == 0.0 {
        return "0".to_string();
    }
    if !v.is_finite() {
        return v.to_string();
    }

    // The exponent after rounding to six significant digits decides the style.
    let sci = format!("{:.5e}", v);
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci;
    };
    let exp: i32 = exp.parse().unwrap_or(0);
    if (-4..6).contains(&exp) {
        let decimals = (5 - exp) as usize;
        trim_fraction(format!("{:.*}", decimals, v))
    } else {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(mantissa.to_string()), sign, exp.abs())
    }
}

fn trim_fraction(mut s: String) -> String {
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recompute_carries_across_legs() {
        let timer = WorkoutTimer::from_deltas(vec![
            vec![(100, 1.0), (150, 1.2)],
            vec![(200, 0.8)],
        ]);
        assert_eq!(timer.render(), "100,1,250,2.2\n450,3\n");
        let last = &timer.legs()[1].splits()[0];
        assert_eq!(last.t, 450);
    }

    #[test]
    fn test_parse_derives_deltas() {
        let timer = WorkoutTimer::parse("100,1,250,2.2\n450,3\n").unwrap();
        let deltas: Vec<u64> = timer
            .legs()
            .iter()
            .flat_map(|l| l.splits().iter().map(|s| s.delta_t))
            .collect();
        assert_eq!(deltas, vec![100, 150, 200]);
        assert_eq!(timer.legs()[1].splits()[0].leg_index, 1);
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        assert!(WorkoutTimer::parse("100,1,250\n").is_err());
        assert!(WorkoutTimer::parse("abc,1\n").is_err());
        assert!(WorkoutTimer::parse("100,x\n").is_err());
    }

    #[test]
    fn test_empty_leg_survives_round_trip() {
        let text = "100,1\n\n300,2.5\n";
        let mut timer = WorkoutTimer::parse(text).unwrap();
        assert_eq!(timer.legs().len(), 3);
        timer.recompute();
        assert_eq!(timer.render(), text);
    }

    #[test]
    fn test_persist_without_backing_fails() {
        let mut timer = WorkoutTimer::from_deltas(vec![vec![(1, 1.0)]]);
        assert!(matches!(
            timer.finalize_and_persist(),
            Err(PersistError::MissingBackingFile)
        ));
    }

    #[test]
    fn test_format_distance_matches_printf_g() {
        assert_eq!(format_distance(1.0), "1");
        assert_eq!(format_distance(2.2), "2.2");
        assert_eq!(format_distance(1.0 + 1.2), "2.2");
        assert_eq!(format_distance(0.1 + 0.2), "0.3");
        assert_eq!(format_distance(12.3456789), "12.3457");
        assert_eq!(format_distance(0.0), "0");
        assert_eq!(format_distance(1234567.0), "1.23457e+06");
        assert_eq!(format_distance(0.00001), "1e-05");
        assert_eq!(format_distance(999999.7), "1e+06");
        assert_eq!(format_distance(999999.4), "999999");
        assert_eq!(format_distance(0.000099999996), "0.0001");
        assert_eq!(format_distance(-2.5), "-2.5");
    }
}
