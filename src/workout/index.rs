use super::timer::WorkoutTimer;
use std::collections::HashMap;

/// Position of a split inside a [`WorkoutTimer`]'s leg and split vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SplitLoc {
    pub leg: usize,
    pub split: usize,
}

/// Direct `(leg, split)` addressing for form ingestion.
///
/// Holds positions, never references, so it stays valid to consult after the
/// timer it was built from is gone: lookups through
/// [`WorkoutTimer::split_mut`] just come back empty. Rebuild it whenever the
/// leg/split topology changes; value edits do not require a rebuild.
#[derive(Debug, Default, Clone)]
pub struct SplitIndex {
    slots: HashMap<(u64, u64), SplitLoc>,
}

impl SplitIndex {
    /// Single pass over every leg and split of `timer`.
    pub fn build(timer: &WorkoutTimer) -> Self {
        let mut slots = HashMap::with_capacity(timer.split_count());
        for (li, leg) in timer.legs().iter().enumerate() {
            for si in 0..leg.splits().len() {
                slots.insert((li as u64, si as u64), SplitLoc { leg: li, split: si });
            }
        }
        Self { slots }
    }

    /// Resolve form numbering to a split position.
    ///
    /// `None` means the numbers fall outside the timer's topology; callers
    /// ignore the field.
    pub fn lookup(&self, leg: u64, split: u64) -> Option<SplitLoc> {
        self.slots.get(&(leg, split)).copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_inside_and_outside_topology() {
        let timer = WorkoutTimer::from_deltas(vec![
            vec![(100, 1.0), (150, 1.2)],
            vec![(200, 0.8)],
        ]);
        let index = SplitIndex::build(&timer);
        assert_eq!(index.len(), 3);
        assert_eq!(index.lookup(0, 1), Some(SplitLoc { leg: 0, split: 1 }));
        assert_eq!(index.lookup(1, 0), Some(SplitLoc { leg: 1, split: 0 }));
        assert_eq!(index.lookup(1, 1), None);
        assert_eq!(index.lookup(2, 0), None);
    }
}
