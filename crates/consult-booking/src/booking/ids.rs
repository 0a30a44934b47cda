use std::sync::atomic::{AtomicU64, Ordering};

use super::error::IntegrityError;

/// Monotonic identifier source producing `S1`, `R7`, `A12`, ...
///
/// Seeded from the highest identifier ever persisted so numbers are never handed out twice,
/// even after the record carrying them has been deleted.
#[derive(Debug)]
pub struct IdSequence {
    prefix: &'static str,
    next: AtomicU64,
}

impl IdSequence {
    pub fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            next: AtomicU64::new(1),
        }
    }

    pub fn starting_after(prefix: &'static str, highest: u64) -> Result<Self, IntegrityError> {
        let next = highest
            .checked_add(1)
            .ok_or(IntegrityError::IdSpaceExhausted { prefix, highest })?;
        Ok(Self {
            prefix,
            next: AtomicU64::new(next),
        })
    }

    /// Builds a sequence that continues after every id in `seen` carrying this prefix.
    pub fn seeded<'a>(
        prefix: &'static str,
        seen: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, IntegrityError> {
        let highest = seen
            .into_iter()
            .filter_map(|id| numeric_suffix(prefix, id))
            .max()
            .unwrap_or(0);
        Self::starting_after(prefix, highest)
    }

    /// Hands out the next id. The counter never wraps: once it reaches the top of the range
    /// every further call fails.
    pub fn next_id(&self) -> Result<String, IntegrityError> {
        let value = self
            .next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                current.checked_add(1)
            })
            .map_err(|highest| IntegrityError::IdSpaceExhausted {
                prefix: self.prefix,
                highest,
            })?;
        Ok(format!("{}{value}", self.prefix))
    }
}

fn numeric_suffix(prefix: &str, id: &str) -> Option<u64> {
    id.strip_prefix(prefix)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_sequence_starts_at_one() {
        let ids = IdSequence::new("S");
        assert_eq!(ids.next_id().as_deref(), Ok("S1"));
        assert_eq!(ids.next_id().as_deref(), Ok("S2"));
    }

    #[test]
    fn seeded_sequence_skips_past_the_highest_known_id() {
        let ids = IdSequence::seeded("R", ["R2", "R10", "X99", "Rlegacy", "R9"]).expect("seeded");
        assert_eq!(ids.next_id().as_deref(), Ok("R11"));
    }

    #[test]
    fn largest_stored_number_cannot_be_continued() {
        let top = format!("S{}", u64::MAX);
        let err = IdSequence::seeded("S", [top.as_str()]).expect_err("no room after the top id");
        assert_eq!(
            err,
            IntegrityError::IdSpaceExhausted {
                prefix: "S",
                highest: u64::MAX,
            }
        );
    }

    #[test]
    fn sequence_stops_instead_of_wrapping() {
        let ids = IdSequence::starting_after("A", u64::MAX - 2).expect("room left");
        assert_eq!(ids.next_id(), Ok(format!("A{}", u64::MAX - 1)));
        assert!(ids.next_id().is_err());
        assert!(ids.next_id().is_err());
    }
}
