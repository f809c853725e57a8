//! ST-007: Run identifiers — ULIDs from an injectable clock and RNG.
//!
//! Ids from one source are strictly increasing, so two runs started within
//! the same millisecond still sort in start order.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::sync::{Mutex, OnceLock, PoisonError};
use ulid::Ulid;

/// Wall-clock source.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// The real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Anything that can hand out run ids.
pub trait RunIdSource {
    fn next_id(&mut self) -> Ulid;

    /// Current time, used for report timestamps.
    fn now(&self) -> DateTime<Utc>;
}

/// ULID generator over a clock and a random source.
pub struct RunIds<C, R> {
    clock: C,
    rng: R,
    last: Option<Ulid>,
}

impl RunIds<SystemClock, StdRng> {
    /// System clock, OS-seeded RNG.
    pub fn system() -> Self {
        Self::new(SystemClock, StdRng::from_entropy())
    }
}

impl<C: Clock, R: RngCore> RunIds<C, R> {
    pub fn new(clock: C, rng: R) -> Self {
        Self {
            clock,
            rng,
            last: None,
        }
    }
}

impl<C: Clock, R: RngCore> RunIdSource for RunIds<C, R> {
    fn next_id(&mut self) -> Ulid {
        let ms = u64::try_from(self.clock.now().timestamp_millis()).unwrap_or(0);
        let random: u128 = self.rng.gen::<u128>() & ((1u128 << 80) - 1);
        let candidate = Ulid::from_parts(ms, random);

        let id = match self.last {
            Some(prev) if candidate <= prev => match prev.increment() {
                Some(next) => next,
                // random part exhausted within one millisecond
                None => Ulid::from_parts(prev.timestamp_ms() + 1, random),
            },
            _ => candidate,
        };
        self.last = Some(id);
        id
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

/// Handle on one process-wide system source. Every handle draws from the
/// same generator, so ids stay ordered across runners.
#[derive(Debug, Clone, Copy, Default)]
pub struct SharedRunIds;

fn shared() -> &'static Mutex<RunIds<SystemClock, StdRng>> {
    static SHARED: OnceLock<Mutex<RunIds<SystemClock, StdRng>>> = OnceLock::new();
    SHARED.get_or_init(|| Mutex::new(RunIds::system()))
}

impl RunIdSource for SharedRunIds {
    fn next_id(&mut self) -> Ulid {
        shared()
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next_id()
    }

    fn now(&self) -> DateTime<Utc> {
        SystemClock.now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn fixed() -> RunIds<FixedClock, StdRng> {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        RunIds::new(FixedClock(at), StdRng::seed_from_u64(7))
    }

    #[test]
    fn test_st007_timestamp_from_clock() {
        let mut ids = fixed();
        let id = ids.next_id();
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(id.timestamp_ms(), at.timestamp_millis() as u64);
    }

    #[test]
    fn test_st007_deterministic_with_seeded_rng() {
        let a = fixed().next_id();
        let b = fixed().next_id();
        assert_eq!(a, b);
    }

    #[test]
    fn test_st007_strictly_increasing_on_frozen_clock() {
        let mut ids = fixed();
        let mut prev = ids.next_id();
        for _ in 0..100 {
            let next = ids.next_id();
            assert!(next > prev, "{} should sort after {}", next, prev);
            prev = next;
        }
    }

    #[test]
    fn test_st007_system_ids_parse() {
        let mut ids = RunIds::system();
        let id = ids.next_id();
        let text = id.to_string();
        assert_eq!(text.len(), 26);
        assert_eq!(Ulid::from_string(&text).unwrap(), id);
        assert_ne!(ids.next_id(), id);
    }

    #[test]
    fn test_st007_shared_handles_stay_ordered() {
        let mut a = SharedRunIds;
        let mut b = SharedRunIds;
        let mut prev = a.next_id();
        for i in 0..200 {
            let next = if i % 2 == 0 { b.next_id() } else { a.next_id() };
            assert!(next > prev, "{} should sort after {}", next, prev);
            prev = next;
        }
    }
}
