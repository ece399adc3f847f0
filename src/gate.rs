//! Once-only and N-th-time triggers.
//!
//! Both gates sit on the completion path of every combinator and may be hit
//! from any number of threads at once (timer threads, worker threads, a caller
//! cancelling synchronously), so they are plain atomics with no locking.

use core::num::NonZeroUsize;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::{ErrorKind, Result};

/// Runs an action on the first call only.
///
/// # Examples
///
/// ```
/// use cps_concurrency::gate::SingleFire;
///
/// let gate = SingleFire::new();
/// assert!(gate.run_once(|| println!("first")));
/// assert!(!gate.run_once(|| unreachable!()));
/// assert!(gate.is_closed());
/// ```
#[derive(Debug, Default)]
pub struct SingleFire {
    closed: AtomicBool,
}

impl SingleFire {
    /// Create an open gate.
    pub const fn new() -> Self {
        Self {
            closed: AtomicBool::new(false),
        }
    }

    /// Close the gate and run `action`, unless the gate was already closed.
    ///
    /// Returns whether this call closed the gate. Exactly one caller ever
    /// observes `true`, and only that caller runs its action.
    pub fn run_once(&self, action: impl FnOnce()) -> bool {
        let won = self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            action();
        }
        won
    }

    /// Whether some call to [`run_once`](Self::run_once) has already won.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Runs an action on exactly the N-th call.
///
/// # Examples
///
/// ```
/// use cps_concurrency::gate::CountdownGate;
///
/// let gate = CountdownGate::new(2).unwrap();
/// assert!(!gate.run_on_nth_hit(|| unreachable!()));
/// assert!(gate.run_on_nth_hit(|| println!("second")));
/// assert!(!gate.run_on_nth_hit(|| unreachable!()));
/// ```
#[derive(Debug)]
pub struct CountdownGate {
    remaining: AtomicUsize,
}

impl CountdownGate {
    /// Create a gate which fires on the `count`-th hit.
    ///
    /// Fails with [`ErrorKind::InvalidArgument`] when `count` is zero.
    pub fn new(count: usize) -> Result<Self> {
        match NonZeroUsize::new(count) {
            Some(count) => Ok(count.into()),
            None => Err(ErrorKind::InvalidArgument(
                "expecting a countdown greater than 0, but found 0".to_owned(),
            )
            .into()),
        }
    }

    /// Record one hit; run `action` if this was the last one.
    ///
    /// Returns whether `action` ran. Hits past zero are no-ops: the counter
    /// saturates instead of wrapping around.
    pub fn run_on_nth_hit(&self, action: impl FnOnce()) -> bool {
        let previous = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        match previous {
            Ok(1) => {
                action();
                true
            }
            _ => false,
        }
    }

    /// Hits still needed before the gate fires.
    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    /// Whether the gate has fired.
    pub fn is_done(&self) -> bool {
        self.remaining() == 0
    }
}

impl From<NonZeroUsize> for CountdownGate {
    fn from(count: NonZeroUsize) -> Self {
        Self {
            remaining: AtomicUsize::new(count.get()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn single_fire_runs_once_across_threads() {
        const THREADS: usize = 16;
        let gate = Arc::new(SingleFire::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let (gate, runs, barrier) = (gate.clone(), runs.clone(), barrier.clone());
                thread::spawn(move || {
                    barrier.wait();
                    gate.run_once(|| {
                        runs.fetch_add(1, Ordering::SeqCst);
                    })
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(gate.is_closed());
    }

    #[test]
    fn countdown_rejects_zero() {
        let err = CountdownGate::new(0).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidArgument(_)));
    }

    #[test]
    fn countdown_fires_exactly_on_nth_hit() {
        let gate = CountdownGate::new(3).unwrap();
        let mut fired = 0;
        for _ in 0..2 {
            gate.run_on_nth_hit(|| fired += 1);
        }
        assert_eq!(fired, 0);
        assert_eq!(gate.remaining(), 1);

        gate.run_on_nth_hit(|| fired += 1);
        assert_eq!(fired, 1);
        assert!(gate.is_done());

        for _ in 0..5 {
            gate.run_on_nth_hit(|| fired += 1);
        }
        assert_eq!(fired, 1);
        assert_eq!(gate.remaining(), 0);
    }

    #[test]
    fn countdown_fires_once_under_contention() {
        const THREADS: usize = 8;
        let gate = Arc::new(CountdownGate::new(THREADS).unwrap());
        let runs = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..THREADS * 2)
            .map(|_| {
                let (gate, runs) = (gate.clone(), runs.clone());
                thread::spawn(move || {
                    gate.run_on_nth_hit(|| {
                        runs.fetch_add(1, Ordering::SeqCst);
                    });
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
