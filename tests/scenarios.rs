//! End-to-end behavior through the public API only.

use cps_concurrency::config::{Inline, SpawnThread};
use cps_concurrency::deferred::{
    many, many2, sequence_unit, EventHandler, EventSource, Step, Unsubscribe,
};
use cps_concurrency::prelude::*;
use cps_concurrency::{Agent, Config, ErrorKind};

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Completes with `()` after `delay`; cancelling delivers `None` right away.
fn timer(delay: Duration) -> Await<()> {
    Await::new(move |complete| {
        let slot = Arc::new(Mutex::new(Some(complete)));
        let fire = {
            let slot = slot.clone();
            move |outcome: Outcome<()>| {
                let complete = slot.lock().unwrap().take();
                if let Some(complete) = complete {
                    complete(outcome);
                }
            }
        };
        let fired = fire.clone();
        thread::spawn(move || {
            thread::sleep(delay);
            fired(Some(Ok(())));
        });
        Cancel::once(move || fire(None))
    })
}

/// Never completes on its own and counts how often it was cancelled.
fn pending(cancels: Arc<AtomicUsize>) -> Await<u32> {
    Await::new(move |complete| {
        let slot = Mutex::new(Some(complete));
        let cancels = cancels.clone();
        Cancel::new(move || {
            let complete = slot.lock().unwrap().take();
            if let Some(complete) = complete {
                cancels.fetch_add(1, Ordering::SeqCst);
                complete(None);
            }
        })
    })
}

#[test]
fn two_timers_race_to_the_faster_one() {
    let started = Instant::now();
    let res = many2(
        timer(Duration::from_millis(1000)),
        timer(Duration::from_millis(100)),
        0,
        |slow, fast| {
            Ok(match (slow, fast) {
                (None, Some(_)) => Some(2),
                (Some(_), None) => Some(1),
                _ => None,
            })
        },
    )
    .wait_success(None)
    .unwrap();

    assert_eq!(res, 2);
    assert!(started.elapsed() < Duration::from_millis(900));
}

#[test]
fn failing_operation_reports_its_message() {
    let failing = Await::<u8>::try_operation(
        || Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, "x")),
        Arc::new(SpawnThread::default()),
    );
    match failing.wait(None) {
        Some(Err(e)) => assert_eq!(e.to_string(), "x"),
        other => panic!("unexpected outcome: {other:?}"),
    }

    let panicking = Await::operation(|| -> u8 { panic!("x") }, Arc::new(Inline));
    match panicking.wait(None) {
        Some(Err(e)) => assert!(matches!(e.kind(), ErrorKind::Panicked(m) if m == "x")),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn satisfied_condition_skips_subscribing() {
    let subscribes = Arc::new(AtomicUsize::new(0));
    let bridge = {
        let subscribes = subscribes.clone();
        move |_: EventHandler<String>| -> Result<Unsubscribe> {
            subscribes.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(|| Ok(())))
        }
    };

    let res = Await::condition(bridge, |_| Ok(Some(5))).wait_success(None).unwrap();
    assert_eq!(res, 5);
    assert_eq!(subscribes.load(Ordering::SeqCst), 0);
}

#[test]
fn continuations_fire_at_most_once_under_contention() {
    for _ in 0..20 {
        let deliveries = Arc::new(AtomicUsize::new(0));
        let sources: Vec<_> = (0..8)
            .map(|n| Await::spawn(&Config::new(), move || n))
            .collect();
        let first = {
            let deliveries = deliveries.clone();
            let (tx, rx) = std::sync::mpsc::channel();
            sources.any().start(move |outcome| {
                deliveries.fetch_add(1, Ordering::SeqCst);
                tx.send(outcome).unwrap();
            });
            rx.recv_timeout(Duration::from_secs(5)).unwrap()
        };
        assert!(matches!(first, Some(Ok(n)) if n < 8));
        thread::sleep(Duration::from_millis(5));
        assert_eq!(deliveries.load(Ordering::SeqCst), 1);
    }
}

#[test]
fn all_keeps_source_order_and_failures() {
    let sources = vec![
        timer(Duration::from_millis(30)).map(|_| 'a'),
        Await::failed(cps_concurrency::Error::msg("b")),
        timer(Duration::from_millis(10)).map(|_| 'c'),
    ];
    let results = sources.all().wait_success(None).unwrap();
    assert_eq!(results.len(), 3);
    assert!(matches!(results[0], Ok('a')));
    assert!(matches!(&results[1], Err(e) if e.to_string() == "b"));
    assert!(matches!(results[2], Ok('c')));
}

#[test]
fn any_cancels_the_losers() {
    let cancels = Arc::new(AtomicUsize::new(0));
    let res = [
        pending(cancels.clone()),
        Await::ready(7),
        pending(cancels.clone()),
    ]
    .any()
    .wait_success(None)
    .unwrap();
    assert_eq!(res, 7);
    // The third source is never started once the second decided.
    assert_eq!(cancels.load(Ordering::SeqCst), 1);
}

#[test]
fn many_falls_back_to_the_default() {
    let res = many(
        |res: Result<u32>, _| Ok(res.ok().filter(|n| *n > 100)),
        42,
        (1..=5).map(Await::ready),
    )
    .wait_success(None)
    .unwrap();
    assert_eq!(res, 42);
}

#[test]
fn cancelling_a_combinator_reaches_every_source() {
    let cancels = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = std::sync::mpsc::channel();
    let cancel = vec![pending(cancels.clone()), pending(cancels.clone())]
        .all()
        .start(move |outcome| tx.send(outcome.is_none()).unwrap());

    cancel.cancel();
    cancel.cancel();
    assert!(rx.recv_timeout(Duration::from_secs(1)).unwrap());
    assert_eq!(cancels.load(Ordering::SeqCst), 2);
}

#[test]
fn events_drive_a_sequence() {
    let clicks = EventSource::<u32>::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let wait_for = |wanted: u32| {
        let seen = seen.clone();
        Await::event(clicks.clone(), move |n: u32| {
            seen.lock().unwrap().push(n);
            Ok((n == wanted).then_some(()))
        })
    };
    let steps = vec![wait_for(1), wait_for(2)];
    let chain = sequence_unit(move || steps.clone().into_iter().map(Step::from));

    let done = Arc::new(AtomicBool::new(false));
    let flag = done.clone();
    chain.start(move |outcome| {
        assert!(matches!(outcome, Some(Ok(()))));
        flag.store(true, Ordering::SeqCst);
    });

    clicks.emit(2);
    clicks.emit(1);
    assert!(!done.load(Ordering::SeqCst));
    clicks.emit(2);
    assert!(done.load(Ordering::SeqCst));
    assert_eq!(clicks.subscriber_count(), 0);
    assert_eq!(*seen.lock().unwrap(), [2, 1, 2]);
}

#[test]
fn configs_do_not_interfere() {
    let reported = Arc::new(AtomicUsize::new(0));
    let counting = {
        let reported = reported.clone();
        Config::new().with_unhandled_failure(move |_| {
            reported.fetch_add(1, Ordering::SeqCst);
        })
    };
    let quiet = Config::new();

    let agent = Agent::new((), &quiet).unwrap();
    agent.post(|_| panic!("quiet")).unwrap();
    drop(agent);

    Await::<()>::failed(cps_concurrency::Error::msg("counted")).forget(&counting);
    assert_eq!(reported.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn awaits_interoperate_with_tokio() {
    let fast = timer(Duration::from_millis(10)).map(|_| "fast");
    let slow = timer(Duration::from_secs(5)).map(|_| "slow");
    let winner = [fast, slow].any().await;
    assert!(matches!(winner, Some(Ok("fast"))));
}
