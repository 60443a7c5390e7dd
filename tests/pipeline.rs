use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use docsweep::{
    BatchQueue, DeleteWorker, MemStore, Producer, RecordRef, RetryPolicy, ShutdownCoordinator,
    StoreConnector, SweepConfig, SweepStats, Sweeper,
};

fn fast_config(threads: usize, batch: usize) -> SweepConfig {
    SweepConfig::default()
        .with_threads_count(threads)
        .with_batch_size(batch)
        .with_empty_queue_timeout_ms(20)
        .with_backoff_ms(0, 0)
}

#[test]
fn six_hundred_records_two_workers() -> Result<()> {
    let store = MemStore::seeded("users", 600);
    let sweeper = Sweeper::new(Arc::new(store.clone()), fast_config(2, 250))?;

    let report = sweeper.run("users")?;
    assert_eq!(report.batches_produced, 3);
    assert_eq!(report.batches_committed, 3);
    assert_eq!(report.refs_deleted, 600);
    assert!(report.is_clean());
    assert_eq!(store.count("users"), 0);

    // ровно 3 коммита: 250 + 250 + 100 (в любом порядке)
    let mut sizes: Vec<usize> = store.commits().iter().map(|c| c.refs).collect();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![100, 250, 250]);
    // все коммиты сделаны воркерами, а не producer'ом
    assert!(store.commits().iter().all(|c| c.thread.starts_with("DEL")));
    // 2 воркера + 1 producer = 3 независимые сессии
    assert_eq!(store.sessions(), 3);
    Ok(())
}

#[test]
fn empty_collection_finishes_immediately() -> Result<()> {
    let store = MemStore::new();
    let sweeper = Sweeper::new(Arc::new(store.clone()), fast_config(3, 250))?;

    let started = Instant::now();
    let report = sweeper.run("nothing")?;
    assert_eq!(report.batches_produced, 0);
    assert_eq!(report.batches_committed, 0);
    assert!(store.commits().is_empty());
    assert!(started.elapsed() < Duration::from_secs(2));
    Ok(())
}

#[test]
fn randomized_batch_completeness() -> Result<()> {
    let mut rng = oorandom::Rand32::new(0x5eed);
    for _ in 0..8 {
        let m = rng.rand_range(0..1200) as usize;
        let b = rng.rand_range(1..300) as usize;

        let store = MemStore::seeded("c", m);
        let expected: HashSet<RecordRef> =
            store.connect()?.stream_all("c")?.collect::<Result<_>>()?;

        let q = Arc::new(BatchQueue::new());
        let stats = Arc::new(SweepStats::new());
        let rep = Producer::new(store.connect()?, q.clone(), stats, b)?
            .run("c", &RetryPolicy::no_retry())?;

        let batches = q.drain();
        assert_eq!(batches.len(), (m + b - 1) / b, "m={m} b={b}");
        assert_eq!(rep.batches as usize, batches.len());
        for (i, batch) in batches.iter().enumerate() {
            if i + 1 < batches.len() {
                assert_eq!(batch.len(), b);
            } else {
                let tail = if m % b == 0 { b } else { m % b };
                assert_eq!(batch.len(), tail);
            }
        }

        let got: Vec<RecordRef> = batches.into_iter().flatten().collect();
        let uniq: HashSet<RecordRef> = got.iter().cloned().collect();
        assert_eq!(got.len(), uniq.len(), "no duplicates");
        assert_eq!(uniq, expected, "no omissions");
    }
    Ok(())
}

#[test]
fn commit_failure_is_reported_and_others_continue() -> Result<()> {
    // первый коммит падает: его воркер останавливается, второй дочищает остальное
    let store = MemStore::seeded("c", 100)
        .fail_commit(1)
        .commit_delay(Duration::from_millis(2));
    let sweeper = Sweeper::new(Arc::new(store.clone()), fast_config(2, 10))?;

    let outcome = sweeper.execute("c", &RetryPolicy::no_retry());
    let report = &outcome.report;
    assert!(outcome.error.is_some());
    assert_eq!(report.failed_batches, 1);
    assert_eq!(report.lost_refs, 10);
    assert_eq!(report.failed_workers.len(), 1);
    assert_eq!(report.batches_committed, 9);
    assert_eq!(store.count("c"), 10, "the failed batch is not requeued");

    let msg = format!("{:#}", outcome.into_result().unwrap_err());
    assert!(msg.contains("were not deleted"), "{msg}");
    Ok(())
}

#[test]
fn all_workers_dead_leftovers_counted_as_lost() -> Result<()> {
    let store = MemStore::seeded("c", 30).fail_commit(1);
    let sweeper = Sweeper::new(Arc::new(store.clone()), fast_config(1, 10))?;

    let outcome = sweeper.execute("c", &RetryPolicy::no_retry());
    assert!(outcome.error.is_some());
    let r = &outcome.report;
    assert_eq!(r.batches_produced, 3);
    // единственный воркер упал на первом коммите; всё, что осталось в очереди, потеряно
    assert_eq!(r.batches_committed + r.failed_batches, 3);
    assert_eq!(r.refs_deleted + r.lost_refs, 30);
    assert_eq!(store.count("c") as u64, r.lost_refs);
    Ok(())
}

#[test]
fn exhausted_producer_still_joins_workers() -> Result<()> {
    let store = MemStore::seeded("c", 50).fail_stream(25, 100);
    let sweeper = Sweeper::new(Arc::new(store.clone()), fast_config(2, 10))?;

    let started = Instant::now();
    let policy = RetryPolicy::new(Some(3), Duration::ZERO, Duration::ZERO);
    let outcome = sweeper.execute("c", &policy);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(outcome.workers.len(), 2);
    assert_eq!(outcome.report.producer_attempts, 3);
    // уже поставленные в очередь батчи удалены до выхода
    assert_eq!(
        outcome.report.batches_committed,
        outcome.report.batches_produced
    );

    let msg = format!("{:#}", outcome.into_result().unwrap_err());
    assert!(msg.contains("enumeration of 'c' failed"), "{msg}");
    assert!(msg.contains("after 3 attempt(s)"), "{msg}");
    Ok(())
}

#[test]
fn invalid_collection_name_rejected() -> Result<()> {
    let sweeper = Sweeper::new(Arc::new(MemStore::new()), fast_config(1, 10))?;
    assert!(sweeper.run("../etc").is_err());
    Ok(())
}

#[test]
fn no_batch_left_behind_after_signal() -> Result<()> {
    let store = MemStore::seeded("c", 400).commit_delay(Duration::from_millis(1));
    let q = Arc::new(BatchQueue::new());
    let s = Arc::new(ShutdownCoordinator::new());
    let stats = Arc::new(SweepStats::new());

    for i in 1..=3 {
        let h = DeleteWorker::new(
            format!("DEL{i}"),
            store.connect()?,
            q.clone(),
            s.clone(),
            stats.clone(),
            Duration::from_millis(5),
        )
        .spawn()?;
        s.register(h);
    }

    Producer::new(store.connect()?, q.clone(), stats.clone(), 7)?
        .run("c", &RetryPolicy::no_retry())?;
    s.signal_done();
    let outs = s.await_all_workers();

    assert_eq!(outs.len(), 3);
    assert!(q.is_empty(), "queue must be drained");
    assert_eq!(stats.batches_committed(), stats.batches_produced());
    assert_eq!(store.count("c"), 0);
    Ok(())
}

#[test]
fn drain_terminates_within_poll_interval() -> Result<()> {
    let store = MemStore::new();
    let q = Arc::new(BatchQueue::new());
    let s = Arc::new(ShutdownCoordinator::new());
    let stats = Arc::new(SweepStats::new());
    let poll = Duration::from_millis(50);

    for i in 1..=4 {
        let h = DeleteWorker::new(
            format!("DEL{i}"),
            store.connect()?,
            q.clone(),
            s.clone(),
            stats.clone(),
            poll,
        )
        .spawn()?;
        s.register(h);
    }
    thread::sleep(Duration::from_millis(30));

    let signaled = Instant::now();
    s.signal_done();
    let outs = s.await_all_workers();
    assert_eq!(outs.len(), 4);
    // один текущий pop на воркер + запас на планировщик
    assert!(
        signaled.elapsed() < poll + Duration::from_millis(500),
        "took {:?}",
        signaled.elapsed()
    );
    Ok(())
}

#[test]
fn oversized_batch_size_yields_single_batch() -> Result<()> {
    for batch_size in [usize::MAX, 1usize << 40] {
        let store = MemStore::seeded("c", 3);
        let sweeper = Sweeper::new(Arc::new(store.clone()), fast_config(2, batch_size))?;

        let report = sweeper.run("c")?;
        assert_eq!(report.batches_produced, 1);
        assert_eq!(report.refs_deleted, 3);
        assert_eq!(store.count("c"), 0);
        let sizes: Vec<usize> = store.commits().iter().map(|c| c.refs).collect();
        assert_eq!(sizes, vec![3]);
    }
    Ok(())
}

#[test]
fn hand_inserted_ids_are_swept() -> Result<()> {
    let store = MemStore::new();
    for id in ["alice", "bob", "x-1", "x_2", "Zed.9"] {
        store.insert("people", id)?;
    }
    store.insert("other", "alice")?;
    assert!(store.insert("people", "a/b").is_err());

    let sweeper = Sweeper::new(Arc::new(store.clone()), fast_config(2, 2))?;
    let report = sweeper.run("people")?;
    assert_eq!(report.batches_produced, 3);
    assert_eq!(report.refs_deleted, 5);
    assert_eq!(store.count("people"), 0);
    assert!(store.contains(&RecordRef::new("other", "alice")));
    Ok(())
}
