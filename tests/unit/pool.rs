use std::sync::Barrier;
use std::time::Instant;

use super::*;
use crate::foundation::core::GridSize;
use crate::plan::plan_tiles;

fn view() -> Viewport {
    Viewport::new(4.0, 8.0, 6.0).unwrap()
}

fn panicking_kernel(bad_row: u32) -> TileKernel {
    let inner = escape_kernel(view());
    Arc::new(move |job: &TileJob| {
        if job.rows().contains(&bad_row) {
            panic!("kernel blew up on row {bad_row}");
        }
        inner(job)
    })
}

fn configs() -> Vec<PoolConfiguration> {
    vec![
        PoolConfiguration::sequential(4),
        PoolConfiguration::fixed(3, 4),
        PoolConfiguration::elastic(4),
        PoolConfiguration::work_stealing(3, 4),
    ]
}

#[test]
fn every_strategy_returns_one_result_per_job() {
    let size = GridSize::new(16, 12).unwrap();
    let jobs = plan_tiles(size, 6, 30).jobs;
    for cfg in configs() {
        let mut exec = create_executor(&cfg, view()).unwrap();
        assert_eq!(exec.strategy(), cfg.strategy);

        let handles = jobs
            .iter()
            .map(|j| exec.submit(*j).unwrap())
            .collect::<Vec<_>>();
        let mut results = await_all(handles).unwrap();
        results.sort_by_key(|r| r.job().rows().start);

        let expected = jobs.iter().map(|j| execute_tile(j, &view())).collect::<Vec<_>>();
        assert_eq!(results, expected, "{}", cfg.strategy);
        assert_eq!(exec.stats().jobs_submitted, jobs.len() as u64);
        exec.shutdown().unwrap();
    }
}

#[test]
fn shutdown_is_idempotent_and_rejects_new_jobs() {
    let job = TileJob::new(0..1, 0..1, 5).unwrap();
    for cfg in configs() {
        let mut exec = create_executor(&cfg, view()).unwrap();
        assert!(!exec.is_shut_down());
        exec.shutdown().unwrap();
        exec.shutdown().unwrap();
        assert!(exec.is_shut_down());

        let err = exec.submit(job).unwrap_err();
        assert!(matches!(err, MandelError::PoolShutdown(_)), "{}: {err}", cfg.strategy);
    }
}

#[test]
fn shutdown_waits_for_queued_jobs() {
    let size = GridSize::new(8, 40).unwrap();
    let jobs = plan_tiles(size, 40, 200).jobs;
    for cfg in [
        PoolConfiguration::fixed(2, 40),
        PoolConfiguration::elastic(40),
        PoolConfiguration::work_stealing(2, 40),
    ] {
        let mut exec = create_executor(&cfg, view()).unwrap();
        let handles = jobs
            .iter()
            .map(|j| exec.submit(*j).unwrap())
            .collect::<Vec<_>>();
        exec.shutdown().unwrap();
        for h in handles {
            h.wait().unwrap();
        }
    }
}

#[test]
fn work_stealing_shutdown_joins_every_worker() {
    let mut pool = work_stealing::WorkStealingPool::new(16, escape_kernel(view())).unwrap();
    assert_eq!(pool.live_workers(), 16);

    let size = GridSize::new(8, 32).unwrap();
    let handles = plan_tiles(size, 32, 100)
        .jobs
        .into_iter()
        .map(|j| pool.submit(j).unwrap())
        .collect::<Vec<_>>();
    pool.shutdown().unwrap();

    // No polling: the threads must be gone by the time shutdown returns.
    assert_eq!(pool.live_workers(), 0);
    for h in handles {
        h.wait().unwrap();
    }
}

#[test]
fn kernel_panic_surfaces_as_worker_fault() {
    let size = GridSize::new(4, 8).unwrap();
    let jobs = plan_tiles(size, 4, 10).jobs;
    for cfg in configs() {
        let mut exec = create_executor_with_kernel(&cfg, panicking_kernel(5)).unwrap();
        let handles = jobs
            .iter()
            .map(|j| exec.submit(*j).unwrap())
            .collect::<Vec<_>>();
        let err = await_all(handles).unwrap_err();
        match err {
            MandelError::WorkerFault {
                row_start,
                row_end,
                ref message,
            } => {
                assert_eq!((row_start, row_end), (4, 6), "{}", cfg.strategy);
                assert!(message.contains("row 5"), "{message}");
            }
            other => panic!("{}: unexpected {other}", cfg.strategy),
        }
        // Workers survive a faulting tile.
        exec.shutdown().unwrap();
    }
}

#[test]
fn await_all_on_no_handles_is_empty() {
    assert!(await_all(Vec::new()).unwrap().is_empty());
}

#[test]
fn dropped_reply_is_a_worker_fault() {
    let job = TileJob::new(2..3, 0..4, 5).unwrap();
    let (handle, reply) = TileHandle::pending(job);
    drop(reply);
    assert!(await_all(vec![handle]).unwrap_err().is_worker_fault());
}

#[test]
fn invalid_configurations_are_rejected() {
    for cfg in [
        PoolConfiguration::fixed(0, 4),
        PoolConfiguration::work_stealing(0, 4),
        PoolConfiguration {
            elastic_idle_timeout_ms: 0,
            ..PoolConfiguration::elastic(4)
        },
    ] {
        assert!(matches!(
            create_executor(&cfg, view()),
            Err(MandelError::Validation(_))
        ));
    }
    // Sequential and elastic ignore the concurrency field.
    let cfg = PoolConfiguration {
        concurrency: 0,
        ..PoolConfiguration::sequential(1)
    };
    assert!(create_executor(&cfg, view()).is_ok());
}

#[test]
fn fixed_pool_starts_exactly_n_threads() {
    let cfg = PoolConfiguration::fixed(5, 10);
    let exec = create_executor(&cfg, view()).unwrap();
    assert_eq!(exec.stats().threads_started, 5);
}

#[test]
fn elastic_pool_retires_idle_workers() {
    let mut pool = elastic::ElasticPool::new(Duration::from_millis(20), escape_kernel(view()));
    let job = TileJob::new(0..2, 0..4, 10).unwrap();
    let handle = pool.submit(job).unwrap();
    handle.wait().unwrap();
    assert_eq!(pool.stats().threads_started, 1);

    let deadline = Instant::now() + Duration::from_secs(5);
    while pool.live_workers() > 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(pool.live_workers(), 0);
    assert_eq!(pool.stats().threads_retired, 1);

    // A fresh worker is spawned for work arriving after retirement.
    pool.submit(job).unwrap().wait().unwrap();
    assert_eq!(pool.stats().threads_started, 2);
    pool.shutdown().unwrap();
}

#[test]
fn elastic_pool_grows_for_concurrent_jobs() {
    const BURST: usize = 6;
    // Every job blocks until all of them are running, so each needs its own thread.
    let barrier = Arc::new(Barrier::new(BURST));
    let inner = escape_kernel(view());
    let kernel: TileKernel = Arc::new(move |job: &TileJob| {
        barrier.wait();
        inner(job)
    });

    let mut pool = elastic::ElasticPool::new(Duration::from_secs(30), kernel);
    let size = GridSize::new(4, BURST as u32).unwrap();
    let handles = plan_tiles(size, BURST as u32, 10)
        .jobs
        .into_iter()
        .map(|j| pool.submit(j).unwrap())
        .collect::<Vec<_>>();

    assert_eq!(pool.stats().threads_started, BURST as u64);
    let results = await_all(handles).unwrap();
    assert_eq!(results.len(), BURST);
    pool.shutdown().unwrap();
    assert_eq!(pool.live_workers(), 0);
}

#[test]
fn elastic_pool_reuses_idle_worker() {
    let mut pool = elastic::ElasticPool::new(Duration::from_secs(30), escape_kernel(view()));
    let job = TileJob::new(0..2, 0..4, 10).unwrap();
    for _ in 0..5 {
        pool.submit(job).unwrap().wait().unwrap();
    }
    assert_eq!(pool.stats().threads_started, 1);
    assert_eq!(pool.stats().jobs_submitted, 5);
    pool.shutdown().unwrap();
    assert_eq!(pool.live_workers(), 0);
}

#[test]
fn strategy_names_round_trip_through_serde() {
    for s in PoolStrategy::ALL {
        let json = serde_json::to_string(&s).unwrap();
        assert_eq!(json, format!("\"{}\"", s.as_str()));
        assert_eq!(serde_json::from_str::<PoolStrategy>(&json).unwrap(), s);
    }
    let cfg: PoolConfiguration =
        serde_json::from_str(r#"{"strategy":"fixed","concurrency":8}"#).unwrap();
    assert_eq!(cfg.cut_count, 1);
    assert_eq!(cfg.elastic_idle_timeout_ms, 60_000);
}
