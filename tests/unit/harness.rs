use super::*;

fn key(variant: &str) -> CellKey {
    CellKey {
        max_iter: 10,
        threads: 2,
        variant: variant.to_string(),
    }
}

fn tiny_plan() -> SweepPlan {
    SweepPlan {
        width: 16,
        height: 12,
        viewport: Viewport::new(4.0, 8.0, 6.0).unwrap(),
        max_iters: vec![10, 40],
        thread_counts: vec![1, 3],
        repeats: 2,
        warmup: 1,
        elastic_idle_timeout_ms: 50,
        ..SweepPlan::classic()
    }
}

#[test]
fn cut_policies_scale_with_threads() {
    assert_eq!(CutPolicy::Whole.cut_count(60), 1);
    assert_eq!(CutPolicy::Fixed(7).cut_count(60), 7);
    assert_eq!(CutPolicy::PerThread(10).cut_count(6), 60);
    assert_eq!(CutPolicy::PerThread(10).cut_count(usize::MAX), u32::MAX);
}

#[test]
fn classic_plan_matches_the_benchmark_shape() {
    let plan = SweepPlan::classic();
    plan.validate().unwrap();
    assert_eq!((plan.width, plan.height), (800, 600));
    assert_eq!(plan.max_iters, vec![555, 5550]);
    assert_eq!(plan.thread_counts, vec![10, 60]);

    let names = plan.variants.iter().map(|v| v.name.as_str()).collect::<Vec<_>>();
    assert_eq!(
        names,
        [
            "single_no_cut",
            "single_cut",
            "fixed",
            "work_stealing",
            "cached",
            "no_executor"
        ]
    );

    let single_cut = &plan.variants[1];
    let cfg = single_cut.pool_config(10, plan.elastic_idle_timeout_ms);
    assert_eq!(cfg.concurrency, 1);
    assert_eq!(cfg.cut_count, 100);
}

#[test]
fn plan_parses_from_partial_json() {
    let plan = SweepPlan::from_json_str(
        r#"{
            "width": 64,
            "height": 48,
            "max_iters": [100],
            "thread_counts": [2],
            "variants": [
                {"name": "steal", "strategy": "work_stealing", "cut": {"per_thread": 4}},
                {"name": "solo", "strategy": "sequential", "cut": "whole"}
            ]
        }"#,
    )
    .unwrap();
    assert_eq!(plan.width, 64);
    assert_eq!(plan.repeats, SweepPlan::classic().repeats);
    assert_eq!(plan.variants[0].cut, CutPolicy::PerThread(4));
    assert_eq!(plan.variants[1].pool_threads, None);
}

#[test]
fn invalid_plans_are_rejected() {
    let dup = SweepPlan {
        variants: vec![
            SweepVariant::new("a", PoolStrategy::Fixed, CutPolicy::Whole),
            SweepVariant::new("a", PoolStrategy::Elastic, CutPolicy::Whole),
        ],
        ..tiny_plan()
    };
    assert!(matches!(dup.validate(), Err(MandelError::Validation(_))));

    let mut bad = tiny_plan();
    bad.thread_counts = vec![2, 0];
    assert!(bad.validate().is_err());
    let mut bad = tiny_plan();
    bad.max_iters.clear();
    assert!(bad.validate().is_err());
    let mut bad = tiny_plan();
    bad.repeats = 0;
    assert!(bad.validate().is_err());
    let mut bad = tiny_plan();
    bad.width = 0;
    assert!(bad.validate().is_err());

    assert!(matches!(
        SweepPlan::from_json_str("{ not json"),
        Err(MandelError::Serde(_))
    ));
}

#[test]
fn accumulator_summarizes_with_nearest_rank() {
    let mut acc = TimingAccumulator::new();
    assert!(acc.summary(&key("a")).is_none());
    for ms in [5u64, 1, 4, 2, 3, 6, 7, 8, 9, 10] {
        acc.record(key("a"), Duration::from_millis(ms));
    }
    assert_eq!(acc.samples(&key("a")).len(), 10);
    assert_eq!(acc.samples(&key("b")), &[] as &[Duration]);

    let s = acc.summary(&key("a")).unwrap();
    assert_eq!(s.runs, 10);
    assert_eq!(s.min_ns, 1_000_000);
    assert_eq!(s.max_ns, 10_000_000);
    assert_eq!(s.mean_ns, 5_500_000);
    assert_eq!(s.p50_ns, 5_000_000);
    assert_eq!(s.p90_ns, 9_000_000);

    acc.clear();
    assert_eq!(acc.cells().count(), 0);
}

#[test]
fn single_sample_is_every_percentile() {
    let mut acc = TimingAccumulator::new();
    acc.record(key("a"), Duration::from_nanos(42));
    let s = acc.summary(&key("a")).unwrap();
    assert_eq!((s.min_ns, s.p50_ns, s.p90_ns, s.max_ns), (42, 42, 42, 42));
}

#[test]
fn sweep_covers_every_cell_and_variant() {
    let plan = tiny_plan();
    let mut acc = TimingAccumulator::new();
    let report = run_sweep(&plan, &mut acc).unwrap();

    assert_eq!(report.rows.len(), 2 * 2 * plan.variants.len());
    assert!(report.rows.iter().all(|r| r.timing.runs == 2));
    assert_eq!(acc.cells().count(), report.rows.len());

    let whole = report
        .rows
        .iter()
        .find(|r| r.variant == "no_executor")
        .unwrap();
    assert_eq!(whole.tiles, 1);
    let fixed = report
        .rows
        .iter()
        .find(|r| r.variant == "fixed" && r.threads == 1)
        .unwrap();
    assert_eq!(fixed.tiles, 10);

    let text = report.to_text();
    assert!(text.starts_with("Max iterations: 10\nThreads: 1\n"), "{text}");
    assert_eq!(text.matches("Max iterations:").count(), 4);
    assert!(text.lines().any(|l| l.starts_with("work_stealing ")));

    let json: serde_json::Value = serde_json::from_str(&report.to_json_pretty().unwrap()).unwrap();
    assert_eq!(json["width"], 16);
    assert_eq!(json["rows"].as_array().unwrap().len(), report.rows.len());

    // Executor counters from the last timed run ride along in every row.
    assert_eq!(fixed.pool.jobs_submitted, 10);
    assert_eq!(fixed.pool.threads_started, 1);
    let fixed_json = json["rows"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["variant"] == "fixed" && r["threads"] == 1)
        .unwrap();
    assert_eq!(fixed_json["pool"]["jobs_submitted"], 10);
    assert_eq!(fixed_json["pool"]["threads_retired"], 0);
}

#[test]
fn repeated_sweeps_share_the_accumulator() {
    let plan = SweepPlan {
        max_iters: vec![10],
        thread_counts: vec![2],
        warmup: 0,
        repeats: 1,
        variants: vec![SweepVariant::new("seq", PoolStrategy::Sequential, CutPolicy::Whole)],
        ..tiny_plan()
    };
    let mut acc = TimingAccumulator::new();
    run_sweep(&plan, &mut acc).unwrap();
    let report = run_sweep(&plan, &mut acc).unwrap();
    assert_eq!(report.rows[0].timing.runs, 2);
}
