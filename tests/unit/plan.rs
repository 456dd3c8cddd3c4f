use super::*;

fn size(w: u32, h: u32) -> GridSize {
    GridSize::new(w, h).unwrap()
}

fn assert_exact_cover(size: GridSize, jobs: &[TileJob]) {
    let mut hits = vec![0u8; size.pixel_count()];
    for job in jobs {
        assert!(job.rows().start < job.rows().end);
        assert!(job.cols().start < job.cols().end);
        for y in job.rows() {
            for x in job.cols() {
                hits[y as usize * size.width as usize + x as usize] += 1;
            }
        }
    }
    assert!(hits.iter().all(|&h| h == 1), "coverage: {hits:?}");
}

#[test]
fn bands_cover_grid_exactly_once() {
    for (w, h) in [(1, 1), (8, 6), (7, 13), (800, 600), (3, 100)] {
        for cuts in 1..=h.min(40) {
            let plan = plan_tiles(size(w, h), cuts, 50);
            assert!(!plan.fell_back);
            assert_eq!(plan.jobs.len(), cuts as usize);
            assert_exact_cover(size(w, h), &plan.jobs);
        }
    }
}

#[test]
fn bands_are_ordered_and_contiguous() {
    let plan = plan_tiles(size(10, 23), 4, 9);
    let rows = plan.jobs.iter().map(TileJob::rows).collect::<Vec<_>>();
    assert_eq!(rows, vec![0..5, 5..10, 10..15, 15..23]);
    assert!(plan.jobs.iter().all(|j| j.cols() == (0..10)));
    assert!(plan.jobs.iter().all(|j| j.max_iter() == 9));
}

#[test]
fn trailing_band_absorbs_remainder() {
    let jobs = try_plan_tiles(size(800, 600), 70, 555).unwrap();
    assert_eq!(jobs.len(), 70);
    assert!(jobs[..69].iter().all(|j| j.height() == 8));
    assert_eq!(jobs[69].height(), 600 - 69 * 8);
}

#[test]
fn even_split_has_equal_bands() {
    let jobs = try_plan_tiles(size(8, 6), 3, 50).unwrap();
    assert!(jobs.iter().all(|j| j.height() == 2));
}

#[test]
fn degenerate_cut_counts_fall_back_to_whole_image() {
    for cuts in [0, 7, 1000] {
        assert!(matches!(
            try_plan_tiles(size(8, 6), cuts, 50),
            Err(MandelError::Planning(_))
        ));
        let plan = plan_tiles(size(8, 6), cuts, 50);
        assert!(plan.fell_back);
        assert_eq!(plan.jobs.len(), 1);
        assert_eq!(plan.jobs[0].rows(), 0..6);
        assert_eq!(plan.jobs[0].cols(), 0..8);
        assert_exact_cover(size(8, 6), &plan.jobs);
    }
}

#[test]
fn tile_job_rejects_empty_ranges() {
    assert!(TileJob::new(3..3, 0..4, 10).is_err());
    assert!(TileJob::new(0..4, 2..1, 10).is_err());
    let j = TileJob::new(1..3, 0..4, 10).unwrap();
    assert_eq!(j.pixel_count(), 8);
}

#[test]
fn deserialized_tile_job_is_validated() {
    let inverted = r#"{"row_start":5,"row_end":2,"col_start":4,"col_end":0,"max_iter":1}"#;
    let err = serde_json::from_str::<TileJob>(inverted).unwrap_err();
    assert!(err.to_string().contains("at least one pixel"), "{err}");

    let empty_cols = r#"{"row_start":0,"row_end":2,"col_start":3,"col_end":3,"max_iter":1}"#;
    assert!(serde_json::from_str::<TileJob>(empty_cols).is_err());

    let job = TileJob::new(2..5, 1..4, 30).unwrap();
    let json = serde_json::to_string(&job).unwrap();
    let back: TileJob = serde_json::from_str(&json).unwrap();
    assert_eq!(back, job);
    assert_eq!(back.pixel_count(), 9);
}
