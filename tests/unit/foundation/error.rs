use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        MandelError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        MandelError::planning("x")
            .to_string()
            .contains("planning error:")
    );
    assert!(
        MandelError::merge_invariant("x")
            .to_string()
            .contains("merge invariant violated:")
    );
    assert!(
        MandelError::pool_shutdown("x")
            .to_string()
            .contains("pool is shut down:")
    );
    assert!(
        MandelError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
}

#[test]
fn worker_fault_names_the_tile_rows() {
    let err = MandelError::worker_fault(8..16, "boom");
    assert!(err.is_worker_fault());
    assert_eq!(err.to_string(), "worker fault on rows 8..16: boom");
    assert!(!MandelError::validation("x").is_worker_fault());
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = MandelError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
