use permset::config::RunConfig;
use permset::histogram::NullHistogram;
use permset::job_status::JobStatus;
use permset::worker::{ChunkTask, Worker};
use permset::PermsetError;
use std::fs::File;
use std::time::{Duration, SystemTime};

fn run_config(dir: &std::path::Path) -> RunConfig {
    let mut config = RunConfig::custom(dir.to_path_buf());
    config.num_permutations = 100;
    config.num_chunks = 4;
    config.hist_bins = 20;
    config.rand_seed = 7;
    config
}

/// Deterministic stand-in for the permuted statistic: depends only on the
/// permutation index and the chunk seed.
fn pseudo_scores(task: &ChunkTask, hist: &mut NullHistogram) -> Result<(), PermsetError> {
    for p in task.permutations.clone() {
        if p % 25 == 0 {
            task.touch_heartbeat()?;
        }
        let x = (p.wrapping_mul(2654435761).wrapping_add(task.seed) % 1000) as f64;
        hist.add(x / 500.0 - 1.0);
    }
    Ok(())
}

#[test]
fn test_crashed_unit_is_recovered_and_rerun() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = run_config(temp_dir.path());

    // reference run without a crash
    let clean_dir = tempfile::tempdir().unwrap();
    let clean = Worker::new(run_config(clean_dir.path())).unwrap();
    clean.run_all(pseudo_scores).unwrap();
    let expected = clean.merged_histogram().unwrap();

    let worker = Worker::new(config.clone()).unwrap();
    let mut crash = |_: &ChunkTask, _: &mut NullHistogram| -> Result<(), PermsetError> {
        Err(PermsetError::Other("worker died".to_string()))
    };
    assert!(worker.run_next(&mut crash).is_err());
    assert_eq!(worker.board().status(0).unwrap(), JobStatus::Busy);

    // the rest of the run proceeds around the stuck unit
    assert_eq!(worker.run_all(pseudo_scores).unwrap(), 3);
    assert!(!worker.board().is_complete().unwrap());

    // a fresh marker is not reset
    assert!(worker.board().recover_stale(Duration::from_secs(600)).unwrap().is_empty());

    let busy_marker = JobStatus::Busy.marker_path(&worker.board().unit_dir(0));
    File::options()
        .write(true)
        .open(busy_marker)
        .unwrap()
        .set_modified(SystemTime::now() - Duration::from_secs(3600))
        .unwrap();
    assert_eq!(
        worker.board().recover_stale(Duration::from_secs(600)).unwrap(),
        vec![0]
    );

    assert_eq!(worker.run_all(pseudo_scores).unwrap(), 1);
    assert!(worker.board().is_complete().unwrap());
    assert_eq!(worker.merged_histogram().unwrap(), expected);
}

#[test]
fn test_rerun_after_completion_does_nothing() {
    let temp_dir = tempfile::tempdir().unwrap();
    let worker = Worker::new(run_config(temp_dir.path())).unwrap();
    assert_eq!(worker.run_all(pseudo_scores).unwrap(), 4);

    let again = Worker::new(run_config(temp_dir.path())).unwrap();
    let ran = again
        .run_all(|_, _| panic!("finished units must not be rerun"))
        .unwrap();
    assert_eq!(ran, 0);
    assert_eq!(again.merged_histogram().unwrap().total(), 100);
}

#[test]
fn test_merged_histogram_quantiles() {
    let temp_dir = tempfile::tempdir().unwrap();
    let worker = Worker::new(run_config(temp_dir.path())).unwrap();
    worker.run_all(pseudo_scores).unwrap();
    let merged = worker.merged_histogram().unwrap();

    let mut prev = f64::NEG_INFINITY;
    for i in 0..=20 {
        let q = merged.quantile(i as f64 / 20.0);
        assert!(q >= prev);
        prev = q;
    }
    assert!(merged.quantile(0.0) >= -1.0);
    assert!(merged.quantile(1.0) <= 1.0);
}
