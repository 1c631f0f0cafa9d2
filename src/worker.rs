use crate::config::RunConfig;
use crate::histogram::NullHistogram;
use crate::job_board::JobBoard;
use crate::job_status::{self, JobStatus};
use crate::PermsetError;
use std::fs;
use std::ops::Range;
use std::path::PathBuf;

const HISTOGRAM_FILE: &str = "null.bin";

/// One claimed partition of the permutation workload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkTask {
    pub index: u64,
    pub permutations: Range<u64>,
    pub seed: u64,
    pub unit_dir: PathBuf,
}

impl ChunkTask {
    /// Refresh the unit's busy marker. Long scoring loops call this between
    /// batches so the supervisor does not reset the unit as stale.
    pub fn touch_heartbeat(&self) -> Result<(), PermsetError> {
        job_status::touch(&self.unit_dir, JobStatus::Busy)
    }
}

/// Runs claimed partitions of a permutation run inside one process.
///
/// The scoring closure receives the partition and a fresh histogram to fill.
/// Its result is persisted next to the unit's markers before the unit is
/// marked done, so a rerun after a crash recomputes the partition from the
/// same seed.
pub struct Worker {
    config: RunConfig,
    board: JobBoard,
}

impl Worker {
    /// Create the job board for `config` if needed
    pub fn new(config: RunConfig) -> Result<Self, PermsetError> {
        config.validate()?;
        let board = JobBoard::new(config.jobs_dir());
        let units = config.chunks()?.len() as u64;
        board.init(units)?;
        Ok(Self { config, board })
    }

    pub fn board(&self) -> &JobBoard {
        &self.board
    }

    pub fn histogram_path(&self, index: u64) -> PathBuf {
        self.board.unit_dir(index).join(HISTOGRAM_FILE)
    }

    fn task(&self, index: u64) -> Result<ChunkTask, PermsetError> {
        let permutations = self.config.chunks()?.nth(index as usize).ok_or_else(|| {
            PermsetError::Invariant(format!(
                "unit {} is outside the {} configured chunks",
                index, self.config.num_chunks
            ))
        })?;
        Ok(ChunkTask {
            index,
            permutations,
            seed: self.config.chunk_seed(index),
            unit_dir: self.board.unit_dir(index),
        })
    }

    /// Claim and run the next ready partition. Returns the partition index, or
    /// `None` when nothing is ready. On error the unit stays busy for the
    /// supervisor to reset.
    ///
    /// A unit that was reset and finished by another worker meanwhile counts
    /// as done here too; both wrote the same histogram.
    pub fn run_next<F>(&self, score: &mut F) -> Result<Option<u64>, PermsetError>
    where
        F: FnMut(&ChunkTask, &mut NullHistogram) -> Result<(), PermsetError>,
    {
        let Some(index) = self.board.claim_next()? else {
            return Ok(None);
        };
        let task = self.task(index)?;
        let mut hist = self.config.new_histogram()?;
        if let Err(e) = score(&task, &mut hist) {
            tracing::error!(unit = index, error = %e, "scoring failed, leaving unit busy");
            return Err(e);
        }

        let path = self.histogram_path(index);
        let tmp = path.with_extension("bin.tmp");
        hist.save(&tmp)?;
        fs::rename(&tmp, &path)?;
        match self.board.set_status(index, JobStatus::Done) {
            Ok(()) => {}
            Err(PermsetError::Invariant(msg)) if self.board.status(index)? == JobStatus::Done => {
                tracing::warn!(unit = index, %msg, "partition already finished elsewhere");
                return Ok(Some(index));
            }
            Err(e) => return Err(e),
        }
        tracing::info!(
            unit = index,
            start = task.permutations.start,
            end = task.permutations.end,
            "partition done"
        );
        Ok(Some(index))
    }

    /// Run partitions until none are ready; returns how many this call ran
    pub fn run_all<F>(&self, mut score: F) -> Result<usize, PermsetError>
    where
        F: FnMut(&ChunkTask, &mut NullHistogram) -> Result<(), PermsetError>,
    {
        let mut ran = 0;
        while self.run_next(&mut score)?.is_some() {
            ran += 1;
        }
        Ok(ran)
    }

    /// Merge the histograms of every finished partition
    pub fn merged_histogram(&self) -> Result<NullHistogram, PermsetError> {
        let mut merged = self.config.new_histogram()?;
        for index in self.board.units()? {
            if self.board.status(index)? != JobStatus::Done {
                continue;
            }
            merged.merge(&NullHistogram::load(&self.histogram_path(index))?)?;
        }
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::{Duration, SystemTime};

    fn age_busy_marker(worker: &Worker, index: u64, secs: u64) {
        let path = JobStatus::Busy.marker_path(&worker.board().unit_dir(index));
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(secs))
            .unwrap();
    }

    fn config(dir: &std::path::Path) -> RunConfig {
        let mut config = RunConfig::custom(dir.to_path_buf());
        config.num_permutations = 10;
        config.num_chunks = 3;
        config.hist_bins = 10;
        config
    }

    fn fake_scores(task: &ChunkTask, hist: &mut NullHistogram) -> Result<(), PermsetError> {
        for p in task.permutations.clone() {
            hist.add((p as f64 / 10.0) - 0.45);
        }
        Ok(())
    }

    #[test]
    fn test_run_all_covers_every_permutation() {
        let temp_dir = tempfile::tempdir().unwrap();
        let worker = Worker::new(config(temp_dir.path())).unwrap();
        let mut seen = Vec::new();
        let ran = worker
            .run_all(|task, hist| {
                seen.push(task.permutations.clone());
                fake_scores(task, hist)
            })
            .unwrap();
        assert_eq!(ran, 3);
        assert_eq!(seen, vec![0..4, 4..7, 7..10]);
        assert!(worker.board().is_complete().unwrap());
        assert_eq!(worker.merged_histogram().unwrap().total(), 10);
    }

    #[test]
    fn test_failed_partition_stays_busy() {
        let temp_dir = tempfile::tempdir().unwrap();
        let worker = Worker::new(config(temp_dir.path())).unwrap();
        let mut fail = |_: &ChunkTask, _: &mut NullHistogram| -> Result<(), PermsetError> {
            Err(PermsetError::Other("boom".into()))
        };
        assert!(worker.run_next(&mut fail).is_err());
        assert_eq!(worker.board().status(0).unwrap(), JobStatus::Busy);
        assert!(!worker.histogram_path(0).exists());
    }

    #[test]
    fn test_seeds_follow_chunk_index() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut cfg = config(temp_dir.path());
        cfg.rand_seed = 100;
        let worker = Worker::new(cfg).unwrap();
        let mut seeds = Vec::new();
        worker
            .run_all(|task, _| {
                seeds.push(task.seed);
                Ok(())
            })
            .unwrap();
        assert_eq!(seeds, vec![100, 101, 102]);
    }

    #[test]
    fn test_heartbeat_keeps_running_partition_fresh() {
        let temp_dir = tempfile::tempdir().unwrap();
        let worker = Worker::new(config(temp_dir.path())).unwrap();
        let mut recovered = Vec::new();
        let mut score = |task: &ChunkTask, hist: &mut NullHistogram| -> Result<(), PermsetError> {
            age_busy_marker(&worker, task.index, 3600);
            task.touch_heartbeat()?;
            recovered = worker.board().recover_stale(Duration::from_secs(600))?;
            fake_scores(task, hist)
        };
        assert_eq!(worker.run_next(&mut score).unwrap(), Some(0));
        assert!(recovered.is_empty());
        assert_eq!(worker.board().status(0).unwrap(), JobStatus::Done);
    }

    #[test]
    fn test_partition_finished_elsewhere_counts_as_done() {
        let temp_dir = tempfile::tempdir().unwrap();
        let slow = Worker::new(config(temp_dir.path())).unwrap();
        let other = Worker::new(config(temp_dir.path())).unwrap();

        let mut score = |task: &ChunkTask, hist: &mut NullHistogram| -> Result<(), PermsetError> {
            // the supervisor gives up on this unit and another worker reruns it
            age_busy_marker(&slow, task.index, 3600);
            let recovered = slow.board().recover_stale(Duration::from_secs(600))?;
            assert_eq!(recovered, vec![task.index]);
            let mut rerun = fake_scores;
            assert_eq!(other.run_next(&mut rerun)?, Some(task.index));
            fake_scores(task, hist)
        };
        assert_eq!(slow.run_next(&mut score).unwrap(), Some(0));
        assert_eq!(slow.board().status(0).unwrap(), JobStatus::Done);
        assert_eq!(slow.merged_histogram().unwrap().total(), 4);

        let mut rest = fake_scores;
        assert_eq!(slow.run_next(&mut rest).unwrap(), Some(1));
    }
}
