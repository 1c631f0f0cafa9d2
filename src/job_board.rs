use crate::job_status::{self, JobStatus};
use crate::PermsetError;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const UNIT_PREFIX: &str = "chunk_";

/// Number of units in each state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub ready: usize,
    pub busy: usize,
    pub done: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.ready + self.busy + self.done
    }
}

/// A directory of work units, one `chunk_<index>` subdirectory each, whose
/// state is tracked with job status markers.
#[derive(Debug, Clone)]
pub struct JobBoard {
    jobs_dir: PathBuf,
}

impl JobBoard {
    pub fn new(jobs_dir: PathBuf) -> Self {
        Self { jobs_dir }
    }

    pub fn jobs_dir(&self) -> &Path {
        &self.jobs_dir
    }

    pub fn unit_dir(&self, index: u64) -> PathBuf {
        self.jobs_dir.join(format!("{}{}", UNIT_PREFIX, index))
    }

    /// Create directories for units `0..num_units`. Existing units and their
    /// markers are left alone, so this is safe to call from every worker.
    pub fn init(&self, num_units: u64) -> Result<(), PermsetError> {
        for index in 0..num_units {
            fs::create_dir_all(self.unit_dir(index))?;
        }
        Ok(())
    }

    /// Indices of all unit directories, ascending
    pub fn units(&self) -> Result<Vec<u64>, PermsetError> {
        if !self.jobs_dir.exists() {
            return Ok(Vec::new());
        }
        let mut units = Vec::new();
        for entry in fs::read_dir(&self.jobs_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let index = name
                .to_str()
                .and_then(|n| n.strip_prefix(UNIT_PREFIX))
                .and_then(|n| n.parse::<u64>().ok());
            if let Some(index) = index {
                units.push(index);
            }
        }
        units.sort_unstable();
        Ok(units)
    }

    pub fn status(&self, index: u64) -> Result<JobStatus, PermsetError> {
        job_status::get(&self.unit_dir(index))
    }

    pub fn set_status(&self, index: u64, status: JobStatus) -> Result<(), PermsetError> {
        job_status::set(&self.unit_dir(index), status)
    }

    /// Refresh the busy marker of a unit this process is working on
    pub fn heartbeat(&self, index: u64) -> Result<(), PermsetError> {
        job_status::touch(&self.unit_dir(index), JobStatus::Busy)
    }

    /// Mark a unit busy. Returns `false` when another process got there first.
    pub fn try_claim(&self, index: u64) -> Result<bool, PermsetError> {
        match self.set_status(index, JobStatus::Busy) {
            Ok(()) => {
                tracing::info!(unit = index, "claimed unit");
                Ok(true)
            }
            Err(PermsetError::Invariant(msg)) => {
                tracing::debug!(unit = index, %msg, "unit claimed elsewhere");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Mark the lowest ready unit busy and return its index.
    ///
    /// A unit that another process marks busy between the read and the write
    /// is skipped.
    pub fn claim_next(&self) -> Result<Option<u64>, PermsetError> {
        for index in self.units()? {
            if self.status(index)? != JobStatus::Ready {
                continue;
            }
            if self.try_claim(index)? {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    pub fn counts(&self) -> Result<StatusCounts, PermsetError> {
        let mut counts = StatusCounts::default();
        for index in self.units()? {
            match self.status(index)? {
                JobStatus::Ready => counts.ready += 1,
                JobStatus::Busy => counts.busy += 1,
                JobStatus::Done => counts.done += 1,
            }
        }
        Ok(counts)
    }

    pub fn is_complete(&self) -> Result<bool, PermsetError> {
        let counts = self.counts()?;
        Ok(counts.total() > 0 && counts.done == counts.total())
    }

    /// Reset busy units whose marker has not been refreshed within `max_age`
    /// back to ready. Returns the reset indices.
    pub fn recover_stale(&self, max_age: Duration) -> Result<Vec<u64>, PermsetError> {
        let mut recovered = Vec::new();
        for index in self.units()? {
            let dir = self.unit_dir(index);
            if job_status::get(&dir)? != JobStatus::Busy {
                continue;
            }
            let Some(age) = job_status::marker_age(&dir, JobStatus::Busy)? else {
                continue;
            };
            if age > max_age {
                job_status::set(&dir, JobStatus::Ready)?;
                tracing::info!(unit = index, age_secs = age.as_secs(), "reset stale busy unit");
                recovered.push(index);
            }
        }
        Ok(recovered)
    }
}
