use crate::PermsetError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, SystemTime};

/// State of one work unit, stored as an empty marker file in the unit's
/// directory. No marker at all reads as `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Ready,
    Busy,
    Done,
}

impl JobStatus {
    /// All states in read precedence order
    pub const PRECEDENCE: [JobStatus; 3] = [JobStatus::Done, JobStatus::Busy, JobStatus::Ready];

    pub fn marker(self) -> &'static str {
        match self {
            JobStatus::Ready => "job.ready",
            JobStatus::Busy => "job.busy",
            JobStatus::Done => "job.done",
        }
    }

    pub fn marker_path(self, dir: &Path) -> PathBuf {
        dir.join(self.marker())
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Ready => "ready",
            JobStatus::Busy => "busy",
            JobStatus::Done => "done",
        };
        f.write_str(s)
    }
}

impl FromStr for JobStatus {
    type Err = PermsetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ready" => Ok(JobStatus::Ready),
            "busy" => Ok(JobStatus::Busy),
            "done" => Ok(JobStatus::Done),
            other => Err(PermsetError::InvalidArgument(format!(
                "unknown job status '{}' (expected ready, busy or done)",
                other
            ))),
        }
    }
}

/// Move the unit in `dir` to `status`.
///
/// Setting a status whose marker already exists is a protocol violation and
/// fails with `Invariant`. Other markers are removed first, then the new
/// marker is created with create-new semantics so two writers cannot both
/// create it.
pub fn set(dir: &Path, status: JobStatus) -> Result<(), PermsetError> {
    let status_path = status.marker_path(dir);
    if status_path.try_exists()? {
        return Err(PermsetError::Invariant(format!(
            "{} already marked {}",
            dir.display(),
            status
        )));
    }
    for other in JobStatus::PRECEDENCE.into_iter().filter(|s| *s != status) {
        match fs::remove_file(other.marker_path(dir)) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(PermsetError::Io(e)),
        }
    }
    match OpenOptions::new().write(true).create_new(true).open(&status_path) {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            return Err(PermsetError::Invariant(format!(
                "{} was marked {} concurrently",
                dir.display(),
                status
            )));
        }
        Err(e) => return Err(PermsetError::Io(e)),
    }
    tracing::debug!(unit = %dir.display(), %status, "job status set");
    Ok(())
}

/// Current status of the unit in `dir`: done, else busy, else ready
pub fn get(dir: &Path) -> Result<JobStatus, PermsetError> {
    for status in [JobStatus::Done, JobStatus::Busy] {
        if status.marker_path(dir).try_exists()? {
            return Ok(status);
        }
    }
    Ok(JobStatus::Ready)
}

/// Refresh the modification time of an existing marker (heartbeat for busy
/// units)
pub fn touch(dir: &Path, status: JobStatus) -> Result<(), PermsetError> {
    let path = status.marker_path(dir);
    let file = match File::options().write(true).open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(PermsetError::Invariant(format!(
                "{} is not marked {}",
                dir.display(),
                status
            )));
        }
        Err(e) => return Err(PermsetError::Io(e)),
    };
    file.set_modified(SystemTime::now())?;
    Ok(())
}

/// Time since the marker for `status` was last written, `None` if absent
pub fn marker_age(dir: &Path, status: JobStatus) -> Result<Option<Duration>, PermsetError> {
    let metadata = match fs::metadata(status.marker_path(dir)) {
        Ok(m) => m,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(PermsetError::Io(e)),
    };
    let modified = metadata.modified()?;
    // A clock that went backwards reads as a fresh marker
    Ok(Some(SystemTime::now().duration_since(modified).unwrap_or_default()))
}
