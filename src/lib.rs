pub mod config;
pub mod error;
pub mod histogram;
pub mod job_board;
pub mod job_status;
pub mod json_lines;
pub mod metadata;
pub mod partition;
pub mod quantile;
pub mod result;
pub mod sample_set;
pub mod worker;

pub use error::*;
pub use json_lines::JsonLine;
