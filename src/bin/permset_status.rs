use clap::{Parser, Subcommand};
use permset::config::RunConfig;
use permset::job_board::JobBoard;
use permset::job_status::JobStatus;
use permset::partition;
use permset::PermsetError;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "permset_status")]
#[command(about = "Inspect and repair job status markers of a permutation run", long_about = None)]
struct Cli {
    /// State directory (defaults to $PERMSET_STATE_DIR or ./permset_state)
    #[arg(long)]
    state_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the run config and create one unit per chunk
    Init {
        #[arg(long)]
        permutations: u64,
        #[arg(long)]
        chunks: u64,
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
    /// Print every unit with its permutation range and status
    Show,
    /// Force one unit into a status
    Set {
        unit: u64,
        /// ready, busy or done
        status: String,
    },
    /// Reset busy units whose marker is older than the grace period
    Recover {
        #[arg(long, default_value_t = 600)]
        max_age_secs: u64,
    },
    /// Print the permutation ranges of splitting n permutations into k chunks
    Chunks { n: u64, k: u64 },
}

fn chunk_lines(n: u64, k: u64) -> Result<Vec<String>, PermsetError> {
    Ok(partition::chunk(n, k)?
        .enumerate()
        .map(|(index, range)| format!("{:>6}  {}..{}", index, range.start, range.end))
        .collect())
}

fn run(cli: Cli) -> Result<(), PermsetError> {
    let state_dir = cli
        .state_dir
        .unwrap_or_else(|| RunConfig::from_env().state_dir);
    let mut config = RunConfig::load_or_default(&state_dir)?;
    let board = JobBoard::new(config.jobs_dir());

    match cli.command {
        Commands::Init {
            permutations,
            chunks,
            seed,
        } => {
            config.num_permutations = permutations;
            config.num_chunks = chunks;
            config.rand_seed = seed;
            config.save()?;
            board.init(config.chunks()?.len() as u64)?;
            println!(
                "[permset] {} permutations in {} chunks under {}",
                permutations,
                chunks,
                board.jobs_dir().display()
            );
        }
        Commands::Show => {
            let ranges: Vec<_> = config.chunks()?.collect();
            for unit in board.units()? {
                let range = ranges
                    .get(unit as usize)
                    .map(|r| format!("{}..{}", r.start, r.end))
                    .unwrap_or_else(|| "?".to_string());
                println!("{:>6}  {:>20}  {}", unit, range, board.status(unit)?);
            }
            let counts = board.counts()?;
            println!(
                "[permset] ready={} busy={} done={}",
                counts.ready, counts.busy, counts.done
            );
        }
        Commands::Set { unit, status } => {
            let status: JobStatus = status.parse()?;
            board.set_status(unit, status)?;
            println!("[permset] unit {} -> {}", unit, status);
        }
        Commands::Recover { max_age_secs } => {
            let recovered = board.recover_stale(Duration::from_secs(max_age_secs))?;
            println!("[permset] reset {} stale unit(s): {:?}", recovered.len(), recovered);
        }
        Commands::Chunks { n, k } => {
            for line in chunk_lines(n, k)? {
                println!("{}", line);
            }
        }
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("[permset] {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunks_command_parses() {
        let cli = Cli::try_parse_from(["permset_status", "chunks", "10", "3"]).unwrap();
        assert!(matches!(cli.command, Commands::Chunks { n: 10, k: 3 }));
        assert!(Cli::try_parse_from(["permset_status", "chunks", "10"]).is_err());
    }

    #[test]
    fn test_chunk_lines() {
        let lines = chunk_lines(10, 3).unwrap();
        assert_eq!(lines, vec!["     0  0..4", "     1  4..7", "     2  7..10"]);
        assert!(chunk_lines(10, 0).is_err());
    }
}
