// round-core/src/round/aggregation.rs

//! Model aggregation call-out.
//!
//! The coordinator hands a finished round to an [`Aggregator`] and only cares
//! whether it succeeded. [`ProcessAggregator`] runs the federated averaging
//! script as a child process:
//!
//! ```text
//! <program> <script> --cf <checkpoint> --mf <model> --u <w1> <p1> <w2> <p2> ...
//! ```

use std::ffi::OsString;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::AggregationConfig;
use crate::error::{Result, RoundError};

/// Everything needed to average one round of updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationJob {
    /// Round the updates belong to.
    pub round: u64,
    /// Checkpoint that receives the averaged weights.
    pub checkpoint_path: PathBuf,
    /// Model architecture file.
    pub model_path: PathBuf,
    /// `(weight, artifact path)` pairs ordered by client index.
    pub updates: Vec<(i64, PathBuf)>,
}

impl AggregationJob {
    /// Arguments following the script name on the aggregation command line.
    pub fn command_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--cf".into(),
            self.checkpoint_path.clone().into_os_string(),
            "--mf".into(),
            self.model_path.clone().into_os_string(),
            "--u".into(),
        ];
        for (weight, path) in &self.updates {
            args.push(weight.to_string().into());
            args.push(path.clone().into_os_string());
        }
        args
    }
}

/// Performs the averaging for a completed round.
#[async_trait]
pub trait Aggregator: Send + Sync {
    /// Runs the aggregation and waits for it to complete.
    ///
    /// # Errors
    ///
    /// Returns an error if the aggregation could not be run or reported failure.
    async fn aggregate(&self, job: AggregationJob) -> Result<()>;
}

/// Runs the aggregation script as an external process.
#[derive(Debug, Clone)]
pub struct ProcessAggregator {
    program: String,
    script: Option<PathBuf>,
}

impl ProcessAggregator {
    pub fn new(config: &AggregationConfig) -> Self {
        let script = if config.script.as_os_str().is_empty() {
            None
        } else {
            Some(config.script.clone())
        };
        Self {
            program: config.program.clone(),
            script,
        }
    }

    fn command(&self, job: &AggregationJob) -> Command {
        let mut command = Command::new(&self.program);
        if let Some(script) = &self.script {
            command.arg(script);
        }
        command.args(job.command_args());
        command.kill_on_drop(true);
        command
    }
}

#[async_trait]
impl Aggregator for ProcessAggregator {
    async fn aggregate(&self, job: AggregationJob) -> Result<()> {
        tracing::info!(
            "Running aggregation for round {} with {} update(s): {}",
            job.round,
            job.updates.len(),
            self.program
        );

        let status = self.command(&job).status().await.map_err(|e| {
            RoundError::aggregation_with_source(
                format!("failed to launch '{}'", self.program),
                e,
            )
        })?;

        if !status.success() {
            return Err(RoundError::aggregation(format!(
                "'{}' exited with {}",
                self.program, status
            )));
        }

        Ok(())
    }
}
