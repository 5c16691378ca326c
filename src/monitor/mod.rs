//! Polls notebook kernels through the `kaggle` CLI and flags failing runs.

mod repair;

pub use repair::{repair_kernel, RepairKind};

use std::path::PathBuf;
use std::process::Output;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::process::Command;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::error::Result;

/// Substrings that mark a log as failed, checked in this order.
pub const FAILURE_INDICATORS: &[&str] = &[
    "error",
    "exception",
    "traceback",
    "failed",
    "timeout",
    "infinite loop",
    "hang",
    "stuck",
    "cuda error",
    "gpu error",
    "tpu error",
    "memory error",
    "oom",
    "out of memory",
];

pub const DEFAULT_KERNELS: &[&str] = &[
    "elyria-tts-tester-cpu",
    "elyria-tts-tester-gpu",
    "elyria-tts-tester-tpu",
    "elyria-video-tester-cpu",
    "elyria-video-tester-gpu",
    "elyria-video-tester-tpu",
];

const STATUS_TIMEOUT: Duration = Duration::from_secs(30);
const OUTPUT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogVerdict {
    Healthy,
    Failure(String),
}

impl LogVerdict {
    pub fn is_healthy(&self) -> bool {
        matches!(self, LogVerdict::Healthy)
    }
}

/// Returns the first failure indicator found in the lowercased log.
pub fn analyze_log(content: &str) -> LogVerdict {
    let lowered = content.to_lowercase();
    FAILURE_INDICATORS
        .iter()
        .find(|indicator| lowered.contains(*indicator))
        .map(|indicator| LogVerdict::Failure(indicator.to_string()))
        .unwrap_or(LogVerdict::Healthy)
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub owner: String,
    pub kernels: Vec<String>,
    pub log_dir: PathBuf,
    pub interval: Duration,
    pub once: bool,
    pub repair: bool,
    pub kaggle_program: PathBuf,
}

impl MonitorConfig {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            kernels: DEFAULT_KERNELS.iter().map(|k| k.to_string()).collect(),
            log_dir: PathBuf::from("monitoring/logs"),
            interval: Duration::from_secs(60),
            once: false,
            repair: false,
            kaggle_program: PathBuf::from("kaggle"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct KernelReport {
    pub kernel: String,
    pub log_path: PathBuf,
    pub verdict: LogVerdict,
}

pub struct Monitor {
    config: MonitorConfig,
}

impl Monitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self { config }
    }

    /// Checks every kernel once, repairing failures when enabled.
    pub async fn check_all(&self) -> Result<Vec<KernelReport>> {
        tokio::fs::create_dir_all(&self.config.log_dir).await?;
        let mut reports = Vec::with_capacity(self.config.kernels.len());

        for kernel in &self.config.kernels {
            info!("Checking logs for: {}", kernel);
            let log_path = self.fetch_kernel_logs(kernel).await?;
            let verdict = match tokio::fs::read_to_string(&log_path).await {
                Ok(content) => analyze_log(&content),
                Err(e) => LogVerdict::Failure(format!("log_analysis_error: {}", e)),
            };

            match &verdict {
                LogVerdict::Healthy => info!("{} is running successfully", kernel),
                LogVerdict::Failure(indicator) => {
                    error!("FAILURE DETECTED in {}: {}", kernel, indicator);
                    if self.config.repair {
                        repair_kernel(kernel, indicator).await?;
                    }
                }
            }

            reports.push(KernelReport {
                kernel: kernel.clone(),
                log_path,
                verdict,
            });
        }

        Ok(reports)
    }

    /// First pass over every kernel; if all are healthy and `once` is not set,
    /// keeps polling at the configured interval.
    pub async fn run(&self) -> Result<Vec<KernelReport>> {
        let reports = self.check_all().await?;
        if !reports.iter().all(|r| r.verdict.is_healthy()) {
            warn!("Some notebooks required repairs. Process complete.");
            return Ok(reports);
        }
        if self.config.once {
            return Ok(reports);
        }

        info!("All notebooks verified, entering periodic monitoring loop");
        loop {
            tokio::time::sleep(self.config.interval).await;
            info!("Performing periodic log check...");
            self.check_all().await?;
            info!(
                "Log check complete. Sleeping for {} seconds...",
                self.config.interval.as_secs()
            );
        }
    }

    /// Writes kernel status and output into a timestamped log file.
    pub async fn fetch_kernel_logs(&self, kernel: &str) -> Result<PathBuf> {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let log_path = self.config.log_dir.join(format!("{}_{}.log", kernel, stamp));
        let slug = format!("{}/{}", self.config.owner, kernel);
        info!("Fetching logs for kernel: {}", kernel);

        let mut log = String::new();
        match self
            .kaggle(&["kernels", "status", &slug], STATUS_TIMEOUT)
            .await
        {
            Ok(output) => {
                log.push_str(&format!("Status for {}:\n", kernel));
                append_output(&mut log, &output, "\nSTDERR:\n");

                match self
                    .kaggle(&["kernels", "output", &slug, "-p", "kaggle_output"], OUTPUT_TIMEOUT)
                    .await
                {
                    Ok(output) => {
                        log.push_str(&format!("\n\nOutput for {}:\n", kernel));
                        append_output(&mut log, &output, "\nOutput STDERR:\n");
                    }
                    Err(FetchError::TimedOut) => {
                        log.push_str(&format!("\n\nOutput retrieval timed out for {}\n", kernel));
                    }
                    Err(FetchError::Io(e)) => {
                        log.push_str(&format!("\n\nError fetching output for {}: {}\n", kernel, e));
                    }
                }
            }
            Err(FetchError::TimedOut) => log = format!("Timeout fetching logs for {}\n", kernel),
            Err(FetchError::Io(e)) => log = format!("Error fetching logs for {}: {}\n", kernel, e),
        }

        tokio::fs::write(&log_path, log).await?;
        Ok(log_path)
    }

    async fn kaggle(&self, args: &[&str], limit: Duration) -> std::result::Result<Output, FetchError> {
        let mut command = Command::new(&self.config.kaggle_program);
        command.args(args).kill_on_drop(true);
        match timeout(limit, command.output()).await {
            Ok(result) => result.map_err(FetchError::Io),
            Err(_) => Err(FetchError::TimedOut),
        }
    }
}

enum FetchError {
    TimedOut,
    Io(std::io::Error),
}

fn append_output(log: &mut String, output: &Output, stderr_heading: &str) {
    log.push_str(&String::from_utf8_lossy(&output.stdout));
    if !output.stderr.is_empty() {
        log.push_str(stderr_heading);
        log.push_str(&String::from_utf8_lossy(&output.stderr));
    }
}
