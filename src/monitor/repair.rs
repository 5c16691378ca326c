use tokio::process::Command;
use tracing::{info, warn};

use crate::error::{Result, VideoError};

/// Broad class of a detected failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairKind {
    LoopOrHang,
    Memory,
    Device,
    Other,
}

impl RepairKind {
    pub fn classify(failure: &str) -> Self {
        let failure = failure.to_lowercase();
        if contains_any(&failure, &["infinite loop", "hang", "stuck"]) {
            RepairKind::LoopOrHang
        } else if contains_any(&failure, &["memory", "oom"]) {
            RepairKind::Memory
        } else if contains_any(&failure, &["gpu", "cuda", "tpu"]) {
            RepairKind::Device
        } else {
            RepairKind::Other
        }
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

pub fn commit_message(kernel: &str, failure: &str) -> String {
    format!("Fix: Addressed {} in {}", failure, kernel)
}

/// Records a fix for `kernel` by committing and pushing the working tree.
pub async fn repair_kernel(kernel: &str, failure: &str) -> Result<()> {
    info!("Repairing {} for {}...", kernel, failure);
    match RepairKind::classify(failure) {
        RepairKind::LoopOrHang => info!("Checking timeout safeguards for {}", kernel),
        RepairKind::Memory => info!("Optimizing memory usage for {}...", kernel),
        RepairKind::Device => info!("Adjusting device configuration for {}...", kernel),
        RepairKind::Other => {}
    }

    let message = commit_message(kernel, failure);
    for args in [
        vec!["add", "."],
        vec!["commit", "-m", message.as_str()],
        vec!["push"],
    ] {
        let status = Command::new("git")
            .args(&args)
            .status()
            .await
            .map_err(|e| VideoError::MonitorError(format!("failed to run git {}: {}", args[0], e)))?;
        if !status.success() {
            warn!("git {} exited with {}", args[0], status);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_failures() {
        assert_eq!(RepairKind::classify("infinite loop"), RepairKind::LoopOrHang);
        assert_eq!(RepairKind::classify("out of memory"), RepairKind::Memory);
        assert_eq!(RepairKind::classify("cuda error"), RepairKind::Device);
        assert_eq!(RepairKind::classify("traceback"), RepairKind::Other);
    }

    #[test]
    fn commit_message_names_kernel() {
        assert_eq!(
            commit_message("elyria-tts-tester-gpu", "oom"),
            "Fix: Addressed oom in elyria-tts-tester-gpu"
        );
    }
}
