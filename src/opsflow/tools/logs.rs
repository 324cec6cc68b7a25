// SPDX-License-Identifier: MIT

use crate::kit::{OpsflowError, Result, Tool};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct LogTotals {
    pub total_files: usize,
    pub total_lines: usize,
    pub total_errors: usize,
    pub total_warnings: usize,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct FileSummary {
    pub file: String,
    pub lines: usize,
    pub errors: usize,
    pub warnings: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogSummary {
    pub summary: LogTotals,
    pub files: Vec<FileSummary>,
}

#[derive(Debug, PartialEq)]
enum LineKind {
    Error,
    Warning,
    Other,
}

fn classify(line: &str) -> LineKind {
    if line.contains("ERROR") || line.contains("CRITICAL") || line.contains("FATAL") {
        LineKind::Error
    } else if line.contains("WARN") {
        LineKind::Warning
    } else {
        LineKind::Other
    }
}

/// Summarizes the log files found directly inside a directory
pub struct LogAnalyticsTool {
    log_directory: PathBuf,
}

impl LogAnalyticsTool {
    pub fn new(log_directory: impl Into<PathBuf>) -> Self {
        Self {
            log_directory: log_directory.into(),
        }
    }

    pub async fn summarize(&self) -> Result<LogSummary> {
        if !tokio::fs::try_exists(&self.log_directory).await? {
            return Err(OpsflowError::other(format!(
                "Log directory not found: {}",
                self.log_directory.display()
            )));
        }

        let mut entries = tokio::fs::read_dir(&self.log_directory).await?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }

            let bytes = tokio::fs::read(entry.path()).await?;
            let text = String::from_utf8_lossy(&bytes);

            let mut summary = FileSummary {
                file: entry.file_name().to_string_lossy().into_owned(),
                lines: 0,
                errors: 0,
                warnings: 0,
            };
            for line in text.lines() {
                summary.lines += 1;
                match classify(line) {
                    LineKind::Error => summary.errors += 1,
                    LineKind::Warning => summary.warnings += 1,
                    LineKind::Other => {}
                }
            }
            files.push(summary);
        }

        files.sort_by(|a, b| a.file.cmp(&b.file));

        let totals = files.iter().fold(LogTotals::default(), |mut acc, f| {
            acc.total_files += 1;
            acc.total_lines += f.lines;
            acc.total_errors += f.errors;
            acc.total_warnings += f.warnings;
            acc
        });

        Ok(LogSummary {
            summary: totals,
            files,
        })
    }
}

#[async_trait]
impl Tool for LogAnalyticsTool {
    fn name(&self) -> &str {
        "log_analytics"
    }

    fn description(&self) -> &str {
        "Summarizes log files in a directory: file, line, error and warning counts."
    }

    async fn run(&self, command: &str) -> Result<String> {
        log::info!(
            "Analyzing logs in {} ({})",
            self.log_directory.display(),
            command
        );
        let summary = self.summarize().await?;
        Ok(serde_json::to_string(&summary)?)
    }
}
