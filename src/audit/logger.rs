//! JSON-lines audit file writer.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::AgentError;

use super::entry::AuditEntry;

/// Appends audit entries to a file, one JSON object per line.
pub struct AuditLogger {
    file: Mutex<File>,
    path: PathBuf,
}

impl AuditLogger {
    /// Open `path` for appending, creating the parent directory if needed.
    ///
    /// A newly created file is readable by the owner only.
    pub fn new(path: &Path) -> Result<Self, AgentError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                debug!(path = %parent.display(), "Creating audit log directory");
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let file = options.open(path)?;

        debug!(path = %path.display(), "Audit logger initialized");

        Ok(Self {
            file: Mutex::new(file),
            path: path.to_path_buf(),
        })
    }

    /// Write one entry and sync it to disk.
    pub fn log(&self, entry: &AuditEntry) -> Result<(), AgentError> {
        let json = serde_json::to_string(entry)?;

        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(file, "{}", json)?;

        if let Err(e) = file.sync_data() {
            warn!(error = %e, "Failed to sync audit log");
        }

        debug!(
            request_id = %entry.request_id,
            method = %entry.method,
            "Audit entry logged"
        );

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditOutcome;
    use crate::auth::Identity;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn entry(method: &str, outcome: AuditOutcome) -> AuditEntry {
        AuditEntry::new(
            Uuid::nil(),
            method,
            &Identity::new("127.0.0.1"),
            &serde_json::json!({"token": "super-secret"}),
        )
        .finish(outcome, 1)
    }

    #[test]
    fn test_logger_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("subdir/audit.log");

        let logger = AuditLogger::new(&log_path).unwrap();
        assert!(log_path.parent().unwrap().exists());
        assert_eq!(logger.path(), log_path);
    }

    #[test]
    fn test_logger_writes_json_lines() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("audit.log");
        let logger = AuditLogger::new(&log_path).unwrap();

        logger
            .log(&entry("/runixo.AgentService/Authenticate", AuditOutcome::Success))
            .unwrap();
        logger
            .log(&entry(
                "/runixo.AgentService/Ping",
                AuditOutcome::Denied {
                    error_code: "RESOURCE_EXHAUSTED".to_string(),
                },
            ))
            .unwrap();

        let content = std::fs::read_to_string(&log_path).unwrap();
        assert!(!content.contains("super-secret"));

        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["outcome"]["status"], "success");
        assert_eq!(lines[1]["outcome"]["error_code"], "RESOURCE_EXHAUSTED");
    }

    #[test]
    fn test_logger_appends_to_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("audit.log");

        for _ in 0..2 {
            let logger = AuditLogger::new(&log_path).unwrap();
            logger
                .log(&entry("/runixo.AgentService/Ping", AuditOutcome::Success))
                .unwrap();
        }

        let content = std::fs::read_to_string(&log_path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_new_log_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("audit.log");
        AuditLogger::new(&log_path).unwrap();

        let mode = std::fs::metadata(&log_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0);
    }
}
