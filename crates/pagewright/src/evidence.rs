//! Failure evidence: screenshots, console dumps and trace archives.
//!
//! Artifacts land in `{base_dir}/{YYYY-MM-DD}/{prefix}_{HHMMSS}_{8 hex}.{ext}`.
//! The random suffix keeps names unique across parallel workers within the
//! same second.
//!
//! Evidence capture never fails the caller. Every method returns `Option`:
//! `None` means "nothing written", whether because capture is switched off or
//! because writing failed (logged at `warn`). The original test failure is
//! what matters.

use crate::driver::Driver;
use crate::trace::TraceRecorder;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment flag that suppresses all screenshots when set to `1`.
pub const DISABLE_SCREENSHOTS_ENV: &str = "DISABLE_SCREENSHOTS";

/// Writes diagnostic artifacts into a dated directory tree.
#[derive(Debug, Clone)]
pub struct EvidenceService {
    base_dir: PathBuf,
    capture_console: bool,
    capture_trace: bool,
}

impl EvidenceService {
    /// Creates a service rooted at `base_dir` with console and trace capture on.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            capture_console: true,
            capture_trace: true,
        }
    }

    /// Turns console log dumps on or off.
    #[must_use]
    pub fn with_console_capture(mut self, enabled: bool) -> Self {
        self.capture_console = enabled;
        self
    }

    /// Turns trace export on or off.
    #[must_use]
    pub fn with_trace_capture(mut self, enabled: bool) -> Self {
        self.capture_trace = enabled;
        self
    }

    /// Root of the evidence tree.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Saves a full-page PNG screenshot.
    ///
    /// Returns `None` without touching the filesystem when
    /// `DISABLE_SCREENSHOTS=1`.
    pub async fn save<D: Driver + ?Sized>(&self, driver: &D, prefix: &str) -> Option<PathBuf> {
        if screenshots_disabled() {
            debug!(prefix, "screenshots disabled, skipping");
            return None;
        }

        let png = match driver.screenshot(true).await {
            Ok(png) => png,
            Err(e) => {
                warn!(prefix, error = %e, "screenshot capture failed");
                return None;
            }
        };

        let path = self.write_artifact(prefix, "png", &png)?;
        info!(path = %path.display(), "screenshot saved");
        Some(path)
    }

    /// Writes console lines, one per line, to a `.log` file.
    ///
    /// Returns `None` when there is nothing to write or console capture is off.
    pub fn save_console_logs(&self, messages: &[String], prefix: &str) -> Option<PathBuf> {
        if !self.capture_console || messages.is_empty() {
            return None;
        }

        let path = self.write_artifact(prefix, "log", messages.join("\n").as_bytes())?;
        info!(path = %path.display(), lines = messages.len(), "console log saved");
        Some(path)
    }

    /// Finalizes `trace` and writes it as a `.zip` archive.
    ///
    /// Returns `None` when trace capture is off or the export fails (for
    /// instance because the trace was already exported).
    pub fn export_trace(&self, trace: &TraceRecorder, prefix: &str) -> Option<PathBuf> {
        if !self.capture_trace {
            return None;
        }

        let path = match self.artifact_path(prefix, "zip") {
            Ok(path) => path,
            Err(e) => {
                warn!(prefix, error = %e, "could not prepare evidence directory");
                return None;
            }
        };

        match trace.export(&path) {
            Ok(()) => {
                info!(path = %path.display(), "trace exported");
                Some(path)
            }
            Err(e) => {
                warn!(prefix, error = %e, "trace export failed");
                // Don't leave a truncated archive behind.
                let _ = std::fs::remove_file(&path);
                None
            }
        }
    }

    fn write_artifact(&self, prefix: &str, extension: &str, bytes: &[u8]) -> Option<PathBuf> {
        let result = self
            .artifact_path(prefix, extension)
            .and_then(|path| std::fs::write(&path, bytes).map(|()| path));

        match result {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(prefix, extension, error = %e, "failed to write evidence");
                None
            }
        }
    }

    /// Creates today's directory and returns a fresh, unique file path in it.
    fn artifact_path(&self, prefix: &str, extension: &str) -> std::io::Result<PathBuf> {
        let now = chrono::Local::now();
        let dir = self.base_dir.join(now.format("%Y-%m-%d").to_string());
        std::fs::create_dir_all(&dir)?;

        let file_name = format!(
            "{}_{}_{}.{extension}",
            sanitize_prefix(prefix),
            now.format("%H%M%S"),
            random_suffix()
        );
        Ok(dir.join(file_name))
    }
}

impl Default for EvidenceService {
    fn default() -> Self {
        Self::new("evidence")
    }
}

/// True when `DISABLE_SCREENSHOTS=1` is set in the process environment.
#[must_use]
pub fn screenshots_disabled() -> bool {
    std::env::var(DISABLE_SCREENSHOTS_ENV).is_ok_and(|v| v == "1")
}

/// Path separators would create stray directories; everything else is kept.
fn sanitize_prefix(prefix: &str) -> String {
    prefix.replace(['/', '\\'], "_")
}

fn random_suffix() -> String {
    let mut hex = uuid::Uuid::new_v4().simple().to_string();
    hex.truncate(8);
    hex
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDriver;
    use serial_test::serial;
    use std::collections::HashSet;
    use std::time::Instant;

    fn set_disable_screenshots(value: Option<&str>) {
        // SAFETY: tests touching the environment are serialized with #[serial].
        unsafe {
            match value {
                Some(v) => std::env::set_var(DISABLE_SCREENSHOTS_ENV, v),
                None => std::env::remove_var(DISABLE_SCREENSHOTS_ENV),
            }
        }
    }

    fn file_name(path: &Path) -> String {
        path.file_name().unwrap().to_string_lossy().into_owned()
    }

    #[tokio::test]
    #[serial]
    async fn screenshot_lands_in_dated_directory() {
        set_disable_screenshots(None);
        let dir = tempfile::tempdir().unwrap();
        let service = EvidenceService::new(dir.path());
        let driver = FakeDriver::new();

        let path = service.save(&driver, "login_failed").await.unwrap();

        let today = chrono::Local::now().format("%Y-%m-%d").to_string();
        assert_eq!(path.parent().unwrap(), dir.path().join(today));
        let name = file_name(&path);
        assert!(name.starts_with("login_failed_"));
        assert!(name.ends_with(".png"));

        // prefix _ HHMMSS _ 8 hex
        let stem = name.trim_end_matches(".png");
        let parts: Vec<&str> = stem.rsplitn(3, '_').collect();
        assert_eq!(parts[0].len(), 8);
        assert!(parts[0].chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(parts[1].len(), 6);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));

        assert_eq!(std::fs::read(&path).unwrap(), driver.screenshot_bytes());
    }

    #[tokio::test]
    #[serial]
    async fn disabled_screenshots_write_nothing() {
        set_disable_screenshots(Some("1"));
        let dir = tempfile::tempdir().unwrap();
        let service = EvidenceService::new(dir.path().join("evidence"));

        let saved = service.save(&FakeDriver::new(), "anything").await;
        set_disable_screenshots(None);

        assert!(saved.is_none());
        assert!(!dir.path().join("evidence").exists());
    }

    #[tokio::test]
    #[serial]
    async fn only_the_value_one_disables_screenshots() {
        set_disable_screenshots(Some("0"));
        let dir = tempfile::tempdir().unwrap();
        let service = EvidenceService::new(dir.path());

        let saved = service.save(&FakeDriver::new(), "shot").await;
        set_disable_screenshots(None);

        assert!(saved.is_some());
    }

    #[tokio::test]
    #[serial]
    async fn failed_screenshot_is_swallowed() {
        set_disable_screenshots(None);
        let dir = tempfile::tempdir().unwrap();
        let service = EvidenceService::new(dir.path());
        let driver = FakeDriver::new();
        driver.close_now();

        assert!(service.save(&driver, "closed").await.is_none());
    }

    #[test]
    fn names_are_unique_within_the_same_second() {
        let dir = tempfile::tempdir().unwrap();
        let service = EvidenceService::new(dir.path());
        let lines = vec!["[log] hi".to_string()];

        let names: HashSet<String> = (0..50)
            .map(|_| file_name(&service.save_console_logs(&lines, "same").unwrap()))
            .collect();

        assert_eq!(names.len(), 50);
    }

    #[test]
    fn console_logs_one_message_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let service = EvidenceService::new(dir.path());
        let lines = vec!["[log] loaded".to_string(), "[error] boom".to_string()];

        let path = service.save_console_logs(&lines, "test_x_local").unwrap();

        assert!(file_name(&path).ends_with(".log"));
        assert_eq!(
            std::fs::read_to_string(path).unwrap(),
            "[log] loaded\n[error] boom"
        );
    }

    #[test]
    fn empty_or_disabled_console_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let service = EvidenceService::new(dir.path());
        assert!(service.save_console_logs(&[], "empty").is_none());

        let off = service.clone().with_console_capture(false);
        assert!(off.save_console_logs(&["[log] x".into()], "off").is_none());
    }

    #[test]
    fn trace_export_is_a_zip_and_only_once() {
        let dir = tempfile::tempdir().unwrap();
        let service = EvidenceService::new(dir.path());
        let trace = TraceRecorder::start();
        trace.record("click", "#go", Instant::now(), None);

        let path = service.export_trace(&trace, "trace").unwrap();
        assert!(file_name(&path).ends_with(".zip"));
        assert!(path.exists());

        assert!(service.export_trace(&trace, "trace").is_none());
        let disabled = service.with_trace_capture(false);
        assert!(disabled.export_trace(&TraceRecorder::start(), "t").is_none());
    }

    #[test]
    fn prefixes_cannot_escape_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let service = EvidenceService::new(dir.path());

        let path = service
            .save_console_logs(&["x".into()], "tests/login.rs::fails")
            .unwrap();

        assert!(file_name(&path).starts_with("tests_login.rs::fails_"));
        assert_eq!(path.parent().unwrap().parent().unwrap(), dir.path());
    }
}
