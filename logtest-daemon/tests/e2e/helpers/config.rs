//! Test configuration builder for E2E tests.

use std::path::{Path, PathBuf};

use logtest_core::config::LogtestConfig;

pub fn fixture(dir: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(dir)
        .display()
        .to_string()
}

/// Builder for test-friendly `LogtestConfig` instances.
///
/// By default the socket lives in the given directory, no PID file is
/// written, metrics are disabled and the sshd fixtures are loaded.
#[allow(dead_code)]
pub struct TestConfigBuilder {
    config: LogtestConfig,
}

#[allow(dead_code)]
impl TestConfigBuilder {
    pub fn new(dir: &Path) -> Self {
        let mut config = LogtestConfig::default();
        config.general.pid_file = String::new();
        config.logtest.socket_path = dir.join("logtest.sock").display().to_string();
        config.logtest.threads = 2;
        config.analysis.decoder_paths = vec![fixture("decoders")];
        config.analysis.rule_paths = vec![fixture("rules")];
        config.analysis.list_paths = Vec::new();
        config.metrics.enabled = false;
        Self { config }
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.config.logtest.threads = threads;
        self
    }

    pub fn max_sessions(mut self, max: usize) -> Self {
        self.config.logtest.max_sessions = max;
        self
    }

    pub fn max_message_size(mut self, size: usize) -> Self {
        self.config.logtest.max_message_size = size;
        self
    }

    pub fn pid_file(mut self, path: &Path) -> Self {
        self.config.general.pid_file = path.display().to_string();
        self
    }

    pub fn rule_paths(mut self, paths: Vec<String>) -> Self {
        self.config.analysis.rule_paths = paths;
        self
    }

    pub fn build(self) -> LogtestConfig {
        self.config
    }
}
