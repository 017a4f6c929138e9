//! Configuration for the NATS event sink.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct NatsConfig {
    /// NATS server URLs (comma-separated for cluster).
    pub urls: Vec<String>,
    /// Prepended to every event subject.
    pub subject_prefix: String,
    /// Connection timeout.
    pub connection_timeout: Duration,
    /// Request timeout.
    pub request_timeout: Duration,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            urls: vec!["nats://localhost:4222".to_string()],
            subject_prefix: "kiln".to_string(),
            connection_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl NatsConfig {
    /// Create a new config with a single URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            ..Default::default()
        }
    }

    /// Set multiple server URLs for cluster support.
    pub fn with_urls(mut self, urls: Vec<String>) -> Self {
        self.urls = urls;
        self
    }

    pub fn with_subject_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.subject_prefix = prefix.into();
        self
    }

    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Full subject for an event subject.
    pub fn subject_for(&self, subject: &str) -> String {
        if self.subject_prefix.is_empty() {
            subject.to_string()
        } else {
            format!("{}.{}", self.subject_prefix, subject)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = NatsConfig::new("nats://nats:4222")
            .with_subject_prefix("ci")
            .with_connection_timeout(Duration::from_secs(1));

        assert_eq!(config.urls, vec!["nats://nats:4222"]);
        assert_eq!(config.subject_for("build.start"), "ci.build.start");
        assert_eq!(config.connection_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_empty_prefix() {
        let config = NatsConfig::default().with_subject_prefix("");
        assert_eq!(config.subject_for("log.x"), "log.x");
    }
}
