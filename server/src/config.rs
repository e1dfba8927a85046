use std::time::Duration;

/// Default time a player gets to finish one turn.
pub const DEFAULT_QUANTUM: Duration = Duration::from_secs(90);

/// Pause before the scheduler rechecks when nobody can take a turn.
pub const DEFAULT_IDLE_BACKOFF: Duration = Duration::from_millis(100);

/// Runtime settings for the game server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub quantum: Duration,
    pub idle_backoff: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7878,
            quantum: DEFAULT_QUANTUM,
            idle_backoff: DEFAULT_IDLE_BACKOFF,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn with_quantum(mut self, quantum: Duration) -> Self {
        self.quantum = quantum;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.address(), "127.0.0.1:7878");
        assert_eq!(config.quantum, Duration::from_secs(90));
    }

    #[test]
    fn test_with_quantum() {
        let config = ServerConfig::default().with_quantum(Duration::from_secs(5));
        assert_eq!(config.quantum.as_secs(), 5);
    }
}
