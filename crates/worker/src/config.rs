/// Worker configuration loaded from environment variables.
///
/// | Env var                 | Default    |
/// |-------------------------|------------|
/// | `DATABASE_URL`          | (required) |
/// | `SHUTDOWN_TIMEOUT_SECS` | `30`       |
///
/// Dispatcher and processor tunables are read by their own `from_env`.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    /// How long shutdown waits for in-flight processing (default: `30`).
    pub shutdown_timeout_secs: u64,
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let database_url = var("DATABASE_URL").expect("DATABASE_URL must be set");

        let shutdown_timeout_secs: u64 = var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        Self {
            database_url,
            shutdown_timeout_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn shutdown_timeout_defaults_to_thirty_seconds() {
        let config =
            WorkerConfig::from_vars(vars(&[("DATABASE_URL", "postgres://localhost/vidintel")]));
        assert_eq!(config.database_url, "postgres://localhost/vidintel");
        assert_eq!(config.shutdown_timeout_secs, 30);
    }

    #[test]
    #[should_panic(expected = "SHUTDOWN_TIMEOUT_SECS must be a valid u64")]
    fn malformed_shutdown_timeout_fails_fast() {
        WorkerConfig::from_vars(vars(&[
            ("DATABASE_URL", "postgres://localhost/vidintel"),
            ("SHUTDOWN_TIMEOUT_SECS", "soon"),
        ]));
    }

    #[test]
    #[should_panic(expected = "DATABASE_URL must be set")]
    fn database_url_is_required() {
        WorkerConfig::from_vars(vars(&[]));
    }
}
