//! Video lifecycle orchestration.
//!
//! - [`service::VideoService`] owns the lifecycle state machine: ingest,
//!   status reads, and `advance`.
//! - [`analyzer`] defines the contract of the NLP / CV / risk
//!   sub-pipelines and runs them side by side.
//! - [`processor::VideoProcessor`] is the background trigger that carries
//!   one video from `UPLOADED` to a terminal status.
//! - [`dispatcher::TaskDispatcher`] feeds the processor from the durable
//!   task queue.

pub mod analyzer;
pub mod dispatcher;
pub mod processor;
pub mod service;

/// Read an environment variable, falling back to `default` when unset.
///
/// Panics on a value that does not parse, so a misspelled setting stops
/// startup instead of being silently replaced.
pub(crate) fn env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    parse_or(key, std::env::var(key).ok().as_deref(), default)
}

fn parse_or<T>(key: &str, raw: Option<&str>, default: T) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => default,
        Some(value) => value.trim().parse().unwrap_or_else(|e| {
            panic!(
                "{key} must be a valid {}, got {value:?}: {e}",
                std::any::type_name::<T>()
            )
        }),
    }
}
