use crate::error::ConfigError;

pub const ENV_POOL_NAME: &str = "WORKER_POOL_NAME";
pub const ENV_POOL_SIZE: &str = "WORKER_POOL_SIZE";
pub const ENV_QUEUE_CAPACITY: &str = "WORKER_POOL_QUEUE_CAPACITY";

const DEFAULT_POOL_NAME: &str = "workerpool";
const DEFAULT_WORKERS: usize = 5;

/// Construction parameters for a `WorkerPool`.
///
/// Values are coerced rather than rejected: a worker count of zero becomes one,
/// and a missing or zero queue capacity becomes twice the worker count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
  pub name: String,
  pub workers: usize,
  pub queue_capacity: Option<usize>,
}

impl Default for PoolConfig {
  fn default() -> Self {
    Self {
      name: DEFAULT_POOL_NAME.to_string(),
      workers: DEFAULT_WORKERS,
      queue_capacity: None,
    }
  }
}

impl PoolConfig {
  pub fn new(workers: usize) -> Self {
    Self {
      workers,
      ..Self::default()
    }
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  pub fn with_workers(mut self, workers: usize) -> Self {
    self.workers = workers;
    self
  }

  pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
    self.queue_capacity = Some(capacity);
    self
  }

  /// Builds a config from the defaults, overridden by `WORKER_POOL_NAME`,
  /// `WORKER_POOL_SIZE` and `WORKER_POOL_QUEUE_CAPACITY` when they are set
  /// and non-empty.
  pub fn from_env() -> Result<Self, ConfigError> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
  where
    F: Fn(&str) -> Option<String>,
  {
    let mut config = Self::default();

    if let Some(name) = non_empty(lookup(ENV_POOL_NAME)) {
      config.name = name;
    }
    if let Some(raw) = non_empty(lookup(ENV_POOL_SIZE)) {
      config.workers = parse_count(ENV_POOL_SIZE, &raw)?;
    }
    if let Some(raw) = non_empty(lookup(ENV_QUEUE_CAPACITY)) {
      config.queue_capacity = Some(parse_count(ENV_QUEUE_CAPACITY, &raw)?);
    }

    Ok(config)
  }

  pub(crate) fn effective_workers(&self) -> usize {
    self.workers.max(1)
  }

  pub(crate) fn effective_queue_capacity(&self) -> usize {
    match self.queue_capacity {
      Some(capacity) if capacity > 0 => capacity,
      _ => self.effective_workers() * 2,
    }
  }
}

fn non_empty(value: Option<String>) -> Option<String> {
  value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_count(key: &str, raw: &str) -> Result<usize, ConfigError> {
  raw.parse::<usize>().map_err(|_| ConfigError::InvalidValue {
    key: key.to_string(),
    value: raw.to_string(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect();
    move |key| map.get(key).cloned()
  }

  #[test]
  fn defaults_apply_when_environment_is_empty() {
    let config = PoolConfig::from_lookup(lookup_from(&[])).unwrap();
    assert_eq!(config, PoolConfig::default());
    assert_eq!(config.effective_workers(), 5);
    assert_eq!(config.effective_queue_capacity(), 10);
  }

  #[test]
  fn environment_overrides_defaults() {
    let config = PoolConfig::from_lookup(lookup_from(&[
      (ENV_POOL_NAME, "orders_post_processing"),
      (ENV_POOL_SIZE, "3"),
      (ENV_QUEUE_CAPACITY, " 12 "),
    ]))
    .unwrap();

    assert_eq!(config.name, "orders_post_processing");
    assert_eq!(config.workers, 3);
    assert_eq!(config.queue_capacity, Some(12));
    assert_eq!(config.effective_queue_capacity(), 12);
  }

  #[test]
  fn blank_values_are_ignored() {
    let config = PoolConfig::from_lookup(lookup_from(&[(ENV_POOL_NAME, ""), (ENV_POOL_SIZE, "   ")])).unwrap();
    assert_eq!(config, PoolConfig::default());
  }

  #[test]
  fn invalid_size_is_reported_with_key() {
    let err = PoolConfig::from_lookup(lookup_from(&[(ENV_POOL_SIZE, "-2")])).unwrap_err();
    assert_eq!(
      err,
      ConfigError::InvalidValue {
        key: ENV_POOL_SIZE.to_string(),
        value: "-2".to_string(),
      }
    );
  }

  #[test]
  fn zero_values_are_coerced() {
    let config = PoolConfig::new(0).with_queue_capacity(0);
    assert_eq!(config.effective_workers(), 1);
    assert_eq!(config.effective_queue_capacity(), 2);
  }

  #[test]
  fn builder_setters_chain() {
    let config = PoolConfig::default()
      .with_name("mailer")
      .with_workers(4)
      .with_queue_capacity(32);
    assert_eq!(config.name, "mailer");
    assert_eq!(config.effective_workers(), 4);
    assert_eq!(config.effective_queue_capacity(), 32);
  }
}
