use crate::class::ExecutionClass;
use once_cell::sync::OnceCell;
use thiserror::Error;

/// Error produced while building or installing a [`RuntimeConfig`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// A pool was asked to run with zero worker threads.
    #[error("thread count for {class} must be positive")]
    InvalidThreadCount {
        /// Name of the class whose pool was being sized.
        class: String,
    },
    /// Only the built-in concurrent classes have configurable pools.
    #[error("{class} has no configurable worker pool")]
    NotConfigurable {
        /// Name of the rejected class.
        class: String,
    },
    /// Worker threads need a non-empty name prefix.
    #[error("thread name prefix must not be empty")]
    EmptyThreadNamePrefix,
    /// The built-in queues were already started with another configuration.
    #[error("runtime is already initialized")]
    AlreadyInitialized,
}

/// Process-wide settings for the built-in execution classes.
///
/// A thread count of `0` leaves the pool size to rayon, which starts one
/// worker per available CPU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    thread_name_prefix: String,
    interactive_threads: usize,
    initiated_threads: usize,
    utility_threads: usize,
    background_threads: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            thread_name_prefix: "chainq".to_owned(),
            interactive_threads: 0,
            initiated_threads: 0,
            utility_threads: 0,
            background_threads: 0,
        }
    }
}

impl RuntimeConfig {
    /// Configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of worker threads backing a built-in concurrent class.
    ///
    /// # Errors
    /// If `threads` is zero, or `class` is the main or a custom class.
    pub fn with_threads(mut self, class: &ExecutionClass, threads: usize) -> Result<Self, ConfigError> {
        let slot = match class {
            ExecutionClass::Interactive => &mut self.interactive_threads,
            ExecutionClass::Initiated => &mut self.initiated_threads,
            ExecutionClass::Utility => &mut self.utility_threads,
            ExecutionClass::Background => &mut self.background_threads,
            ExecutionClass::Main | ExecutionClass::Custom(_) => {
                return Err(ConfigError::NotConfigurable {
                    class: class.to_string(),
                });
            }
        };
        if threads == 0 {
            return Err(ConfigError::InvalidThreadCount {
                class: class.to_string(),
            });
        }
        *slot = threads;
        Ok(self)
    }

    /// Set the prefix used when naming worker threads.
    ///
    /// # Errors
    /// If `prefix` is empty.
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Result<Self, ConfigError> {
        let prefix = prefix.into();
        if prefix.is_empty() {
            return Err(ConfigError::EmptyThreadNamePrefix);
        }
        self.thread_name_prefix = prefix;
        Ok(self)
    }

    /// Prefix used when naming worker threads.
    #[must_use]
    pub fn thread_name_prefix(&self) -> &str {
        &self.thread_name_prefix
    }

    /// Configured worker count for a class; `None` for the main and custom
    /// classes, `Some(0)` when rayon picks the size.
    #[must_use]
    pub fn threads(&self, class: &ExecutionClass) -> Option<usize> {
        match class {
            ExecutionClass::Interactive => Some(self.interactive_threads),
            ExecutionClass::Initiated => Some(self.initiated_threads),
            ExecutionClass::Utility => Some(self.utility_threads),
            ExecutionClass::Background => Some(self.background_threads),
            ExecutionClass::Main | ExecutionClass::Custom(_) => None,
        }
    }
}

static CONFIG: OnceCell<RuntimeConfig> = OnceCell::new();

/// Install the process-wide configuration.
///
/// Must run before anything touches a built-in execution class or schedules
/// delayed work; the first such use freezes the defaults.
///
/// # Errors
/// [`ConfigError::AlreadyInitialized`] if a configuration is already in
/// effect.
pub fn configure(config: RuntimeConfig) -> Result<(), ConfigError> {
    CONFIG
        .set(config)
        .map_err(|_| ConfigError::AlreadyInitialized)
}

/// Configuration in effect, freezing the defaults on first call.
pub(crate) fn current() -> &'static RuntimeConfig {
    CONFIG.get_or_init(RuntimeConfig::default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Queue;

    #[test]
    fn with_threads_sets_only_the_requested_class() {
        let config = RuntimeConfig::new()
            .with_threads(&ExecutionClass::Utility, 3)
            .unwrap();
        assert_eq!(config.threads(&ExecutionClass::Utility), Some(3));
        assert_eq!(config.threads(&ExecutionClass::Background), Some(0));
        assert_eq!(config.threads(&ExecutionClass::Main), None);
    }

    #[test]
    fn with_threads_rejects_zero_and_unpooled_classes() {
        assert_eq!(
            RuntimeConfig::new().with_threads(&ExecutionClass::Interactive, 0),
            Err(ConfigError::InvalidThreadCount {
                class: "interactive".to_owned()
            })
        );
        assert_eq!(
            RuntimeConfig::new().with_threads(&ExecutionClass::Main, 2),
            Err(ConfigError::NotConfigurable {
                class: "main".to_owned()
            })
        );
        let custom = ExecutionClass::Custom(Queue::serial("cfg-test").unwrap());
        assert!(matches!(
            RuntimeConfig::new().with_threads(&custom, 2),
            Err(ConfigError::NotConfigurable { .. })
        ));
    }

    #[test]
    fn empty_prefix_is_rejected() {
        assert_eq!(
            RuntimeConfig::new().with_thread_name_prefix(""),
            Err(ConfigError::EmptyThreadNamePrefix)
        );
        let config = RuntimeConfig::new().with_thread_name_prefix("app").unwrap();
        assert_eq!(config.thread_name_prefix(), "app");
    }

    #[test]
    fn configure_twice_fails() {
        // Either this call or an earlier runtime start already froze a config.
        let _ = configure(RuntimeConfig::default());
        assert_eq!(
            configure(RuntimeConfig::default()),
            Err(ConfigError::AlreadyInitialized)
        );
    }
}
