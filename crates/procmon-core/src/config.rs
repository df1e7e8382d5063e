//! Metric category configuration.
//!
//! Categories are given as short specs on the command line or in
//! `PROCMON_METRICS`:
//!
//! - `system`
//! - `network_usage`
//! - `topn_process=N`
//! - `processes=name1,name2` (or bare `processes` for every process)

use std::str::FromStr;

/// Error type for invalid configuration. Detected before the monitor runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Unknown or malformed category spec.
    UnsupportedCategory(String),
    /// `topn_process` needs a positive count.
    InvalidTopN(String),
    /// No category enabled.
    NoCategories,
    /// Poll interval must be positive.
    ZeroInterval,
    /// Cooldown must be positive and shorter than the poll interval.
    InvalidCooldown,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::UnsupportedCategory(spec) => {
                write!(f, "unsupported metric category '{}'", spec)
            }
            ConfigError::InvalidTopN(value) => {
                write!(f, "topn_process needs a positive count, got '{}'", value)
            }
            ConfigError::NoCategories => write!(f, "no metric category enabled"),
            ConfigError::ZeroInterval => write!(f, "poll interval must be positive"),
            ConfigError::InvalidCooldown => {
                write!(f, "cooldown must be positive and shorter than the poll interval")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// A single enabled metric category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricCategory {
    System,
    NetworkUsage,
    TopNProcess(usize),
    Processes(Vec<String>),
}

impl FromStr for MetricCategory {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let spec = s.trim();
        let (name, value) = match spec.split_once('=') {
            Some((name, value)) => (name.trim(), Some(value.trim())),
            None => (spec, None),
        };

        match (name, value) {
            ("system", None) => Ok(MetricCategory::System),
            ("network_usage", None) => Ok(MetricCategory::NetworkUsage),
            ("topn_process", Some(value)) => match value.parse::<usize>() {
                Ok(n) if n > 0 => Ok(MetricCategory::TopNProcess(n)),
                _ => Err(ConfigError::InvalidTopN(value.to_string())),
            },
            ("topn_process", None) => Err(ConfigError::InvalidTopN(String::new())),
            ("processes", value) => Ok(MetricCategory::Processes(
                value
                    .unwrap_or_default()
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect(),
            )),
            _ => Err(ConfigError::UnsupportedCategory(spec.to_string())),
        }
    }
}

/// Enabled metric categories.
///
/// Immutable once handed to the monitor: fields are private and the builder
/// methods consume `self`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsConfig {
    system: bool,
    network_usage: bool,
    topn_process: Option<usize>,
    processes: Option<Vec<String>>,
}

impl MetricsConfig {
    /// An empty config; enable categories with the `with_*` methods.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a config from category specs, e.g. `["system", "topn_process=5"]`.
    ///
    /// Repeated `processes` specs accumulate names; repeated `topn_process`
    /// specs keep the last count.
    pub fn from_specs<I, S>(specs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut config = Self::new();
        for spec in specs {
            config = config.with_category(spec.as_ref().parse()?);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_category(self, category: MetricCategory) -> Self {
        match category {
            MetricCategory::System => self.with_system(),
            MetricCategory::NetworkUsage => self.with_network_usage(),
            MetricCategory::TopNProcess(n) => self.with_topn_process(n),
            MetricCategory::Processes(names) => self.with_processes(names),
        }
    }

    pub fn with_system(mut self) -> Self {
        self.system = true;
        self
    }

    pub fn with_network_usage(mut self) -> Self {
        self.network_usage = true;
        self
    }

    pub fn with_topn_process(mut self, n: usize) -> Self {
        self.topn_process = Some(n);
        self
    }

    /// Enables named process stats. An empty list selects every process.
    pub fn with_processes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list = self.processes.get_or_insert_with(Vec::new);
        for name in names {
            let name = name.into();
            if !list.contains(&name) {
                list.push(name);
            }
        }
        self
    }

    /// Checks that at least one category is enabled and parameters are valid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.topn_process == Some(0) {
            return Err(ConfigError::InvalidTopN("0".to_string()));
        }
        if !self.system
            && !self.network_usage
            && self.topn_process.is_none()
            && self.processes.is_none()
        {
            return Err(ConfigError::NoCategories);
        }
        Ok(())
    }

    pub fn system(&self) -> bool {
        self.system
    }

    pub fn network_usage(&self) -> bool {
        self.network_usage
    }

    pub fn topn_process(&self) -> Option<usize> {
        self.topn_process
    }

    pub fn processes(&self) -> Option<&[String]> {
        self.processes.as_deref()
    }

    /// Short description for startup logging, in collection order.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if self.system {
            parts.push("system".to_string());
        }
        if self.network_usage {
            parts.push("network_usage".to_string());
        }
        if let Some(n) = self.topn_process {
            parts.push(format!("topn_process={}", n));
        }
        match self.processes.as_deref() {
            Some([]) => parts.push("processes=*".to_string()),
            Some(names) => parts.push(format!("processes={}", names.join(","))),
            None => {}
        }
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_categories() {
        assert_eq!("system".parse(), Ok(MetricCategory::System));
        assert_eq!(" network_usage ".parse(), Ok(MetricCategory::NetworkUsage));
        assert_eq!("topn_process=5".parse(), Ok(MetricCategory::TopNProcess(5)));
        assert_eq!(
            "processes=systemd, init".parse(),
            Ok(MetricCategory::Processes(vec![
                "systemd".to_string(),
                "init".to_string()
            ]))
        );
        assert_eq!(
            "processes".parse(),
            Ok(MetricCategory::Processes(Vec::new()))
        );
    }

    #[test]
    fn test_parse_invalid_categories() {
        assert_eq!(
            "disk".parse::<MetricCategory>(),
            Err(ConfigError::UnsupportedCategory("disk".to_string()))
        );
        assert_eq!(
            "system=1".parse::<MetricCategory>(),
            Err(ConfigError::UnsupportedCategory("system=1".to_string()))
        );
        assert_eq!(
            "topn_process=0".parse::<MetricCategory>(),
            Err(ConfigError::InvalidTopN("0".to_string()))
        );
        assert_eq!(
            "topn_process=many".parse::<MetricCategory>(),
            Err(ConfigError::InvalidTopN("many".to_string()))
        );
        assert!("topn_process".parse::<MetricCategory>().is_err());
    }

    #[test]
    fn test_from_specs() {
        let config =
            MetricsConfig::from_specs(["system", "processes=initd", "processes=sshd,initd"])
                .unwrap();

        assert!(config.system());
        assert!(!config.network_usage());
        assert_eq!(config.topn_process(), None);
        assert_eq!(
            config.processes(),
            Some(&["initd".to_string(), "sshd".to_string()][..])
        );
        assert_eq!(config.describe(), "system, processes=initd,sshd");
    }

    #[test]
    fn test_from_specs_rejects_unsupported() {
        assert_eq!(
            MetricsConfig::from_specs(["system", "gpu"]),
            Err(ConfigError::UnsupportedCategory("gpu".to_string()))
        );
    }

    #[test]
    fn test_validate() {
        assert_eq!(MetricsConfig::new().validate(), Err(ConfigError::NoCategories));
        assert_eq!(
            MetricsConfig::from_specs(Vec::<String>::new()),
            Err(ConfigError::NoCategories)
        );
        assert_eq!(
            MetricsConfig::new().with_topn_process(0).validate(),
            Err(ConfigError::InvalidTopN("0".to_string()))
        );
        assert!(
            MetricsConfig::new()
                .with_processes(Vec::<String>::new())
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn test_describe_all_categories() {
        let config = MetricsConfig::new()
            .with_processes(Vec::<String>::new())
            .with_topn_process(3)
            .with_network_usage()
            .with_system();
        assert_eq!(
            config.describe(),
            "system, network_usage, topn_process=3, processes=*"
        );
    }
}
