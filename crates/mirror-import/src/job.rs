//! Configured mirroring jobs

use crate::config::JobConfig;
use crate::error::ConfigError;
use crate::source::{self, Source};
use regex::Regex;
use std::path::PathBuf;

/// Where a job's files land
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub container: String,
    /// Prepended verbatim to every object name
    pub object_prefix: String,
}

impl Target {
    pub fn object_name(&self, path: &str) -> String {
        format!("{}{}", self.object_prefix, path)
    }
}

/// Client certificate and CA material for a job's HTTP transport
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsMaterial {
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
    pub ca: Option<PathBuf>,
}

impl TlsMaterial {
    pub fn is_configured(&self) -> bool {
        self.cert.is_some() || self.key.is_some() || self.ca.is_some()
    }
}

/// Path filters of a job
///
/// `except` excludes files and directories (directories are matched with their
/// trailing `/`); `only` restricts files and never prunes directories.
#[derive(Debug, Clone, Default)]
pub struct Filters {
    pub except: Option<Regex>,
    pub only: Option<Regex>,
}

impl Filters {
    pub fn accepts_directory(&self, path: &str) -> bool {
        !self.except.as_ref().is_some_and(|except| except.is_match(path))
    }

    /// Whether a file should be mirrored, including a check of every ancestor
    /// directory against `except`
    pub fn accepts_file(&self, path: &str) -> bool {
        let excluded_ancestor = path
            .match_indices('/')
            .any(|(idx, _)| !self.accepts_directory(&path[..=idx]));
        if excluded_ancestor {
            return false;
        }
        if self.except.as_ref().is_some_and(|except| except.is_match(path)) {
            return false;
        }
        self.only.as_ref().is_none_or(|only| only.is_match(path))
    }
}

/// One source-to-destination mirroring task
#[derive(Debug)]
pub struct Job {
    /// `jobs[<index>]`
    pub name: String,
    pub source: Box<dyn Source>,
    pub target: Target,
    pub filters: Filters,
    pub tls: TlsMaterial,
}

impl Job {
    pub fn name_for(index: usize) -> String {
        format!("jobs[{index}]")
    }

    /// Build a job from its configuration, collecting every validation error
    pub fn from_config(index: usize, config: &JobConfig) -> Result<Self, Vec<ConfigError>> {
        let name = Self::name_for(index);
        let source = source::from_config(&config.from);
        let mut errors = source.validate(&name);

        match (&config.from.cert, &config.from.key) {
            (Some(_), None) => errors.push(ConfigError::new(&name, "from.key", "is required when from.cert is set")),
            (None, Some(_)) => errors.push(ConfigError::new(&name, "from.cert", "is required when from.key is set")),
            _ => {},
        }

        if config.to.container.trim().is_empty() {
            errors.push(ConfigError::new(&name, "to.container", "is missing"));
        }

        let except = compile_filter(&name, "except", config.except.as_deref(), &mut errors);
        let only = compile_filter(&name, "only", config.only.as_deref(), &mut errors);

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Self {
            name,
            source,
            target: Target {
                container: config.to.container.clone(),
                object_prefix: config.to.object_prefix.clone(),
            },
            filters: Filters { except, only },
            tls: TlsMaterial {
                cert: config.from.cert.clone(),
                key: config.from.key.clone(),
                ca: config.from.ca.clone(),
            },
        })
    }
}

fn compile_filter(
    job: &str,
    field: &str,
    pattern: Option<&str>,
    errors: &mut Vec<ConfigError>,
) -> Option<Regex> {
    let pattern = pattern?;
    match Regex::new(pattern) {
        Ok(regex) => Some(regex),
        Err(e) => {
            errors.push(ConfigError::new(job, field, format!("invalid regex: {e}")));
            None
        },
    }
}
