use crate::utils::error::{CloudError, Result};
use rand::Rng;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

pub const MAX_GROUP_LENGTH: usize = 63;
pub const DEFAULT_MAX_NAME_ATTEMPTS: usize = 100;

static GROUP_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$").expect("static group pattern"));

static UNIQUE_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)-[0-9a-f]{3}$").expect("static unique name pattern"));

type SuffixSource = Box<dyn Fn() -> String + Send + Sync>;

/// Encodes a group into node names as `{group}-{3 hex chars}`.
pub struct GroupNamingConvention {
    suffix: SuffixSource,
    max_attempts: usize,
}

impl Default for GroupNamingConvention {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_NAME_ATTEMPTS)
    }
}

impl GroupNamingConvention {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            suffix: Box::new(random_suffix),
            max_attempts,
        }
    }

    /// Replaces the random suffix source; tests use this to force collisions.
    pub fn with_suffix_source(mut self, source: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.suffix = Box::new(source);
        self
    }

    pub fn validate_group(&self, group: &str) -> Result<()> {
        if group.len() > MAX_GROUP_LENGTH || !GROUP_PATTERN.is_match(group) {
            return Err(CloudError::invalid_argument(format!(
                "group '{}' must be lowercase letters, digits and hyphens, start and end alphanumeric, at most {} chars",
                group, MAX_GROUP_LENGTH
            )));
        }
        Ok(())
    }

    pub fn unique_name_for_group(&self, group: &str) -> String {
        format!("{}-{}", group, (self.suffix)())
    }

    /// Recovers the group out of a name produced by `unique_name_for_group`.
    pub fn group_in_unique_name_or_none(&self, name: &str) -> Option<String> {
        UNIQUE_NAME_PATTERN
            .captures(name)
            .map(|caps| caps[1].to_string())
            .filter(|group| self.validate_group(group).is_ok())
    }

    /// Draws `count` distinct names not present in `existing`.
    pub fn next_names(&self, group: &str, count: usize, existing: &HashSet<String>) -> Result<Vec<String>> {
        self.validate_group(group)?;
        let mut names = Vec::with_capacity(count);
        let mut seen = HashSet::new();
        let mut attempts = 0;
        while names.len() < count && attempts < self.max_attempts {
            attempts += 1;
            let candidate = self.unique_name_for_group(group);
            if existing.contains(&candidate) || !seen.insert(candidate.clone()) {
                tracing::trace!(%candidate, "name in use, drawing again");
                continue;
            }
            names.push(candidate);
        }
        if names.len() < count {
            return Err(CloudError::illegal_state(format!(
                "only found {} of {} unused names for group {} after {} attempts",
                names.len(),
                count,
                group,
                attempts
            )));
        }
        Ok(names)
    }
}

fn random_suffix() -> String {
    format!("{:03x}", rand::rng().random_range(0..0x1000u16))
}
