//! Origin domain allow-list.
//!
//! Built once at startup and never mutated. An empty list is an explicit
//! allow-all policy.

use std::collections::HashSet;

/// Set of origin hostnames the proxy may fetch from.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    domains: HashSet<String>,
}

impl AllowList {
    /// Parse a comma-separated list of hostnames.
    pub fn parse(raw: &str) -> Self {
        Self::from_domains(raw.split(','))
    }

    /// Build from individual entries, normalizing each one.
    pub fn from_domains<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let domains = domains
            .into_iter()
            .map(|d| normalize(d.as_ref()))
            .filter(|d| !d.is_empty())
            .collect();
        Self { domains }
    }

    /// Whether `domain` may be fetched.
    pub fn is_allowed(&self, domain: &str) -> bool {
        self.domains.is_empty() || self.domains.contains(&normalize(domain))
    }

    /// True when no domains are listed and every origin is permitted.
    pub fn is_open(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Listed domains, sorted for stable log output.
    pub fn domains(&self) -> Vec<&str> {
        let mut domains: Vec<&str> = self.domains.iter().map(String::as_str).collect();
        domains.sort_unstable();
        domains
    }
}

fn normalize(domain: &str) -> String {
    domain.trim().to_ascii_lowercase()
}
