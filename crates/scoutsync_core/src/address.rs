//! Address normalization and rewriting.
//!
//! Member and alias sets are compared as sets of normalized strings:
//! trimmed, lower-cased and, for members, with any `+tag` suffix removed
//! from the local part.

use crate::error::{CoreError, CoreResult};
use regex::{Regex, RegexBuilder};
use tracing::debug;

/// Trims and lower-cases an address.
pub fn normalize(address: &str) -> String {
    address.trim().to_lowercase()
}

/// Removes a `+tag` suffix from the local part: `user+tag@d` becomes `user@d`.
pub fn strip_tag(address: &str) -> String {
    match address.split_once('@') {
        Some((local, domain)) => {
            let base = local.split('+').next().unwrap_or(local);
            format!("{base}@{domain}")
        }
        None => address.split('+').next().unwrap_or(address).to_string(),
    }
}

/// The comparison key for a group member.
pub fn member_key(address: &str) -> String {
    strip_tag(&normalize(address))
}

/// Returns true if `address` belongs to `domain` (case-insensitive).
pub fn in_domain(address: &str, domain: &str) -> bool {
    let domain = domain.trim().trim_start_matches('@').to_lowercase();
    !domain.is_empty() && normalize(address).ends_with(&format!("@{domain}"))
}

/// A regex rewrite applied to member addresses before they are added to a
/// group. Replacements use `regex` syntax (`${1}`).
///
/// Addresses are lower-cased before rules run, so patterns match
/// case-insensitively.
#[derive(Debug, Clone)]
pub struct RewriteRule {
    pattern: Regex,
    replacement: String,
}

impl RewriteRule {
    /// Compiles a rule.
    pub fn new(pattern: &str, replacement: impl Into<String>) -> CoreResult<Self> {
        let compiled = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| CoreError::InvalidRewrite {
                pattern: pattern.to_string(),
                source,
            })?;
        Ok(Self {
            pattern: compiled,
            replacement: replacement.into(),
        })
    }

    /// Rewrites `googlemail.com` addresses to `gmail.com`.
    pub fn googlemail() -> CoreResult<Self> {
        Self::new(r"^(.+)@googlemail\.com$", "${1}@gmail.com")
    }

    /// Returns the pattern source.
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Returns the replacement template.
    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    /// Applies the rule; `None` when the pattern does not match.
    pub fn apply(&self, address: &str) -> Option<String> {
        if self.pattern.is_match(address) {
            Some(
                self.pattern
                    .replace(address, self.replacement.as_str())
                    .into_owned(),
            )
        } else {
            None
        }
    }
}

/// Applies the first matching rule in `rules` to `address`.
pub fn rewrite(rules: &[RewriteRule], address: &str) -> String {
    for rule in rules {
        if let Some(rewritten) = rule.apply(address) {
            if rewritten != address {
                debug!(from = address, to = %rewritten, "address rewritten");
            }
            return rewritten;
        }
    }
    address.to_string()
}
