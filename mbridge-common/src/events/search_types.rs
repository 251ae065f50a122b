//! Address suggestion type definitions

use serde::{Deserialize, Serialize};

/// Which family of addresses a lookup should suggest
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    /// Free subdomains of the hosting service only
    #[default]
    DotComOnly,
    /// Free subdomains plus the `.blog` subdomain family
    IncludeDotBlog,
    /// Registrable custom domains
    CustomDomains,
}

impl SuggestionKind {
    /// Query-string value understood by the suggestion service
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionKind::DotComOnly => "dot_com_only",
            SuggestionKind::IncludeDotBlog => "include_dot_blog",
            SuggestionKind::CustomDomains => "custom_domains",
        }
    }
}

impl std::fmt::Display for SuggestionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SuggestionKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dot_com_only" => Ok(SuggestionKind::DotComOnly),
            "include_dot_blog" => Ok(SuggestionKind::IncludeDotBlog),
            "custom_domains" => Ok(SuggestionKind::CustomDomains),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown suggestion kind: {}",
                other
            ))),
        }
    }
}

/// One address suggestion returned by the lookup service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Fully qualified domain name
    pub domain_name: String,
    /// Whether the address is free of charge
    #[serde(default)]
    pub is_free: bool,
}

impl Suggestion {
    pub fn free(domain_name: impl Into<String>) -> Self {
        Self {
            domain_name: domain_name.into(),
            is_free: true,
        }
    }
}
