use crate::introspection::error::SessionError;
use std::fmt;
use std::str::FromStr;

/// Name of a group of attributes, in the `domain:key=value,key=value` form.
///
/// Used both for concrete names and for patterns. In a pattern, the domain and
/// the property values may contain `*` and `?` wildcards, and a trailing `,*` (or a
/// lone `*` after the colon) lets the pattern match names with extra properties.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectName {
    domain: String,
    properties: Vec<(String, String)>,
    property_list_pattern: bool,
}

impl ObjectName {
    pub fn new<K, V>(domain: impl Into<String>, properties: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            domain: domain.into(),
            properties: properties
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            property_list_pattern: false,
        }
    }

    pub fn parse(name: &str) -> Result<Self, SessionError> {
        let invalid = || SessionError::InvalidObjectName(name.to_string());

        let (domain, props) = name.split_once(':').ok_or_else(invalid)?;
        let mut properties = Vec::new();
        let mut property_list_pattern = false;

        for part in props.split(',') {
            if part == "*" {
                property_list_pattern = true;
                continue;
            }
            let (key, value) = part.split_once('=').ok_or_else(invalid)?;
            if key.is_empty() || value.is_empty() || properties.iter().any(|(k, _)| k == key) {
                return Err(invalid());
            }
            properties.push((key.to_string(), value.to_string()));
        }

        if properties.is_empty() && !property_list_pattern {
            return Err(invalid());
        }

        Ok(Self {
            domain: domain.to_string(),
            properties,
            property_list_pattern,
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push((key.into(), value.into()));
        self
    }

    pub fn is_pattern(&self) -> bool {
        self.property_list_pattern
            || has_wildcard(&self.domain)
            || self.properties.iter().any(|(_, v)| has_wildcard(v))
    }

    /// Whether this (concrete) name is selected by `pattern`.
    pub fn matches(&self, pattern: &ObjectName) -> bool {
        if !glob_match(&pattern.domain, &self.domain) {
            return false;
        }
        if !pattern.property_list_pattern && pattern.properties.len() != self.properties.len() {
            return false;
        }
        pattern.properties.iter().all(|(key, value_pattern)| {
            self.property(key)
                .is_some_and(|value| glob_match(value_pattern, value))
        })
    }
}

impl FromStr for ObjectName {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectName::parse(s)
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.domain)?;
        let mut first = true;
        for (key, value) in &self.properties {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{}={}", key, value)?;
            first = false;
        }
        if self.property_list_pattern {
            f.write_str(if first { "*" } else { ",*" })?;
        }
        Ok(())
    }
}

fn has_wildcard(s: &str) -> bool {
    s.contains('*') || s.contains('?')
}

/// Glob match supporting `*` (any run) and `?` (any single char).
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((star_pi, star_ti)) = star {
            pi = star_pi + 1;
            ti = star_ti + 1;
            star = Some((star_pi, star_ti + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|c| *c == '*')
}
