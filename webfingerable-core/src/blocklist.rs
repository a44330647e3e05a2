use crate::error::Result;
use std::fs;
use std::path::Path;

/// Domain suffixes that must never be probed.
#[derive(Debug, Clone, Default)]
pub struct Blocklist {
    suffixes: Vec<String>,
}

impl Blocklist {
    pub fn new<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            suffixes: suffixes
                .into_iter()
                .map(Into::into)
                .filter(|s: &String| !s.is_empty())
                .collect(),
        }
    }

    /// Parse a JSON array of suffix strings.
    pub fn from_json(json: &str) -> Result<Self> {
        let suffixes: Vec<String> = serde_json::from_str(json)?;
        Ok(Self::new(suffixes))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Plain suffix match: `bad.example` also blocks `notbad.example`.
    pub fn is_blocked(&self, domain: &str) -> bool {
        self.suffixes.iter().any(|suffix| domain.ends_with(suffix.as_str()))
    }

    pub fn len(&self) -> usize {
        self.suffixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suffixes.is_empty()
    }
}
