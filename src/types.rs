use crate::error::{Error, Result};
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Section key identifying one definition instance in a model (`r`, `p2`, `g`, `m`, `e`).
///
/// A key is a one-letter kind followed by an optional integer instance suffix;
/// a missing suffix means instance 1. Multiple instances let a model carry
/// alternative request/policy shapes side by side (`p` and `p2`).
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SectionKey {
    token: String,
    instance: u32,
}

// Hash over the token alone, so map lookups through `Borrow<str>` stay coherent.
impl Hash for SectionKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.token.hash(state);
    }
}

impl SectionKey {
    /// Parses and validates a section key token.
    pub fn new(token: impl AsRef<str>) -> Result<Self> {
        let token = token.as_ref().trim();
        let mut chars = token.chars();
        let kind = chars
            .next()
            .ok_or_else(|| Error::InvalidSectionKey("empty token".to_string()))?;
        if !kind.is_ascii_alphabetic() {
            return Err(Error::InvalidSectionKey(token.to_string()));
        }
        let suffix = chars.as_str();
        let instance = if suffix.is_empty() {
            1
        } else {
            suffix
                .parse::<u32>()
                .map_err(|_| Error::InvalidSectionKey(token.to_string()))?
        };
        Ok(Self {
            token: token.to_string(),
            instance,
        })
    }

    /// Builds the key for a kind letter at a given instance (`m` for 1, `m2` for 2, ...).
    pub fn for_instance(kind: char, instance: u32) -> Self {
        let token = if instance == 1 {
            kind.to_string()
        } else {
            format!("{kind}{instance}")
        };
        Self { token, instance }
    }

    /// Returns the kind letter.
    pub fn kind(&self) -> char {
        self.token.chars().next().unwrap_or_default()
    }

    /// Returns the instance number (1 when no suffix is present).
    pub fn instance(&self) -> u32 {
        self.instance
    }

    /// Returns the underlying token.
    pub fn as_str(&self) -> &str {
        &self.token
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token)
    }
}

impl AsRef<str> for SectionKey {
    fn as_ref(&self) -> &str {
        &self.token
    }
}

impl Borrow<str> for SectionKey {
    fn borrow(&self) -> &str {
        &self.token
    }
}

impl TryFrom<&str> for SectionKey {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<String> for SectionKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<SectionKey> for String {
    fn from(value: SectionKey) -> Self {
        value.token
    }
}
