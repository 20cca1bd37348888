/// Composite cache identity.
///
/// A key is the ordered list of everything that determines a query result:
/// statement id, row bounds, resolved SQL and the parameter. The running hash
/// code and checksum only speed up comparison; equality always falls back to
/// comparing every part, so a hash collision can never alias two results.

use std::fmt;
use std::hash::{Hash, Hasher};
use serde::Serialize;
use sha2::{Digest, Sha256};
use crate::core::{Limit, Parameter};

const DEFAULT_MULTIPLIER: u64 = 37;
const DEFAULT_HASHCODE: u64 = 17;

/// One contributing value of a `CacheKey`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub enum KeyPart {
    Text(String),
    Number(u64),
    Limit(Limit),
    Parameter(Parameter),
}

impl KeyPart {
    /// Stable 64-bit digest of the part's binary encoding
    fn digest(&self) -> u64 {
        let encoded = bincode::serialize(self).unwrap_or_else(|_| format!("{self:?}").into_bytes());
        let hash = Sha256::digest(&encoded);
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash[..8]);
        u64::from_be_bytes(bytes)
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Limit(limit) => write!(f, "{limit}"),
            Self::Parameter(p) => match serde_json::to_string(p) {
                Ok(json) => write!(f, "{json}"),
                Err(_) => write!(f, "{p:?}"),
            },
        }
    }
}

impl From<&str> for KeyPart {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<usize> for KeyPart {
    fn from(n: usize) -> Self {
        Self::Number(n as u64)
    }
}

impl From<Limit> for KeyPart {
    fn from(limit: Limit) -> Self {
        Self::Limit(limit)
    }
}

impl From<Parameter> for KeyPart {
    fn from(p: Parameter) -> Self {
        Self::Parameter(p)
    }
}

#[derive(Debug, Clone)]
pub struct CacheKey {
    hashcode: u64,
    checksum: u64,
    count: usize,
    parts: Vec<KeyPart>,
}

impl CacheKey {
    pub fn new() -> Self {
        Self {
            hashcode: DEFAULT_HASHCODE,
            checksum: 0,
            count: 0,
            parts: Vec::new(),
        }
    }

    /// Appends a contributing value
    pub fn update(&mut self, part: impl Into<KeyPart>) {
        let part = part.into();
        let mut base = part.digest();

        self.count += 1;
        self.checksum = self.checksum.wrapping_add(base);
        base = base.wrapping_mul(self.count as u64);
        self.hashcode = DEFAULT_MULTIPLIER.wrapping_mul(self.hashcode).wrapping_add(base);

        self.parts.push(part);
    }

    #[must_use]
    pub fn with(mut self, part: impl Into<KeyPart>) -> Self {
        self.update(part);
        self
    }

    pub fn update_all<P: Into<KeyPart>>(&mut self, parts: impl IntoIterator<Item = P>) {
        for part in parts {
            self.update(part);
        }
    }

    pub const fn hashcode(&self) -> u64 {
        self.hashcode
    }

    pub const fn checksum(&self) -> u64 {
        self.checksum
    }

    pub const fn update_count(&self) -> usize {
        self.count
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.parts
    }
}

impl Default for CacheKey {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.hashcode == other.hashcode
            && self.checksum == other.checksum
            && self.count == other.count
            && self.parts == other.parts
    }
}

// NaN parameters make a key unequal to itself; such keys simply never hit.
impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hashcode.hash(state);
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hashcode, self.checksum)?;
        for part in &self.parts {
            write!(f, ":{part}")?;
        }
        Ok(())
    }
}
