use crate::error::{GpkgError, Result};
use serde::Deserialize;
use std::fmt;

/// A single pragma value.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PragmaValue {
    Integer(i64),
    Text(String),
}

impl fmt::Display for PragmaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for PragmaValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for PragmaValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for PragmaValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Ordered pragma settings applied every time a connection is opened.
///
/// Keys are matched case-insensitively, as SQLite does.
#[derive(Clone, Debug, PartialEq)]
pub struct PragmaConfig {
    entries: Vec<(String, PragmaValue)>,
}

impl Default for PragmaConfig {
    fn default() -> Self {
        Self {
            entries: vec![
                ("journal_mode".to_string(), "WAL".into()),
                ("synchronous".to_string(), "NORMAL".into()),
                ("cache_size".to_string(), PragmaValue::Integer(-2000)),
                ("temp_store".to_string(), "MEMORY".into()),
                ("mmap_size".to_string(), PragmaValue::Integer(268_435_456)),
                ("page_size".to_string(), PragmaValue::Integer(4096)),
            ],
        }
    }
}

impl PragmaConfig {
    /// The defaults merged with `overrides`.
    ///
    /// A key present in both keeps its default position but takes the
    /// override's value. Keys only present in `overrides` are appended in
    /// iteration order.
    pub fn with_overrides<I, K, V>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<PragmaValue>,
    {
        let mut config = Self::default();
        for (key, value) in overrides {
            config.set(key, value);
        }
        config
    }

    pub fn set<K: Into<String>, V: Into<PragmaValue>>(&mut self, key: K, value: V) {
        let key = key.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&key))
        {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&PragmaValue> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PragmaValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Render the `PRAGMA` statements, rejecting anything that is not a bare
    /// name or keyword.
    pub(crate) fn statements(&self) -> Result<Vec<String>> {
        self.entries
            .iter()
            .map(|(key, value)| {
                if !is_bare_word(key) {
                    return Err(GpkgError::InvalidIdentifier(key.clone()));
                }
                if let PragmaValue::Text(text) = value {
                    if !is_bare_word(text) {
                        return Err(GpkgError::InvalidPragmaValue {
                            pragma: key.clone(),
                            value: text.clone(),
                        });
                    }
                }
                Ok(format!("PRAGMA {key}={value}"))
            })
            .collect()
    }

    /// Apply every pragma in order.
    pub(crate) fn apply(&self, conn: &rusqlite::Connection) -> Result<()> {
        for sql in self.statements()? {
            tracing::debug!("{sql}");
            // Some pragmas (journal_mode, page_size on some builds) report the
            // resulting value as a row.
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query([])?;
            while rows.next()?.is_some() {}
        }
        Ok(())
    }
}

// Pragma names and keyword values are spliced in unquoted.
fn is_bare_word(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
