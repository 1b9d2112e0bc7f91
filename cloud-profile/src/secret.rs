use serde::Deserialize;
use std::fmt;

/// A credential string that never prints its value.
///
/// `Debug` and `Display` show at most the first four characters followed by
/// `****`, and nothing of values shorter than [`MIN_REVEAL_LEN`]. There is
/// no `Serialize` impl.
/// Values shorter than this are masked completely.
pub const MIN_REVEAL_LEN: usize = 8;

#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self(value.into())
    }

    /// The raw value, for handing to the storage client.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Masked form used in logs and CLI output.
    pub fn masked(&self) -> String {
        if self.0.is_empty() {
            return String::new();
        }
        if self.0.chars().count() < MIN_REVEAL_LEN {
            return "****".to_string();
        }
        let head: String = self.0.chars().take(4).collect();
        format!("{head}****")
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({:?})", self.masked())
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}
