use serde::{Deserialize, Serialize};

/// Identifier for the machine a unit of work is dispatched to.
///
/// A target is an opaque host name. Whether it refers to the current machine
/// is resolved at execution time, never cached at construction, so a spec
/// built on one host can be serialized and dispatched from another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Target(String);

impl Target {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// True if this target refers to the machine we are running on.
    ///
    /// Matches the literal `localhost` sentinel or the current host name,
    /// case-insensitively.
    pub fn is_local(&self) -> bool {
        if self.0.eq_ignore_ascii_case("localhost") {
            return true;
        }
        match gethostname::gethostname().to_str() {
            Some(host) => self.0.eq_ignore_ascii_case(host),
            None => false,
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Target {
    fn from(name: String) -> Self {
        Self(name)
    }
}
