use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

/// Identity of a tracked vehicle.
///
/// Unique within one fleet store. Drivers choose their own id, so this is any non-empty string.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct VehicleId(Arc<str>);

impl VehicleId {
    /// Create a new [`VehicleId`] from any type that can be converted into an `Arc<str>`.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Returns the underlying string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for VehicleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for VehicleId {
    fn from(s: String) -> Self {
        Self(s.into())
    }
}

impl From<&str> for VehicleId {
    fn from(s: &str) -> Self {
        Self(s.into())
    }
}

/// The line selector held by a viewer.
///
/// Not an entity of its own, only the predicate the reconciler checks visibility against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LineFilter {
    #[default]
    All,
    Line(String),
}

impl LineFilter {
    /// Whether a vehicle serving `line_id` should be drawn under this filter.
    pub fn admits(&self, line_id: &str) -> bool {
        match self {
            Self::All => true,
            Self::Line(selected) => selected == line_id,
        }
    }
}

impl FromStr for LineFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            Ok(Self::All)
        } else {
            Ok(Self::Line(s.to_string()))
        }
    }
}

impl Display for LineFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Line(line_id) => f.write_str(line_id),
        }
    }
}
