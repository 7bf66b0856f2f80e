//! The fixed set of placement zones.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RegistryError;

/// Placement zone a plugin can occupy.
///
/// The set is closed: descriptors always carry a valid section by
/// construction, and string input is validated at the parse boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Header,
    Sidebar,
    Content,
    Footer,
}

impl Section {
    /// Every placement zone, in page order.
    pub const ALL: [Section; 4] = [Self::Header, Self::Sidebar, Self::Content, Self::Footer];

    /// The canonical lowercase name of this section.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Sidebar => "sidebar",
            Self::Content => "content",
            Self::Footer => "footer",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Section {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "header" => Ok(Self::Header),
            "sidebar" => Ok(Self::Sidebar),
            "content" => Ok(Self::Content),
            "footer" => Ok(Self::Footer),
            other => Err(RegistryError::InvalidSection(other.to_string())),
        }
    }
}
