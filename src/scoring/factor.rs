use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator, IntoStaticStr};

/// One aspect of repository completeness that contributes to the quality score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, Display, IntoStaticStr, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Factor {
    /// A non-blank description
    Description,

    /// A detected license
    License,

    /// At least one topic
    Topics,

    /// A README known to be present
    Readme,

    /// How recently the repository was pushed to
    Recency,

    /// Stargazer count, in logarithmic bands
    Stars,
}

impl Factor {
    /// Look up a factor by its snake_case name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::iter().find(|f| <&'static str>::from(*f) == name)
    }

    #[must_use]
    pub const fn default_weight(self) -> f64 {
        match self {
            Self::Description | Self::License | Self::Readme => 20.0,
            Self::Topics | Self::Recency => 15.0,
            Self::Stars => 10.0,
        }
    }
}
