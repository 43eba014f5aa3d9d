//! Scopes a client may request.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Id, username, name and avatar. Always granted.
    Basic,
    /// Email and mobile.
    Contact,
}

pub type Scopes = BTreeSet<Scope>;

impl Scope {
    pub const ALL: [Scope; 2] = [Scope::Basic, Scope::Contact];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Contact => "contact",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Basic => "Your account id, username, name and avatar",
            Self::Contact => "Your email address and mobile number",
        }
    }

    pub fn required(self) -> bool {
        self == Self::Basic
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "contact" => Ok(Self::Contact),
            _ => Err(()),
        }
    }
}

/// Parses a space or comma separated scope list; unknown names are ignored
/// and `basic` is always included.
pub fn parse_scopes<'a>(items: impl IntoIterator<Item = &'a str>) -> Scopes {
    let mut scopes: Scopes = items
        .into_iter()
        .flat_map(|item| item.split([' ', ',']))
        .filter_map(|name| name.parse().ok())
        .collect();
    scopes.insert(Scope::Basic);
    scopes
}

/// Space separated, as in the `scope` field of a token response.
pub fn join_scopes(scopes: &Scopes) -> String {
    scopes.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(" ")
}
