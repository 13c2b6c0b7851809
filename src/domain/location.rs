use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationScope {
    Provider,
    Region,
    Zone,
    Host,
}

impl fmt::Display for LocationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LocationScope::Provider => "provider",
            LocationScope::Region => "region",
            LocationScope::Zone => "zone",
            LocationScope::Host => "host",
        };
        f.write_str(s)
    }
}

/// A named place where resources live, nested provider > region > zone > host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub scope: LocationScope,
    pub description: String,
    pub parent: Option<Box<Location>>,
    #[serde(default)]
    pub iso3166_codes: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Location {
    pub fn new(id: impl Into<String>, scope: LocationScope, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            scope,
            description: description.into(),
            parent: None,
            iso3166_codes: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn provider(id: impl Into<String>) -> Self {
        let id = id.into();
        Self::new(id.clone(), LocationScope::Provider, id)
    }

    pub fn with_parent(mut self, parent: Location) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }

    pub fn with_iso3166_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.iso3166_codes = codes.into_iter().map(Into::into).collect();
        self
    }

    /// True when this location or one of its ancestors carries `id`.
    pub fn is_within(&self, id: &str) -> bool {
        let mut current = Some(self);
        while let Some(location) = current {
            if location.id == id {
                return true;
            }
            current = location.parent.as_deref();
        }
        false
    }

    pub fn ancestors(&self) -> impl Iterator<Item = &Location> {
        std::iter::successors(self.parent.as_deref(), |l| l.parent.as_deref())
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.id, self.scope)
    }
}
