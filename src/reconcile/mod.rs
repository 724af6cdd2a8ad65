//! Prefix list reconciliation
//!
//! Desired prefixes are read from local subnet files and compared (as opaque
//! strings, with set semantics) against the entries a remote router holds for
//! the prefix list of the same name. Only lists with a non-empty diff are
//! written back, and the write always replaces the whole list.

mod desired;
mod plan;
mod sync;

pub use desired::{load_source, DesiredList, DesiredState};
pub use plan::ReconciliationPlan;
pub use sync::{ListOutcome, ListReport, Reconciler, RunReport};

use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;
use ipnetwork::IpNetwork;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

pub type PrefixSet = BTreeSet<PrefixEntry>;

/// A single CIDR prefix, e.g. "10.0.0.0/16"
///
/// Compared by exact string value; equivalent spellings of the same network
/// are distinct entries.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrefixEntry(String);

impl PrefixEntry {
    pub fn new<S: Into<String>>(prefix: S) -> Self {
        Self(prefix.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn network(&self) -> Result<IpNetwork> {
        self.0
            .parse()
            .map_err(|err| Error::config(format!("Invalid prefix '{}': {}", self.0, err)))
    }
}

impl fmt::Display for PrefixEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PrefixEntry {
    fn from(prefix: &str) -> Self {
        Self::new(prefix)
    }
}

/// Opaque identifier the remote system assigns to a prefix list
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RemoteId(String);

impl RemoteId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Megaport hands out numeric ids, but nothing here relies on that
impl<'de> Deserialize<'de> for RemoteId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<RemoteId, D::Error>
    where
        D: Deserializer<'de>,
    {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(s) => Ok(RemoteId(s)),
            serde_json::Value::Number(n) => Ok(RemoteId(n.to_string())),
            other => Err(serde::de::Error::custom(format!(
                "Unsupported prefix list id: '{}'",
                other
            ))),
        }
    }
}

/// A prefix list as listed in the remote catalog
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RemotePrefixList {
    pub id: RemoteId,
    /// The list's name, used to match it against local desired state
    #[serde(rename = "description")]
    pub name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum AddressFamily {
    IPv4,
    IPv6,
}

impl AddressFamily {
    /// Work out the family of a desired prefix set
    ///
    /// Every entry must parse as CIDR and all must share a family.
    /// An empty set is treated as IPv4.
    pub fn of(entries: &PrefixSet) -> Result<Self> {
        let mut family = None;
        for entry in entries {
            let this = match entry.network()? {
                IpNetwork::V4(_) => AddressFamily::IPv4,
                IpNetwork::V6(_) => AddressFamily::IPv6,
            };
            match family {
                Some(seen) if seen != this => {
                    return Err(Error::config(format!(
                        "Mixed address families in prefix set ('{}' is {})",
                        entry, this
                    )));
                }
                _ => family = Some(this),
            }
        }
        Ok(family.unwrap_or(AddressFamily::IPv4))
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let display = match self {
            AddressFamily::IPv4 => "IPv4",
            AddressFamily::IPv6 => "IPv6",
        };
        write!(f, "{}", display)
    }
}

/// Remote system holding named prefix lists
#[async_trait]
pub trait PrefixListStore {
    /// Every prefix list known to the remote system
    async fn catalog(&self) -> Result<Vec<RemotePrefixList>>;

    /// Current entries of a single list
    async fn entries(&self, id: &RemoteId) -> Result<PrefixSet>;

    /// Overwrite a list with `entries`; `label` is the list's human-readable name
    async fn replace(
        &self,
        id: &RemoteId,
        label: &str,
        family: AddressFamily,
        entries: &PrefixSet,
    ) -> Result<()>;
}

/// Find the one catalog entry named `name`
pub fn resolve_remote_id(catalog: &[RemotePrefixList], name: &str) -> Result<RemoteId> {
    let mut matches = catalog.iter().filter(|list| list.name == name);
    match (matches.next(), matches.next()) {
        (Some(list), None) => Ok(list.id.clone()),
        (None, _) => Err(Error::config(format!(
            "No remote prefix list named '{}'",
            name
        ))),
        (Some(_), Some(_)) => Err(Error::config(format!(
            "Multiple remote prefix lists named '{}'",
            name
        ))),
    }
}
