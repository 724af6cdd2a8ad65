use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use log::{debug, info, warn};
use serde::Deserialize;

use super::{AddressFamily, PrefixEntry, PrefixSet};
use crate::error::{Error, Result};

/// One subnet record in a desired-state file; other fields are ignored
#[derive(Debug, Deserialize)]
struct SubnetRecord {
    subnet: String,
}

/// Subnet file contents: arbitrary group keys mapping to subnet records
/// E.g. `{"vpc-a": [{"subnet": "10.0.0.0/24"}], "vpc-b": [...]}`
type SubnetFile = BTreeMap<String, Vec<SubnetRecord>>;

/// Read every subnet listed in a single source file
pub fn load_source(path: &Path) -> Result<Vec<PrefixEntry>> {
    let contents = read_file(path).map_err(|err| {
        Error::config(format!("Unable to read subnet file {}: {}", path.display(), err))
    })?;
    let groups: SubnetFile = serde_json::from_str(&contents).map_err(|err| {
        Error::config(format!("Invalid subnet file {}: {}", path.display(), err))
    })?;
    let entries: Vec<_> = groups
        .into_iter()
        .flat_map(|(_, records)| records)
        .map(|record| PrefixEntry::new(record.subnet))
        .collect();
    debug!("Read {} subnets from {}", entries.len(), path.display());
    Ok(entries)
}

fn read_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    Ok(contents)
}

/// Desired entries for a single named prefix list
#[derive(Clone, Debug)]
pub struct DesiredList {
    pub name: String,
    pub sources: Vec<String>,
    pub entries: PrefixSet,
    pub family: AddressFamily,
}

/// Desired entries for every configured prefix list, in name order
#[derive(Clone, Debug, Default)]
pub struct DesiredState {
    pub lists: Vec<DesiredList>,
}

impl DesiredState {
    /// Load and flatten the sources of each list
    ///
    /// Any unreadable source fails the whole load, so nothing remote is
    /// touched with partial desired state.
    pub fn load(subnets_dir: &Path, prefix_lists: &BTreeMap<String, Vec<String>>) -> Result<Self> {
        let mut lists = Vec::with_capacity(prefix_lists.len());
        for (name, sources) in prefix_lists {
            let mut entries = PrefixSet::new();
            for source in sources {
                entries.extend(load_source(&subnets_dir.join(source))?);
            }
            let family = AddressFamily::of(&entries)
                .map_err(|err| Error::config(format!("Prefix list '{}': {}", name, err)))?;
            if entries.is_empty() {
                warn!(
                    "Desired state for '{}' is empty; applying will clear the remote list",
                    name
                );
            }
            info!(
                "Desired state for '{}': {} prefixes from {} source(s)",
                name,
                entries.len(),
                sources.len()
            );
            lists.push(DesiredList {
                name: name.clone(),
                sources: sources.clone(),
                entries,
                family,
            });
        }
        Ok(Self { lists })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) {
        fs::write(dir.path().join(name), contents).unwrap();
    }

    fn lists(pairs: &[(&str, Vec<&str>)]) -> BTreeMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(name, files)| {
                (
                    name.to_string(),
                    files.iter().map(|f| f.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_load_source() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "aws.json",
            r#"{
                "vpc-prod": [
                    {"subnet": "10.0.0.0/24", "name": "prod-a"},
                    {"subnet": "10.0.1.0/24", "name": "prod-b"}
                ],
                "vpc-dev": [{"subnet": "10.10.0.0/24"}]
            }"#,
        );
        let entries = load_source(&dir.path().join("aws.json")).unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries.contains(&PrefixEntry::from("10.10.0.0/24")));
    }

    #[test]
    fn test_flatten_and_dedupe() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.json", r#"{"x": [{"subnet": "10.0.0.0/24"}, {"subnet": "10.0.1.0/24"}]}"#);
        write(&dir, "b.json", r#"{"y": [{"subnet": "10.0.1.0/24"}, {"subnet": "10.0.2.0/24"}]}"#);
        let state = DesiredState::load(dir.path(), &lists(&[("aws", vec!["a.json", "b.json"])])).unwrap();
        assert_eq!(state.lists.len(), 1);
        let aws = &state.lists[0];
        assert_eq!(aws.entries.len(), 3);
        assert_eq!(aws.family, AddressFamily::IPv4);
    }

    #[test]
    fn test_empty_sources() {
        let dir = TempDir::new().unwrap();
        write(&dir, "empty.json", "{}");
        let state = DesiredState::load(dir.path(), &lists(&[("gcp", vec!["empty.json"])])).unwrap();
        assert!(state.lists[0].entries.is_empty());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.json", r#"{"x": [{"subnet": "10.0.0.0/24"}]}"#);
        let result = DesiredState::load(
            dir.path(),
            &lists(&[("aws", vec!["a.json"]), ("gcp", vec!["missing.json"])]),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_record_without_subnet() {
        let dir = TempDir::new().unwrap();
        write(&dir, "bad.json", r#"{"x": [{"cidr": "10.0.0.0/24"}]}"#);
        assert!(matches!(
            load_source(&dir.path().join("bad.json")),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_mixed_families_rejected() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "mixed.json",
            r#"{"x": [{"subnet": "10.0.0.0/24"}, {"subnet": "2001:db8::/48"}]}"#,
        );
        let result = DesiredState::load(dir.path(), &lists(&[("azure", vec!["mixed.json"])]));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
