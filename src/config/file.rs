use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

pub(super) struct Defaults {}

impl Defaults {
    pub(super) fn token_url() -> String {
        "https://auth-m2m.megaport.com/oauth2/token".to_string()
    }

    pub(super) fn api_url() -> String {
        "https://api.megaport.com/v2".to_string()
    }

    pub(super) fn timeout_secs() -> u64 {
        30
    }

    pub(super) fn subnets_dir() -> PathBuf {
        PathBuf::from("subnets")
    }

    pub(super) fn statsd_addr() -> String {
        "127.0.0.1:8125".to_string()
    }

    pub(super) fn datadog_url() -> String {
        "https://api.datadoghq.com".to_string()
    }
}

/// A flag that may be written as a TOML boolean or as a "true"/"false" string
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub(super) enum FlagSpec {
    Bool(bool),
    Text(String),
}

/// Parameters file (toml) representation
///
/// Every field is optional here; required values are checked once CLI and
/// environment overrides have been applied.
#[derive(Debug, Default, Deserialize)]
pub(super) struct ParamsSpec {
    // Target MCR for prefix-list sync
    pub(super) mcr_id: Option<String>,
    // Must be given explicitly, there is no default run mode
    pub(super) dry_run: Option<FlagSpec>,
    // Megaport prefix list name -> subnet files feeding it
    #[serde(default = "BTreeMap::new")]
    pub(super) prefix_lists: BTreeMap<String, Vec<String>>,
    // Directory the subnet files are resolved against
    pub(super) subnets_dir: Option<PathBuf>,
    #[serde(default)]
    pub(super) megaport: MegaportSpec,
    #[serde(default)]
    pub(super) statsd: StatsdSpec,
    #[serde(default)]
    pub(super) datadog: DatadogSpec,
    #[serde(default)]
    pub(super) f5: F5Spec,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct MegaportSpec {
    pub(super) token_url: Option<String>,
    pub(super) api_url: Option<String>,
    pub(super) client_id: Option<String>,
    pub(super) client_secret: Option<String>,
    pub(super) timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct StatsdSpec {
    pub(super) addr: Option<String>,
    // Tags added to every gauge and service check
    #[serde(default = "Vec::new")]
    pub(super) tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct DatadogSpec {
    pub(super) api_url: Option<String>,
    pub(super) api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct F5Spec {
    pub(super) host: Option<String>,
    pub(super) username: Option<String>,
    pub(super) password: Option<String>,
    // File holding the username on line 1 and the password on line 2
    pub(super) credentials_file: Option<PathBuf>,
    // Accept self-signed management certificates
    #[serde(default)]
    pub(super) insecure: bool,
    // Metric name prefix, e.g. "f5metrics.site1.hostname1"
    pub(super) metric_prefix: Option<String>,
    // Metric suffix -> virtual server whose client-side connections it reports
    #[serde(default = "HashMap::new")]
    pub(super) virtual_servers: HashMap<String, String>,
}

impl ParamsSpec {
    pub(super) fn from_file(path: &Path) -> Result<Self> {
        let mut file = File::open(path).map_err(|err| {
            Error::config(format!("Unable to open params file {}: {}", path.display(), err))
        })?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        toml::from_str(&contents).map_err(|err| {
            Error::config(format!("Invalid params file {}: {}", path.display(), err))
        })
    }

    #[cfg(test)]
    pub(super) fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|err| Error::config(format!("Invalid params: {}", err)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_params() {
        let params = ParamsSpec::from_file(Path::new("./demos/params.toml")).unwrap();
        assert_eq!(params.mcr_id.as_deref(), Some("11111111-2222-3333-4444-555555555555"));
        assert_eq!(params.dry_run, Some(FlagSpec::Text("true".to_string())));
        assert_eq!(params.prefix_lists.len(), 3);
        assert_eq!(
            params.prefix_lists["aws"],
            vec!["aws-subnets.json".to_string(), "aws-shared-subnets.json".to_string()]
        );
        assert_eq!(params.subnets_dir, Some(PathBuf::from("demos/subnets")));
        assert_eq!(params.statsd.tags, vec!["env:prd".to_string(), "team-name:networking".to_string()]);
        assert_eq!(params.f5.virtual_servers.len(), 2);
        assert!(params.f5.insecure);
    }

    #[test]
    fn test_bool_dry_run() {
        let params = ParamsSpec::parse("dry_run = false").unwrap();
        assert_eq!(params.dry_run, Some(FlagSpec::Bool(false)));
        assert!(params.prefix_lists.is_empty());
        assert!(params.megaport.client_id.is_none());
    }

    #[test]
    fn test_invalid_params() {
        assert!(matches!(
            ParamsSpec::parse("prefix_lists = \"aws\""),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ParamsSpec::from_file(Path::new("./demos/missing.toml")),
            Err(Error::Config(_))
        ));
    }
}
