mod file;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;

use crate::error::{Error, Result};
use crate::megaport::Credentials;
use file::{Defaults, FlagSpec, ParamsSpec};

/// Values read from the optional parameters file
///
/// Command builders layer CLI/environment overrides on top and validate the
/// result into one of the `*Config` types below.
#[derive(Debug, Default)]
pub struct Params {
    spec: ParamsSpec,
}

impl Params {
    /// Parse a TOML params file, or start empty when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let spec = match path {
            Some(path) => {
                let spec = ParamsSpec::from_file(path)?;
                debug!("Loaded params from {}", path.display());
                spec
            }
            None => ParamsSpec::default(),
        };
        Ok(Self { spec })
    }

    #[cfg(test)]
    fn parse(contents: &str) -> Result<Self> {
        Ok(Self {
            spec: ParamsSpec::parse(contents)?,
        })
    }

    pub fn sync_config(&self, overrides: SyncOverrides) -> Result<SyncConfig> {
        let mcr_id = overrides
            .mcr_id
            .or_else(|| self.spec.mcr_id.clone())
            .ok_or_else(|| missing("mcr_id", "MCR_ID"))?;
        let dry_run = match (overrides.dry_run, &self.spec.dry_run) {
            (Some(value), _) => parse_dry_run(&value)?,
            (None, Some(FlagSpec::Bool(value))) => *value,
            (None, Some(FlagSpec::Text(value))) => parse_dry_run(value)?,
            (None, None) => return Err(missing("dry_run", "DRY_RUN")),
        };
        let prefix_lists = match overrides.prefix_list_map {
            Some(map) => parse_prefix_list_map(&map)?,
            None => self.spec.prefix_lists.clone(),
        };
        if prefix_lists.is_empty() {
            return Err(missing("prefix_lists", "PREFIX_LISTS"));
        }
        let subnets_dir = overrides
            .subnets_dir
            .or_else(|| self.spec.subnets_dir.clone())
            .unwrap_or_else(Defaults::subnets_dir);
        let megaport = self.megaport_config(overrides.megaport)?;
        Ok(SyncConfig {
            mcr_id,
            dry_run,
            prefix_lists,
            subnets_dir,
            megaport,
        })
    }

    pub fn megaport_config(&self, overrides: MegaportOverrides) -> Result<MegaportConfig> {
        let spec = &self.spec.megaport;
        let client_id = overrides
            .client_id
            .or_else(|| spec.client_id.clone())
            .ok_or_else(|| missing("megaport.client_id", "MEGAPORT_CLIENT_ID"))?;
        let client_secret = overrides
            .client_secret
            .or_else(|| spec.client_secret.clone())
            .ok_or_else(|| missing("megaport.client_secret", "MEGAPORT_CLIENT_SECRET"))?;
        Ok(MegaportConfig {
            token_url: overrides
                .token_url
                .or_else(|| spec.token_url.clone())
                .unwrap_or_else(Defaults::token_url),
            api_url: overrides
                .api_url
                .or_else(|| spec.api_url.clone())
                .unwrap_or_else(Defaults::api_url),
            credentials: Credentials {
                client_id,
                client_secret,
            },
            timeout: Duration::from_secs(spec.timeout_secs.unwrap_or_else(Defaults::timeout_secs)),
        })
    }

    pub fn statsd_config(&self, addr: Option<String>) -> StatsdConfig {
        StatsdConfig {
            addr: addr
                .or_else(|| self.spec.statsd.addr.clone())
                .unwrap_or_else(Defaults::statsd_addr),
            tags: self.spec.statsd.tags.clone(),
        }
    }

    pub fn datadog_config(&self, api_key: Option<String>) -> Result<DatadogConfig> {
        let spec = &self.spec.datadog;
        Ok(DatadogConfig {
            api_url: spec.api_url.clone().unwrap_or_else(Defaults::datadog_url),
            api_key: api_key
                .or_else(|| spec.api_key.clone())
                .ok_or_else(|| missing("datadog.api_key", "DD_API_KEY"))?,
        })
    }

    pub fn f5_config(&self, overrides: F5Overrides) -> Result<F5Config> {
        let spec = &self.spec.f5;
        let host = overrides
            .host
            .or_else(|| spec.host.clone())
            .ok_or_else(|| missing("f5.host", "F5_HOST"))?;
        let file_credentials = match overrides
            .credentials_file
            .as_ref()
            .or_else(|| spec.credentials_file.as_ref())
        {
            Some(path) => Some(read_credentials_file(path)?),
            None => None,
        };
        let (file_user, file_pass) = match file_credentials {
            Some((user, pass)) => (Some(user), Some(pass)),
            None => (None, None),
        };
        let username = overrides
            .username
            .or_else(|| spec.username.clone())
            .or(file_user)
            .ok_or_else(|| missing("f5.username", "F5_USERNAME"))?;
        let password = overrides
            .password
            .or_else(|| spec.password.clone())
            .or(file_pass)
            .ok_or_else(|| missing("f5.password", "F5_PASSWORD"))?;
        let metric_prefix = overrides
            .metric_prefix
            .or_else(|| spec.metric_prefix.clone())
            .unwrap_or_else(|| format!("f5metrics.{}", host));
        Ok(F5Config {
            host,
            username,
            password,
            insecure: overrides.insecure || spec.insecure,
            metric_prefix,
            virtual_servers: spec
                .virtual_servers
                .iter()
                .map(|(metric, server)| (metric.clone(), server.clone()))
                .collect(),
        })
    }
}

fn missing(field: &str, env: &str) -> Error {
    Error::config(format!(
        "Parameter '{}' is not set (params file, CLI flag or ${})",
        field, env
    ))
}

/// Username on the first line, password on the second
fn read_credentials_file(path: &Path) -> Result<(String, String)> {
    let contents = fs::read_to_string(path).map_err(|err| {
        Error::config(format!("Unable to read credentials file {}: {}", path.display(), err))
    })?;
    let mut lines = contents.lines().map(str::trim_end);
    match (lines.next(), lines.next()) {
        (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => {
            Ok((user.to_string(), pass.to_string()))
        }
        _ => Err(Error::config(format!(
            "Credentials file {} must hold a username and a password line",
            path.display()
        ))),
    }
}

/// Accept only an explicit "true" or "false"
pub fn parse_dry_run(value: &str) -> Result<bool> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(Error::config(format!(
            "Invalid value for dry_run: '{}'. Must be true or false",
            value
        ))),
    }
}

/// Parse a JSON object of prefix list name -> subnet files
/// E.g. `{"aws": ["aws-subnets.json"], "gcp": ["gcp-subnets.json"]}`
pub fn parse_prefix_list_map(value: &str) -> Result<BTreeMap<String, Vec<String>>> {
    serde_json::from_str(value)
        .map_err(|err| Error::config(format!("Invalid prefix list map '{}': {}", value, err)))
}

#[derive(Clone, Debug, Default)]
pub struct MegaportOverrides {
    pub token_url: Option<String>,
    pub api_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct SyncOverrides {
    pub mcr_id: Option<String>,
    pub dry_run: Option<String>,
    pub prefix_list_map: Option<String>,
    pub subnets_dir: Option<PathBuf>,
    pub megaport: MegaportOverrides,
}

#[derive(Clone, Debug, Default)]
pub struct F5Overrides {
    pub host: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub credentials_file: Option<PathBuf>,
    pub insecure: bool,
    pub metric_prefix: Option<String>,
}

#[derive(Debug)]
pub struct MegaportConfig {
    pub token_url: String,
    pub api_url: String,
    pub credentials: Credentials,
    pub timeout: Duration,
}

/// Validated inputs for a prefix-list sync run
#[derive(Debug)]
pub struct SyncConfig {
    pub mcr_id: String,
    pub dry_run: bool,
    pub prefix_lists: BTreeMap<String, Vec<String>>,
    pub subnets_dir: PathBuf,
    pub megaport: MegaportConfig,
}

#[derive(Clone, Debug)]
pub struct StatsdConfig {
    pub addr: String,
    pub tags: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct DatadogConfig {
    pub api_url: String,
    pub api_key: String,
}

#[derive(Clone, Debug)]
pub struct F5Config {
    pub host: String,
    pub username: String,
    pub password: String,
    pub insecure: bool,
    pub metric_prefix: String,
    // Sorted so gauges are emitted in a stable order
    pub virtual_servers: BTreeMap<String, String>,
}
