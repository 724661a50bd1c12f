//! Command-line arguments: a required config path plus a handful of
//! directly-overridable fields, and a generic `key.path=value` escape
//! hatch for anything else in [`Config`].

use std::path::PathBuf;

use anyhow::anyhow;
use argh::FromArgs;
use covenant_config::Config;
use serde_json::{from_str, from_value, to_value, Value};

#[derive(Debug, Clone, FromArgs)]
#[argh(description = "Covenant consensus-core node")]
pub struct Args {
    #[argh(option, short = 'c', description = "path to the TOML configuration file")]
    pub config: PathBuf,

    #[argh(option, short = 'd', description = "datadir path")]
    pub datadir: Option<PathBuf>,

    #[argh(option, description = "admin HTTP bind address, e.g. 127.0.0.1:9090")]
    pub rpc_bind_addr: Option<String>,

    #[argh(option, short = 'o', description = "generic config override, key.path=value")]
    pub overrides: Vec<String>,
}

impl Args {
    /// Applies every override onto `config` in place. Returns whether
    /// anything actually changed.
    pub fn override_config(&self, config: &mut Config) -> anyhow::Result<bool> {
        let mut overridden = self.override_generic(config)?;

        if let Some(datadir) = &self.datadir {
            config.datadir = datadir.clone();
            overridden = true;
        }
        if let Some(bind_addr) = &self.rpc_bind_addr {
            config.rpc.bind_addr = bind_addr.clone();
            overridden = true;
        }
        Ok(overridden)
    }

    fn override_generic(&self, config: &mut Config) -> anyhow::Result<bool> {
        let original = config.clone();
        let mut json_config = to_value(&*config).expect("config json serialization failed");

        for (path, val) in parse_overrides(&self.overrides)?.iter() {
            apply_override(path, val, &mut json_config)?;
        }
        *config = from_value(json_config).expect("json value should deserialize back into Config");
        Ok(original != *config)
    }
}

type Override = (Vec<String>, String);

fn parse_overrides(overrides: &[String]) -> anyhow::Result<Vec<Override>> {
    overrides
        .iter()
        .map(|item| {
            let (key, value) = item
                .split_once('=')
                .ok_or_else(|| anyhow!("invalid override {item:?}: must be 'key=value'"))?;
            let path = key.split('.').map(str::to_owned).collect();
            Ok((path, value.to_owned()))
        })
        .collect()
}

fn apply_override(path: &[String], str_value: &str, value: &mut Value) -> anyhow::Result<()> {
    match path {
        [key] => {
            value[key] = from_str(str_value)?;
        }
        [key, rest @ ..] => {
            apply_override(rest, str_value, &mut value[key])?;
        }
        [] => return Err(anyhow!("invalid override path")),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_config::config::{BatchConfig, CommitteeConfig, RpcConfig, TimingConfig};

    fn base_config() -> Config {
        Config {
            datadir: "/tmp/covenant".into(),
            rpc: RpcConfig { bind_addr: "127.0.0.1:9090".into() },
            committee: CommitteeConfig { size: 4, quorum: 3 },
            timing: TimingConfig::default(),
            batch: BatchConfig::default(),
            preload_chains: Vec::new(),
        }
    }

    #[test]
    fn generic_override_patches_nested_fields() {
        let mut config = base_config();
        let args = Args {
            config: "config.toml".into(),
            datadir: None,
            rpc_bind_addr: None,
            overrides: vec!["committee.quorum=2".to_string(), "timing.stage_timeout_secs=10".to_string()],
        };

        assert_ne!(config.committee.quorum, 2);
        let changed = args.override_config(&mut config).unwrap();
        assert!(changed);
        assert_eq!(config.committee.quorum, 2);
        assert_eq!(config.timing.stage_timeout_secs, 10);
    }

    #[test]
    fn direct_fields_take_priority_over_generic_overrides() {
        let mut config = base_config();
        let args = Args {
            config: "config.toml".into(),
            datadir: Some("/var/lib/covenant".into()),
            rpc_bind_addr: Some("0.0.0.0:9999".into()),
            overrides: Vec::new(),
        };
        args.override_config(&mut config).unwrap();
        assert_eq!(config.datadir, PathBuf::from("/var/lib/covenant"));
        assert_eq!(config.rpc.bind_addr, "0.0.0.0:9999");
    }
}
