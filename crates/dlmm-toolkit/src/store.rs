use eyre::Context as _;
use std::{fs, path::PathBuf};

use crate::{config::ToolkitConfig, paths::ToolkitPaths};

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

/// If an env var is set and non-empty, apply `setter` with the trimmed value.
fn apply_env(var: &str, setter: impl FnOnce(&str)) {
    if let Ok(u) = std::env::var(var) {
        let t = u.trim();
        if !t.is_empty() {
            setter(t);
        }
    }
}

/// Environment overrides. Applied after load and never written back.
fn apply_env_overrides(cfg: &mut ToolkitConfig) {
    apply_env("DLMM_TOOLKIT_SOLANA_RPC_URL", |v| {
        v.clone_into(&mut cfg.rpc.solana_rpc_url);
    });
    apply_env("DLMM_TOOLKIT_DLMM_ADAPTER_BASE_URL", |v| {
        cfg.http.dlmm_adapter_base_url = Some(v.to_owned());
    });
    apply_env("DLMM_TOOLKIT_METEORA_API_BASE_URL", |v| {
        v.clone_into(&mut cfg.http.meteora_api_base_url);
    });
    apply_env("DLMM_TOOLKIT_KEYPAIR_PATH", |v| {
        cfg.wallet.keypair_path = Some(PathBuf::from(v));
    });
}

impl ConfigStore {
    pub fn new(paths: &ToolkitPaths) -> Self {
        Self {
            path: paths.config_file(),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub fn load_or_init_default(&self) -> eyre::Result<ToolkitConfig> {
        let mut cfg = if self.path.exists() {
            let s = fs::read_to_string(&self.path).context("read config.toml")?;
            toml::from_str(&s).context("parse config.toml")?
        } else {
            let cfg = ToolkitConfig::default();
            self.save(&cfg)?;
            cfg
        };
        apply_env_overrides(&mut cfg);
        Ok(cfg)
    }

    pub fn save(&self, cfg: &ToolkitConfig) -> eyre::Result<()> {
        let s = toml::to_string_pretty(cfg).context("serialize config.toml")?;
        crate::fsutil::replace_private_file(&self.path, &s).context("write config.toml")
    }
}
