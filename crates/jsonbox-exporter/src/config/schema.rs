use std::collections::BTreeMap;

use serde::Deserialize;

use jsonbox_core::error::{ProbeError, Result};
use jsonbox_core::model::MetricSpec;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExporterConfig {
    #[serde(default)]
    pub modules: BTreeMap<String, ModuleConfig>,
}

impl ExporterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.modules.is_empty() {
            return Err(ProbeError::Config("modules must not be empty".into()));
        }
        for (name, module) in &self.modules {
            if name.is_empty() {
                return Err(ProbeError::Config("module name must not be empty".into()));
            }
            module
                .validate()
                .map_err(|e| ProbeError::Config(format!("module {name}: {e}")))?;
        }
        Ok(())
    }

    pub fn module(&self, name: &str) -> Option<&ModuleConfig> {
        self.modules.get(name)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleConfig {
    #[serde(default)]
    pub request: RequestConfig,

    #[serde(default)]
    pub metrics: Vec<MetricSpec>,
}

impl ModuleConfig {
    pub fn validate(&self) -> Result<()> {
        self.request.client_config.validate()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestConfig {
    /// Accepted but not applied: the method follows from body presence.
    #[serde(default)]
    pub method: Option<String>,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Merged into the target's query string.
    #[serde(default)]
    pub params: BTreeMap<String, String>,

    #[serde(default)]
    pub body: BodyConfig,

    #[serde(default)]
    pub client_config: ClientConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BodyConfig {
    #[serde(default)]
    pub content: String,

    #[serde(default)]
    pub templatize: bool,
}

/// Outbound client capability: auth, TLS, proxy, redirects.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    #[serde(default)]
    pub basic_auth: Option<BasicAuth>,

    #[serde(default)]
    pub bearer_token: Option<String>,

    #[serde(default)]
    pub bearer_token_file: Option<String>,

    #[serde(default)]
    pub proxy_url: Option<String>,

    #[serde(default = "default_follow_redirects")]
    pub follow_redirects: bool,

    #[serde(default)]
    pub tls_config: TlsConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            basic_auth: None,
            bearer_token: None,
            bearer_token_file: None,
            proxy_url: None,
            follow_redirects: default_follow_redirects(),
            tls_config: TlsConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        if self.bearer_token.is_some() && self.bearer_token_file.is_some() {
            return Err(ProbeError::Config(
                "at most one of bearer_token & bearer_token_file must be configured".into(),
            ));
        }
        if self.basic_auth.is_some() && (self.bearer_token.is_some() || self.bearer_token_file.is_some()) {
            return Err(ProbeError::Config(
                "at most one of basic_auth, bearer_token & bearer_token_file must be configured".into(),
            ));
        }
        if let Some(auth) = &self.basic_auth {
            auth.validate()?;
        }
        self.tls_config.validate()
    }
}

fn default_follow_redirects() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BasicAuth {
    pub username: String,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub password_file: Option<String>,
}

impl BasicAuth {
    pub fn validate(&self) -> Result<()> {
        if self.password.is_some() && self.password_file.is_some() {
            return Err(ProbeError::Config(
                "at most one of basic_auth password & password_file must be configured".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsConfig {
    #[serde(default)]
    pub ca_file: Option<String>,

    #[serde(default)]
    pub cert_file: Option<String>,

    #[serde(default)]
    pub key_file: Option<String>,

    #[serde(default)]
    pub insecure_skip_verify: bool,
}

impl TlsConfig {
    pub fn validate(&self) -> Result<()> {
        match (&self.cert_file, &self.key_file) {
            (Some(_), None) => Err(ProbeError::Config(
                "tls_config.cert_file requires tls_config.key_file".into(),
            )),
            (None, Some(_)) => Err(ProbeError::Config(
                "tls_config.key_file requires tls_config.cert_file".into(),
            )),
            _ => Ok(()),
        }
    }
}
