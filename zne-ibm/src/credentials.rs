//! IBM Quantum credentials
//!
//! ## Token Sources (in priority order)
//! 1. Direct parameter
//! 2. Environment variable `IBM_QUANTUM_TOKEN` (a `.env` file is loaded first)
//! 3. Config file `~/.qiskit/qiskit-ibm.json`

use crate::error::{IBMError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable holding the API token
pub const TOKEN_VAR: &str = "IBM_QUANTUM_TOKEN";

/// Environment variable holding the hub/group/project instance
pub const INSTANCE_VAR: &str = "IBM_QUANTUM_INSTANCE";

/// Shortest token accepted by [`Credentials::validate`]
const MIN_TOKEN_LEN: usize = 32;

/// IBM Quantum credentials
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    token: String,

    /// Instance (hub/group/project)
    #[serde(default)]
    instance: Option<String>,

    /// Channel (ibm_quantum or ibm_cloud)
    #[serde(default = "default_channel")]
    channel: String,
}

fn default_channel() -> String {
    "ibm_quantum".to_string()
}

// Keeps the token out of logs
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .field("instance", &self.instance)
            .field("channel", &self.channel)
            .finish()
    }
}

impl Credentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            instance: None,
            channel: default_channel(),
        }
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn instance(&self) -> Option<&str> {
        self.instance.as_deref()
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Basic token format check
    pub fn validate(&self) -> Result<()> {
        if self.token.trim().is_empty() {
            return Err(IBMError::InvalidToken("Token is empty".into()));
        }
        if self.token.len() < MIN_TOKEN_LEN {
            return Err(IBMError::InvalidToken("Token too short".into()));
        }
        Ok(())
    }

    /// Authorization header value
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Loads credentials from the environment or the Qiskit config file
pub struct CredentialsManager;

impl CredentialsManager {
    /// Load credentials from the first available source
    pub fn load() -> Result<Credentials> {
        // A missing .env file is not an error
        let _ = dotenvy::dotenv();

        if let Ok(token) = env::var(TOKEN_VAR) {
            let mut creds = Credentials::new(token);
            if let Ok(instance) = env::var(INSTANCE_VAR) {
                creds = creds.with_instance(instance);
            }
            creds.validate()?;
            tracing::debug!("credentials loaded from environment");
            return Ok(creds);
        }

        if let Some(path) = Self::qiskit_config_path() {
            if let Some(creds) = Self::load_from_file(&path)? {
                tracing::debug!(path = %path.display(), "credentials loaded from Qiskit config");
                return Ok(creds);
            }
        }

        Err(IBMError::TokenNotFound)
    }

    /// Credentials from an explicit token
    pub fn from_token(token: impl Into<String>) -> Result<Credentials> {
        let creds = Credentials::new(token);
        creds.validate()?;
        Ok(creds)
    }

    /// Parse a Qiskit-style JSON config; `Ok(None)` when the file is absent
    /// or holds no token
    pub fn load_from_file(path: &Path) -> Result<Option<Credentials>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)?;
        let config: serde_json::Value = serde_json::from_str(&content)?;

        // Flat layout first, then the `default_provider` section
        let section = if config.get("token").is_some() {
            Some(&config)
        } else {
            config.get("default_provider")
        };

        let Some(section) = section else {
            return Ok(None);
        };
        let Some(token) = section.get("token").and_then(|v| v.as_str()) else {
            return Ok(None);
        };

        let mut creds = Credentials::new(token);
        if let Some(instance) = section.get("instance").and_then(|v| v.as_str()) {
            creds = creds.with_instance(instance);
        }
        creds.validate()?;
        Ok(Some(creds))
    }

    fn qiskit_config_path() -> Option<PathBuf> {
        env::var("HOME")
            .or_else(|_| env::var("USERPROFILE"))
            .ok()
            .map(|home| PathBuf::from(home).join(".qiskit").join("qiskit-ibm.json"))
    }
}
