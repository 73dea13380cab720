use std::fs;
use std::io;
use std::path::Path;

use secrecy::SecretString;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};

#[derive(Deserialize)]
#[serde(untagged)]
enum CredentialFile {
    Bare(String),
    Keyed { key: String },
}

impl CredentialFile {
    fn into_key(self) -> String {
        match self {
            CredentialFile::Bare(key) | CredentialFile::Keyed { key } => key,
        }
    }
}

pub fn resolve_api_key(config: &AppConfig) -> AppResult<SecretString> {
    if let Some(key) = config.google_places_api_key.clone() {
        debug!(target: "credentials", "using places api key from environment");
        return Ok(key);
    }
    load_api_key(&config.api_key_path)
}

pub fn load_api_key(path: &Path) -> AppResult<SecretString> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(AppError::Config(format!(
                "api credentials not found at {} and GOOGLE_PLACES_API_KEY is unset",
                path.display()
            )));
        }
        Err(err) => return Err(AppError::Io(err)),
    };

    let key = serde_json::from_str::<CredentialFile>(&contents)?.into_key();
    let key = key.trim();
    if key.is_empty() {
        return Err(AppError::Config(format!(
            "api credentials at {} are empty",
            path.display()
        )));
    }
    info!(
        target: "credentials",
        path = %path.display(),
        "loaded places api key"
    );
    Ok(SecretString::new(key.into()))
}
