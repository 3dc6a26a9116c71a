//! Access tokens for the Google Sheets API.

use crate::debug_println;
use crate::error::{CarsError, Result};
use std::path::{Path, PathBuf};

pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetsCredentials {
    /// OAuth 2.0 access token issued elsewhere, used as is.
    AccessToken(String),
    /// Service account key file (JSON); tokens are minted with the spreadsheets scope.
    ServiceAccount(PathBuf),
}

impl SheetsCredentials {
    pub fn access_token(&self) -> Result<String> {
        match self {
            SheetsCredentials::AccessToken(token) => Ok(token.clone()),
            SheetsCredentials::ServiceAccount(key_path) => service_account_token(key_path),
        }
    }
}

fn auth_error(context: &str, error: impl std::fmt::Display) -> CarsError {
    CarsError::Auth(format!("{}: {}", context, error))
}

/// Runs the service account JWT flow on a short-lived runtime; the rest of the crate is blocking.
fn service_account_token(key_path: &Path) -> Result<String> {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;

    runtime.block_on(async {
        let key = yup_oauth2::read_service_account_key(key_path)
            .await
            .map_err(|e| auth_error(&format!("Failed to read service account key {}", key_path.display()), e))?;
        debug_println!("Requesting access token for {}", key.client_email);

        let authenticator = yup_oauth2::ServiceAccountAuthenticator::builder(key)
            .build()
            .await
            .map_err(|e| auth_error("Failed to build authenticator", e))?;
        let token = authenticator
            .token(&[SPREADSHEETS_SCOPE])
            .await
            .map_err(|e| auth_error("Token request failed", e))?;

        token
            .token()
            .map(str::to_string)
            .ok_or_else(|| CarsError::Auth("Token response carried no access token".to_string()))
    })
}
