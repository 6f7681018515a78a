use std::env;

use super::error::{CouchDaoError, CouchResult};

const DEFAULT_DATABASE: &str = "quiz_master";

/// Basic-auth pair sent with every request.
#[derive(Debug, Clone)]
pub struct CouchCredentials {
    pub username: String,
    pub password: String,
}

/// Where the CouchDB backend lives.
#[derive(Debug, Clone)]
pub struct CouchConfig {
    pub base_url: String,
    pub database: String,
    pub credentials: Option<CouchCredentials>,
}

impl CouchConfig {
    /// Read `COUCH_BASE_URL` (required), `COUCH_DB` and the optional
    /// `COUCH_USERNAME` / `COUCH_PASSWORD` pair.
    pub fn from_env() -> CouchResult<Self> {
        let base_url = non_blank("COUCH_BASE_URL").ok_or(CouchDaoError::MissingEnvVar {
            var: "COUCH_BASE_URL",
        })?;
        let database = non_blank("COUCH_DB").unwrap_or_else(|| DEFAULT_DATABASE.to_owned());
        let credentials = non_blank("COUCH_USERNAME")
            .zip(non_blank("COUCH_PASSWORD"))
            .map(|(username, password)| CouchCredentials { username, password });

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            database,
            credentials,
        })
    }

    pub(super) fn database_url(&self) -> String {
        format!("{}/{}", self.base_url, self.database)
    }
}

fn non_blank(var: &str) -> Option<String> {
    env::var(var).ok().filter(|value| !value.trim().is_empty())
}
