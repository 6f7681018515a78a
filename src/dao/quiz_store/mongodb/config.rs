use std::{env, time::Duration};

use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

const DEFAULT_DATABASE: &str = "quiz_master";
const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(3);

/// Parsed client options plus the database holding both collections.
#[derive(Clone)]
pub struct MongoConfig {
    pub options: ClientOptions,
    pub database_name: String,
}

impl MongoConfig {
    /// Read `MONGO_URI` (required) and `MONGO_DB` (optional).
    ///
    /// A server selection timeout is applied unless the URI sets one, so an
    /// unreachable cluster fails the connect attempt quickly.
    pub async fn from_env() -> MongoResult<Self> {
        let uri = env::var("MONGO_URI")
            .map_err(|_| MongoDaoError::MissingEnvVar { var: "MONGO_URI" })?;
        let mut options =
            ClientOptions::parse(&uri)
                .await
                .map_err(|source| MongoDaoError::InvalidUri {
                    uri: uri.clone(),
                    source,
                })?;
        options
            .server_selection_timeout
            .get_or_insert(SERVER_SELECTION_TIMEOUT);

        let database_name = env::var("MONGO_DB")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE.to_owned());

        Ok(Self {
            options,
            database_name,
        })
    }
}
