use mongodb::{Client, Database, bson::doc};
use tracing::debug;

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult},
};

/// Build a client and check the database answers a single ping.
///
/// Retrying is left to the storage supervisor; the ping itself is bounded by
/// the server selection timeout set in [`MongoConfig`].
pub async fn establish_connection(config: &MongoConfig) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(config.options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(&config.database_name);

    database
        .run_command(doc! { "ping": 1 })
        .await
        .map_err(|source| MongoDaoError::InitialPing {
            database: config.database_name.clone(),
            source,
        })?;
    debug!(database = %config.database_name, "MongoDB answered ping");

    Ok((client, database))
}
