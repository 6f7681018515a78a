use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB database `{database}` did not answer the initial ping")]
    InitialPing {
        database: String,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to load questions")]
    LoadQuestions {
        #[source]
        source: MongoError,
    },
    #[error("failed to save question `{id}`")]
    SaveQuestion {
        id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to insert leaderboard entry `{id}`")]
    InsertEntry {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load ranked leaderboard entries")]
    LoadRanked {
        #[source]
        source: MongoError,
    },
    #[error("stored leaderboard entry `{id}` is malformed: {reason}")]
    MalformedEntry { id: String, reason: &'static str },
}
