/// Database model definitions.
pub mod models;
/// Question and leaderboard storage backends.
pub mod quiz_store;
/// Storage abstraction layer for database operations.
pub mod storage;
