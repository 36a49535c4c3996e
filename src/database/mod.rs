pub mod answers;
pub mod coursework;
pub mod courses;
pub mod database;
pub mod models;
pub mod programs;
pub mod qdrant_config;
pub mod questions;
pub mod users;
pub mod vector_db;

pub use database::Database;
pub use database::DatabaseError;
pub use vector_db::{InMemoryVectorStore, QdrantStore, ScoredChunk, VectorDBError, VectorStore};
