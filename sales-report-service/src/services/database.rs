use crate::services::metrics::record_db_query_duration;
use crate::services::store::{DocumentQuery, DocumentStore, FieldPath};
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::{
    bson::{doc, Bson, Document, Regex},
    Client as MongoClient, Collection, Database,
};
use serde_json::Value;
use service_core::error::AppError;
use std::time::Instant;

#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
}

impl MongoDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!("Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::from(e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection(name)
    }
}

/// Translate a query into a BSON filter. Ids are stored as strings by some
/// writers and as numbers by others, so numeric-looking equality values match
/// both representations.
pub fn build_filter(query: &DocumentQuery) -> Document {
    let mut clauses = Vec::new();

    for condition in &query.equals {
        let matcher = match condition.value.parse::<i64>() {
            Ok(n) => Bson::Document(doc! { "$in": [condition.value.as_str(), n] }),
            Err(_) => Bson::String(condition.value.clone()),
        };
        clauses.push(first_usable(&condition.path, matcher));
    }

    if let Some(range) = &query.date_range {
        let mut bounds = Document::new();
        if let Some(lower) = range.lower_bound() {
            bounds.insert("$gte", lower);
        }
        if let Some(upper) = range.upper_bound_exclusive() {
            bounds.insert("$lt", upper);
        }
        clauses.push(first_usable(&range.path, Bson::Document(bounds)));
    }

    match clauses.len() {
        0 => Document::new(),
        1 => clauses.remove(0),
        _ => doc! { "$and": clauses },
    }
}

/// `matcher` applied to the first candidate that holds a value: candidate `n`
/// only counts when every earlier candidate is missing, null or blank.
fn first_usable(path: &FieldPath, matcher: Bson) -> Document {
    let mut branches: Vec<Document> = Vec::with_capacity(path.candidates.len());
    for (position, field) in path.candidates.iter().enumerate() {
        let mut branch = Document::new();
        for earlier in &path.candidates[..position] {
            branch.insert(earlier.as_str(), blank());
        }
        branch.insert(field.as_str(), matcher.clone());
        branches.push(branch);
    }

    match branches.len() {
        1 => branches.remove(0),
        _ => doc! { "$or": branches },
    }
}

fn blank() -> Document {
    let whitespace = Bson::RegularExpression(Regex {
        pattern: r"^\s*$".to_string(),
        options: String::new(),
    });
    doc! { "$in": [Bson::Null, whitespace] }
}

#[async_trait]
impl DocumentStore for MongoDb {
    async fn find(&self, collection: &str, query: &DocumentQuery) -> Result<Vec<Value>, AppError> {
        let start = Instant::now();
        let filter = build_filter(query);
        tracing::debug!(collection = %collection, filter = %filter, "Querying collection");

        let mut cursor = self
            .collection(collection)
            .find(filter, None)
            .await
            .map_err(|e| {
                tracing::error!(collection = %collection, "Query failed: {}", e);
                AppError::from(e)
            })?;

        let mut documents = Vec::new();
        while let Some(document) = cursor.try_next().await.map_err(AppError::from)? {
            documents.push(Bson::Document(document).into_relaxed_extjson());
        }

        record_db_query_duration(collection, start.elapsed().as_secs_f64());
        Ok(documents)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                AppError::from(e)
            })?;
        Ok(())
    }
}
