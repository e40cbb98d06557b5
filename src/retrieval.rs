//! Retriever abstraction: query in, documents out.
//!
//! The Retrieval node holds a `dyn Retriever` and concatenates the returned
//! `page_content`s; failure is swallowed at the node boundary, so this trait
//! only needs the happy path plus an error.

use async_trait::async_trait;

use crate::error::EngineError;

/// One retrieved document; only the text matters to the engine.
#[derive(Debug, Clone)]
pub struct Document {
    pub page_content: String,
}

impl Document {
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
        }
    }
}

/// Document retriever: given a query, return relevant documents.
///
/// **Interaction**: Held by `RetrievalNode`; queried with the last human
/// message. Implementations live outside this crate (vector stores, search
/// APIs); `MockRetriever` is the in-crate fixture.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Vec<Document>, EngineError>;
}

/// Mock retriever: fixed document list (or a fixed error) for every query.
pub struct MockRetriever {
    documents: Vec<Document>,
    fail_with: Option<String>,
}

impl MockRetriever {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
            fail_with: None,
        }
    }

    /// A retriever whose every query fails, for fallback-path tests.
    pub fn failing(detail: impl Into<String>) -> Self {
        Self {
            documents: Vec::new(),
            fail_with: Some(detail.into()),
        }
    }
}

#[async_trait]
impl Retriever for MockRetriever {
    async fn retrieve(&self, _query: &str) -> Result<Vec<Document>, EngineError> {
        if let Some(detail) = &self.fail_with {
            return Err(EngineError::RetrievalFailed(detail.clone()));
        }
        Ok(self.documents.clone())
    }
}
