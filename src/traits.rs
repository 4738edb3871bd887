//! Traits for storage abstraction and external collaborators

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use uuid::Uuid;

use crate::document::numbering::SequenceKey;
use crate::types::*;

/// Outcome of attempting to claim a document for conversion
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionClaim {
    /// This caller holds the claim and must either mark the document
    /// converted or release the claim
    Claimed,
    /// The document was already converted; the existing link is returned
    /// so the caller can reference the same target
    AlreadyConverted(ConversionLink),
    /// Another caller holds the claim right now
    InProgress,
}

/// Storage abstraction for documents
///
/// This trait allows the engine to work with any storage backend
/// (PostgreSQL, MySQL, SQLite, in-memory, etc.) by implementing these
/// methods. Updates use document-level optimistic concurrency: the store
/// rejects a write whose expected version does not match the stored one.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document. Fails with [`EngineError::Conflict`] when a
    /// document with the same (company, number) already exists, so a
    /// numbering collision is detected at insert time.
    async fn save_document(&self, document: &Document) -> EngineResult<()>;

    /// Get a document by id
    async fn get_document(&self, document_id: Uuid) -> EngineResult<Option<Document>>;

    /// Replace a document, guarded by its version. Fails with
    /// [`EngineError::Conflict`] when `expected_version` is stale; the
    /// stored version is bumped on success.
    async fn update_document(&self, document: &Document, expected_version: u64)
        -> EngineResult<()>;

    /// List documents for a company, optionally filtered by type
    async fn list_documents(
        &self,
        company_id: Uuid,
        document_type: Option<DocumentType>,
    ) -> EngineResult<Vec<Document>>;

    /// Atomically claim a document for conversion (compare-and-set on its
    /// unconverted state). Exactly one concurrent caller receives
    /// [`ConversionClaim::Claimed`].
    async fn claim_conversion(&self, source_id: Uuid) -> EngineResult<ConversionClaim>;

    /// Release a claim taken by [`Self::claim_conversion`] after a failed
    /// conversion, so the document becomes convertible again
    async fn release_conversion(&self, source_id: Uuid) -> EngineResult<()>;

    /// Record the conversion link on the source document and drop the
    /// claim. Both the link write and the claim drop happen atomically;
    /// a target must never be observable without its source marked.
    async fn mark_converted(&self, source_id: Uuid, link: &ConversionLink) -> EngineResult<()>;
}

/// Atomic per-key sequence counter backing document numbering
///
/// `next_sequence` must be a single atomic increment-and-return per key;
/// reading the current maximum and writing back is not safe under
/// concurrent allocation and must not be used to implement this trait.
#[async_trait]
pub trait SequenceStore: Send + Sync {
    /// Return the next sequence value for the key, starting at 1
    async fn next_sequence(&self, key: &SequenceKey) -> EngineResult<u32>;
}

/// Counterparty directory, namespaced per company
#[async_trait]
pub trait PartyDirectory: Send + Sync {
    /// Get a party by id
    async fn get_party(&self, party_id: Uuid) -> EngineResult<Option<Party>>;

    /// Find a party by its stable identity key within a company
    async fn find_party(&self, company_id: Uuid, identity_key: &str)
        -> EngineResult<Option<Party>>;

    /// Create a party. Fails with [`EngineError::Conflict`] when a
    /// non-identity unique field (such as a phone number) collides.
    async fn create_party(&self, party: NewParty) -> EngineResult<Party>;
}

/// External inventory service
///
/// The engine treats stock as a downstream projection: adjustments are
/// side effects that may fail without failing the financial document.
#[async_trait]
pub trait StockAdjuster: Send + Sync {
    /// Apply a signed stock delta for an item and return the new level
    async fn adjust_stock(
        &self,
        item_id: Uuid,
        company_id: Uuid,
        delta: &BigDecimal,
        reason: &str,
        reference: &str,
    ) -> EngineResult<StockAdjustment>;
}
