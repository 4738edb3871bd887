//! In-memory storage implementation for testing and development

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::document::numbering::SequenceKey;
use crate::traits::*;
use crate::types::*;

/// In-memory implementation of every storage-side trait the engine
/// consumes: documents, sequence counters, and the party directory
///
/// Interior mutability keeps all operations on `&self` so the store can
/// be shared across concurrent tasks; every read-modify-write runs under
/// one lock, which is what makes the sequence counter and the conversion
/// claim atomic.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    documents: Arc<Mutex<HashMap<Uuid, Document>>>,
    numbers: Arc<Mutex<HashSet<(Uuid, String)>>>,
    sequences: Arc<Mutex<HashMap<String, u32>>>,
    parties: Arc<Mutex<HashMap<Uuid, Party>>>,
    claims: Arc<Mutex<HashSet<Uuid>>>,
}

impl MemoryStore {
    /// Create a new memory store instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) {
        self.documents.lock().unwrap().clear();
        self.numbers.lock().unwrap().clear();
        self.sequences.lock().unwrap().clear();
        self.parties.lock().unwrap().clear();
        self.claims.lock().unwrap().clear();
    }

    /// Pin a sequence counter to a value (useful for exhaustion tests)
    pub fn set_sequence(&self, key: &SequenceKey, value: u32) {
        self.sequences
            .lock()
            .unwrap()
            .insert(key.storage_key(), value);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn save_document(&self, document: &Document) -> EngineResult<()> {
        let mut numbers = self.numbers.lock().unwrap();
        let number_key = (document.company_id, document.number.clone());
        if !numbers.insert(number_key) {
            return Err(EngineError::Conflict(format!(
                "document number '{}' already exists",
                document.number
            )));
        }
        self.documents
            .lock()
            .unwrap()
            .insert(document.id, document.clone());
        Ok(())
    }

    async fn get_document(&self, document_id: Uuid) -> EngineResult<Option<Document>> {
        Ok(self.documents.lock().unwrap().get(&document_id).cloned())
    }

    async fn update_document(
        &self,
        document: &Document,
        expected_version: u64,
    ) -> EngineResult<()> {
        let mut documents = self.documents.lock().unwrap();
        let stored = documents
            .get(&document.id)
            .ok_or_else(|| EngineError::DocumentNotFound(document.id.to_string()))?;

        if stored.version != expected_version {
            return Err(EngineError::Conflict(format!(
                "stale version {} for document {}, stored is {}",
                expected_version, document.id, stored.version
            )));
        }

        let mut updated = document.clone();
        updated.version = expected_version + 1;
        documents.insert(document.id, updated);
        Ok(())
    }

    async fn list_documents(
        &self,
        company_id: Uuid,
        document_type: Option<DocumentType>,
    ) -> EngineResult<Vec<Document>> {
        let documents = self.documents.lock().unwrap();
        let filtered: Vec<Document> = documents
            .values()
            .filter(|doc| {
                doc.company_id == company_id
                    && document_type.is_none_or(|t| doc.document_type == t)
            })
            .cloned()
            .collect();
        Ok(filtered)
    }

    async fn claim_conversion(&self, source_id: Uuid) -> EngineResult<ConversionClaim> {
        let documents = self.documents.lock().unwrap();
        let document = documents
            .get(&source_id)
            .ok_or_else(|| EngineError::DocumentNotFound(source_id.to_string()))?;

        if let Some(link) = &document.converted {
            return Ok(ConversionClaim::AlreadyConverted(link.clone()));
        }

        let mut claims = self.claims.lock().unwrap();
        if claims.insert(source_id) {
            Ok(ConversionClaim::Claimed)
        } else {
            Ok(ConversionClaim::InProgress)
        }
    }

    async fn release_conversion(&self, source_id: Uuid) -> EngineResult<()> {
        self.claims.lock().unwrap().remove(&source_id);
        Ok(())
    }

    async fn mark_converted(&self, source_id: Uuid, link: &ConversionLink) -> EngineResult<()> {
        let mut documents = self.documents.lock().unwrap();
        let document = documents
            .get_mut(&source_id)
            .ok_or_else(|| EngineError::DocumentNotFound(source_id.to_string()))?;

        document.converted = Some(link.clone());
        document.updated_at = link.converted_at;
        document.version += 1;

        self.claims.lock().unwrap().remove(&source_id);
        Ok(())
    }
}

#[async_trait]
impl SequenceStore for MemoryStore {
    async fn next_sequence(&self, key: &SequenceKey) -> EngineResult<u32> {
        let mut sequences = self.sequences.lock().unwrap();
        let counter = sequences.entry(key.storage_key()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}

#[async_trait]
impl PartyDirectory for MemoryStore {
    async fn get_party(&self, party_id: Uuid) -> EngineResult<Option<Party>> {
        Ok(self.parties.lock().unwrap().get(&party_id).cloned())
    }

    async fn find_party(
        &self,
        company_id: Uuid,
        identity_key: &str,
    ) -> EngineResult<Option<Party>> {
        let parties = self.parties.lock().unwrap();
        Ok(parties
            .values()
            .find(|party| {
                party.company_id == company_id
                    && party.identity_key.as_deref() == Some(identity_key)
            })
            .cloned())
    }

    async fn create_party(&self, party: NewParty) -> EngineResult<Party> {
        let mut parties = self.parties.lock().unwrap();

        // Unique indexes a relational directory would enforce
        if let Some(identity) = &party.identity_key {
            if parties.values().any(|p| {
                p.company_id == party.company_id && p.identity_key.as_deref() == Some(identity)
            }) {
                return Err(EngineError::Conflict(format!(
                    "party with identity '{}' already exists",
                    identity
                )));
            }
        }
        if let Some(phone) = &party.phone {
            if parties
                .values()
                .any(|p| p.company_id == party.company_id && p.phone.as_deref() == Some(phone))
            {
                return Err(EngineError::Conflict(format!(
                    "phone number '{}' already in use",
                    phone
                )));
            }
        }

        let created = Party {
            id: Uuid::new_v4(),
            company_id: party.company_id,
            name: party.name,
            identity_key: party.identity_key,
            phone: party.phone,
            email: party.email,
            created_at: chrono::Utc::now().naive_utc(),
        };
        parties.insert(created.id, created.clone());
        Ok(created)
    }
}

/// In-memory inventory service for testing and development
///
/// Stock levels are keyed by (company, item); adjusting an untracked item
/// fails like an unknown-item response from a real inventory service.
#[derive(Debug, Clone, Default)]
pub struct MemoryStockAdjuster {
    stocks: Arc<Mutex<HashMap<(Uuid, Uuid), BigDecimal>>>,
}

impl MemoryStockAdjuster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the stock level for an item
    pub fn set_stock(&self, company_id: Uuid, item_id: Uuid, quantity: BigDecimal) {
        self.stocks
            .lock()
            .unwrap()
            .insert((company_id, item_id), quantity);
    }

    /// Current stock level, if the item is tracked
    pub fn stock_level(&self, company_id: Uuid, item_id: Uuid) -> Option<BigDecimal> {
        self.stocks
            .lock()
            .unwrap()
            .get(&(company_id, item_id))
            .cloned()
    }
}

#[async_trait]
impl StockAdjuster for MemoryStockAdjuster {
    async fn adjust_stock(
        &self,
        item_id: Uuid,
        company_id: Uuid,
        delta: &BigDecimal,
        _reason: &str,
        _reference: &str,
    ) -> EngineResult<StockAdjustment> {
        let mut stocks = self.stocks.lock().unwrap();
        let level = stocks
            .get_mut(&(company_id, item_id))
            .ok_or_else(|| EngineError::Dependency(format!("item '{}' is not tracked", item_id)))?;

        *level += delta;
        Ok(StockAdjustment {
            item_id,
            new_stock: level.clone(),
        })
    }
}
