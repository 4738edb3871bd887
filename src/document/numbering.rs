//! Sequential document number allocation
//!
//! Numbers follow `{PREFIX}-{YYYYMMDD}-{SEQ4}` and are unique per
//! (company, prefix, day). The sequence comes from an atomic per-key
//! counter behind [`SequenceStore`]; reading the highest existing number
//! and incrementing it is not safe under concurrent writers and is never
//! done here.

use chrono::{NaiveDate, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::traits::SequenceStore;
use crate::types::*;

/// Highest sequence the 4-digit format can carry. Allocation beyond this
/// fails loudly rather than wrapping.
pub const MAX_SEQUENCE: u32 = 9999;

/// Key identifying one daily counter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SequenceKey {
    pub company_id: Uuid,
    pub prefix: String,
    pub date: NaiveDate,
}

impl SequenceKey {
    pub fn new(company_id: Uuid, prefix: &str, date: NaiveDate) -> Self {
        Self {
            company_id,
            prefix: prefix.to_string(),
            date,
        }
    }

    /// Flat representation used by key-value sequence stores
    pub fn storage_key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.company_id,
            self.prefix,
            self.date.format("%Y%m%d")
        )
    }
}

/// An allocated document number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatedNumber {
    pub value: String,
    /// True when the number came from the timestamp fallback and must be
    /// reconciled later
    pub fallback: bool,
}

/// Allocates document numbers from a [`SequenceStore`]
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberAllocator;

impl NumberAllocator {
    pub fn new() -> Self {
        Self
    }

    /// Allocate the next number for (company, document type, day)
    ///
    /// Fails with [`EngineError::Fatal`] once the day's counter passes
    /// [`MAX_SEQUENCE`]; the width is never widened silently.
    pub async fn allocate<S: SequenceStore>(
        &self,
        sequences: &S,
        company_id: Uuid,
        document_type: DocumentType,
        gst_enabled: bool,
        date: NaiveDate,
    ) -> EngineResult<AllocatedNumber> {
        let prefix = document_type.prefix(gst_enabled);
        let key = SequenceKey::new(company_id, prefix, date);

        let sequence = sequences.next_sequence(&key).await?;
        if sequence > MAX_SEQUENCE {
            return Err(EngineError::Fatal(format!(
                "sequence exhausted for {}: {} exceeds {:04}",
                key.storage_key(),
                sequence,
                MAX_SEQUENCE
            )));
        }

        Ok(AllocatedNumber {
            value: format!("{}-{}-{:04}", prefix, date.format("%Y%m%d"), sequence),
            fallback: false,
        })
    }

    /// Allocate, substituting a timestamp-suffixed number when the
    /// sequence store is unavailable
    ///
    /// The fallback is a last resort and is flagged so the document can
    /// be reconciled later. Sequence exhaustion is never masked by the
    /// fallback; it still fails the operation.
    pub async fn allocate_or_fallback<S: SequenceStore>(
        &self,
        sequences: &S,
        company_id: Uuid,
        document_type: DocumentType,
        gst_enabled: bool,
        date: NaiveDate,
    ) -> EngineResult<AllocatedNumber> {
        match self
            .allocate(sequences, company_id, document_type, gst_enabled, date)
            .await
        {
            Ok(number) => Ok(number),
            Err(EngineError::Fatal(message)) => Err(EngineError::Fatal(message)),
            Err(error) => {
                let prefix = document_type.prefix(gst_enabled);
                warn!(%company_id, %error, "sequence store unavailable, using fallback number");
                Ok(AllocatedNumber {
                    value: format!(
                        "{}-{}-T{}",
                        prefix,
                        date.format("%Y%m%d"),
                        Utc::now().timestamp_millis()
                    ),
                    fallback: true,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_store::MemoryStore;
    use async_trait::async_trait;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[tokio::test]
    async fn formats_prefix_date_and_padded_sequence() {
        let store = MemoryStore::new();
        let company = Uuid::new_v4();
        let allocator = NumberAllocator::new();

        let first = allocator
            .allocate(&store, company, DocumentType::Sale, true, date())
            .await
            .unwrap();
        let second = allocator
            .allocate(&store, company, DocumentType::Sale, true, date())
            .await
            .unwrap();

        assert_eq!(first.value, "GST-20240315-0001");
        assert_eq!(second.value, "GST-20240315-0002");
        assert!(!first.fallback);
    }

    #[tokio::test]
    async fn counters_are_scoped_per_company_prefix_and_day() {
        let store = MemoryStore::new();
        let allocator = NumberAllocator::new();
        let company_a = Uuid::new_v4();
        let company_b = Uuid::new_v4();

        let a1 = allocator
            .allocate(&store, company_a, DocumentType::Sale, true, date())
            .await
            .unwrap();
        let b1 = allocator
            .allocate(&store, company_b, DocumentType::Sale, true, date())
            .await
            .unwrap();
        let a_order = allocator
            .allocate(&store, company_a, DocumentType::SalesOrder, true, date())
            .await
            .unwrap();
        let a_next_day = allocator
            .allocate(
                &store,
                company_a,
                DocumentType::Sale,
                true,
                date().succ_opt().unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(a1.value, "GST-20240315-0001");
        assert_eq!(b1.value, "GST-20240315-0001");
        assert_eq!(a_order.value, "SO-20240315-0001");
        assert_eq!(a_next_day.value, "GST-20240316-0001");
    }

    #[tokio::test]
    async fn exhaustion_is_fatal() {
        let store = MemoryStore::new();
        let company = Uuid::new_v4();
        let key = SequenceKey::new(company, "GST", date());
        store.set_sequence(&key, MAX_SEQUENCE);

        let allocator = NumberAllocator::new();
        let err = allocator
            .allocate(&store, company, DocumentType::Sale, true, date())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Fatal(_)));
    }

    struct BrokenSequences;

    #[async_trait]
    impl SequenceStore for BrokenSequences {
        async fn next_sequence(&self, _key: &SequenceKey) -> EngineResult<u32> {
            Err(EngineError::Storage("sequence store offline".to_string()))
        }
    }

    #[tokio::test]
    async fn fallback_number_is_flagged() {
        let allocator = NumberAllocator::new();
        let number = allocator
            .allocate_or_fallback(
                &BrokenSequences,
                Uuid::new_v4(),
                DocumentType::Sale,
                false,
                date(),
            )
            .await
            .unwrap();

        assert!(number.fallback);
        assert!(number.value.starts_with("INV-20240315-T"));
    }

    #[tokio::test]
    async fn fallback_does_not_mask_exhaustion() {
        let store = MemoryStore::new();
        let company = Uuid::new_v4();
        store.set_sequence(&SequenceKey::new(company, "SO", date()), MAX_SEQUENCE + 5);

        let allocator = NumberAllocator::new();
        let err = allocator
            .allocate_or_fallback(&store, company, DocumentType::SalesOrder, true, date())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Fatal(_)));
    }
}
