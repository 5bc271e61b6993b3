//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store`
//! trait.

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};

use shopsync_core::{
    Baseline, Customer, DeadLetterEntry, DeadLetterId, DeadLetterStats, DeadLetterStatus,
    GateOverride, GateState, GateType, Merchant, MerchantId, Order, OrderId,
    ProcessedEventRecord, QueueJob,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::{InsertOutcome, Store};

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    /// Serializes natural-key check-then-insert sequences. RocksDB batches
    /// are atomic but not conditional, so the uniqueness constraint on
    /// `(merchant_id, source_order_id)` is enforced by holding this lock
    /// across the index read and the batch write.
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>> {
        let cf = self.cf(cf::ORDERS)?;
        self.db
            .get_cf(&cf, keys::order_key(order_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    /// Stage an order insert (record plus both indexes) into a batch.
    fn stage_order_insert(&self, batch: &mut WriteBatch, order: &Order) -> Result<()> {
        let cf_orders = self.cf(cf::ORDERS)?;
        let cf_source = self.cf(cf::ORDERS_BY_SOURCE)?;
        let cf_time = self.cf(cf::ORDERS_BY_TIME)?;

        let value = Self::serialize(order)?;
        batch.put_cf(&cf_orders, keys::order_key(&order.id), &value);
        batch.put_cf(
            &cf_source,
            keys::order_source_key(&order.merchant_id, order.source_order_id),
            order.id.to_bytes(),
        );
        batch.put_cf(
            &cf_time,
            keys::order_time_key(
                &order.merchant_id,
                order.created_at.timestamp_millis(),
                &order.id,
            ),
            [],
        );
        Ok(())
    }

    /// Stage a customer upsert, preserving `created_at` for existing rows.
    fn stage_customer_upsert(&self, batch: &mut WriteBatch, customer: &Customer) -> Result<()> {
        let cf_customers = self.cf(cf::CUSTOMERS)?;
        let key = keys::customer_key(&customer.merchant_id, customer.source_customer_id);

        let mut row = customer.clone();
        if let Some(existing) =
            self.get_customer(&customer.merchant_id, customer.source_customer_id)?
        {
            row.created_at = existing.created_at;
        }
        row.updated_at = Utc::now();

        batch.put_cf(&cf_customers, key, Self::serialize(&row)?);
        Ok(())
    }

    fn stage_processed_record(
        &self,
        batch: &mut WriteBatch,
        record: &ProcessedEventRecord,
    ) -> Result<()> {
        let cf_ledger = self.cf(cf::PROCESSED_EVENTS)?;
        batch.put_cf(
            &cf_ledger,
            keys::processed_event_key(&record.event_id),
            Self::serialize(record)?,
        );
        Ok(())
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn natural_key_exists(&self, merchant_id: &MerchantId, source_order_id: i64) -> Result<bool> {
        let cf_source = self.cf(cf::ORDERS_BY_SOURCE)?;
        Ok(self
            .db
            .get_cf(&cf_source, keys::order_source_key(merchant_id, source_order_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some())
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Merchant Operations
    // =========================================================================

    fn put_merchant(&self, merchant: &Merchant) -> Result<()> {
        let cf = self.cf(cf::MERCHANTS)?;
        self.db
            .put_cf(&cf, keys::merchant_key(&merchant.id), Self::serialize(merchant)?)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn get_merchant(&self, merchant_id: &MerchantId) -> Result<Option<Merchant>> {
        let cf = self.cf(cf::MERCHANTS)?;
        self.db
            .get_cf(&cf, keys::merchant_key(merchant_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list_active_merchants(&self) -> Result<Vec<Merchant>> {
        let cf = self.cf(cf::MERCHANTS)?;
        let mut merchants = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            let merchant: Merchant = Self::deserialize(&value)?;
            if merchant.active {
                merchants.push(merchant);
            }
        }
        Ok(merchants)
    }

    // =========================================================================
    // Order Operations
    // =========================================================================

    fn insert_order(&self, order: &Order) -> Result<InsertOutcome> {
        let _guard = self.write_lock.lock().expect("store write lock");

        if self.natural_key_exists(&order.merchant_id, order.source_order_id)? {
            return Ok(InsertOutcome::Duplicate);
        }

        let mut batch = WriteBatch::default();
        self.stage_order_insert(&mut batch, order)?;
        self.write(batch)?;
        Ok(InsertOutcome::Inserted)
    }

    fn find_order_by_source_id(
        &self,
        merchant_id: &MerchantId,
        source_order_id: i64,
    ) -> Result<Option<Order>> {
        let cf_source = self.cf(cf::ORDERS_BY_SOURCE)?;
        let Some(id_bytes) = self
            .db
            .get_cf(&cf_source, keys::order_source_key(merchant_id, source_order_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            return Ok(None);
        };

        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&id_bytes[..16]);
        let order_id = OrderId::from_bytes(bytes)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.get_order(&order_id)
    }

    fn list_orders_in_window(
        &self,
        merchant_id: &MerchantId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Order>> {
        let cf_time = self.cf(cf::ORDERS_BY_TIME)?;
        let prefix = keys::merchant_prefix(merchant_id);
        let lower = keys::order_time_lower_bound(merchant_id, from.timestamp_millis());
        let to_ms = to.timestamp_millis();

        let mut orders = Vec::new();
        let iter = self
            .db
            .iterator_cf(&cf_time, IteratorMode::From(&lower, Direction::Forward));
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            if keys::extract_ts_from_time_key(&key) > to_ms {
                break;
            }
            let order_id = keys::extract_order_id_from_time_key(&key);
            if let Some(order) = self.get_order(&order_id)? {
                orders.push(order);
            }
        }
        Ok(orders)
    }

    // =========================================================================
    // Customer Operations
    // =========================================================================

    fn upsert_customer(&self, customer: &Customer) -> Result<()> {
        let mut batch = WriteBatch::default();
        self.stage_customer_upsert(&mut batch, customer)?;
        self.write(batch)
    }

    fn get_customer(
        &self,
        merchant_id: &MerchantId,
        source_customer_id: i64,
    ) -> Result<Option<Customer>> {
        let cf = self.cf(cf::CUSTOMERS)?;
        self.db
            .get_cf(&cf, keys::customer_key(merchant_id, source_customer_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    // =========================================================================
    // Idempotency Ledger
    // =========================================================================

    fn has_processed_event(&self, event_id: &str) -> Result<bool> {
        let cf = self.cf(cf::PROCESSED_EVENTS)?;
        Ok(self
            .db
            .get_cf(&cf, keys::processed_event_key(event_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some())
    }

    fn get_processed_event(&self, event_id: &str) -> Result<Option<ProcessedEventRecord>> {
        let cf = self.cf(cf::PROCESSED_EVENTS)?;
        self.db
            .get_cf(&cf, keys::processed_event_key(event_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn record_processed(&self, record: &ProcessedEventRecord) -> Result<()> {
        let mut batch = WriteBatch::default();
        self.stage_processed_record(&mut batch, record)?;
        self.write(batch)
    }

    // =========================================================================
    // Compound Operations
    // =========================================================================

    fn apply_order_event(
        &self,
        order: &Order,
        customer: Option<&Customer>,
        record: &ProcessedEventRecord,
    ) -> Result<InsertOutcome> {
        let _guard = self.write_lock.lock().expect("store write lock");

        let mut batch = WriteBatch::default();
        let outcome = if self.natural_key_exists(&order.merchant_id, order.source_order_id)? {
            // The losing writer still records the ledger entry so the event
            // never replays.
            InsertOutcome::Duplicate
        } else {
            self.stage_order_insert(&mut batch, order)?;
            if let Some(customer) = customer {
                self.stage_customer_upsert(&mut batch, customer)?;
            }
            InsertOutcome::Inserted
        };
        self.stage_processed_record(&mut batch, record)?;
        self.write(batch)?;
        Ok(outcome)
    }

    fn apply_customer_event(
        &self,
        customer: &Customer,
        record: &ProcessedEventRecord,
    ) -> Result<()> {
        let mut batch = WriteBatch::default();
        self.stage_customer_upsert(&mut batch, customer)?;
        self.stage_processed_record(&mut batch, record)?;
        self.write(batch)
    }

    // =========================================================================
    // Queue Operations
    // =========================================================================

    fn enqueue_job(&self, job: &QueueJob) -> Result<()> {
        let cf = self.cf(cf::QUEUE_JOBS)?;
        let key = keys::queue_job_key(job.run_at.timestamp_millis(), &job.job_id);
        self.db
            .put_cf(&cf, key, Self::serialize(job)?)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn due_jobs(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<QueueJob>> {
        let cf = self.cf(cf::QUEUE_JOBS)?;
        let now_ms = now.timestamp_millis();

        let mut jobs = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            let mut ts_bytes = [0u8; 8];
            ts_bytes.copy_from_slice(&key[..8]);
            #[allow(clippy::cast_possible_wrap)]
            let run_at_ms = u64::from_be_bytes(ts_bytes) as i64;
            if run_at_ms > now_ms {
                break;
            }
            jobs.push(Self::deserialize(&value)?);
            if jobs.len() >= limit {
                break;
            }
        }
        Ok(jobs)
    }

    fn remove_job(&self, job: &QueueJob) -> Result<()> {
        let cf = self.cf(cf::QUEUE_JOBS)?;
        let key = keys::queue_job_key(job.run_at.timestamp_millis(), &job.job_id);
        self.db
            .delete_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn reschedule_job(&self, old: &QueueJob, new: &QueueJob) -> Result<()> {
        let cf = self.cf(cf::QUEUE_JOBS)?;
        let mut batch = WriteBatch::default();
        batch.delete_cf(
            &cf,
            keys::queue_job_key(old.run_at.timestamp_millis(), &old.job_id),
        );
        batch.put_cf(
            &cf,
            keys::queue_job_key(new.run_at.timestamp_millis(), &new.job_id),
            Self::serialize(new)?,
        );
        self.write(batch)
    }

    // =========================================================================
    // Dead Letter Operations
    // =========================================================================

    fn put_dead_letter(&self, entry: &DeadLetterEntry) -> Result<()> {
        let cf_entries = self.cf(cf::DEAD_LETTERS)?;
        let cf_index = self.cf(cf::DEAD_LETTERS_BY_MERCHANT)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_entries, keys::dead_letter_key(&entry.id), Self::serialize(entry)?);
        batch.put_cf(
            &cf_index,
            keys::merchant_dead_letter_key(&entry.merchant_id, &entry.id),
            [], // Index entry (empty value)
        );
        self.write(batch)
    }

    fn get_dead_letter(&self, id: &DeadLetterId) -> Result<Option<DeadLetterEntry>> {
        let cf = self.cf(cf::DEAD_LETTERS)?;
        self.db
            .get_cf(&cf, keys::dead_letter_key(id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn update_dead_letter(&self, entry: &DeadLetterEntry) -> Result<()> {
        if self.get_dead_letter(&entry.id)?.is_none() {
            return Err(StoreError::NotFound {
                entity: "dead letter",
                id: entry.id.to_string(),
            });
        }
        let cf = self.cf(cf::DEAD_LETTERS)?;
        self.db
            .put_cf(&cf, keys::dead_letter_key(&entry.id), Self::serialize(entry)?)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn list_dead_letters(
        &self,
        merchant_id: &MerchantId,
        status: Option<DeadLetterStatus>,
    ) -> Result<Vec<DeadLetterEntry>> {
        let cf_index = self.cf(cf::DEAD_LETTERS_BY_MERCHANT)?;
        let prefix = keys::merchant_prefix(merchant_id);

        let mut entries = Vec::new();
        let iter = self
            .db
            .iterator_cf(&cf_index, IteratorMode::From(&prefix, Direction::Forward));
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            let id = keys::extract_dead_letter_id(&key);
            if let Some(entry) = self.get_dead_letter(&id)? {
                if status.map_or(true, |s| entry.status == s) {
                    entries.push(entry);
                }
            }
        }
        Ok(entries)
    }

    fn dead_letter_stats(&self, merchant_id: &MerchantId) -> Result<DeadLetterStats> {
        let mut stats = DeadLetterStats::default();
        for entry in self.list_dead_letters(merchant_id, None)? {
            stats.record(entry.status);
        }
        Ok(stats)
    }

    // =========================================================================
    // Baseline Operations
    // =========================================================================

    fn put_baseline(&self, baseline: &Baseline) -> Result<()> {
        let cf = self.cf(cf::BASELINES)?;
        self.db
            .put_cf(
                &cf,
                keys::baseline_key(&baseline.merchant_id),
                Self::serialize(baseline)?,
            )
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn get_baseline(&self, merchant_id: &MerchantId) -> Result<Option<Baseline>> {
        let cf = self.cf(cf::BASELINES)?;
        self.db
            .get_cf(&cf, keys::baseline_key(merchant_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    // =========================================================================
    // Gate Operations
    // =========================================================================

    fn put_gate_state(&self, state: &GateState) -> Result<()> {
        let cf = self.cf(cf::GATE_STATES)?;
        self.db
            .put_cf(
                &cf,
                keys::gate_state_key(&state.merchant_id, state.gate_type),
                Self::serialize(state)?,
            )
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn get_gate_state(
        &self,
        merchant_id: &MerchantId,
        gate_type: GateType,
    ) -> Result<Option<GateState>> {
        let cf = self.cf(cf::GATE_STATES)?;
        self.db
            .get_cf(&cf, keys::gate_state_key(merchant_id, gate_type))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn delete_gate_state(&self, merchant_id: &MerchantId, gate_type: GateType) -> Result<()> {
        let cf = self.cf(cf::GATE_STATES)?;
        self.db
            .delete_cf(&cf, keys::gate_state_key(merchant_id, gate_type))
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn list_gate_states(&self, merchant_id: &MerchantId) -> Result<Vec<GateState>> {
        let cf = self.cf(cf::GATE_STATES)?;
        let prefix = keys::merchant_prefix(merchant_id);

        let mut states = Vec::new();
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&prefix, Direction::Forward));
        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            states.push(Self::deserialize(&value)?);
        }
        Ok(states)
    }

    fn append_gate_override(&self, entry: &GateOverride) -> Result<()> {
        let cf = self.cf(cf::GATE_OVERRIDES)?;
        self.db
            .put_cf(
                &cf,
                keys::gate_override_key(&entry.merchant_id, &entry.id),
                Self::serialize(entry)?,
            )
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn list_gate_overrides(
        &self,
        merchant_id: &MerchantId,
        gate_type: Option<GateType>,
    ) -> Result<Vec<GateOverride>> {
        let cf = self.cf(cf::GATE_OVERRIDES)?;
        let prefix = keys::merchant_prefix(merchant_id);

        let mut overrides = Vec::new();
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&prefix, Direction::Forward));
        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            let entry: GateOverride = Self::deserialize(&value)?;
            if gate_type.map_or(true, |g| entry.gate_type == g) {
                overrides.push(entry);
            }
        }
        Ok(overrides)
    }
}
