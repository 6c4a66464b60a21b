use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rand::Rng;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{StockKey, StockRecord};

/// Bounded retry with backoff for contended record access.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 25,
        }
    }
}

impl RetryPolicy {
    async fn pause(&self, attempt: u32) {
        let jitter = rand::thread_rng().gen_range(0..=self.backoff_ms.max(1) / 2);
        tokio::time::sleep(Duration::from_millis(
            self.backoff_ms * u64::from(attempt) + jitter,
        ))
        .await;
    }
}

/// Outcome of a maintenance prune pass.
#[derive(Debug, Clone, Default)]
pub struct PruneReport {
    pub removed: Vec<StockKey>,
    /// Records that stayed locked through every attempt and were skipped.
    pub busy: usize,
}

/// The single shared mutable resource of the system: per-(variant, warehouse)
/// stock records.
///
/// Every read-then-write runs under the record's own `tokio::sync::Mutex`,
/// the in-process equivalent of a row-level `SELECT ... FOR UPDATE`. The map
/// itself only hands out `Arc` handles; after acquiring a lock, mutators
/// re-check that their handle is still the live map entry (a prune may have
/// removed it in between) and retry against the fresh entry otherwise.
pub struct StockStore {
    records: DashMap<StockKey, Arc<Mutex<StockRecord>>>,
    retry: RetryPolicy,
}

impl StockStore {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            records: DashMap::new(),
            retry,
        }
    }

    fn handle(&self, key: StockKey, create: bool) -> Option<Arc<Mutex<StockRecord>>> {
        if create {
            Some(
                self.records
                    .entry(key)
                    .or_insert_with(|| Arc::new(Mutex::new(StockRecord::default())))
                    .value()
                    .clone(),
            )
        } else {
            self.records.get(&key).map(|r| r.value().clone())
        }
    }

    fn is_current(&self, key: StockKey, handle: &Arc<Mutex<StockRecord>>) -> bool {
        self.records
            .get(&key)
            .map(|r| Arc::ptr_eq(r.value(), handle))
            .unwrap_or(false)
    }

    /// Runs `f` on the record under its lock. Retries (bounded, with
    /// backoff) when the locked record turns out to be stale; business
    /// errors from `f` surface immediately and are never retried.
    async fn with_record<T>(
        &self,
        key: StockKey,
        create: bool,
        mut f: impl FnMut(&mut StockRecord) -> Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        for attempt in 1..=self.retry.max_attempts {
            let Some(handle) = self.handle(key, create) else {
                return Err(ServiceError::NotFound(format!("no stock record for {}", key)));
            };
            let mut guard = handle.lock().await;
            if !self.is_current(key, &handle) {
                drop(guard);
                debug!(%key, attempt, "stock record went stale under lock, retrying");
                self.retry.pause(attempt).await;
                continue;
            }
            return f(&mut guard);
        }
        Err(ServiceError::ConcurrencyConflict(format!(
            "stock record for {} kept changing under contention",
            key
        )))
    }

    /// Stock-in: adds to the available pool, creating the record lazily on
    /// first movement into the warehouse.
    #[instrument(skip(self))]
    pub async fn receive(&self, key: StockKey, quantity: Decimal) -> Result<StockRecord, ServiceError> {
        self.with_record(key, true, |record| {
            record.quantity_available += quantity;
            Ok(record.clone())
        })
        .await
    }

    /// Moves `quantity` from available to reserved, failing without any
    /// mutation when the available pool cannot cover it. The availability
    /// check and the reservation are one critical section: there is no
    /// check-then-act window for a concurrent caller to slip through.
    #[instrument(skip(self))]
    pub async fn reserve(&self, key: StockKey, quantity: Decimal) -> Result<StockRecord, ServiceError> {
        let result = self
            .with_record(key, false, |record| {
                if record.quantity_available < quantity {
                    return Err(ServiceError::InsufficientStock {
                        requested: quantity,
                        available: record.quantity_available,
                    });
                }
                record.quantity_available -= quantity;
                record.quantity_reserved += quantity;
                Ok(record.clone())
            })
            .await;
        match result {
            // No record at all means nothing available to reserve.
            Err(ServiceError::NotFound(_)) => Err(ServiceError::InsufficientStock {
                requested: quantity,
                available: Decimal::ZERO,
            }),
            other => other,
        }
    }

    /// Returns a reservation to the available pool (transfer cancelled, sale
    /// abandoned).
    #[instrument(skip(self))]
    pub async fn release(&self, key: StockKey, quantity: Decimal) -> Result<StockRecord, ServiceError> {
        self.with_record(key, false, |record| {
            if record.quantity_reserved < quantity {
                return Err(ServiceError::InternalError(format!(
                    "release of {} exceeds reserved {} for {}",
                    quantity, record.quantity_reserved, key
                )));
            }
            record.quantity_reserved -= quantity;
            record.quantity_available += quantity;
            Ok(record.clone())
        })
        .await
    }

    /// Consumes a reservation at the source and lands the quantity at the
    /// destination: source.reserved -= q, destination.available += q.
    ///
    /// Locks the two records in ascending warehouse-id order so concurrent
    /// opposite-direction transfers cannot deadlock.
    #[instrument(skip(self))]
    pub async fn transfer_reserved(
        &self,
        variant_id: Uuid,
        source_warehouse_id: Uuid,
        destination_warehouse_id: Uuid,
        quantity: Decimal,
    ) -> Result<(StockRecord, StockRecord), ServiceError> {
        if source_warehouse_id == destination_warehouse_id {
            return Err(ServiceError::validation(
                "source and destination warehouses must differ",
            ));
        }
        let source_key = StockKey::new(variant_id, source_warehouse_id);
        let dest_key = StockKey::new(variant_id, destination_warehouse_id);

        for attempt in 1..=self.retry.max_attempts {
            let Some(source_handle) = self.handle(source_key, false) else {
                return Err(ServiceError::InternalError(format!(
                    "reservation without a stock record for {}",
                    source_key
                )));
            };
            let dest_handle = self
                .handle(dest_key, true)
                .expect("created on demand");

            // Fixed lock order across both records.
            let (mut source_guard, mut dest_guard) =
                if source_warehouse_id <= destination_warehouse_id {
                    let s = source_handle.lock().await;
                    let d = dest_handle.lock().await;
                    (s, d)
                } else {
                    let d = dest_handle.lock().await;
                    let s = source_handle.lock().await;
                    (s, d)
                };

            if !self.is_current(source_key, &source_handle)
                || !self.is_current(dest_key, &dest_handle)
            {
                drop(source_guard);
                drop(dest_guard);
                debug!(%source_key, %dest_key, attempt, "record pair went stale, retrying");
                self.retry.pause(attempt).await;
                continue;
            }

            if source_guard.quantity_reserved < quantity {
                return Err(ServiceError::InternalError(format!(
                    "reserved {} at {} cannot cover transfer of {}",
                    source_guard.quantity_reserved, source_key, quantity
                )));
            }

            source_guard.quantity_reserved -= quantity;
            dest_guard.quantity_available += quantity;
            return Ok((source_guard.clone(), dest_guard.clone()));
        }

        Err(ServiceError::ConcurrencyConflict(format!(
            "stock records for variant {} kept changing under contention",
            variant_id
        )))
    }

    /// Audited manual correction of the available pool. Returns the previous
    /// and the new record. Never touches the reserved pool.
    #[instrument(skip(self))]
    pub async fn set_available(
        &self,
        key: StockKey,
        new_available: Decimal,
    ) -> Result<(Decimal, StockRecord), ServiceError> {
        self.with_record(key, true, |record| {
            let old = record.quantity_available;
            record.quantity_available = new_available;
            Ok((old, record.clone()))
        })
        .await
    }

    /// All records of a variant, sorted by warehouse id. Each record is
    /// locked only long enough to clone it; reporting does not need a
    /// cross-record transaction.
    pub async fn records_for_variant(&self, variant_id: Uuid) -> Vec<(Uuid, StockRecord)> {
        let mut handles: Vec<(Uuid, Arc<Mutex<StockRecord>>)> = self
            .records
            .iter()
            .filter(|entry| entry.key().variant_id == variant_id)
            .map(|entry| (entry.key().warehouse_id, entry.value().clone()))
            .collect();
        handles.sort_by_key(|(warehouse_id, _)| *warehouse_id);

        let mut out = Vec::with_capacity(handles.len());
        for (warehouse_id, handle) in handles {
            let record = handle.lock().await.clone();
            out.push((warehouse_id, record));
        }
        out
    }

    /// All records held at a warehouse, keyed by variant.
    pub async fn records_for_warehouse(&self, warehouse_id: Uuid) -> Vec<(Uuid, StockRecord)> {
        let handles: Vec<(Uuid, Arc<Mutex<StockRecord>>)> = self
            .records
            .iter()
            .filter(|entry| entry.key().warehouse_id == warehouse_id)
            .map(|entry| (entry.key().variant_id, entry.value().clone()))
            .collect();

        let mut out = Vec::with_capacity(handles.len());
        for (variant_id, handle) in handles {
            let record = handle.lock().await.clone();
            out.push((variant_id, record));
        }
        out
    }

    /// True when the warehouse still holds any stock, available or reserved.
    pub async fn warehouse_holds_stock(&self, warehouse_id: Uuid) -> bool {
        self.records_for_warehouse(warehouse_id)
            .await
            .iter()
            .any(|(_, record)| !record.is_empty())
    }

    /// Maintenance pass: removes records where both pools are zero. Busy
    /// records are retried with backoff and skipped if still contended, to
    /// be picked up by the next pass.
    #[instrument(skip(self))]
    pub async fn prune_empty(&self) -> PruneReport {
        let keys: Vec<StockKey> = self.records.iter().map(|entry| *entry.key()).collect();
        let mut report = PruneReport::default();

        'keys: for key in keys {
            for attempt in 1..=self.retry.max_attempts {
                let Some(handle) = self.handle(key, false) else {
                    continue 'keys;
                };
                match handle.try_lock() {
                    Ok(guard) => {
                        if guard.is_empty() {
                            // Removal happens while the record lock is held,
                            // and only if the map still points at this exact
                            // record.
                            self.records.remove_if(&key, |_, value| Arc::ptr_eq(value, &handle));
                            report.removed.push(key);
                        }
                        continue 'keys;
                    }
                    Err(_) if attempt < self.retry.max_attempts => {
                        self.retry.pause(attempt).await;
                    }
                    Err(_) => {
                        warn!(%key, "record stayed locked through prune attempts, skipping");
                        report.busy += 1;
                    }
                };
            }
        }
        report
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn store() -> StockStore {
        StockStore::new(RetryPolicy::default())
    }

    fn key() -> StockKey {
        StockKey::new(Uuid::new_v4(), Uuid::new_v4())
    }

    #[tokio::test]
    async fn reserve_is_atomic_with_the_availability_check() {
        let store = store();
        let k = key();
        store.receive(k, dec!(10)).await.unwrap();

        let record = store.reserve(k, dec!(4)).await.unwrap();
        assert_eq!(record.quantity_available, dec!(6));
        assert_eq!(record.quantity_reserved, dec!(4));

        let err = store.reserve(k, dec!(7)).await.unwrap_err();
        assert_matches!(
            err,
            ServiceError::InsufficientStock { available, .. } if available == dec!(6)
        );
        // Failed reservation left nothing half-applied.
        let records = store.records_for_variant(k.variant_id).await;
        assert_eq!(records[0].1, StockRecord::new(dec!(6), dec!(4)));
    }

    #[tokio::test]
    async fn reserve_on_missing_record_reports_zero_available() {
        let err = store().reserve(key(), dec!(1)).await.unwrap_err();
        assert_matches!(
            err,
            ServiceError::InsufficientStock { available, .. } if available == Decimal::ZERO
        );
    }

    #[tokio::test]
    async fn concurrent_reserves_never_oversubscribe() {
        let store = Arc::new(store());
        let k = key();
        store.receive(k, dec!(10)).await.unwrap();

        let mut tasks = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            tasks.push(tokio::spawn(
                async move { store.reserve(k, dec!(1)).await.is_ok() },
            ));
        }
        let mut admitted = 0;
        for task in tasks {
            if task.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 10, "exactly the available quantity is admitted");

        let record = &store.records_for_variant(k.variant_id).await[0].1;
        assert_eq!(record.quantity_available, Decimal::ZERO);
        assert_eq!(record.quantity_reserved, dec!(10));
    }

    #[tokio::test]
    async fn transfer_reserved_moves_between_pools() {
        let store = store();
        let variant = Uuid::new_v4();
        let (wh1, wh2) = (Uuid::new_v4(), Uuid::new_v4());
        store.receive(StockKey::new(variant, wh1), dec!(20)).await.unwrap();
        store.reserve(StockKey::new(variant, wh1), dec!(5)).await.unwrap();

        let (source, dest) = store.transfer_reserved(variant, wh1, wh2, dec!(5)).await.unwrap();
        assert_eq!(source, StockRecord::new(dec!(15), Decimal::ZERO));
        assert_eq!(dest, StockRecord::new(dec!(5), Decimal::ZERO));
    }

    #[tokio::test]
    async fn release_guards_the_reserved_floor() {
        let store = store();
        let k = key();
        store.receive(k, dec!(2)).await.unwrap();
        store.reserve(k, dec!(2)).await.unwrap();
        assert_matches!(
            store.release(k, dec!(3)).await.unwrap_err(),
            ServiceError::InternalError(_)
        );
        store.release(k, dec!(2)).await.unwrap();
        let record = &store.records_for_variant(k.variant_id).await[0].1;
        assert_eq!(record.quantity_available, dec!(2));
        assert_eq!(record.quantity_reserved, Decimal::ZERO);
    }

    #[tokio::test]
    async fn prune_removes_only_empty_records() {
        let store = store();
        let keep = key();
        let drop_me = key();
        store.receive(keep, dec!(1)).await.unwrap();
        store.receive(drop_me, dec!(3)).await.unwrap();
        store.reserve(drop_me, dec!(3)).await.unwrap();
        store.release(drop_me, dec!(3)).await.unwrap();
        store.set_available(drop_me, Decimal::ZERO).await.unwrap();

        let report = store.prune_empty().await;
        assert_eq!(report.removed, vec![drop_me]);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn prune_skips_locked_records() {
        let store = StockStore::new(RetryPolicy {
            max_attempts: 2,
            backoff_ms: 1,
        });
        let k = key();
        store.receive(k, Decimal::ZERO).await.unwrap();

        let handle = store.handle(k, false).unwrap();
        let guard = handle.lock().await;
        let report = store.prune_empty().await;
        drop(guard);

        assert_eq!(report.busy, 1);
        assert_eq!(store.len(), 1);
    }
}
