//! Contract storage view with tracing

use strata_primitives::{Address, H256};
use strata_state::{Repository, StateResult};

use crate::tracer::Tracer;

/// Storage of one contract over a backing repository.
///
/// Reads and writes go straight to the repository; writes are reported to
/// the tracer when one is attached.
pub struct ContractStorage<'r, 't> {
    repo: &'r mut dyn Repository,
    address: Address,
    tracer: Option<&'r mut (dyn Tracer + 't)>,
}

impl<'r, 't> ContractStorage<'r, 't> {
    /// Wrap `repo` for `address`
    pub fn new(
        repo: &'r mut dyn Repository,
        address: Address,
        tracer: Option<&'r mut (dyn Tracer + 't)>,
    ) -> Self {
        Self {
            repo,
            address,
            tracer,
        }
    }

    /// Traced contract
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Current slot value
    pub fn get(&self, key: &H256) -> StateResult<H256> {
        self.repo.get_storage_value(&self.address, key)
    }

    /// Slot value at the start of the transaction
    pub fn original(&self, key: &H256) -> StateResult<H256> {
        self.repo.committed_storage(&self.address, key)
    }

    /// Write a slot; zero clears it
    pub fn put(&mut self, key: H256, value: H256) -> StateResult<()> {
        if let Some(tracer) = self.tracer.as_deref_mut() {
            if value.is_zero() {
                tracer.on_storage_clear(&self.address, &key);
            } else {
                tracer.on_storage_put(&self.address, &key, &value);
            }
        }
        self.repo.add_storage_row(&self.address, key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracer::{StructLogger, TraceEvent};
    use strata_state::{StateDb, Tracked};

    #[test]
    fn test_put_reports_to_tracer() {
        let mut db = StateDb::new();
        let mut logger = StructLogger::new();
        let address = Address::from_low_u64_be(0xc0);
        let key = H256::from_low_u64_be(1);
        {
            let mut storage = ContractStorage::new(&mut db, address, Some(&mut logger));
            storage.put(key, H256::from_low_u64_be(7)).unwrap();
            assert_eq!(storage.get(&key).unwrap(), H256::from_low_u64_be(7));
            storage.put(key, H256::ZERO).unwrap();
        }
        assert_eq!(
            logger.events(),
            &[
                TraceEvent::StoragePut {
                    address,
                    key,
                    value: H256::from_low_u64_be(7)
                },
                TraceEvent::StorageClear { address, key },
            ]
        );
        assert_eq!(db.get_storage_value(&address, &key).unwrap(), H256::ZERO);
    }

    #[test]
    fn test_original_value_is_transaction_start() {
        let address = Address::from_low_u64_be(0xc0);
        let key = H256::from_low_u64_be(1);
        let mut db = StateDb::new();
        db.add_storage_row(&address, key, H256::from_low_u64_be(5)).unwrap();

        let mut tx = Tracked::transaction(&mut db);
        let mut storage = ContractStorage::new(&mut tx, address, None);
        storage.put(key, H256::from_low_u64_be(6)).unwrap();
        assert_eq!(storage.get(&key).unwrap(), H256::from_low_u64_be(6));
        assert_eq!(storage.original(&key).unwrap(), H256::from_low_u64_be(5));
    }
}
