//! Per-frame accumulated effects

use std::collections::BTreeSet;
use strata_primitives::Address;
use strata_types::Log;

/// Effects of a frame that survive only if the frame halts normally
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substate {
    /// Emitted logs in execution order
    pub logs: Vec<Log>,
    /// Accounts scheduled for deletion at finalization
    pub selfdestructs: BTreeSet<Address>,
    /// SSTORE refund counter; net metering can drive a frame's share negative
    pub refund: i64,
    /// Accounts touched (state clearing candidates)
    pub touched: BTreeSet<Address>,
}

impl Substate {
    /// Create an empty substate
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a successful child's effects into this one
    pub fn merge(&mut self, child: Substate) {
        self.logs.extend(child.logs);
        self.selfdestructs.extend(child.selfdestructs);
        self.refund += child.refund;
        self.touched.extend(child.touched);
    }

    /// Record a touched account
    pub fn touch(&mut self, address: Address) {
        self.touched.insert(address);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_merge_preserves_log_order() {
        let a = Address::from_low_u64_be(1);
        let mut parent = Substate::new();
        parent.logs.push(Log::new(a, vec![], Bytes::from_static(b"first")));
        parent.refund = 100;

        let mut child = Substate::new();
        child.logs.push(Log::new(a, vec![], Bytes::from_static(b"second")));
        child.selfdestructs.insert(a);
        child.refund = -40;
        child.touch(Address::from_low_u64_be(2));

        parent.merge(child);
        assert_eq!(parent.logs.len(), 2);
        assert_eq!(&parent.logs[1].data[..], b"second");
        assert_eq!(parent.refund, 60);
        assert!(parent.selfdestructs.contains(&a));
        assert_eq!(parent.touched.len(), 1);
    }
}
