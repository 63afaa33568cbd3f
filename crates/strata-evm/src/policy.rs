//! Protocol-version policy: gas prices, feature flags and activation schedule

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use strata_primitives::H256;

use crate::error::{EvmError, EvmResult};
use crate::gas::{cost, GasSchedule};
use crate::opcode::{Opcode, Tier};
use crate::word::Word;

/// Feature switches of a protocol version
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForkRules {
    /// Creation transactions pay the create surcharge
    pub create_tx_surcharge: bool,
    /// DELEGATECALL is available
    pub delegate_call: bool,
    /// Failing to pay the code deposit fails the create
    pub create_deposit_oog_fails: bool,
    /// Signatures with `s` above half the curve order are invalid
    pub reject_high_s: bool,
    /// Reserved fraction divisor for call and create gas
    pub call_gas_divisor: Option<u64>,
    /// Chain id is part of the signing hash
    pub replay_protection: bool,
    /// Touched empty accounts are deleted
    pub state_clearing: bool,
    /// EXP per-byte price raised
    pub exp_byte_increase: bool,
    /// Deployed code size limit
    pub max_code_size: Option<usize>,
    /// REVERT is available
    pub revert: bool,
    /// RETURNDATASIZE and RETURNDATACOPY are available
    pub return_data: bool,
    /// STATICCALL is available
    pub static_call: bool,
    /// SHL, SHR and SAR are available
    pub bitwise_shifting: bool,
    /// CREATE2 is available
    pub create2: bool,
    /// EXTCODEHASH is available
    pub extcodehash: bool,
    /// CHAINID is available
    pub chain_id_opcode: bool,
    /// SELFBALANCE is available
    pub self_balance: bool,
    /// SSTORE uses net gas metering
    pub sstore_net_metering: bool,
}

/// One protocol-version delta.
///
/// Variants are declared in activation order; [`Ord`] follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Upgrade {
    /// Homestead
    Homestead,
    /// Tangerine Whistle (EIP-150)
    TangerineWhistle,
    /// Spurious Dragon (EIP-155, EIP-158, EIP-160, EIP-170)
    SpuriousDragon,
    /// Byzantium
    Byzantium,
    /// Constantinople with Petersburg semantics
    #[serde(alias = "petersburg")]
    Constantinople,
    /// Istanbul
    Istanbul,
}

impl Upgrade {
    /// Every upgrade in activation order
    pub const ALL: [Upgrade; 6] = [
        Upgrade::Homestead,
        Upgrade::TangerineWhistle,
        Upgrade::SpuriousDragon,
        Upgrade::Byzantium,
        Upgrade::Constantinople,
        Upgrade::Istanbul,
    ];

    /// Apply this delta to a policy
    pub fn apply(self, policy: &mut ResourcePolicy) {
        let gas = &mut policy.gas;
        let rules = &mut policy.rules;
        match self {
            Upgrade::Homestead => {
                rules.create_tx_surcharge = true;
                rules.delegate_call = true;
                rules.create_deposit_oog_fails = true;
                rules.reject_high_s = true;
            }
            Upgrade::TangerineWhistle => {
                gas.balance = 400;
                gas.sload = 200;
                gas.extcode = 700;
                gas.call = 700;
                gas.selfdestruct = 5000;
                gas.selfdestruct_new_account = 25000;
                rules.call_gas_divisor = Some(64);
            }
            Upgrade::SpuriousDragon => {
                gas.exp_byte = 50;
                rules.replay_protection = true;
                rules.state_clearing = true;
                rules.exp_byte_increase = true;
                rules.max_code_size = Some(cost::MAX_CODE_SIZE);
            }
            Upgrade::Byzantium => {
                rules.revert = true;
                rules.return_data = true;
                rules.static_call = true;
            }
            Upgrade::Constantinople => {
                gas.extcodehash = 400;
                rules.bitwise_shifting = true;
                rules.create2 = true;
                rules.extcodehash = true;
            }
            Upgrade::Istanbul => {
                gas.sload = 800;
                gas.balance = 700;
                gas.extcodehash = 700;
                gas.tx_data_nonzero = 16;
                rules.chain_id_opcode = true;
                rules.self_balance = true;
                rules.sstore_net_metering = true;
            }
        }
    }
}

impl fmt::Display for Upgrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Gas and refund of one SSTORE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SstoreCost {
    /// Gas charged
    pub gas: u64,
    /// Change to the refund counter
    pub refund: i64,
}

/// Effective policy of one protocol version
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourcePolicy {
    /// Prices
    pub gas: GasSchedule,
    /// Feature switches
    pub rules: ForkRules,
}

impl ResourcePolicy {
    /// The genesis protocol version
    pub fn frontier() -> Self {
        Self::default()
    }

    /// Policy with every upgrade up to and including `upgrade`
    pub fn at(upgrade: Upgrade) -> Self {
        Upgrade::ALL
            .iter()
            .filter(|u| **u <= upgrade)
            .fold(Self::frontier(), |policy, u| policy.upgraded(*u))
    }

    /// Apply one more delta
    pub fn upgraded(mut self, upgrade: Upgrade) -> Self {
        upgrade.apply(&mut self);
        self
    }

    /// Check if an opcode exists under these rules
    pub fn is_enabled(&self, opcode: Opcode) -> bool {
        let rules = &self.rules;
        match opcode {
            Opcode::DELEGATECALL => rules.delegate_call,
            Opcode::REVERT => rules.revert,
            Opcode::RETURNDATASIZE | Opcode::RETURNDATACOPY => rules.return_data,
            Opcode::STATICCALL => rules.static_call,
            Opcode::SHL | Opcode::SHR | Opcode::SAR => rules.bitwise_shifting,
            Opcode::CREATE2 => rules.create2,
            Opcode::EXTCODEHASH => rules.extcodehash,
            Opcode::CHAINID => rules.chain_id_opcode,
            Opcode::SELFBALANCE => rules.self_balance,
            Opcode::INVALID => false,
            _ => true,
        }
    }

    /// Cost charged before an opcode executes.
    ///
    /// Dynamic components (memory, copies, exponent bytes, log data, SSTORE,
    /// call and create extras) are charged by the opcode itself.
    pub fn static_cost(&self, opcode: Opcode) -> u64 {
        let gas = &self.gas;
        match opcode {
            Opcode::BALANCE => gas.balance,
            Opcode::SLOAD => gas.sload,
            Opcode::EXTCODESIZE | Opcode::EXTCODECOPY => gas.extcode,
            Opcode::EXTCODEHASH => gas.extcodehash,
            Opcode::CALL | Opcode::CALLCODE | Opcode::DELEGATECALL | Opcode::STATICCALL => gas.call,
            Opcode::SELFDESTRUCT => gas.selfdestruct,
            Opcode::CREATE | Opcode::CREATE2 => gas.create,
            Opcode::KECCAK256 => gas.sha3,
            Opcode::EXP => gas.exp,
            Opcode::LOG0 | Opcode::LOG1 | Opcode::LOG2 | Opcode::LOG3 | Opcode::LOG4 => {
                gas.log + gas.log_topic * opcode.log_topics() as u64
            }
            Opcode::SSTORE => 0,
            _ => match opcode.info().tier {
                Tier::Special => 0,
                tier => gas.tier_cost(tier),
            },
        }
    }

    /// Gas granted to a child call.
    ///
    /// Without a divisor the request must fit in `available`; with one the
    /// child gets at most all but `available / divisor`.
    pub fn call_gas(&self, requested: Word, available: u64) -> EvmResult<u64> {
        match self.rules.call_gas_divisor {
            None => match requested.as_u64() {
                Some(gas) if gas <= available => Ok(gas),
                _ => Err(EvmError::OutOfGas),
            },
            Some(divisor) => {
                let cap = available - available / divisor;
                Ok(requested.as_u64().map_or(cap, |gas| gas.min(cap)))
            }
        }
    }

    /// Gas granted to a child create
    pub fn create_gas(&self, available: u64) -> u64 {
        match self.rules.call_gas_divisor {
            None => available,
            Some(divisor) => available - available / divisor,
        }
    }

    /// Gas charged before a transaction's first instruction
    pub fn intrinsic_gas(&self, data: &[u8], is_create: bool) -> u64 {
        let gas = &self.gas;
        let zeros = data.iter().filter(|b| **b == 0).count() as u64;
        let nonzeros = data.len() as u64 - zeros;
        let mut total = gas.tx + zeros * gas.tx_data_zero + nonzeros * gas.tx_data_nonzero;
        if is_create && self.rules.create_tx_surcharge {
            total += gas.tx_create;
        }
        total
    }

    /// SSTORE gas and refund.
    ///
    /// `original` is the slot value at the start of the transaction and
    /// `current` the value before this write.
    pub fn sstore_cost(
        &self,
        gas_left: u64,
        original: &H256,
        current: &H256,
        new: &H256,
    ) -> EvmResult<SstoreCost> {
        let gas = &self.gas;
        let clear_refund = gas.sstore_refund as i64;

        if !self.rules.sstore_net_metering {
            return Ok(if current.is_zero() && !new.is_zero() {
                SstoreCost {
                    gas: gas.sstore_set,
                    refund: 0,
                }
            } else if !current.is_zero() && new.is_zero() {
                SstoreCost {
                    gas: gas.sstore_reset,
                    refund: clear_refund,
                }
            } else {
                SstoreCost {
                    gas: gas.sstore_reset,
                    refund: 0,
                }
            });
        }

        if gas_left <= gas.sstore_sentry {
            return Err(EvmError::OutOfGas);
        }
        if current == new {
            return Ok(SstoreCost {
                gas: gas.sload,
                refund: 0,
            });
        }
        if original == current {
            return Ok(if original.is_zero() {
                SstoreCost {
                    gas: gas.sstore_set,
                    refund: 0,
                }
            } else {
                SstoreCost {
                    gas: gas.sstore_reset,
                    refund: if new.is_zero() { clear_refund } else { 0 },
                }
            });
        }

        let mut refund = 0i64;
        if !original.is_zero() {
            if current.is_zero() {
                refund -= clear_refund;
            } else if new.is_zero() {
                refund += clear_refund;
            }
        }
        if original == new {
            refund += if original.is_zero() {
                (gas.sstore_set - gas.sload) as i64
            } else {
                (gas.sstore_reset - gas.sload) as i64
            };
        }
        Ok(SstoreCost {
            gas: gas.sload,
            refund,
        })
    }
}

/// Ordered list of `(activation block, upgrade)` records.
///
/// Serialized as a map from upgrade name to activation block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<Upgrade, u64>", into = "BTreeMap<Upgrade, u64>")]
pub struct ProtocolSchedule {
    activations: Vec<(u64, Upgrade)>,
}

impl ProtocolSchedule {
    /// Build from activation records in any order
    pub fn new(activations: impl IntoIterator<Item = (u64, Upgrade)>) -> Self {
        let mut activations: Vec<_> = activations.into_iter().collect();
        activations.sort();
        activations.dedup_by_key(|(_, upgrade)| *upgrade);
        Self { activations }
    }

    /// Frontier forever
    pub fn frontier() -> Self {
        Self::default()
    }

    /// Every upgrade up to `upgrade` active from genesis
    pub fn fixed(upgrade: Upgrade) -> Self {
        Self::new(
            Upgrade::ALL
                .iter()
                .filter(|u| **u <= upgrade)
                .map(|u| (0, *u)),
        )
    }

    /// Public main network activation blocks
    pub fn mainnet() -> Self {
        Self::new([
            (1_150_000, Upgrade::Homestead),
            (2_463_000, Upgrade::TangerineWhistle),
            (2_675_000, Upgrade::SpuriousDragon),
            (4_370_000, Upgrade::Byzantium),
            (7_280_000, Upgrade::Constantinople),
            (9_069_000, Upgrade::Istanbul),
        ])
    }

    /// Activation records sorted by block
    pub fn activations(&self) -> &[(u64, Upgrade)] {
        &self.activations
    }

    /// Check that upgrades activate in declaration order
    pub fn is_ordered(&self) -> bool {
        self.activations
            .windows(2)
            .all(|pair| pair[0].1 < pair[1].1)
    }

    /// Latest upgrade active at `number`
    pub fn upgrade_at(&self, number: u64) -> Option<Upgrade> {
        self.activations
            .iter()
            .filter(|(block, _)| *block <= number)
            .map(|(_, upgrade)| *upgrade)
            .max()
    }

    /// Fold every delta active at `number` over the Frontier base
    pub fn policy_for(&self, number: u64) -> ResourcePolicy {
        self.activations
            .iter()
            .filter(|(block, _)| *block <= number)
            .fold(ResourcePolicy::frontier(), |policy, (_, upgrade)| {
                policy.upgraded(*upgrade)
            })
    }
}

impl From<BTreeMap<Upgrade, u64>> for ProtocolSchedule {
    fn from(map: BTreeMap<Upgrade, u64>) -> Self {
        Self::new(map.into_iter().map(|(upgrade, block)| (block, upgrade)))
    }
}

impl From<ProtocolSchedule> for BTreeMap<Upgrade, u64> {
    fn from(schedule: ProtocolSchedule) -> Self {
        schedule
            .activations
            .into_iter()
            .map(|(block, upgrade)| (upgrade, block))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(value: u64) -> H256 {
        H256::from_low_u64_be(value)
    }

    #[test]
    fn test_frontier_prices() {
        let policy = ResourcePolicy::frontier();
        assert_eq!(policy.static_cost(Opcode::SLOAD), 50);
        assert_eq!(policy.static_cost(Opcode::BALANCE), 20);
        assert_eq!(policy.static_cost(Opcode::CALL), 40);
        assert_eq!(policy.static_cost(Opcode::SELFDESTRUCT), 0);
        assert_eq!(policy.static_cost(Opcode::ADD), 3);
        assert_eq!(policy.static_cost(Opcode::LOG2), 375 + 750);
        assert!(!policy.is_enabled(Opcode::DELEGATECALL));
        assert!(!policy.is_enabled(Opcode::REVERT));
    }

    #[test]
    fn test_tangerine_whistle_reprices_io() {
        let policy = ResourcePolicy::at(Upgrade::TangerineWhistle);
        assert_eq!(policy.static_cost(Opcode::SLOAD), 200);
        assert_eq!(policy.static_cost(Opcode::EXTCODESIZE), 700);
        assert_eq!(policy.static_cost(Opcode::CALL), 700);
        assert_eq!(policy.static_cost(Opcode::SELFDESTRUCT), 5000);
        assert_eq!(policy.rules.call_gas_divisor, Some(64));
        assert!(policy.rules.delegate_call);
    }

    #[test]
    fn test_istanbul_policy() {
        let policy = ResourcePolicy::at(Upgrade::Istanbul);
        assert_eq!(policy.static_cost(Opcode::SLOAD), 800);
        assert_eq!(policy.static_cost(Opcode::BALANCE), 700);
        assert_eq!(policy.static_cost(Opcode::EXTCODEHASH), 700);
        assert_eq!(policy.static_cost(Opcode::SELFBALANCE), 5);
        assert_eq!(policy.gas.exp_byte, 50);
        assert_eq!(policy.rules.max_code_size, Some(24576));
        for opcode in [Opcode::CHAINID, Opcode::SHL, Opcode::CREATE2, Opcode::STATICCALL] {
            assert!(policy.is_enabled(opcode));
        }
        assert!(!policy.is_enabled(Opcode::INVALID));
    }

    #[test]
    fn test_call_gas_without_divisor() {
        let policy = ResourcePolicy::frontier();
        assert_eq!(policy.call_gas(Word::from(100u64), 1000).unwrap(), 100);
        assert_eq!(policy.call_gas(Word::from(1000u64), 1000).unwrap(), 1000);
        assert!(matches!(
            policy.call_gas(Word::from(1001u64), 1000),
            Err(EvmError::OutOfGas)
        ));
        assert!(policy.call_gas(Word::MAX, 1000).is_err());
        assert_eq!(policy.create_gas(1000), 1000);
    }

    #[test]
    fn test_call_gas_reserves_sixty_fourth() {
        let policy = ResourcePolicy::at(Upgrade::TangerineWhistle);
        assert_eq!(policy.call_gas(Word::from(100u64), 6400).unwrap(), 100);
        assert_eq!(policy.call_gas(Word::from(10_000u64), 6400).unwrap(), 6300);
        assert_eq!(policy.call_gas(Word::MAX, 6400).unwrap(), 6300);
        assert_eq!(policy.create_gas(6400), 6300);
        assert_eq!(policy.create_gas(63), 63);
    }

    #[test]
    fn test_intrinsic_gas_by_fork() {
        let data = [0u8, 1, 2, 0];
        assert_eq!(ResourcePolicy::frontier().intrinsic_gas(&[], false), 21000);
        assert_eq!(ResourcePolicy::frontier().intrinsic_gas(&data, false), 21000 + 8 + 136);
        assert_eq!(ResourcePolicy::frontier().intrinsic_gas(&[], true), 21000);
        let homestead = ResourcePolicy::at(Upgrade::Homestead);
        assert_eq!(homestead.intrinsic_gas(&[], true), 53000);
        let istanbul = ResourcePolicy::at(Upgrade::Istanbul);
        assert_eq!(istanbul.intrinsic_gas(&data, false), 21000 + 8 + 32);
    }

    #[test]
    fn test_legacy_sstore_pricing() {
        let policy = ResourcePolicy::at(Upgrade::Constantinople);
        let set = policy.sstore_cost(100_000, &h(0), &h(0), &h(1)).unwrap();
        assert_eq!(set, SstoreCost { gas: 20000, refund: 0 });
        let clear = policy.sstore_cost(100_000, &h(1), &h(1), &h(0)).unwrap();
        assert_eq!(clear, SstoreCost { gas: 5000, refund: 15000 });
        let reset = policy.sstore_cost(100_000, &h(1), &h(1), &h(2)).unwrap();
        assert_eq!(reset, SstoreCost { gas: 5000, refund: 0 });
        let noop = policy.sstore_cost(100_000, &h(1), &h(1), &h(1)).unwrap();
        assert_eq!(noop, SstoreCost { gas: 5000, refund: 0 });
    }

    #[test]
    fn test_net_metering() {
        let policy = ResourcePolicy::at(Upgrade::Istanbul);
        let cost = |o, c, n| policy.sstore_cost(100_000, &h(o), &h(c), &h(n)).unwrap();

        assert_eq!(cost(0, 0, 0), SstoreCost { gas: 800, refund: 0 });
        assert_eq!(cost(0, 0, 1), SstoreCost { gas: 20000, refund: 0 });
        assert_eq!(cost(1, 1, 0), SstoreCost { gas: 5000, refund: 15000 });
        assert_eq!(cost(1, 1, 2), SstoreCost { gas: 5000, refund: 0 });
        // dirty slot restored to its original zero
        assert_eq!(cost(0, 1, 0), SstoreCost { gas: 800, refund: 19200 });
        // dirty slot cleared then set again
        assert_eq!(cost(1, 0, 2), SstoreCost { gas: 800, refund: -15000 });
        assert_eq!(cost(1, 0, 1), SstoreCost { gas: 800, refund: -15000 + 4200 });
        assert_eq!(cost(1, 2, 0), SstoreCost { gas: 800, refund: 15000 });
    }

    #[test]
    fn test_net_metering_sentry() {
        let policy = ResourcePolicy::at(Upgrade::Istanbul);
        assert!(matches!(
            policy.sstore_cost(2300, &h(0), &h(0), &h(1)),
            Err(EvmError::OutOfGas)
        ));
        assert!(policy.sstore_cost(2301, &h(0), &h(0), &h(0)).is_ok());
    }

    #[test]
    fn test_schedule_folds_deltas() {
        let schedule = ProtocolSchedule::new([
            (10, Upgrade::TangerineWhistle),
            (5, Upgrade::Homestead),
            (20, Upgrade::Istanbul),
        ]);
        assert!(schedule.is_ordered());
        assert_eq!(schedule.policy_for(0), ResourcePolicy::frontier());
        assert_eq!(schedule.policy_for(5), ResourcePolicy::at(Upgrade::Homestead));
        assert_eq!(schedule.policy_for(12).gas.call, 700);
        assert_eq!(schedule.upgrade_at(12), Some(Upgrade::TangerineWhistle));
        let istanbul = schedule.policy_for(20);
        assert!(istanbul.rules.sstore_net_metering);
        // Spurious Dragon was never scheduled
        assert!(!istanbul.rules.state_clearing);
    }

    #[test]
    fn test_fixed_schedule() {
        let schedule = ProtocolSchedule::fixed(Upgrade::Byzantium);
        assert_eq!(schedule.activations().len(), 4);
        assert_eq!(schedule.policy_for(0), ResourcePolicy::at(Upgrade::Byzantium));
        assert_eq!(ProtocolSchedule::frontier().upgrade_at(1_000_000), None);
    }

    #[test]
    fn test_mainnet_schedule() {
        let schedule = ProtocolSchedule::mainnet();
        assert!(schedule.is_ordered());
        assert_eq!(schedule.upgrade_at(1_149_999), None);
        assert_eq!(schedule.upgrade_at(4_370_000), Some(Upgrade::Byzantium));
    }

    #[test]
    fn test_out_of_order_schedule_detected() {
        let schedule = ProtocolSchedule::new([(10, Upgrade::Homestead), (5, Upgrade::Istanbul)]);
        assert!(!schedule.is_ordered());
    }
}
