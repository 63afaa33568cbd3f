//! Gas schedule and dynamic cost components

use crate::opcode::Tier;
use crate::word::Word;

/// Fork-independent limits
pub mod cost {
    /// Maximum call depth
    pub const MAX_CALL_DEPTH: usize = 1024;
    /// Maximum stack size
    pub const MAX_STACK_SIZE: usize = 1024;
    /// Code size limit introduced by Spurious Dragon
    pub const MAX_CODE_SIZE: usize = 24576;
}

/// Every gas price the interpreter and executor charge.
///
/// Values that differ between protocol versions are plain fields; an
/// [`Upgrade`](crate::policy::Upgrade) overwrites them when it activates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasSchedule {
    /// Tier costs: zero, base, verylow, low, mid, high, ext
    pub tiers: [u64; 7],
    /// JUMPDEST
    pub jumpdest: u64,

    /// BALANCE
    pub balance: u64,
    /// SLOAD, also the dirty-slot SSTORE price under net metering
    pub sload: u64,
    /// EXTCODESIZE and EXTCODECOPY base
    pub extcode: u64,
    /// EXTCODEHASH
    pub extcodehash: u64,
    /// CALL family base
    pub call: u64,
    /// SELFDESTRUCT base
    pub selfdestruct: u64,
    /// SELFDESTRUCT to a new account
    pub selfdestruct_new_account: u64,
    /// EXP base
    pub exp: u64,
    /// EXP per exponent byte
    pub exp_byte: u64,

    /// SSTORE zero to non-zero
    pub sstore_set: u64,
    /// SSTORE other writes
    pub sstore_reset: u64,
    /// Refund for clearing a slot
    pub sstore_refund: u64,
    /// Minimum gas left for SSTORE under net metering
    pub sstore_sentry: u64,
    /// Refund per self-destructed account
    pub selfdestruct_refund: u64,

    /// KECCAK256 base
    pub sha3: u64,
    /// KECCAK256 per word
    pub sha3_word: u64,
    /// LOG base
    pub log: u64,
    /// LOG per topic
    pub log_topic: u64,
    /// LOG per data byte
    pub log_data: u64,
    /// Per word copied
    pub copy: u64,

    /// CREATE and CREATE2 base
    pub create: u64,
    /// Per byte of deployed code
    pub code_deposit: u64,
    /// CALL with value
    pub call_value: u64,
    /// Gas added to a value-carrying call
    pub call_stipend: u64,
    /// CALL to a new account
    pub new_account: u64,

    /// Memory per word
    pub memory: u64,
    /// Memory quadratic divisor
    pub memory_quad_divisor: u64,

    /// Transaction base
    pub tx: u64,
    /// Contract creation surcharge
    pub tx_create: u64,
    /// Per zero byte of call data
    pub tx_data_zero: u64,
    /// Per non-zero byte of call data
    pub tx_data_nonzero: u64,
}

impl Default for GasSchedule {
    fn default() -> Self {
        Self::frontier()
    }
}

fn words(len: u64) -> u64 {
    len.div_ceil(32)
}

impl GasSchedule {
    /// Prices at genesis
    pub fn frontier() -> Self {
        Self {
            tiers: [0, 2, 3, 5, 8, 10, 20],
            jumpdest: 1,
            balance: 20,
            sload: 50,
            extcode: 20,
            extcodehash: 400,
            call: 40,
            selfdestruct: 0,
            selfdestruct_new_account: 0,
            exp: 10,
            exp_byte: 10,
            sstore_set: 20000,
            sstore_reset: 5000,
            sstore_refund: 15000,
            sstore_sentry: 2300,
            selfdestruct_refund: 24000,
            sha3: 30,
            sha3_word: 6,
            log: 375,
            log_topic: 375,
            log_data: 8,
            copy: 3,
            create: 32000,
            code_deposit: 200,
            call_value: 9000,
            call_stipend: 2300,
            new_account: 25000,
            memory: 3,
            memory_quad_divisor: 512,
            tx: 21000,
            tx_create: 32000,
            tx_data_zero: 4,
            tx_data_nonzero: 68,
        }
    }

    /// Static cost of a tier; `Special` is priced by the caller
    pub fn tier_cost(&self, tier: Tier) -> u64 {
        match tier {
            Tier::Zero | Tier::Special => self.tiers[0],
            Tier::Base => self.tiers[1],
            Tier::VeryLow => self.tiers[2],
            Tier::Low => self.tiers[3],
            Tier::Mid => self.tiers[4],
            Tier::High => self.tiers[5],
            Tier::Ext => self.tiers[6],
            Tier::JumpDest => self.jumpdest,
        }
    }

    /// Total cost of `words` words of memory
    pub fn memory_cost(&self, words: u64) -> u64 {
        self.memory
            .saturating_mul(words)
            .saturating_add(words.saturating_mul(words) / self.memory_quad_divisor)
    }

    /// Cost of growing memory from `current_words` to `new_words`
    pub fn memory_expansion(&self, current_words: u64, new_words: u64) -> u64 {
        if new_words <= current_words {
            return 0;
        }
        self.memory_cost(new_words)
            .saturating_sub(self.memory_cost(current_words))
    }

    /// Per-word copy cost of `len` bytes
    pub fn copy_cost(&self, len: u64) -> u64 {
        self.copy.saturating_mul(words(len))
    }

    /// Per-byte part of EXP for `exponent`
    pub fn exp_byte_cost(&self, exponent: Word) -> u64 {
        self.exp_byte * exponent.bytes_occupied() as u64
    }

    /// Per-word hashing cost of `len` bytes (KECCAK256, CREATE2)
    pub fn hash_word_cost(&self, len: u64) -> u64 {
        self.sha3_word.saturating_mul(words(len))
    }

    /// Per-byte part of LOG
    pub fn log_data_cost(&self, len: u64) -> u64 {
        self.log_data.saturating_mul(len)
    }

    /// Code deposit cost of `len` bytes
    pub fn deposit_cost(&self, len: usize) -> u64 {
        self.code_deposit.saturating_mul(len as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_costs() {
        let gas = GasSchedule::frontier();
        assert_eq!(gas.tier_cost(Tier::Zero), 0);
        assert_eq!(gas.tier_cost(Tier::VeryLow), 3);
        assert_eq!(gas.tier_cost(Tier::Low), 5);
        assert_eq!(gas.tier_cost(Tier::Mid), 8);
        assert_eq!(gas.tier_cost(Tier::High), 10);
        assert_eq!(gas.tier_cost(Tier::Ext), 20);
        assert_eq!(gas.tier_cost(Tier::JumpDest), 1);
    }

    #[test]
    fn test_memory_cost() {
        let gas = GasSchedule::frontier();
        assert_eq!(gas.memory_cost(0), 0);
        assert_eq!(gas.memory_cost(1), 3);
        assert_eq!(gas.memory_cost(32), 98);
        assert_eq!(gas.memory_cost(1024), 3 * 1024 + 2048);
    }

    #[test]
    fn test_memory_expansion_charges_delta() {
        let gas = GasSchedule::frontier();
        assert_eq!(gas.memory_expansion(1, 1), 0);
        assert_eq!(gas.memory_expansion(2, 1), 0);
        assert_eq!(gas.memory_expansion(0, 2), 6);
        assert_eq!(gas.memory_expansion(1, 2), 3);
        assert_eq!(
            gas.memory_expansion(0, 1) + gas.memory_expansion(1, 100),
            gas.memory_cost(100)
        );
    }

    #[test]
    fn test_copy_cost() {
        let gas = GasSchedule::frontier();
        assert_eq!(gas.copy_cost(0), 0);
        assert_eq!(gas.copy_cost(32), 3);
        assert_eq!(gas.copy_cost(33), 6);
    }

    #[test]
    fn test_exp_byte_cost() {
        let mut gas = GasSchedule::frontier();
        assert_eq!(gas.exp_byte_cost(Word::ZERO), 0);
        assert_eq!(gas.exp_byte_cost(Word::from(0x0100u64)), 20);
        gas.exp_byte = 50;
        assert_eq!(gas.exp_byte_cost(Word::MAX), 32 * 50);
    }

    #[test]
    fn test_hash_and_log_data_cost() {
        let gas = GasSchedule::frontier();
        assert_eq!(gas.hash_word_cost(0), 0);
        assert_eq!(gas.hash_word_cost(64), 12);
        assert_eq!(gas.hash_word_cost(65), 18);
        assert_eq!(gas.log_data_cost(10), 80);
        assert_eq!(gas.deposit_cost(3), 600);
    }
}
