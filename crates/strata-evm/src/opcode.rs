//! Opcode definitions and the dense opcode table

/// Opcodes up to the Istanbul instruction set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Opcode {
    // Stop and arithmetic
    STOP = 0x00,
    ADD = 0x01,
    MUL = 0x02,
    SUB = 0x03,
    DIV = 0x04,
    SDIV = 0x05,
    MOD = 0x06,
    SMOD = 0x07,
    ADDMOD = 0x08,
    MULMOD = 0x09,
    EXP = 0x0A,
    SIGNEXTEND = 0x0B,

    // Comparison and bitwise logic
    LT = 0x10,
    GT = 0x11,
    SLT = 0x12,
    SGT = 0x13,
    EQ = 0x14,
    ISZERO = 0x15,
    AND = 0x16,
    OR = 0x17,
    XOR = 0x18,
    NOT = 0x19,
    BYTE = 0x1A,
    SHL = 0x1B,
    SHR = 0x1C,
    SAR = 0x1D,

    // Hashing
    KECCAK256 = 0x20,

    // Environment
    ADDRESS = 0x30,
    BALANCE = 0x31,
    ORIGIN = 0x32,
    CALLER = 0x33,
    CALLVALUE = 0x34,
    CALLDATALOAD = 0x35,
    CALLDATASIZE = 0x36,
    CALLDATACOPY = 0x37,
    CODESIZE = 0x38,
    CODECOPY = 0x39,
    GASPRICE = 0x3A,
    EXTCODESIZE = 0x3B,
    EXTCODECOPY = 0x3C,
    RETURNDATASIZE = 0x3D,
    RETURNDATACOPY = 0x3E,
    EXTCODEHASH = 0x3F,

    // Block information
    BLOCKHASH = 0x40,
    COINBASE = 0x41,
    TIMESTAMP = 0x42,
    NUMBER = 0x43,
    DIFFICULTY = 0x44,
    GASLIMIT = 0x45,
    CHAINID = 0x46,
    SELFBALANCE = 0x47,

    // Stack, memory, storage and flow
    POP = 0x50,
    MLOAD = 0x51,
    MSTORE = 0x52,
    MSTORE8 = 0x53,
    SLOAD = 0x54,
    SSTORE = 0x55,
    JUMP = 0x56,
    JUMPI = 0x57,
    PC = 0x58,
    MSIZE = 0x59,
    GAS = 0x5A,
    JUMPDEST = 0x5B,

    // Push
    PUSH1 = 0x60,
    PUSH2 = 0x61,
    PUSH3 = 0x62,
    PUSH4 = 0x63,
    PUSH5 = 0x64,
    PUSH6 = 0x65,
    PUSH7 = 0x66,
    PUSH8 = 0x67,
    PUSH9 = 0x68,
    PUSH10 = 0x69,
    PUSH11 = 0x6A,
    PUSH12 = 0x6B,
    PUSH13 = 0x6C,
    PUSH14 = 0x6D,
    PUSH15 = 0x6E,
    PUSH16 = 0x6F,
    PUSH17 = 0x70,
    PUSH18 = 0x71,
    PUSH19 = 0x72,
    PUSH20 = 0x73,
    PUSH21 = 0x74,
    PUSH22 = 0x75,
    PUSH23 = 0x76,
    PUSH24 = 0x77,
    PUSH25 = 0x78,
    PUSH26 = 0x79,
    PUSH27 = 0x7A,
    PUSH28 = 0x7B,
    PUSH29 = 0x7C,
    PUSH30 = 0x7D,
    PUSH31 = 0x7E,
    PUSH32 = 0x7F,

    // Duplication
    DUP1 = 0x80,
    DUP2 = 0x81,
    DUP3 = 0x82,
    DUP4 = 0x83,
    DUP5 = 0x84,
    DUP6 = 0x85,
    DUP7 = 0x86,
    DUP8 = 0x87,
    DUP9 = 0x88,
    DUP10 = 0x89,
    DUP11 = 0x8A,
    DUP12 = 0x8B,
    DUP13 = 0x8C,
    DUP14 = 0x8D,
    DUP15 = 0x8E,
    DUP16 = 0x8F,

    // Exchange
    SWAP1 = 0x90,
    SWAP2 = 0x91,
    SWAP3 = 0x92,
    SWAP4 = 0x93,
    SWAP5 = 0x94,
    SWAP6 = 0x95,
    SWAP7 = 0x96,
    SWAP8 = 0x97,
    SWAP9 = 0x98,
    SWAP10 = 0x99,
    SWAP11 = 0x9A,
    SWAP12 = 0x9B,
    SWAP13 = 0x9C,
    SWAP14 = 0x9D,
    SWAP15 = 0x9E,
    SWAP16 = 0x9F,

    // Logging
    LOG0 = 0xA0,
    LOG1 = 0xA1,
    LOG2 = 0xA2,
    LOG3 = 0xA3,
    LOG4 = 0xA4,

    // System
    CREATE = 0xF0,
    CALL = 0xF1,
    CALLCODE = 0xF2,
    RETURN = 0xF3,
    DELEGATECALL = 0xF4,
    CREATE2 = 0xF5,
    STATICCALL = 0xFA,
    REVERT = 0xFD,
    INVALID = 0xFE,
    SELFDESTRUCT = 0xFF,
}

/// Static gas tier of an opcode.
///
/// `Special` opcodes take their base cost from the fork-dependent fields of
/// the gas schedule instead of a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// 0 gas
    Zero,
    /// 2 gas
    Base,
    /// 3 gas
    VeryLow,
    /// 5 gas
    Low,
    /// 8 gas
    Mid,
    /// 10 gas
    High,
    /// 20 gas
    Ext,
    /// 1 gas
    JumpDest,
    /// Priced by the gas schedule
    Special,
}

/// Descriptor of a defined opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpInfo {
    /// The opcode
    pub opcode: Opcode,
    /// Stack items consumed
    pub inputs: usize,
    /// Stack items produced
    pub outputs: usize,
    /// Static cost tier
    pub tier: Tier,
}

const fn op(opcode: Opcode, inputs: usize, outputs: usize, tier: Tier) -> Option<OpInfo> {
    Some(OpInfo {
        opcode,
        inputs,
        outputs,
        tier,
    })
}

const fn build_table() -> [Option<OpInfo>; 256] {
    let mut t: [Option<OpInfo>; 256] = [None; 256];
    t[0x00] = op(Opcode::STOP, 0, 0, Tier::Zero);
    t[0x01] = op(Opcode::ADD, 2, 1, Tier::VeryLow);
    t[0x02] = op(Opcode::MUL, 2, 1, Tier::Low);
    t[0x03] = op(Opcode::SUB, 2, 1, Tier::VeryLow);
    t[0x04] = op(Opcode::DIV, 2, 1, Tier::Low);
    t[0x05] = op(Opcode::SDIV, 2, 1, Tier::Low);
    t[0x06] = op(Opcode::MOD, 2, 1, Tier::Low);
    t[0x07] = op(Opcode::SMOD, 2, 1, Tier::Low);
    t[0x08] = op(Opcode::ADDMOD, 3, 1, Tier::Mid);
    t[0x09] = op(Opcode::MULMOD, 3, 1, Tier::Mid);
    t[0x0A] = op(Opcode::EXP, 2, 1, Tier::Special);
    t[0x0B] = op(Opcode::SIGNEXTEND, 2, 1, Tier::Low);
    t[0x10] = op(Opcode::LT, 2, 1, Tier::VeryLow);
    t[0x11] = op(Opcode::GT, 2, 1, Tier::VeryLow);
    t[0x12] = op(Opcode::SLT, 2, 1, Tier::VeryLow);
    t[0x13] = op(Opcode::SGT, 2, 1, Tier::VeryLow);
    t[0x14] = op(Opcode::EQ, 2, 1, Tier::VeryLow);
    t[0x15] = op(Opcode::ISZERO, 1, 1, Tier::VeryLow);
    t[0x16] = op(Opcode::AND, 2, 1, Tier::VeryLow);
    t[0x17] = op(Opcode::OR, 2, 1, Tier::VeryLow);
    t[0x18] = op(Opcode::XOR, 2, 1, Tier::VeryLow);
    t[0x19] = op(Opcode::NOT, 1, 1, Tier::VeryLow);
    t[0x1A] = op(Opcode::BYTE, 2, 1, Tier::VeryLow);
    t[0x1B] = op(Opcode::SHL, 2, 1, Tier::VeryLow);
    t[0x1C] = op(Opcode::SHR, 2, 1, Tier::VeryLow);
    t[0x1D] = op(Opcode::SAR, 2, 1, Tier::VeryLow);
    t[0x20] = op(Opcode::KECCAK256, 2, 1, Tier::Special);
    t[0x30] = op(Opcode::ADDRESS, 0, 1, Tier::Base);
    t[0x31] = op(Opcode::BALANCE, 1, 1, Tier::Special);
    t[0x32] = op(Opcode::ORIGIN, 0, 1, Tier::Base);
    t[0x33] = op(Opcode::CALLER, 0, 1, Tier::Base);
    t[0x34] = op(Opcode::CALLVALUE, 0, 1, Tier::Base);
    t[0x35] = op(Opcode::CALLDATALOAD, 1, 1, Tier::VeryLow);
    t[0x36] = op(Opcode::CALLDATASIZE, 0, 1, Tier::Base);
    t[0x37] = op(Opcode::CALLDATACOPY, 3, 0, Tier::VeryLow);
    t[0x38] = op(Opcode::CODESIZE, 0, 1, Tier::Base);
    t[0x39] = op(Opcode::CODECOPY, 3, 0, Tier::VeryLow);
    t[0x3A] = op(Opcode::GASPRICE, 0, 1, Tier::Base);
    t[0x3B] = op(Opcode::EXTCODESIZE, 1, 1, Tier::Special);
    t[0x3C] = op(Opcode::EXTCODECOPY, 4, 0, Tier::Special);
    t[0x3D] = op(Opcode::RETURNDATASIZE, 0, 1, Tier::Base);
    t[0x3E] = op(Opcode::RETURNDATACOPY, 3, 0, Tier::VeryLow);
    t[0x3F] = op(Opcode::EXTCODEHASH, 1, 1, Tier::Special);
    t[0x40] = op(Opcode::BLOCKHASH, 1, 1, Tier::Ext);
    t[0x41] = op(Opcode::COINBASE, 0, 1, Tier::Base);
    t[0x42] = op(Opcode::TIMESTAMP, 0, 1, Tier::Base);
    t[0x43] = op(Opcode::NUMBER, 0, 1, Tier::Base);
    t[0x44] = op(Opcode::DIFFICULTY, 0, 1, Tier::Base);
    t[0x45] = op(Opcode::GASLIMIT, 0, 1, Tier::Base);
    t[0x46] = op(Opcode::CHAINID, 0, 1, Tier::Base);
    t[0x47] = op(Opcode::SELFBALANCE, 0, 1, Tier::Low);
    t[0x50] = op(Opcode::POP, 1, 0, Tier::Base);
    t[0x51] = op(Opcode::MLOAD, 1, 1, Tier::VeryLow);
    t[0x52] = op(Opcode::MSTORE, 2, 0, Tier::VeryLow);
    t[0x53] = op(Opcode::MSTORE8, 2, 0, Tier::VeryLow);
    t[0x54] = op(Opcode::SLOAD, 1, 1, Tier::Special);
    t[0x55] = op(Opcode::SSTORE, 2, 0, Tier::Special);
    t[0x56] = op(Opcode::JUMP, 1, 0, Tier::Mid);
    t[0x57] = op(Opcode::JUMPI, 2, 0, Tier::High);
    t[0x58] = op(Opcode::PC, 0, 1, Tier::Base);
    t[0x59] = op(Opcode::MSIZE, 0, 1, Tier::Base);
    t[0x5A] = op(Opcode::GAS, 0, 1, Tier::Base);
    t[0x5B] = op(Opcode::JUMPDEST, 0, 0, Tier::JumpDest);
    t[0x60] = op(Opcode::PUSH1, 0, 1, Tier::VeryLow);
    t[0x61] = op(Opcode::PUSH2, 0, 1, Tier::VeryLow);
    t[0x62] = op(Opcode::PUSH3, 0, 1, Tier::VeryLow);
    t[0x63] = op(Opcode::PUSH4, 0, 1, Tier::VeryLow);
    t[0x64] = op(Opcode::PUSH5, 0, 1, Tier::VeryLow);
    t[0x65] = op(Opcode::PUSH6, 0, 1, Tier::VeryLow);
    t[0x66] = op(Opcode::PUSH7, 0, 1, Tier::VeryLow);
    t[0x67] = op(Opcode::PUSH8, 0, 1, Tier::VeryLow);
    t[0x68] = op(Opcode::PUSH9, 0, 1, Tier::VeryLow);
    t[0x69] = op(Opcode::PUSH10, 0, 1, Tier::VeryLow);
    t[0x6A] = op(Opcode::PUSH11, 0, 1, Tier::VeryLow);
    t[0x6B] = op(Opcode::PUSH12, 0, 1, Tier::VeryLow);
    t[0x6C] = op(Opcode::PUSH13, 0, 1, Tier::VeryLow);
    t[0x6D] = op(Opcode::PUSH14, 0, 1, Tier::VeryLow);
    t[0x6E] = op(Opcode::PUSH15, 0, 1, Tier::VeryLow);
    t[0x6F] = op(Opcode::PUSH16, 0, 1, Tier::VeryLow);
    t[0x70] = op(Opcode::PUSH17, 0, 1, Tier::VeryLow);
    t[0x71] = op(Opcode::PUSH18, 0, 1, Tier::VeryLow);
    t[0x72] = op(Opcode::PUSH19, 0, 1, Tier::VeryLow);
    t[0x73] = op(Opcode::PUSH20, 0, 1, Tier::VeryLow);
    t[0x74] = op(Opcode::PUSH21, 0, 1, Tier::VeryLow);
    t[0x75] = op(Opcode::PUSH22, 0, 1, Tier::VeryLow);
    t[0x76] = op(Opcode::PUSH23, 0, 1, Tier::VeryLow);
    t[0x77] = op(Opcode::PUSH24, 0, 1, Tier::VeryLow);
    t[0x78] = op(Opcode::PUSH25, 0, 1, Tier::VeryLow);
    t[0x79] = op(Opcode::PUSH26, 0, 1, Tier::VeryLow);
    t[0x7A] = op(Opcode::PUSH27, 0, 1, Tier::VeryLow);
    t[0x7B] = op(Opcode::PUSH28, 0, 1, Tier::VeryLow);
    t[0x7C] = op(Opcode::PUSH29, 0, 1, Tier::VeryLow);
    t[0x7D] = op(Opcode::PUSH30, 0, 1, Tier::VeryLow);
    t[0x7E] = op(Opcode::PUSH31, 0, 1, Tier::VeryLow);
    t[0x7F] = op(Opcode::PUSH32, 0, 1, Tier::VeryLow);
    t[0x80] = op(Opcode::DUP1, 1, 2, Tier::VeryLow);
    t[0x81] = op(Opcode::DUP2, 2, 3, Tier::VeryLow);
    t[0x82] = op(Opcode::DUP3, 3, 4, Tier::VeryLow);
    t[0x83] = op(Opcode::DUP4, 4, 5, Tier::VeryLow);
    t[0x84] = op(Opcode::DUP5, 5, 6, Tier::VeryLow);
    t[0x85] = op(Opcode::DUP6, 6, 7, Tier::VeryLow);
    t[0x86] = op(Opcode::DUP7, 7, 8, Tier::VeryLow);
    t[0x87] = op(Opcode::DUP8, 8, 9, Tier::VeryLow);
    t[0x88] = op(Opcode::DUP9, 9, 10, Tier::VeryLow);
    t[0x89] = op(Opcode::DUP10, 10, 11, Tier::VeryLow);
    t[0x8A] = op(Opcode::DUP11, 11, 12, Tier::VeryLow);
    t[0x8B] = op(Opcode::DUP12, 12, 13, Tier::VeryLow);
    t[0x8C] = op(Opcode::DUP13, 13, 14, Tier::VeryLow);
    t[0x8D] = op(Opcode::DUP14, 14, 15, Tier::VeryLow);
    t[0x8E] = op(Opcode::DUP15, 15, 16, Tier::VeryLow);
    t[0x8F] = op(Opcode::DUP16, 16, 17, Tier::VeryLow);
    t[0x90] = op(Opcode::SWAP1, 2, 2, Tier::VeryLow);
    t[0x91] = op(Opcode::SWAP2, 3, 3, Tier::VeryLow);
    t[0x92] = op(Opcode::SWAP3, 4, 4, Tier::VeryLow);
    t[0x93] = op(Opcode::SWAP4, 5, 5, Tier::VeryLow);
    t[0x94] = op(Opcode::SWAP5, 6, 6, Tier::VeryLow);
    t[0x95] = op(Opcode::SWAP6, 7, 7, Tier::VeryLow);
    t[0x96] = op(Opcode::SWAP7, 8, 8, Tier::VeryLow);
    t[0x97] = op(Opcode::SWAP8, 9, 9, Tier::VeryLow);
    t[0x98] = op(Opcode::SWAP9, 10, 10, Tier::VeryLow);
    t[0x99] = op(Opcode::SWAP10, 11, 11, Tier::VeryLow);
    t[0x9A] = op(Opcode::SWAP11, 12, 12, Tier::VeryLow);
    t[0x9B] = op(Opcode::SWAP12, 13, 13, Tier::VeryLow);
    t[0x9C] = op(Opcode::SWAP13, 14, 14, Tier::VeryLow);
    t[0x9D] = op(Opcode::SWAP14, 15, 15, Tier::VeryLow);
    t[0x9E] = op(Opcode::SWAP15, 16, 16, Tier::VeryLow);
    t[0x9F] = op(Opcode::SWAP16, 17, 17, Tier::VeryLow);
    t[0xA0] = op(Opcode::LOG0, 2, 0, Tier::Special);
    t[0xA1] = op(Opcode::LOG1, 3, 0, Tier::Special);
    t[0xA2] = op(Opcode::LOG2, 4, 0, Tier::Special);
    t[0xA3] = op(Opcode::LOG3, 5, 0, Tier::Special);
    t[0xA4] = op(Opcode::LOG4, 6, 0, Tier::Special);
    t[0xF0] = op(Opcode::CREATE, 3, 1, Tier::Special);
    t[0xF1] = op(Opcode::CALL, 7, 1, Tier::Special);
    t[0xF2] = op(Opcode::CALLCODE, 7, 1, Tier::Special);
    t[0xF3] = op(Opcode::RETURN, 2, 0, Tier::Zero);
    t[0xF4] = op(Opcode::DELEGATECALL, 6, 1, Tier::Special);
    t[0xF5] = op(Opcode::CREATE2, 4, 1, Tier::Special);
    t[0xFA] = op(Opcode::STATICCALL, 6, 1, Tier::Special);
    t[0xFD] = op(Opcode::REVERT, 2, 0, Tier::Zero);
    t[0xFE] = op(Opcode::INVALID, 0, 0, Tier::Zero);
    t[0xFF] = op(Opcode::SELFDESTRUCT, 1, 0, Tier::Special);
    t
}

/// Opcode descriptors indexed by byte; `None` marks an undefined byte.
pub static OPCODE_TABLE: [Option<OpInfo>; 256] = build_table();

impl Opcode {
    /// Decode a byte, `None` if undefined
    pub fn from_byte(byte: u8) -> Option<Self> {
        OPCODE_TABLE[byte as usize].map(|info| info.opcode)
    }

    /// Table descriptor of this opcode
    pub fn info(self) -> OpInfo {
        match OPCODE_TABLE[self as usize] {
            Some(info) => info,
            None => OpInfo {
                opcode: self,
                inputs: 0,
                outputs: 0,
                tier: Tier::Zero,
            },
        }
    }

    /// Mnemonic
    pub fn name(self) -> String {
        format!("{:?}", self)
    }

    /// Immediate bytes following a PUSH (0 otherwise)
    pub fn push_size(self) -> usize {
        let byte = self as u8;
        if (0x60..=0x7F).contains(&byte) {
            (byte - 0x5F) as usize
        } else {
            0
        }
    }

    /// Check if this is a PUSH opcode
    pub fn is_push(self) -> bool {
        self.push_size() > 0
    }

    /// DUP depth (1-16, 0 otherwise)
    pub fn dup_depth(self) -> usize {
        let byte = self as u8;
        if (0x80..=0x8F).contains(&byte) {
            (byte - 0x7F) as usize
        } else {
            0
        }
    }

    /// SWAP depth (1-16, 0 otherwise)
    pub fn swap_depth(self) -> usize {
        let byte = self as u8;
        if (0x90..=0x9F).contains(&byte) {
            (byte - 0x8F) as usize
        } else {
            0
        }
    }

    /// Topic count of a LOG opcode (0 otherwise)
    pub fn log_topics(self) -> usize {
        let byte = self as u8;
        if (0xA0..=0xA4).contains(&byte) {
            (byte - 0xA0) as usize
        } else {
            0
        }
    }

    /// Check if this opcode ends the frame unconditionally
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Opcode::STOP | Opcode::RETURN | Opcode::REVERT | Opcode::INVALID | Opcode::SELFDESTRUCT
        )
    }
}
