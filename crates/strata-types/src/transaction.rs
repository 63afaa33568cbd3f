//! Legacy transaction wire record with EIP-155 signing

use crate::error::{TransactionError, TransactionResult};
use bytes::Bytes;
use rlp::{Rlp, RlpStream};
use strata_crypto::{keccak256, recover_address, sign, PrivateKey, Signature};
use strata_primitives::{Address, H256, U256};

/// Signature components as carried on the wire
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxSignature {
    /// 27/28, or `35 + 2 * chain_id + recovery_id` under EIP-155
    pub v: u64,
    /// R component
    pub r: H256,
    /// S component
    pub s: H256,
}

impl TxSignature {
    /// Create a new signature
    pub fn new(v: u64, r: H256, s: H256) -> Self {
        Self { v, r, s }
    }

    /// Check if signature is valid (non-zero r and s)
    pub fn is_valid(&self) -> bool {
        !self.r.is_zero() && !self.s.is_zero()
    }

    /// Chain id encoded in `v`, if any
    pub fn chain_id(&self) -> Option<u64> {
        if self.v >= 35 {
            Some((self.v - 35) / 2)
        } else {
            None
        }
    }

    /// Raw recovery id (0 or 1)
    pub fn recovery_id(&self) -> TransactionResult<u8> {
        match self.v {
            27 | 28 => Ok((self.v - 27) as u8),
            v if v >= 35 => Ok(((v - 35) % 2) as u8),
            v => Err(TransactionError::InvalidV(v)),
        }
    }

    /// Convert to a recoverable crypto signature
    pub fn to_signature(&self) -> TransactionResult<Signature> {
        Ok(Signature::new(
            *self.r.as_bytes(),
            *self.s.as_bytes(),
            self.recovery_id()?,
        ))
    }
}

/// Transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    /// Sender nonce
    pub nonce: u64,
    /// Gas price in wei
    pub gas_price: U256,
    /// Gas limit
    pub gas_limit: u64,
    /// Recipient address (None for contract creation)
    pub to: Option<Address>,
    /// Value to transfer in wei
    pub value: U256,
    /// Call data or init code
    pub data: Bytes,
    /// Chain id the transaction is bound to (EIP-155)
    pub chain_id: Option<u64>,
    /// Signature, absent for unsigned transactions
    pub signature: Option<TxSignature>,
}

impl Default for Transaction {
    fn default() -> Self {
        Self {
            nonce: 0,
            gas_price: U256::zero(),
            gas_limit: 21000,
            to: None,
            value: U256::zero(),
            data: Bytes::new(),
            chain_id: None,
            signature: None,
        }
    }
}

fn h256_from_u256(value: U256) -> H256 {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    H256::from_bytes(bytes)
}

impl Transaction {
    /// Check if this is a contract creation transaction
    pub fn is_contract_creation(&self) -> bool {
        self.to.is_none()
    }

    fn append_body(&self, stream: &mut RlpStream) {
        stream.append(&self.nonce);
        stream.append(&self.gas_price);
        stream.append(&self.gas_limit);
        if let Some(to) = &self.to {
            stream.append(to);
        } else {
            stream.append_empty_data();
        }
        stream.append(&self.value);
        stream.append(&self.data.to_vec());
    }

    /// Hash that is signed.
    ///
    /// `keccak(rlp([nonce, gasPrice, gasLimit, to, value, data]))`, extended
    /// with `[chainId, 0, 0]` when bound to a chain.
    pub fn signing_hash(&self) -> H256 {
        let mut stream = match self.chain_id {
            Some(_) => RlpStream::new_list(9),
            None => RlpStream::new_list(6),
        };
        self.append_body(&mut stream);
        if let Some(chain_id) = self.chain_id {
            stream.append(&chain_id);
            stream.append(&0u8);
            stream.append(&0u8);
        }
        keccak256(&stream.out())
    }

    /// Sign with `private_key`, producing a low-s signature
    pub fn sign(mut self, private_key: &PrivateKey) -> TransactionResult<Self> {
        let signature = sign(&self.signing_hash(), private_key)?;
        let v = match self.chain_id {
            Some(chain_id) => 35 + 2 * chain_id + signature.recovery_id as u64,
            None => 27 + signature.recovery_id as u64,
        };
        self.signature = Some(TxSignature::new(
            v,
            H256::from_bytes(signature.r),
            H256::from_bytes(signature.s),
        ));
        Ok(self)
    }

    /// Recover the signer address
    pub fn recover_sender(&self) -> TransactionResult<Address> {
        let signature = self
            .signature
            .as_ref()
            .ok_or(TransactionError::MissingSignature)?;
        Ok(recover_address(&self.signing_hash(), &signature.to_signature()?)?)
    }

    /// RLP encoding of the signed transaction
    pub fn rlp_bytes(&self) -> TransactionResult<Vec<u8>> {
        let signature = self
            .signature
            .as_ref()
            .ok_or(TransactionError::MissingSignature)?;
        let mut stream = RlpStream::new_list(9);
        self.append_body(&mut stream);
        stream.append(&signature.v);
        stream.append(&U256::from_big_endian(signature.r.as_bytes()));
        stream.append(&U256::from_big_endian(signature.s.as_bytes()));
        Ok(stream.out().to_vec())
    }

    /// Transaction hash: keccak of the signed encoding
    pub fn hash(&self) -> TransactionResult<H256> {
        Ok(keccak256(&self.rlp_bytes()?))
    }

    /// Decode a signed transaction
    pub fn decode(bytes: &[u8]) -> TransactionResult<Self> {
        let rlp = Rlp::new(bytes);
        if rlp.item_count()? != 9 {
            return Err(rlp::DecoderError::RlpIncorrectListLen.into());
        }
        let to_item = rlp.at(3)?;
        let to = if to_item.is_empty() {
            None
        } else {
            Some(to_item.as_val()?)
        };
        let data: Vec<u8> = rlp.val_at(5)?;
        let signature = TxSignature::new(
            rlp.val_at(6)?,
            h256_from_u256(rlp.val_at(7)?),
            h256_from_u256(rlp.val_at(8)?),
        );
        Ok(Self {
            nonce: rlp.val_at(0)?,
            gas_price: rlp.val_at(1)?,
            gas_limit: rlp.val_at(2)?,
            to,
            value: rlp.val_at(4)?,
            data: Bytes::from(data),
            chain_id: signature.chain_id(),
            signature: Some(signature),
        })
    }
}
