//! Canonical binary encoding of account records and candidate lists.
//!
//! These encodings are what the tries commit to, so they must be
//! deterministic: `decode(encode(x)) == x` for every record, and equal
//! candidate sets encode to identical bytes (the list is sorted by the
//! canonical order before encoding). All integers are big-endian.

use num_bigint::{BigInt, BigUint, Sign};

use dpos_mpt::Hash256;

use crate::account::Account;
use crate::candidate::{sort_candidates, Candidate};
use crate::error::{StateError, StateResult};

const SIGN_ZERO: u8 = 0;
const SIGN_PLUS: u8 = 1;
const SIGN_MINUS: u8 = 2;

/// Encodes an account record.
pub fn encode_account(account: &Account) -> StateResult<Vec<u8>> {
    let mut out = Vec::with_capacity(96);
    out.extend_from_slice(&account.nonce.to_be_bytes());
    write_var(&mut out, &account.balance.to_bytes_be())?;
    write_bigint(&mut out, &account.voting_weight)?;
    write_var(&mut out, account.votee.as_bytes())?;
    out.push(u8::from(account.is_candidate));
    out.extend_from_slice(&account.root);
    out.extend_from_slice(&account.code_hash);
    Ok(out)
}

/// Decodes an account record; the exact inverse of [`encode_account`].
pub fn decode_account(bytes: &[u8]) -> StateResult<Account> {
    let mut reader = Reader::new(bytes);
    let nonce = reader.read_u64()?;
    let balance = BigUint::from_bytes_be(reader.read_var()?);
    let voting_weight = reader.read_bigint()?;
    let votee = String::from_utf8(reader.read_var()?.to_vec())
        .map_err(|_| StateError::Decoding("votee is not valid utf-8".to_string()))?;
    let is_candidate = reader.read_bool()?;
    let root = reader.read_hash()?;
    let code_hash = reader.read_hash()?;
    reader.finish()?;
    Ok(Account {
        balance,
        nonce,
        voting_weight,
        votee,
        is_candidate,
        root,
        code_hash,
    })
}

/// Encodes a candidate list, sorting by the canonical order first so that
/// equal sets encode identically.
pub fn encode_candidates(candidates: &[Candidate]) -> StateResult<Vec<u8>> {
    let mut sorted = candidates.to_vec();
    sort_candidates(&mut sorted);

    let count = u32::try_from(sorted.len())
        .map_err(|_| StateError::Encoding("candidate list too long".to_string()))?;
    let mut out = Vec::new();
    out.extend_from_slice(&count.to_be_bytes());
    for candidate in &sorted {
        write_var(&mut out, candidate.address.as_bytes())?;
        write_var(&mut out, &candidate.public_key)?;
        write_bigint(&mut out, &candidate.votes)?;
        out.extend_from_slice(&candidate.creation_height.to_be_bytes());
        out.extend_from_slice(&candidate.last_update_height.to_be_bytes());
    }
    Ok(out)
}

/// Decodes a candidate list; the exact inverse of [`encode_candidates`].
pub fn decode_candidates(bytes: &[u8]) -> StateResult<Vec<Candidate>> {
    let mut reader = Reader::new(bytes);
    let count = reader.read_u32()? as usize;
    let mut candidates = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        let address = String::from_utf8(reader.read_var()?.to_vec())
            .map_err(|_| StateError::Decoding("candidate address is not valid utf-8".to_string()))?;
        let public_key = reader.read_var()?.to_vec();
        let votes = reader.read_bigint()?;
        let creation_height = reader.read_u64()?;
        let last_update_height = reader.read_u64()?;
        candidates.push(Candidate {
            address,
            public_key,
            votes,
            creation_height,
            last_update_height,
        });
    }
    reader.finish()?;
    Ok(candidates)
}

fn write_var(out: &mut Vec<u8>, bytes: &[u8]) -> StateResult<()> {
    let len = u32::try_from(bytes.len())
        .map_err(|_| StateError::Encoding("field exceeds length limit".to_string()))?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

fn write_bigint(out: &mut Vec<u8>, value: &BigInt) -> StateResult<()> {
    let (sign, magnitude) = value.to_bytes_be();
    out.push(match sign {
        Sign::NoSign => SIGN_ZERO,
        Sign::Plus => SIGN_PLUS,
        Sign::Minus => SIGN_MINUS,
    });
    write_var(out, &magnitude)
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn read_bytes(&mut self, len: usize) -> StateResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| StateError::Decoding("truncated record".to_string()))?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn read_var(&mut self) -> StateResult<&'a [u8]> {
        let len = self.read_u32()? as usize;
        self.read_bytes(len)
    }

    fn read_u32(&mut self) -> StateResult<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_u64(&mut self) -> StateResult<u64> {
        let bytes = self.read_bytes(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(u64::from_be_bytes(buf))
    }

    fn read_bool(&mut self) -> StateResult<bool> {
        match self.read_bytes(1)?[0] {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(StateError::Decoding(format!("invalid boolean byte {other}"))),
        }
    }

    fn read_hash(&mut self) -> StateResult<Hash256> {
        let bytes = self.read_bytes(32)?;
        let mut hash = Hash256::default();
        hash.copy_from_slice(bytes);
        Ok(hash)
    }

    fn read_bigint(&mut self) -> StateResult<BigInt> {
        let sign = match self.read_bytes(1)?[0] {
            SIGN_ZERO => Sign::NoSign,
            SIGN_PLUS => Sign::Plus,
            SIGN_MINUS => Sign::Minus,
            other => return Err(StateError::Decoding(format!("invalid sign byte {other}"))),
        };
        let magnitude = self.read_var()?;
        Ok(BigInt::from_bytes_be(sign, magnitude))
    }

    fn finish(&self) -> StateResult<()> {
        if self.pos != self.buf.len() {
            return Err(StateError::Decoding("trailing bytes after record".to_string()));
        }
        Ok(())
    }
}
