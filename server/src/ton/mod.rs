//! TON chain boundary: amounts, comment codec, connect-proof verification
//! and the chain access trait used by the indexer.

pub mod amount;
pub mod client;
pub mod comment;
pub mod proof;

pub use amount::{format_nano_as_ton, parse_ton_to_nano, AmountError, NANO_PER_TON};
pub use client::{AccountState, ChainApi, ChainTx, InboundTransfer, TonHttpClient};
pub use comment::{encode_comment, extract_comment};
pub use proof::{parse_raw_address, proof_hash, verify_proof, Proof, ProofDomain, ProofError};
