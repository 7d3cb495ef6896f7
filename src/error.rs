use thiserror::Error;

use crate::indexer::types::ChainKey;

/// Failures reported by a network client adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The RPC transport or node returned an error.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// The request did not complete within the configured timeout.
    #[error("RPC request timed out")]
    Timeout,

    /// The node has no block with this number.
    #[error("Block {0} not found")]
    BlockNotFound(u64),
}

/// A log that could not be turned into a transaction event.
///
/// Decode failures only ever affect a single record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("log does not match BoughtStableCoins: {0}")]
    Abi(String),

    #[error("log is missing {0}")]
    MissingField(&'static str),
}

/// Errors that abort a whole ledger call.
///
/// The caller's pagination state is never touched when one of these is
/// returned, so retrying with the same state is always safe.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("head lookup failed on chain '{chain}': {source}")]
    HeadLookup {
        chain: ChainKey,
        #[source]
        source: ClientError,
    },

    #[error("page limit must be greater than 0")]
    InvalidLimit,
}
