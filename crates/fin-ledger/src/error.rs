use fin_schemas::Money;
use fin_store::StoreError;

/// All failure modes a ledger operation can surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    WalletNotFound {
        wallet_id: String,
    },
    TransactionNotFound {
        id: String,
    },
    TransferNotFound {
        id: String,
    },
    /// Amounts must be strictly positive.
    NonPositiveAmount {
        amount: Money,
    },
    /// A transfer's source and destination must differ.
    SameWallet {
        wallet_id: String,
    },
    /// The deduction would drive the wallet negative. Raised before any
    /// write; nothing to roll back.
    InsufficientBalance {
        wallet_id: String,
        balance: Money,
        requested: Money,
    },
    Store(StoreError),
    /// A compensating inverse failed after a forward step had already
    /// failed. Unrecoverable by the operation itself.
    RollbackFailure {
        operation: &'static str,
        cause: String,
        rollback_cause: String,
    },
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::WalletNotFound { wallet_id } => {
                write!(f, "wallet '{wallet_id}' does not exist")
            }
            LedgerError::TransactionNotFound { id } => {
                write!(f, "transaction '{id}' does not exist")
            }
            LedgerError::TransferNotFound { id } => write!(f, "transfer '{id}' does not exist"),
            LedgerError::NonPositiveAmount { amount } => {
                write!(f, "amount must be > 0, got {amount}")
            }
            LedgerError::SameWallet { wallet_id } => {
                write!(f, "transfer source and destination are both '{wallet_id}'")
            }
            LedgerError::InsufficientBalance {
                wallet_id,
                balance,
                requested,
            } => write!(
                f,
                "wallet '{wallet_id}' holds {balance}, cannot deduct {requested}"
            ),
            LedgerError::Store(e) => write!(f, "store failure: {e}"),
            LedgerError::RollbackFailure {
                operation,
                cause,
                rollback_cause,
            } => write!(
                f,
                "{operation} failed ({cause}) and rollback also failed \
                 ({rollback_cause}); wallet balances may be inconsistent, \
                 run a wallet balance recalculation"
            ),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<StoreError> for LedgerError {
    fn from(e: StoreError) -> Self {
        LedgerError::Store(e)
    }
}
