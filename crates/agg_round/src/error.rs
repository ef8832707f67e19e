use agg_bft::AnchorError;
use agg_smt::SmtConcurrencyError;
use agg_storage::StorageError;

/// Everything that can make a round fail. All variants are handled
/// identically by the task loop: log and retry next tick, cursor left
/// wherever it was (`IN_PROGRESS` if the batch was already claimed).
///
/// `Smt(SmtConcurrencyError::Tree(SmtError::LeafInBranch { .. }))` would in
/// principle call for a different policy — drop the offending commitment
/// and keep producing the rest of the batch, since a divergent value at
/// an existing path means the commitment itself is bad, not the round.
/// It's folded into the same retry-next-tick bucket here because
/// `materialize` never hands `add_leaves` a path it hasn't first checked
/// against storage and against earlier rows in the same batch (the
/// `REQUEST_ID_EXISTS` rule): by the time a node reaches the tree its
/// path is either brand new or carries the one value storage already
/// agrees on. A genuine divergent-value conflict would mean the record
/// store and the tree disagree about a request id that both claim to
/// know, which is a bug in `materialize` or in storage's own uniqueness
/// guarantee, not a condition this loop is designed to route around.
#[derive(Debug, thiserror::Error)]
pub enum RoundError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Smt(#[from] SmtConcurrencyError),
    #[error(transparent)]
    Anchor(#[from] AnchorError),
}
