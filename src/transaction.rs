/// Lifecycle states of a connection-attached transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Idle,
    Active,
    Committed,
    RolledBack,
}

/// A transaction attached to one connection.
///
/// `Committed` and `RolledBack` are terminal; completing a terminal
/// transaction again is a no-op.
#[derive(Debug, Clone)]
pub struct Transaction {
    state: TransactionState,
}

impl Transaction {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            state: TransactionState::Idle,
        }
    }

    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            TransactionState::Committed | TransactionState::RolledBack
        )
    }

    /// Move `Idle -> Active`. Returns whether the transition happened.
    pub(crate) fn activate(&mut self) -> bool {
        if self.state == TransactionState::Idle {
            self.state = TransactionState::Active;
            true
        } else {
            false
        }
    }

    /// Move `Active` to a terminal state. Returns whether the backend should
    /// be told; terminal transactions swallow the second call.
    pub(crate) fn complete(&mut self, commit: bool) -> bool {
        if self.state == TransactionState::Active {
            self.state = if commit {
                TransactionState::Committed
            } else {
                TransactionState::RolledBack
            };
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_is_terminal_and_idempotent() {
        let mut tx = Transaction::new();
        assert!(tx.activate());
        assert!(tx.complete(true));
        assert!(!tx.complete(true));
        assert!(!tx.complete(false));
        assert_eq!(tx.state(), TransactionState::Committed);
    }

    #[test]
    fn activate_twice_is_rejected() {
        let mut tx = Transaction::new();
        assert!(tx.activate());
        assert!(!tx.activate());
    }
}
