use relaypay_types::ChainId;

/// True iff `chain_id` is known and equals the accepted network.
pub fn is_accepted(chain_id: Option<ChainId>, accepted: ChainId) -> bool {
    chain_id == Some(accepted)
}

/// Classifies the connected chain against the single accepted deployment network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkValidator {
    accepted: ChainId,
}

impl NetworkValidator {
    pub const fn new(accepted: ChainId) -> Self {
        Self { accepted }
    }

    pub const fn accepted_network(&self) -> ChainId {
        self.accepted
    }

    pub fn is_accepted(&self, chain_id: Option<ChainId>) -> bool {
        is_accepted(chain_id, self.accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::{is_accepted, NetworkValidator};

    #[test]
    fn accepts_only_the_configured_network() {
        let validator = NetworkValidator::new(3);
        assert!(validator.is_accepted(Some(3)));
        for other in [0, 1, 4, 5, 42, 1337, u64::MAX] {
            assert!(!validator.is_accepted(Some(other)), "network {other}");
        }
    }

    #[test]
    fn unknown_network_is_never_accepted() {
        assert!(!is_accepted(None, 3));
        assert!(!NetworkValidator::new(0).is_accepted(None));
    }
}
