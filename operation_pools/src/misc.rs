use strum::IntoStaticStr;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PoolAdditionOutcome {
    Accept,
    Ignore,
    Reject(PoolRejectionReason),
}

impl PoolAdditionOutcome {
    #[must_use]
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::Accept)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum PoolRejectionReason {
    EmptyInitTxHash,
    EmptyAggregationBits,
}
