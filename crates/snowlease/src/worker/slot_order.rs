use rand::Rng;

/// The order in which candidate worker slots are tried during acquisition.
///
/// Either way the first free slot wins and slots stay mutually exclusive; the
/// order only affects which slot that is.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SlotOrder {
    /// `0..max_workers`. Low slots fill first and gaps stay small.
    #[default]
    Ascending,
    /// Starts at a random slot and wraps around, which spreads out processes
    /// that boot at the same moment.
    RandomOffset,
}

impl SlotOrder {
    /// Yields every slot in `0..max_workers` exactly once.
    pub fn candidates(self, max_workers: u64) -> impl Iterator<Item = u64> {
        let start = match self {
            Self::Ascending => 0,
            Self::RandomOffset if max_workers > 0 => rand::rng().random_range(0..max_workers),
            Self::RandomOffset => 0,
        };
        (start..max_workers).chain(0..start)
    }
}
