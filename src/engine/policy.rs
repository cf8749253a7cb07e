//! Playlist aggregation: owner verdict plus a tally of sampled member verdicts.

use super::types::{Reason, Verdict};
use crate::config::PlaylistPolicy;

/// Sampled member videos and how many of them were blocked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleTally {
    pub sampled: usize,
    pub blocked: usize,
}

impl SampleTally {
    pub fn from_verdicts<'a>(verdicts: impl IntoIterator<Item = &'a Verdict>) -> Self {
        verdicts
            .into_iter()
            .fold(Self::default(), |mut tally, verdict| {
                tally.sampled += 1;
                if verdict.blocked {
                    tally.blocked += 1;
                }
                tally
            })
    }

    /// Strict majority; ties do not count.
    pub fn is_majority(&self) -> bool {
        self.sampled > 0 && self.blocked * 2 > self.sampled
    }

    pub fn any_blocked(&self) -> bool {
        self.blocked > 0
    }
}

impl PlaylistPolicy {
    pub fn needs_sample(self) -> bool {
        !matches!(self, PlaylistPolicy::Owner)
    }

    /// `owner` is `None` when the playlist has no resolvable owner channel.
    /// `tally` is ignored by the `owner` policy.
    pub fn evaluate(self, owner: Option<&Verdict>, tally: SampleTally) -> Verdict {
        let owner_country = owner.and_then(|v| v.country.clone());
        let owner_blocked = owner.is_some_and(|v| v.blocked);

        match self {
            PlaylistPolicy::Owner => match owner {
                None => Verdict::allowed(Reason::PlaylistNoChannel),
                Some(v) if v.blocked => Verdict::new(Reason::PlaylistOwnerBlocked, owner_country),
                Some(_) => Verdict::new(Reason::PlaylistOwnerAllowed, owner_country),
            },
            PlaylistPolicy::AnyItem => {
                if tally.sampled == 0 {
                    Verdict::allowed(Reason::NoSampledItems)
                } else if tally.any_blocked() {
                    Verdict::new(Reason::PlaylistItemBlocked, None)
                } else {
                    Verdict::allowed(Reason::NoSampledBlocks)
                }
            }
            PlaylistPolicy::Majority => {
                if tally.sampled == 0 {
                    Verdict::allowed(Reason::NoSampledItems)
                } else if tally.is_majority() {
                    Verdict::new(Reason::PlaylistMajorityBlocked, None)
                } else {
                    Verdict::allowed(Reason::NotMajority)
                }
            }
            PlaylistPolicy::OwnerOrMajority => {
                if owner_blocked {
                    Verdict::new(Reason::PlaylistOwnerBlocked, owner_country)
                } else if tally.is_majority() {
                    Verdict::new(Reason::PlaylistMajorityBlocked, None)
                } else if tally.sampled == 0 {
                    Verdict::allowed(Reason::NoSampledItems)
                } else {
                    Verdict::new(Reason::Allowed, owner_country)
                }
            }
        }
    }
}
