use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::bank::QuestionBank;
use super::domain::{Domain, QuestionRecord};

/// Error raised when the bank cannot satisfy a draw. Fatal to session
/// creation; never retried internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("not enough questions in the bank for a unique draw: requested {requested}, available {available}")]
    InsufficientQuestions { requested: u32, available: u32 },
}

/// Draws unique, quota-weighted question sets from a bank.
///
/// Uniqueness is guaranteed by construction: each domain pool is shuffled
/// and consumed from the front without replacement, and a question belongs
/// to exactly one domain, so cross-domain duplicates are structurally
/// impossible. No post-hoc deduplication happens anywhere downstream.
pub struct QuestionSelector {
    rng: StdRng,
}

impl QuestionSelector {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Seeded construction so any past draw can be reproduced exactly from
    /// the seed stored on its session.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Draw exactly `requested` distinct questions from `domains`.
    ///
    /// With `percentages`, each domain's quota is round-half-up of
    /// `requested * share / 100`, computed in the caller-supplied domain
    /// order; a rounding shortfall is absorbed by the first domain, and an
    /// overshoot is clamped by truncating the final shuffled list. Without
    /// `percentages`, the union of the domain pools is shuffled once.
    pub fn draw(
        &mut self,
        bank: &dyn QuestionBank,
        domains: &[Domain],
        requested: u32,
        percentages: Option<&BTreeMap<Domain, u8>>,
    ) -> Result<Vec<QuestionRecord>, SelectionError> {
        let mut selected = match percentages {
            Some(shares) if !shares.is_empty() => {
                self.draw_with_distribution(bank, domains, requested, shares)
            }
            _ => self.draw_uniform(bank, domains, requested),
        };

        if (selected.len() as u32) < requested {
            return Err(SelectionError::InsufficientQuestions {
                requested,
                available: selected.len() as u32,
            });
        }

        selected.truncate(requested as usize);
        Ok(selected)
    }

    fn draw_uniform(
        &mut self,
        bank: &dyn QuestionBank,
        domains: &[Domain],
        requested: u32,
    ) -> Vec<QuestionRecord> {
        let mut pool = bank.find_by_domains(domains);
        pool.shuffle(&mut self.rng);
        pool.truncate(requested as usize);
        pool
    }

    fn draw_with_distribution(
        &mut self,
        bank: &dyn QuestionBank,
        domains: &[Domain],
        requested: u32,
        shares: &BTreeMap<Domain, u8>,
    ) -> Vec<QuestionRecord> {
        let mut pools: BTreeMap<Domain, Vec<QuestionRecord>> = BTreeMap::new();
        for domain in domains {
            let mut pool = bank.find_by_domain(*domain);
            pool.shuffle(&mut self.rng);
            pools.insert(*domain, pool);
        }

        let mut quotas = quotas_for(domains, requested, shares);

        // Any rounding shortfall goes to the first caller-supplied domain.
        // This is a documented contract, not an iteration-order accident.
        let allocated: u32 = quotas.values().sum();
        if allocated < requested {
            if let Some(first) = domains.first() {
                *quotas.entry(*first).or_insert(0) += requested - allocated;
            }
        }

        let mut selected = Vec::with_capacity(requested as usize);
        for domain in domains {
            let quota = quotas.get(domain).copied().unwrap_or(0) as usize;
            if let Some(pool) = pools.get_mut(domain) {
                let take = quota.min(pool.len());
                selected.extend(pool.drain(..take));
            }
        }

        // Second shuffle removes the per-domain block ordering left by the
        // concatenation above.
        selected.shuffle(&mut self.rng);
        selected
    }
}

/// Per-domain quotas: round-half-up of `requested * share / 100`, in the
/// caller-supplied domain order.
pub(crate) fn quotas_for(
    domains: &[Domain],
    requested: u32,
    shares: &BTreeMap<Domain, u8>,
) -> BTreeMap<Domain, u32> {
    domains
        .iter()
        .map(|domain| {
            let share = shares.get(domain).copied().unwrap_or(0) as u32;
            (*domain, (requested * share + 50) / 100)
        })
        .collect()
}
