// src/services/selection.rs

//! Random question selection by difficulty and Bloom quotas.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};

use crate::config::MAX_SELECTION_TOTAL;
use crate::models::question::{BloomLevel, Difficulty, Question};
use crate::models::test_paper::SelectionRequest;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    EmptyTotal,
    TotalTooLarge { requested: usize, max: usize },
    DifficultyQuotaExceedsTotal { sum: usize, total: usize },
    BloomQuotaExceedsTotal { sum: usize, total: usize },
}

impl fmt::Display for SelectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionError::EmptyTotal => write!(f, "total must be at least 1"),
            SelectionError::TotalTooLarge { requested, max } => {
                write!(f, "Requested {} questions but at most {} can be selected", requested, max)
            }
            SelectionError::DifficultyQuotaExceedsTotal { sum, total } => write!(
                f,
                "Difficulty quotas add up to {} which exceeds the total of {}",
                sum, total
            ),
            SelectionError::BloomQuotaExceedsTotal { sum, total } => write!(
                f,
                "Bloom level quotas add up to {} which exceeds the total of {}",
                sum, total
            ),
        }
    }
}

impl std::error::Error for SelectionError {}

/// How many questions to draw, overall and per category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionQuota {
    pub by_difficulty: BTreeMap<Difficulty, usize>,
    pub by_bloom: BTreeMap<BloomLevel, usize>,
    pub total: usize,
}

impl SelectionQuota {
    pub fn validate(&self) -> Result<(), SelectionError> {
        if self.total == 0 {
            return Err(SelectionError::EmptyTotal);
        }
        if self.total > MAX_SELECTION_TOTAL {
            return Err(SelectionError::TotalTooLarge {
                requested: self.total,
                max: MAX_SELECTION_TOTAL,
            });
        }
        let sum: usize = self.by_difficulty.values().sum();
        if sum > self.total {
            return Err(SelectionError::DifficultyQuotaExceedsTotal { sum, total: self.total });
        }
        let sum: usize = self.by_bloom.values().sum();
        if sum > self.total {
            return Err(SelectionError::BloomQuotaExceedsTotal { sum, total: self.total });
        }
        Ok(())
    }
}

impl From<&SelectionRequest> for SelectionQuota {
    fn from(req: &SelectionRequest) -> Self {
        Self {
            by_difficulty: req.by_difficulty.clone(),
            by_bloom: req.by_bloom.clone(),
            total: req.total,
        }
    }
}

/// Seeded generator when a seed is given, otherwise one seeded from the OS.
pub fn rng_for(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Draws up to `quota.total` distinct questions from `pool`.
///
/// Difficulty quotas are filled first, then Bloom quotas from what is left,
/// then the remainder from any unused question. A short pool yields a short
/// result. Quotas are visited in key order so a seeded `rng` reproduces the
/// same selection.
pub fn select_questions<R: Rng + ?Sized>(
    pool: &[Question],
    quota: &SelectionQuota,
    rng: &mut R,
) -> Vec<Question> {
    let mut used = HashSet::new();
    let mut selected: Vec<&Question> = Vec::with_capacity(quota.total);

    for (&difficulty, &count) in &quota.by_difficulty {
        take_random(pool, |q| q.difficulty == difficulty, count, &mut used, &mut selected, rng);
    }

    for (&level, &count) in &quota.by_bloom {
        take_random(pool, |q| q.bloom() == Some(level), count, &mut used, &mut selected, rng);
    }

    if selected.len() < quota.total {
        let remaining = quota.total - selected.len();
        take_random(pool, |_| true, remaining, &mut used, &mut selected, rng);
    }

    selected.truncate(quota.total);
    selected.into_iter().cloned().collect()
}

fn take_random<'a, F, R>(
    pool: &'a [Question],
    matches: F,
    count: usize,
    used: &mut HashSet<i64>,
    selected: &mut Vec<&'a Question>,
    rng: &mut R,
) where
    F: Fn(&Question) -> bool,
    R: Rng + ?Sized,
{
    if count == 0 {
        return;
    }

    let mut candidates: Vec<&Question> = pool
        .iter()
        .filter(|q| !used.contains(&q.id) && matches(*q))
        .collect();
    candidates.shuffle(rng);

    let mut taken = 0;
    for question in candidates {
        if taken == count {
            break;
        }
        // The pool may list the same id twice.
        if used.insert(question.id) {
            selected.push(question);
            taken += 1;
        }
    }
}

/// Picks a random candidate whose id is not in `exclude`.
pub fn pick_replacement<R: Rng + ?Sized>(
    candidates: &[Question],
    exclude: &HashSet<i64>,
    rng: &mut R,
) -> Option<Question> {
    let eligible: Vec<&Question> = candidates
        .iter()
        .filter(|q| !exclude.contains(&q.id))
        .collect();
    eligible.choose(rng).map(|q| (*q).clone())
}
