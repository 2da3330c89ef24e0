// Persistence seam for the submission boundary
//
// RedisStore is the production ledger; MemoryStore backs local runs and tests.

use anyhow::Context;
use async_trait::async_trait;
use crucible_common::redis as ledger;
use crucible_common::types::{Challenge, ResultRecord, Solution, UserStats};
use redis::aio::ConnectionManager;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

#[async_trait]
pub trait SubmissionStore: Send + Sync {
    async fn challenge(&self, challenge_id: u64) -> Result<Option<Challenge>, StoreError>;

    /// Persist the solution with its results and, when it succeeded, credit
    /// `points` unless this user already solved the challenge. Both happen in
    /// one atomic step; the stored solution carries the points only when
    /// awarded. Returns true only for the call that performed the award.
    async fn record_submission(
        &self,
        solution: &Solution,
        results: &[ResultRecord],
        points: u32,
    ) -> Result<bool, StoreError>;

    async fn user_stats(&self, user_id: &str) -> Result<UserStats, StoreError>;
}

pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl SubmissionStore for RedisStore {
    async fn challenge(&self, challenge_id: u64) -> Result<Option<Challenge>, StoreError> {
        let mut conn = self.conn.clone();
        Ok(ledger::get_challenge(&mut conn, challenge_id).await?)
    }

    async fn record_submission(
        &self,
        solution: &Solution,
        results: &[ResultRecord],
        points: u32,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        Ok(ledger::record_submission(&mut conn, solution, results, points).await?)
    }

    async fn user_stats(&self, user_id: &str) -> Result<UserStats, StoreError> {
        let mut conn = self.conn.clone();
        Ok(ledger::get_user_stats(&mut conn, user_id).await?)
    }
}

#[derive(Default)]
struct MemoryState {
    challenges: HashMap<u64, Challenge>,
    solved: HashSet<(String, u64)>,
    stats: HashMap<String, UserStats>,
    solutions: Vec<Solution>,
    results: HashMap<Uuid, Vec<ResultRecord>>,
}

/// In-process store; every operation runs under one mutex
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new(challenges: Vec<Challenge>) -> Self {
        let store = Self::default();
        for challenge in challenges {
            store.insert_challenge(challenge);
        }
        store
    }

    /// Seed from a JSON array of challenges
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let challenges: Vec<Challenge> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        info!(path = %path.display(), challenges = challenges.len(), "Seeded in-memory store");
        Ok(Self::new(challenges))
    }

    pub fn insert_challenge(&self, challenge: Challenge) {
        self.lock().challenges.insert(challenge.id, challenge);
    }

    #[cfg(test)]
    pub fn solutions(&self) -> Vec<Solution> {
        self.lock().solutions.clone()
    }

    #[cfg(test)]
    pub fn results(&self, solution_id: &Uuid) -> Vec<ResultRecord> {
        self.lock().results.get(solution_id).cloned().unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn challenge(&self, challenge_id: u64) -> Result<Option<Challenge>, StoreError> {
        Ok(self.lock().challenges.get(&challenge_id).cloned())
    }

    async fn record_submission(
        &self,
        solution: &Solution,
        results: &[ResultRecord],
        points: u32,
    ) -> Result<bool, StoreError> {
        let mut state = self.lock();

        let awarded = solution.is_successful
            && state.solved.insert((solution.user_id.clone(), solution.challenge_id));
        if awarded {
            let stats = state.stats.entry(solution.user_id.clone()).or_default();
            stats.total_score += u64::from(points);
            stats.solved_challenges += 1;
        }

        state.solutions.push(Solution {
            points_earned: if awarded { points } else { 0 },
            ..solution.clone()
        });
        state.results.insert(solution.id, results.to_vec());
        Ok(awarded)
    }

    async fn user_stats(&self, user_id: &str) -> Result<UserStats, StoreError> {
        Ok(self.lock().stats.get(user_id).cloned().unwrap_or_default())
    }
}
