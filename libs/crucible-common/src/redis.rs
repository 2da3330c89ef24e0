use crate::types::{Challenge, ResultRecord, Solution, UserStats};
use redis::{AsyncCommands, RedisResult};
use uuid::Uuid;

/// Redis key semantics for the submission ledger
/// Keeps the API and the CLI agreeing on deterministic key names

pub const CHALLENGE_PREFIX: &str = "crucible:challenge";
pub const SOLUTION_PREFIX: &str = "crucible:solution";
pub const RESULTS_PREFIX: &str = "crucible:results";
pub const USER_SOLUTIONS_PREFIX: &str = "crucible:user_solutions";
pub const SOLVED_PREFIX: &str = "crucible:solved";
pub const USER_STATS_PREFIX: &str = "crucible:user_stats";

const TOTAL_SCORE_FIELD: &str = "total_score";
const SOLVED_CHALLENGES_FIELD: &str = "solved_challenges";

/// Persists a solution with its results and, for a successful solution,
/// marks the (user, challenge) pair solved and credits the user, all in one
/// script run. ARGV[5] is the solution payload carrying the points, ARGV[6]
/// the one without; result payloads start at ARGV[8].
/// Returns 1 when this call performed the award, 0 otherwise.
const RECORD_SUBMISSION_SCRIPT: &str = r#"
local awarded = 0
if ARGV[7] == '1' and redis.call('SET', KEYS[1], ARGV[1], 'NX') then
  redis.call('HINCRBY', KEYS[2], ARGV[3], ARGV[2])
  redis.call('HINCRBY', KEYS[2], ARGV[4], 1)
  awarded = 1
end
if awarded == 1 then
  redis.call('SET', KEYS[3], ARGV[5])
else
  redis.call('SET', KEYS[3], ARGV[6])
end
redis.call('RPUSH', KEYS[4], ARGV[1])
if #ARGV > 7 then
  redis.call('RPUSH', KEYS[5], unpack(ARGV, 8))
end
return awarded
"#;

pub fn challenge_key(challenge_id: u64) -> String {
    format!("{}:{}", CHALLENGE_PREFIX, challenge_id)
}

pub fn solution_key(solution_id: &Uuid) -> String {
    format!("{}:{}", SOLUTION_PREFIX, solution_id)
}

pub fn results_key(solution_id: &Uuid) -> String {
    format!("{}:{}", RESULTS_PREFIX, solution_id)
}

pub fn user_solutions_key(user_id: &str) -> String {
    format!("{}:{}", USER_SOLUTIONS_PREFIX, user_id)
}

pub fn solved_key(user_id: &str, challenge_id: u64) -> String {
    format!("{}:{}:{}", SOLVED_PREFIX, user_id, challenge_id)
}

pub fn user_stats_key(user_id: &str) -> String {
    format!("{}:{}", USER_STATS_PREFIX, user_id)
}

fn serialization_error(e: serde_json::Error) -> redis::RedisError {
    redis::RedisError::from((redis::ErrorKind::TypeError, "serialization error", e.to_string()))
}

fn deserialization_error(e: serde_json::Error) -> redis::RedisError {
    redis::RedisError::from((redis::ErrorKind::TypeError, "deserialization error", e.to_string()))
}

/// Fetch a challenge written by the portal's persistence layer
pub async fn get_challenge(
    conn: &mut redis::aio::ConnectionManager,
    challenge_id: u64,
) -> RedisResult<Option<Challenge>> {
    let payload: Option<String> = conn.get(challenge_key(challenge_id)).await?;

    match payload {
        Some(data) => {
            let challenge: Challenge = serde_json::from_str(&data).map_err(deserialization_error)?;
            Ok(Some(challenge))
        }
        None => Ok(None),
    }
}

pub async fn put_challenge(
    conn: &mut redis::aio::ConnectionManager,
    challenge: &Challenge,
) -> RedisResult<()> {
    let payload = serde_json::to_string(challenge).map_err(serialization_error)?;
    conn.set(challenge_key(challenge.id), payload).await
}

/// Persist a submission and award first-solve points in one atomic step
///
/// Concurrent duplicate submissions race on a single SET NX inside the Lua
/// script, so exactly one of them observes `true`. The stored solution
/// carries `points` only for that call, keeping user stats and solution
/// history in agreement. Failed solutions are stored without an award.
pub async fn record_submission(
    conn: &mut redis::aio::ConnectionManager,
    solution: &Solution,
    results: &[ResultRecord],
    points: u32,
) -> RedisResult<bool> {
    let awarded_payload = serde_json::to_string(&Solution {
        points_earned: points,
        ..solution.clone()
    })
    .map_err(serialization_error)?;
    let plain_payload = serde_json::to_string(&Solution {
        points_earned: 0,
        ..solution.clone()
    })
    .map_err(serialization_error)?;
    let result_payloads = results
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<Vec<_>, _>>()
        .map_err(serialization_error)?;

    let script = redis::Script::new(RECORD_SUBMISSION_SCRIPT);
    let mut invocation = script.prepare_invoke();
    invocation
        .key(solved_key(&solution.user_id, solution.challenge_id))
        .key(user_stats_key(&solution.user_id))
        .key(solution_key(&solution.id))
        .key(user_solutions_key(&solution.user_id))
        .key(results_key(&solution.id))
        .arg(solution.id.to_string())
        .arg(points)
        .arg(TOTAL_SCORE_FIELD)
        .arg(SOLVED_CHALLENGES_FIELD)
        .arg(awarded_payload)
        .arg(plain_payload)
        .arg(if solution.is_successful { "1" } else { "0" })
        .arg(result_payloads);

    let awarded: i64 = invocation.invoke_async(conn).await?;
    Ok(awarded == 1)
}

pub async fn get_user_stats(
    conn: &mut redis::aio::ConnectionManager,
    user_id: &str,
) -> RedisResult<UserStats> {
    let (total_score, solved_challenges): (Option<u64>, Option<u64>) = conn
        .hget(user_stats_key(user_id), &[TOTAL_SCORE_FIELD, SOLVED_CHALLENGES_FIELD][..])
        .await?;

    Ok(UserStats {
        total_score: total_score.unwrap_or(0),
        solved_challenges: solved_challenges.unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_challenge_key_format() {
        assert_eq!(challenge_key(42), "crucible:challenge:42");
    }

    #[test]
    fn test_solution_keys_deterministic() {
        let id = Uuid::new_v4();
        assert_eq!(solution_key(&id), solution_key(&id));
        assert!(solution_key(&id).starts_with("crucible:solution:"));
        assert!(results_key(&id).ends_with(&id.to_string()));
    }

    #[test]
    fn test_solved_key_is_per_user_and_challenge() {
        assert_eq!(solved_key("alice", 7), "crucible:solved:alice:7");
        assert_ne!(solved_key("alice", 7), solved_key("alice", 8));
        assert_ne!(solved_key("alice", 7), solved_key("bob", 7));
    }

    #[test]
    fn test_user_keys() {
        assert_eq!(user_stats_key("alice"), "crucible:user_stats:alice");
        assert_eq!(user_solutions_key("alice"), "crucible:user_solutions:alice");
    }
}
