/// Database row types — these map directly to SQLite rows.
/// Distinct from the kudos-types domain models to keep the DB layer
/// independent.

pub struct UserRow {
    pub id: String,
    pub platform_id: String,
    pub username: String,
    pub created_at: String,
}

/// One coalesced ledger increment: `count` duplicate tokens of `emoji`
/// going to `recipient` within a single message.
#[derive(Debug, Clone)]
pub struct GrantRow {
    pub recipient: String,
    pub emoji: String,
    pub count: i64,
}

pub struct LeaderboardRow {
    pub username: String,
    pub total: i64,
}

/// One (counterpart, emoji) row of a personal history query. Grouping by
/// counterpart happens in the aggregator.
pub struct HistoryRow {
    pub counterpart_id: String,
    pub counterpart_name: String,
    pub emoji: String,
    pub count: i64,
}

/// Result of a quota reservation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaOutcome {
    /// Counter bumped and all grants recorded in the same transaction.
    Reserved { remaining: u32 },
    /// Nothing written; the sender had `remaining` kudos left (0 when the
    /// day's quota was already spent).
    Refused { remaining: u32 },
}
