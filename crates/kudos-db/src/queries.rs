use crate::Database;
use crate::models::{GrantRow, HistoryRow, LeaderboardRow, QuotaOutcome, UserRow};
use anyhow::{Result, anyhow};
use rusqlite::{Connection, OptionalExtension};

impl Database {
    // -- Users --

    pub fn get_user_by_platform_id(&self, platform_id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_platform_id(conn, platform_id))
    }

    /// Insert a user row, treating the unique platform_id constraint as
    /// authoritative: if a concurrent first-sighting won the insert race,
    /// the existing row is read back instead of surfacing the conflict.
    pub fn insert_user(&self, id: &str, platform_id: &str, username: &str) -> Result<UserRow> {
        self.with_conn_mut(|conn| {
            match conn.execute(
                "INSERT INTO users (id, platform_id, username) VALUES (?1, ?2, ?3)",
                (id, platform_id, username),
            ) {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation => {}
                Err(e) => return Err(e.into()),
            }
            query_user_by_platform_id(conn, platform_id)?
                .ok_or_else(|| anyhow!("user {} missing after insert", platform_id))
        })
    }

    // -- Channels --

    /// Durable enablement state; `None` means the channel was never
    /// toggled.
    pub fn channel_enabled(&self, channel_id: &str) -> Result<Option<bool>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT enabled FROM enabled_channels WHERE id = ?1",
                    [channel_id],
                    |row| row.get::<_, i64>(0),
                )
                .optional()?;
            Ok(row.map(|v| v != 0))
        })
    }

    pub fn set_channel_enabled(&self, channel_id: &str, enabled: bool) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO enabled_channels (id, enabled) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET enabled = excluded.enabled",
                (channel_id, enabled as i64),
            )?;
            Ok(())
        })
    }

    // -- Rate-limited ledger --

    /// Atomically reserve `to_give` of the sender's daily quota and record
    /// every grant. One transaction covers the stale-counter sweep, the
    /// check-then-increment, and all ledger upserts, so a refused or
    /// failed attempt leaves both tables unchanged.
    pub fn reserve_and_record(
        &self,
        sender: &str,
        day: &str,
        quota: u32,
        to_give: u32,
        grants: &[GrantRow],
    ) -> Result<QuotaOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            // Counters from previous days reset the window
            tx.execute("DELETE FROM rate WHERE day < ?1", [day])?;

            let count: i64 = tx
                .query_row(
                    "SELECT count FROM rate WHERE user_id = ?1 AND day = ?2",
                    (sender, day),
                    |row| row.get(0),
                )
                .optional()?
                .unwrap_or(0);
            let count = count as u32;

            if count >= quota {
                tx.commit()?;
                return Ok(QuotaOutcome::Refused { remaining: 0 });
            }
            if count + to_give > quota {
                tx.commit()?;
                return Ok(QuotaOutcome::Refused {
                    remaining: quota - count,
                });
            }

            tx.execute(
                "INSERT INTO rate (user_id, day, count) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id, day) DO UPDATE SET count = count + excluded.count",
                (sender, day, to_give as i64),
            )?;

            for grant in grants {
                tx.execute(
                    "INSERT INTO kudos (sender, recipient, emoji, count) VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(sender, recipient, emoji) DO UPDATE SET count = count + excluded.count",
                    (sender, &grant.recipient, &grant.emoji, grant.count),
                )?;
            }

            tx.commit()?;
            Ok(QuotaOutcome::Reserved {
                remaining: quota - (count + to_give),
            })
        })
    }

    // -- Aggregation --

    /// Top recipients by total kudos received, optionally restricted to a
    /// set of emojis. Ties are broken by username ascending so equal
    /// totals always render in the same order.
    pub fn leaderboard(&self, emoji_filter: &[String], limit: u32) -> Result<Vec<LeaderboardRow>> {
        self.with_conn(|conn| {
            let (filter_clause, mut params) = emoji_in_clause(emoji_filter, 1);
            let sql = format!(
                "SELECT u.username, SUM(k.count) AS total
                 FROM kudos k
                     INNER JOIN users u ON k.recipient = u.id
                 {}
                 GROUP BY u.username
                 ORDER BY total DESC, u.username ASC
                 LIMIT ?{}",
                filter_clause,
                emoji_filter.len() + 1
            );
            let limit = limit as i64;
            params.push(&limit);

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok(LeaderboardRow {
                        username: row.get(0)?,
                        total: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Per-counterpart kudos rows for one user, received or given. Rows
    /// come back ordered by count descending then counterpart username
    /// descending; the aggregator groups them.
    pub fn personal_history(
        &self,
        user_id: &str,
        emoji_filter: &[String],
        received: bool,
    ) -> Result<Vec<HistoryRow>> {
        let (counterpart, target) = if received {
            ("k.sender", "k.recipient")
        } else {
            ("k.recipient", "k.sender")
        };

        self.with_conn(|conn| {
            let (filter_clause, mut params) = emoji_in_clause(emoji_filter, 2);
            let sql = format!(
                "SELECT u.id, u.username, k.emoji, k.count
                 FROM kudos k
                     INNER JOIN users u ON {} = u.id
                 WHERE {} = ?1 {}
                 ORDER BY k.count DESC, u.username DESC",
                counterpart,
                target,
                filter_clause.replacen("WHERE", "AND", 1)
            );
            params.insert(0, &user_id);

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok(HistoryRow {
                        counterpart_id: row.get(0)?,
                        counterpart_name: row.get(1)?,
                        emoji: row.get(2)?,
                        count: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn query_user_by_platform_id(conn: &Connection, platform_id: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, platform_id, username, created_at FROM users WHERE platform_id = ?1",
    )?;

    let row = stmt
        .query_row([platform_id], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                platform_id: row.get(1)?,
                username: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

/// Build a `WHERE k.emoji IN (?N, ...)` clause with numbered placeholders
/// starting at `start`, plus the matching parameter slice. Empty filter
/// means no clause at all (all emojis).
fn emoji_in_clause(
    emojis: &[String],
    start: usize,
) -> (String, Vec<&dyn rusqlite::types::ToSql>) {
    if emojis.is_empty() {
        return (String::new(), Vec::new());
    }

    let placeholders: Vec<String> = (start..start + emojis.len())
        .map(|i| format!("?{}", i))
        .collect();
    let clause = format!("WHERE k.emoji IN ({})", placeholders.join(", "));
    let params: Vec<&dyn rusqlite::types::ToSql> = emojis
        .iter()
        .map(|e| e as &dyn rusqlite::types::ToSql)
        .collect();

    (clause, params)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn add_user(db: &Database, id: &str, platform_id: &str, name: &str) {
        db.insert_user(id, platform_id, name).unwrap();
    }

    fn kudos_row_count(db: &Database) -> i64 {
        db.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM kudos", [], |row| row.get(0))?)
        })
        .unwrap()
    }

    fn grant(recipient: &str, emoji: &str, count: i64) -> GrantRow {
        GrantRow {
            recipient: recipient.into(),
            emoji: emoji.into(),
            count,
        }
    }

    #[test]
    fn insert_then_lookup() {
        let db = test_db();
        add_user(&db, "u1", "U111", "alice");

        let row = db.get_user_by_platform_id("U111").unwrap().unwrap();
        assert_eq!(row.id, "u1");
        assert_eq!(row.username, "alice");
        assert!(db.get_user_by_platform_id("U999").unwrap().is_none());
    }

    #[test]
    fn losing_insert_reads_back_winner() {
        let db = test_db();
        add_user(&db, "u1", "U111", "alice");

        // Same platform_id with a different generated id: the constraint
        // wins and the original row comes back.
        let row = db.insert_user("u2", "U111", "alice").unwrap();
        assert_eq!(row.id, "u1");
    }

    #[test]
    fn channel_state_default_absent() {
        let db = test_db();
        assert_eq!(db.channel_enabled("C1").unwrap(), None);

        db.set_channel_enabled("C1", true).unwrap();
        assert_eq!(db.channel_enabled("C1").unwrap(), Some(true));

        db.set_channel_enabled("C1", false).unwrap();
        assert_eq!(db.channel_enabled("C1").unwrap(), Some(false));
    }

    #[test]
    fn quota_reserve_and_refuse() {
        let db = test_db();
        add_user(&db, "s", "US", "sender");
        add_user(&db, "r", "UR", "recv");

        let day = "2026-08-07";
        let out = db
            .reserve_and_record("s", day, 5, 3, &[grant("r", "star", 3)])
            .unwrap();
        assert_eq!(out, QuotaOutcome::Reserved { remaining: 2 });

        // Asking for more than what's left refuses with the exact remainder
        let out = db
            .reserve_and_record("s", day, 5, 3, &[grant("r", "star", 3)])
            .unwrap();
        assert_eq!(out, QuotaOutcome::Refused { remaining: 2 });

        // The refusal left the counter unchanged
        let out = db
            .reserve_and_record("s", day, 5, 2, &[grant("r", "star", 2)])
            .unwrap();
        assert_eq!(out, QuotaOutcome::Reserved { remaining: 0 });

        // Fully spent: refusal reports zero remaining
        let out = db
            .reserve_and_record("s", day, 5, 1, &[grant("r", "star", 1)])
            .unwrap();
        assert_eq!(out, QuotaOutcome::Refused { remaining: 0 });
    }

    #[test]
    fn refused_attempt_records_nothing() {
        let db = test_db();
        add_user(&db, "s", "US", "sender");
        add_user(&db, "r", "UR", "recv");

        let day = "2026-08-07";
        db.reserve_and_record("s", day, 5, 5, &[grant("r", "star", 5)])
            .unwrap();
        assert_eq!(kudos_row_count(&db), 1);

        let out = db
            .reserve_and_record("s", day, 5, 1, &[grant("r", "heart", 1)])
            .unwrap();
        assert_eq!(out, QuotaOutcome::Refused { remaining: 0 });
        assert_eq!(kudos_row_count(&db), 1);
    }

    #[test]
    fn stale_counters_expire_but_ledger_persists() {
        let db = test_db();
        add_user(&db, "s", "US", "sender");
        add_user(&db, "r", "UR", "recv");

        db.reserve_and_record("s", "2026-08-06", 5, 5, &[grant("r", "star", 5)])
            .unwrap();

        // A new day sweeps yesterday's counter; the full quota is back
        let out = db
            .reserve_and_record("s", "2026-08-07", 5, 5, &[grant("r", "star", 5)])
            .unwrap();
        assert_eq!(out, QuotaOutcome::Reserved { remaining: 0 });

        // Both days' grants accumulated into the one ledger row
        let board = db.leaderboard(&[], 10).unwrap();
        assert_eq!(board[0].total, 10);
    }

    #[test]
    fn same_triple_accumulates_one_row() {
        let db = test_db();
        add_user(&db, "s", "US", "sender");
        add_user(&db, "r", "UR", "recv");

        db.reserve_and_record("s", "2026-08-06", 10, 2, &[grant("r", "star", 2)])
            .unwrap();
        db.reserve_and_record("s", "2026-08-06", 10, 3, &[grant("r", "star", 3)])
            .unwrap();

        assert_eq!(kudos_row_count(&db), 1);
        let board = db.leaderboard(&[], 10).unwrap();
        assert_eq!(board[0].total, 5);
    }

    #[test]
    fn leaderboard_ties_break_ascending() {
        let db = test_db();
        add_user(&db, "s", "US", "sender");
        add_user(&db, "a", "UA", "alice");
        add_user(&db, "b", "UB", "bob");
        add_user(&db, "c", "UC", "carol");

        let day = "2026-08-07";
        db.reserve_and_record(
            "s",
            day,
            200,
            130,
            &[
                grant("b", "star", 50),
                grant("a", "star", 50),
                grant("c", "star", 30),
            ],
        )
        .unwrap();

        let board = db.leaderboard(&[], 10).unwrap();
        let got: Vec<(&str, i64)> = board
            .iter()
            .map(|r| (r.username.as_str(), r.total))
            .collect();
        assert_eq!(got, vec![("alice", 50), ("bob", 50), ("carol", 30)]);
    }

    #[test]
    fn leaderboard_emoji_filter() {
        let db = test_db();
        add_user(&db, "s", "US", "sender");
        add_user(&db, "a", "UA", "alice");
        add_user(&db, "b", "UB", "bob");

        let day = "2026-08-07";
        db.reserve_and_record(
            "s",
            day,
            100,
            7,
            &[
                grant("a", "star", 2),
                grant("a", "heart", 3),
                grant("b", "heart", 2),
            ],
        )
        .unwrap();

        let board = db.leaderboard(&["heart".into()], 10).unwrap();
        let got: Vec<(&str, i64)> = board
            .iter()
            .map(|r| (r.username.as_str(), r.total))
            .collect();
        assert_eq!(got, vec![("alice", 3), ("bob", 2)]);

        let board = db.leaderboard(&["star".into(), "heart".into()], 1).unwrap();
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].username, "alice");
        assert_eq!(board[0].total, 5);
    }

    #[test]
    fn personal_history_directions() {
        let db = test_db();
        add_user(&db, "me", "UM", "me");
        add_user(&db, "a", "UA", "alice");
        add_user(&db, "b", "UB", "bob");

        let day = "2026-08-07";
        db.reserve_and_record("a", day, 10, 4, &[grant("me", "star", 4)])
            .unwrap();
        db.reserve_and_record("b", day, 10, 2, &[grant("me", "heart", 2)])
            .unwrap();
        db.reserve_and_record("me", day, 10, 1, &[grant("a", "wave", 1)])
            .unwrap();

        let received = db.personal_history("me", &[], true).unwrap();
        let got: Vec<(&str, &str, i64)> = received
            .iter()
            .map(|r| (r.counterpart_name.as_str(), r.emoji.as_str(), r.count))
            .collect();
        assert_eq!(got, vec![("alice", "star", 4), ("bob", "heart", 2)]);

        let given = db.personal_history("me", &[], false).unwrap();
        assert_eq!(given.len(), 1);
        assert_eq!(given[0].counterpart_name, "alice");
        assert_eq!(given[0].emoji, "wave");

        let filtered = db.personal_history("me", &["heart".into()], true).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].counterpart_name, "bob");
    }

    #[test]
    fn personal_history_rows_order_descending() {
        let db = test_db();
        add_user(&db, "me", "UM", "me");
        add_user(&db, "a", "UA", "alice");
        add_user(&db, "b", "UB", "bob");

        let day = "2026-08-07";
        db.reserve_and_record("a", day, 10, 3, &[grant("me", "star", 3)])
            .unwrap();
        db.reserve_and_record("b", day, 10, 3, &[grant("me", "star", 3)])
            .unwrap();

        // Equal counts: counterpart username orders descending
        let rows = db.personal_history("me", &[], true).unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.counterpart_name.as_str()).collect();
        assert_eq!(names, vec!["bob", "alice"]);
    }
}
