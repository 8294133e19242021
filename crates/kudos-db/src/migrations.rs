use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            platform_id TEXT NOT NULL UNIQUE,
            username    TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Accumulated kudos per (sender, recipient, emoji). Counts only
        -- ever increase; rows are never deleted.
        CREATE TABLE IF NOT EXISTS kudos (
            sender      TEXT NOT NULL REFERENCES users(id),
            recipient   TEXT NOT NULL REFERENCES users(id),
            emoji       TEXT NOT NULL,
            count       INTEGER NOT NULL DEFAULT 0,
            UNIQUE(sender, recipient, emoji)
        );

        CREATE INDEX IF NOT EXISTS idx_kudos_recipient
            ON kudos(recipient);

        CREATE INDEX IF NOT EXISTS idx_kudos_sender
            ON kudos(sender);

        -- Per-sender daily counters. Rows dated before today are deleted
        -- lazily inside each reservation.
        CREATE TABLE IF NOT EXISTS rate (
            user_id     TEXT NOT NULL REFERENCES users(id),
            day         TEXT NOT NULL,
            count       INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (user_id, day)
        );

        CREATE TABLE IF NOT EXISTS enabled_channels (
            id          TEXT PRIMARY KEY,
            enabled     INTEGER NOT NULL DEFAULT 0
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
