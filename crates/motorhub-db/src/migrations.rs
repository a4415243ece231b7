use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("DB: running migration v1 (threads, files, blocks, reports)");
        conn.execute_batch(
            "
            CREATE TABLE messages (
                id              TEXT PRIMARY KEY,
                thread          TEXT NOT NULL,
                car_id          TEXT NOT NULL,
                sender          TEXT NOT NULL,
                receiver        TEXT NOT NULL,
                content         TEXT,
                file_url        TEXT,
                file_mime       TEXT,
                file_category   TEXT,
                file_name       TEXT,
                file_size       INTEGER,
                file_hash       TEXT,
                timestamp_ms    INTEGER NOT NULL,
                status          TEXT NOT NULL DEFAULT 'sent'
                                CHECK(status IN ('sent', 'read', 'failed'))
            );

            CREATE INDEX idx_messages_thread
                ON messages(thread, timestamp_ms);

            CREATE INDEX idx_messages_file_hash
                ON messages(file_hash);

            -- Rows are only ever inserted: deleted_for grows, never shrinks
            CREATE TABLE message_deletions (
                message_id      TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                participant     TEXT NOT NULL,
                PRIMARY KEY (message_id, participant)
            );

            CREATE TABLE file_records (
                hash            TEXT PRIMARY KEY,
                url             TEXT NOT NULL,
                size            INTEGER NOT NULL,
                mime_type       TEXT NOT NULL,
                category        TEXT NOT NULL,
                created_at_ms   INTEGER NOT NULL
            );

            CREATE TABLE file_references (
                hash            TEXT NOT NULL REFERENCES file_records(hash) ON DELETE CASCADE,
                participant     TEXT NOT NULL,
                PRIMARY KEY (hash, participant)
            );

            CREATE TABLE blocks (
                blocker         TEXT NOT NULL,
                blocked         TEXT NOT NULL,
                car_id          TEXT NOT NULL,
                created_at_ms   INTEGER NOT NULL,
                PRIMARY KEY (blocker, blocked, car_id)
            );

            CREATE TABLE reports (
                id              TEXT PRIMARY KEY,
                reporter        TEXT NOT NULL,
                reported        TEXT NOT NULL,
                car_id          TEXT NOT NULL,
                owner           TEXT NOT NULL,
                thread          TEXT NOT NULL,
                timestamp_ms    INTEGER NOT NULL,
                comment         TEXT,
                messages_json   TEXT NOT NULL,
                revised         INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX idx_reports_time
                ON reports(timestamp_ms DESC);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("DB: running migration v2 (device download ledger)");
        conn.execute_batch(
            "
            CREATE TABLE local_downloads (
                hash            TEXT PRIMARY KEY,
                file_name       TEXT NOT NULL,
                local_path      TEXT NOT NULL,
                mime_type       TEXT NOT NULL,
                source          TEXT NOT NULL CHECK(source IN ('uploaded', 'downloaded')),
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
