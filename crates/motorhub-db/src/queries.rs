use std::collections::{BTreeSet, HashMap};

use anyhow::Result;
use rusqlite::{Connection, params};
use uuid::Uuid;

use motorhub_types::{
    BlockRelation, ContentHash, FileRecord, LocalDownloadRecord, Message, MessageId,
    MessageStatus, ModerationReport, Participant, ThreadKey,
};

use crate::Database;
use crate::models::{BlockRow, DownloadRow, FileRecordRow, MessageRow, ReportRow};

const MESSAGE_COLUMNS: &str = "id, thread, car_id, sender, receiver, content, file_url, file_mime, \
     file_category, file_name, file_size, file_hash, timestamp_ms, status";

impl Database {
    // -- Messages --

    pub fn insert_message(&self, thread: &ThreadKey, message: &Message) -> Result<()> {
        let file = message.attachment.as_ref();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                &format!(
                    "INSERT INTO messages ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                    MESSAGE_COLUMNS
                ),
                params![
                    message.id.to_string(),
                    thread.path(),
                    message.car_id.as_str(),
                    message.sender_id.to_string(),
                    message.receiver_id.to_string(),
                    message.content,
                    file.and_then(|f| f.file_url.as_deref()),
                    file.map(|f| f.mime_type.as_str()),
                    file.map(|f| f.category.as_str()),
                    file.map(|f| f.file_name.as_str()),
                    file.map(|f| f.file_size as i64),
                    file.map(|f| f.hash.as_str()),
                    message.timestamp.timestamp_millis(),
                    message.status.as_str(),
                ],
            )?;
            for participant in &message.deleted_for {
                tx.execute(
                    "INSERT OR IGNORE INTO message_deletions (message_id, participant) VALUES (?1, ?2)",
                    params![message.id.to_string(), participant.to_string()],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_message(&self, id: MessageId) -> Result<Option<Message>> {
        self.with_conn(|conn| query_message(conn, &id.to_string()))
    }

    /// All messages of a thread in display order (timestamp, then id).
    pub fn list_thread_messages(&self, thread: &ThreadKey) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let path = thread.path();
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM messages WHERE thread = ?1 ORDER BY timestamp_ms ASC, id ASC",
                MESSAGE_COLUMNS
            ))?;
            let rows = stmt
                .query_map([&path], map_message_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut deletions = query_thread_deletions(conn, &path)?;
            rows.into_iter()
                .map(|row| {
                    let deleted_for = deletions.remove(&row.id).unwrap_or_default();
                    row.into_message(deleted_for)
                })
                .collect()
        })
    }

    pub fn count_thread_messages(&self, thread: &ThreadKey) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE thread = ?1",
                [thread.path()],
                |row| row.get(0),
            )?;
            Ok(count.max(0) as u64)
        })
    }

    /// Move a message out of `sent`. The write only applies while the stored
    /// status is still `sent`, so a late write can never undo a terminal status.
    /// Returns the updated message, or `None` when nothing changed.
    pub fn advance_message_status(&self, id: MessageId, next: MessageStatus) -> Result<Option<Message>> {
        if !MessageStatus::Sent.can_transition_to(next) {
            return Ok(None);
        }

        let changed = self.with_conn_mut(|conn| {
            Ok(conn.execute(
                "UPDATE messages SET status = ?2 WHERE id = ?1 AND status = 'sent'",
                params![id.to_string(), next.as_str()],
            )?)
        })?;

        if changed == 0 {
            return Ok(None);
        }
        self.get_message(id)
    }

    /// Add `participant` to a message's deleted_for set.
    /// Returns the updated message, or `None` if it was already there or the message is unknown.
    pub fn add_message_deletion(&self, id: MessageId, participant: &Participant) -> Result<Option<Message>> {
        let changed = self.with_conn_mut(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM messages WHERE id = ?1)",
                [id.to_string()],
                |row| row.get(0),
            )?;
            if !exists {
                return Ok(0);
            }
            Ok(conn.execute(
                "INSERT OR IGNORE INTO message_deletions (message_id, participant) VALUES (?1, ?2)",
                params![id.to_string(), participant.to_string()],
            )?)
        })?;

        if changed == 0 {
            return Ok(None);
        }
        self.get_message(id)
    }

    // -- File records --

    pub fn get_file_record(&self, hash: &ContentHash) -> Result<Option<FileRecord>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT hash, url, size, mime_type, category, created_at_ms FROM file_records WHERE hash = ?1",
                    [hash.as_str()],
                    |row| {
                        Ok(FileRecordRow {
                            hash: row.get(0)?,
                            url: row.get(1)?,
                            size: row.get(2)?,
                            mime_type: row.get(3)?,
                            category: row.get(4)?,
                            created_at_ms: row.get(5)?,
                        })
                    },
                )
                .optional()?;

            match row {
                Some(row) => {
                    let users = query_file_references(conn, hash.as_str())?;
                    Ok(Some(row.into_record(users)?))
                }
                None => Ok(None),
            }
        })
    }

    /// Insert a record unless one already exists for the hash; its referencing
    /// users are unioned in either way. Returns true if the record was created.
    pub fn insert_file_record(&self, record: &FileRecord) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let created = tx.execute(
                "INSERT OR IGNORE INTO file_records (hash, url, size, mime_type, category, created_at_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.hash.as_str(),
                    record.url,
                    record.size as i64,
                    record.mime_type,
                    record.category.as_str(),
                    record.created_at.timestamp_millis(),
                ],
            )? > 0;
            for user in &record.referencing_users {
                tx.execute(
                    "INSERT OR IGNORE INTO file_references (hash, participant) VALUES (?1, ?2)",
                    params![record.hash.as_str(), user.to_string()],
                )?;
            }
            tx.commit()?;
            Ok(created)
        })
    }

    /// Returns true if the participant was not already referencing the file.
    pub fn add_file_reference(&self, hash: &ContentHash, participant: &Participant) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let added = conn.execute(
                "INSERT OR IGNORE INTO file_references (hash, participant) VALUES (?1, ?2)",
                params![hash.as_str(), participant.to_string()],
            )?;
            Ok(added > 0)
        })
    }

    // -- Blocks --

    pub fn is_blocked(&self, blocker: &Participant, blocked: &Participant, car_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM blocks WHERE blocker = ?1 AND blocked = ?2 AND car_id = ?3)",
                params![blocker.to_string(), blocked.to_string(), car_id],
                |row| row.get(0),
            )?)
        })
    }

    pub fn insert_block(&self, relation: &BlockRelation) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO blocks (blocker, blocked, car_id, created_at_ms) VALUES (?1, ?2, ?3, ?4)",
                params![
                    relation.blocker.to_string(),
                    relation.blocked.to_string(),
                    relation.car_id.as_str(),
                    relation.created_at.timestamp_millis(),
                ],
            )?;
            Ok(inserted > 0)
        })
    }

    pub fn remove_block(&self, blocker: &Participant, blocked: &Participant, car_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute(
                "DELETE FROM blocks WHERE blocker = ?1 AND blocked = ?2 AND car_id = ?3",
                params![blocker.to_string(), blocked.to_string(), car_id],
            )?;
            Ok(removed > 0)
        })
    }

    pub fn list_blocks(&self, blocker: &Participant, car_id: &str) -> Result<Vec<BlockRelation>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT blocker, blocked, car_id, created_at_ms FROM blocks
                 WHERE blocker = ?1 AND car_id = ?2
                 ORDER BY created_at_ms ASC",
            )?;
            let rows = stmt
                .query_map(params![blocker.to_string(), car_id], |row| {
                    Ok(BlockRow {
                        blocker: row.get(0)?,
                        blocked: row.get(1)?,
                        car_id: row.get(2)?,
                        created_at_ms: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(BlockRelation::try_from).collect()
        })
    }

    // -- Reports --

    pub fn insert_report(&self, report: &ModerationReport) -> Result<()> {
        let messages_json = serde_json::to_string(&report.messages)?;
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO reports (id, reporter, reported, car_id, owner, thread, timestamp_ms, comment, messages_json, revised)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    report.id.to_string(),
                    report.reporter_id.to_string(),
                    report.reported_user_id.to_string(),
                    report.car_id.as_str(),
                    report.owner.to_string(),
                    report.thread.path(),
                    report.timestamp.timestamp_millis(),
                    report.comment,
                    messages_json,
                    report.revised,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_report(&self, id: Uuid) -> Result<Option<ModerationReport>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, reporter, reported, car_id, owner, thread, timestamp_ms, comment, messages_json, revised
                     FROM reports WHERE id = ?1",
                    [id.to_string()],
                    map_report_row,
                )
                .optional()?;
            row.map(ModerationReport::try_from).transpose()
        })
    }

    /// Newest first.
    pub fn list_reports(&self) -> Result<Vec<ModerationReport>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, reporter, reported, car_id, owner, thread, timestamp_ms, comment, messages_json, revised
                 FROM reports ORDER BY timestamp_ms DESC",
            )?;
            let rows = stmt
                .query_map([], map_report_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(ModerationReport::try_from).collect()
        })
    }

    pub fn mark_report_revised(&self, id: Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute("UPDATE reports SET revised = 1 WHERE id = ?1", [id.to_string()])?;
            Ok(updated > 0)
        })
    }

    // -- Device download ledger --

    pub fn get_download(&self, hash: &ContentHash) -> Result<Option<LocalDownloadRecord>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT hash, file_name, local_path, mime_type, source FROM local_downloads WHERE hash = ?1",
                    [hash.as_str()],
                    map_download_row,
                )
                .optional()?;
            row.map(LocalDownloadRecord::try_from).transpose()
        })
    }

    pub fn upsert_download(&self, record: &LocalDownloadRecord) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO local_downloads (hash, file_name, local_path, mime_type, source)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.hash.as_str(),
                    record.file_name,
                    record.local_path.to_string_lossy(),
                    record.mime_type,
                    record.source.as_str(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn delete_download(&self, hash: &ContentHash) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute("DELETE FROM local_downloads WHERE hash = ?1", [hash.as_str()])?;
            Ok(removed > 0)
        })
    }

    pub fn list_downloads(&self) -> Result<Vec<LocalDownloadRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT hash, file_name, local_path, mime_type, source FROM local_downloads ORDER BY created_at ASC",
            )?;
            let rows = stmt
                .query_map([], map_download_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(LocalDownloadRecord::try_from).collect()
        })
    }
}

fn map_message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        thread: row.get(1)?,
        car_id: row.get(2)?,
        sender: row.get(3)?,
        receiver: row.get(4)?,
        content: row.get(5)?,
        file_url: row.get(6)?,
        file_mime: row.get(7)?,
        file_category: row.get(8)?,
        file_name: row.get(9)?,
        file_size: row.get(10)?,
        file_hash: row.get(11)?,
        timestamp_ms: row.get(12)?,
        status: row.get(13)?,
    })
}

fn map_report_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReportRow> {
    Ok(ReportRow {
        id: row.get(0)?,
        reporter: row.get(1)?,
        reported: row.get(2)?,
        car_id: row.get(3)?,
        owner: row.get(4)?,
        thread: row.get(5)?,
        timestamp_ms: row.get(6)?,
        comment: row.get(7)?,
        messages_json: row.get(8)?,
        revised: row.get(9)?,
    })
}

fn map_download_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DownloadRow> {
    Ok(DownloadRow {
        hash: row.get(0)?,
        file_name: row.get(1)?,
        local_path: row.get(2)?,
        mime_type: row.get(3)?,
        source: row.get(4)?,
    })
}

fn query_message(conn: &Connection, id: &str) -> Result<Option<Message>> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM messages WHERE id = ?1", MESSAGE_COLUMNS),
            [id],
            map_message_row,
        )
        .optional()?;

    let Some(row) = row else {
        return Ok(None);
    };

    let mut stmt = conn.prepare("SELECT participant FROM message_deletions WHERE message_id = ?1")?;
    let deleted_for = stmt
        .query_map([id], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?
        .into_iter()
        .map(|p| p.parse::<Participant>())
        .collect::<std::result::Result<BTreeSet<_>, _>>()?;

    Ok(Some(row.into_message(deleted_for)?))
}

/// Batch-fetch deleted_for sets for every message in a thread.
fn query_thread_deletions(conn: &Connection, thread_path: &str) -> Result<HashMap<String, BTreeSet<Participant>>> {
    let mut stmt = conn.prepare(
        "SELECT d.message_id, d.participant
         FROM message_deletions d
         JOIN messages m ON m.id = d.message_id
         WHERE m.thread = ?1",
    )?;
    let pairs = stmt
        .query_map([thread_path], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut map: HashMap<String, BTreeSet<Participant>> = HashMap::new();
    for (message_id, participant) in pairs {
        map.entry(message_id).or_default().insert(participant.parse()?);
    }
    Ok(map)
}

fn query_file_references(conn: &Connection, hash: &str) -> Result<BTreeSet<Participant>> {
    let mut stmt = conn.prepare("SELECT participant FROM file_references WHERE hash = ?1")?;
    let users = stmt
        .query_map([hash], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    users
        .into_iter()
        .map(|p| p.parse::<Participant>().map_err(Into::into))
        .collect()
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use motorhub_types::{Attachment, CarId, FileCategory};

    fn text(thread: &ThreadKey, from: &str, to: &str, body: &str, offset_ms: i64) -> Message {
        Message {
            id: MessageId::new(),
            sender_id: Participant::user(from),
            receiver_id: Participant::user(to),
            content: Some(body.to_string()),
            attachment: None,
            timestamp: Utc::now() + Duration::milliseconds(offset_ms),
            status: MessageStatus::Sent,
            car_id: thread.car_id.clone(),
            deleted_for: BTreeSet::new(),
        }
    }

    fn hash(c: char) -> ContentHash {
        c.to_string().repeat(64).parse().unwrap()
    }

    #[test]
    fn test_thread_listing_is_ordered_and_scoped() {
        let db = Database::open_in_memory().unwrap();
        let t1 = ThreadKey::direct("s", "car1", "b").unwrap();
        let t2 = ThreadKey::direct("s", "car2", "b").unwrap();

        let late = text(&t1, "b", "s", "second", 50);
        let early = text(&t1, "s", "b", "first", 0);
        let other = text(&t2, "b", "s", "elsewhere", 10);
        db.insert_message(&t1, &late).unwrap();
        db.insert_message(&t1, &early).unwrap();
        db.insert_message(&t2, &other).unwrap();

        let listed = db.list_thread_messages(&t1).unwrap();
        let bodies: Vec<_> = listed.iter().map(|m| m.content.clone().unwrap()).collect();
        assert_eq!(bodies, vec!["first", "second"]);
        assert_eq!(db.count_thread_messages(&t2).unwrap(), 1);
    }

    #[test]
    fn test_status_only_leaves_sent_once() {
        let db = Database::open_in_memory().unwrap();
        let t = ThreadKey::direct("s", "car1", "b").unwrap();
        let m = text(&t, "b", "s", "hi", 0);
        db.insert_message(&t, &m).unwrap();

        let read = db.advance_message_status(m.id, MessageStatus::Read).unwrap().unwrap();
        assert_eq!(read.status, MessageStatus::Read);

        // A stale or conflicting write never clobbers a terminal status.
        assert!(db.advance_message_status(m.id, MessageStatus::Failed).unwrap().is_none());
        assert!(db.advance_message_status(m.id, MessageStatus::Sent).unwrap().is_none());
        assert_eq!(db.get_message(m.id).unwrap().unwrap().status, MessageStatus::Read);
    }

    #[test]
    fn test_deletions_only_grow() {
        let db = Database::open_in_memory().unwrap();
        let t = ThreadKey::direct("s", "car1", "b").unwrap();
        let mut m = text(&t, "b", "s", "hi", 0);
        m.deleted_for.insert(Participant::user("s"));
        db.insert_message(&t, &m).unwrap();

        assert!(db.add_message_deletion(m.id, &Participant::user("s")).unwrap().is_none());
        let updated = db.add_message_deletion(m.id, &Participant::user("b")).unwrap().unwrap();
        assert_eq!(updated.deleted_for.len(), 2);

        let listed = db.list_thread_messages(&t).unwrap();
        assert_eq!(listed[0].deleted_for, updated.deleted_for);
        assert!(db.add_message_deletion(MessageId::new(), &Participant::user("b")).unwrap().is_none());
    }

    #[test]
    fn test_attachment_columns_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        let t = ThreadKey::direct("s", "car1", "b").unwrap();
        let mut m = text(&t, "b", "s", "", 0);
        m.content = None;
        m.attachment = Some(Attachment {
            file_url: Some("mem://documents/aa/x".into()),
            mime_type: "application/pdf".into(),
            category: FileCategory::Document,
            file_name: "invoice.pdf".into(),
            file_size: 2048,
            hash: hash('a'),
        });
        db.insert_message(&t, &m).unwrap();
        assert_eq!(db.get_message(m.id).unwrap().unwrap(), m_with_millis(&m));
    }

    fn m_with_millis(m: &Message) -> Message {
        let mut copy = m.clone();
        copy.timestamp = crate::models::from_millis(m.timestamp.timestamp_millis()).unwrap();
        copy
    }

    #[test]
    fn test_file_references_union_idempotently() {
        let db = Database::open_in_memory().unwrap();
        let record = FileRecord {
            hash: hash('b'),
            url: "mem://images/bb/b".into(),
            size: 10,
            mime_type: "image/png".into(),
            category: FileCategory::Image,
            referencing_users: [Participant::user("a")].into_iter().collect(),
            created_at: Utc::now(),
        };
        assert!(db.insert_file_record(&record).unwrap());

        let mut racing = record.clone();
        racing.referencing_users = [Participant::user("c")].into_iter().collect();
        assert!(!db.insert_file_record(&racing).unwrap());

        assert!(!db.add_file_reference(&record.hash, &Participant::user("a")).unwrap());
        let stored = db.get_file_record(&record.hash).unwrap().unwrap();
        assert_eq!(stored.url, record.url);
        assert_eq!(
            stored.referencing_users,
            [Participant::user("a"), Participant::user("c")].into_iter().collect()
        );
    }

    #[test]
    fn test_blocks_are_scoped_per_car() {
        let db = Database::open_in_memory().unwrap();
        let relation = BlockRelation {
            blocker: Participant::user("b"),
            blocked: Participant::user("a"),
            car_id: CarId::new("car42"),
            created_at: Utc::now(),
        };
        assert!(db.insert_block(&relation).unwrap());
        assert!(!db.insert_block(&relation).unwrap());
        assert!(db.is_blocked(&relation.blocker, &relation.blocked, "car42").unwrap());
        assert!(!db.is_blocked(&relation.blocker, &relation.blocked, "car99").unwrap());
        assert!(!db.is_blocked(&relation.blocked, &relation.blocker, "car42").unwrap());
        assert_eq!(db.list_blocks(&relation.blocker, "car42").unwrap().len(), 1);
        assert!(db.remove_block(&relation.blocker, &relation.blocked, "car42").unwrap());
        assert!(!db.is_blocked(&relation.blocker, &relation.blocked, "car42").unwrap());
    }
}
