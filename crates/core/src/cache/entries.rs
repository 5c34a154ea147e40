//! SQLite implementation of [`CacheStorage`].
//!
//! Generations are rows in `generations`; entries reference their generation
//! and are removed with it.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};
use tokio_rusqlite::params;

use super::CacheStorage;
use super::connection::CacheDb;
use super::hash::compute_entry_key;
use crate::Error;
use crate::http::{Request, Response};

/// Owned copy of what an entry write needs, so it can move onto the
/// database thread.
struct EntryRow {
    key_hash: String,
    method: String,
    url: String,
    status: u16,
    headers_json: String,
    body: Bytes,
}

impl EntryRow {
    fn new(request: &Request, response: &Response) -> Result<Self, Error> {
        let url = request.cache_url();
        let headers_json = serde_json::to_string(&response.headers).map_err(|e| Error::CorruptEntry(e.to_string()))?;
        Ok(Self {
            key_hash: compute_entry_key(&request.method, &url),
            method: request.method.clone(),
            url,
            status: response.status,
            headers_json,
            body: response.body.clone(),
        })
    }
}

fn ensure_generation(conn: &rusqlite::Connection, name: &str, now: &str) -> Result<i64, Error> {
    conn.execute(
        "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
        params![name, now],
    )?;
    let id = conn.query_row("SELECT id FROM generations WHERE name = ?1", params![name], |row| row.get(0))?;
    Ok(id)
}

fn insert_entry(conn: &rusqlite::Connection, generation_id: i64, row: &EntryRow, now: &str) -> Result<(), Error> {
    conn.execute(
        "INSERT INTO entries (generation_id, key_hash, method, url, status, headers_json, body, stored_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(generation_id, key_hash) DO UPDATE SET
            status = excluded.status,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            generation_id,
            &row.key_hash,
            &row.method,
            &row.url,
            row.status,
            &row.headers_json,
            &row.body[..],
            now,
        ],
    )?;
    Ok(())
}

fn decode_response(status: u16, headers_json: &str, body: Vec<u8>) -> Result<Response, Error> {
    let headers: BTreeMap<String, String> =
        serde_json::from_str(headers_json).map_err(|e| Error::CorruptEntry(e.to_string()))?;
    Ok(Response { status, headers, body: Bytes::from(body) })
}

type RawEntry = (u16, String, Vec<u8>);

fn raw_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawEntry> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, generation: &str) -> Result<(), Error> {
        let name = generation.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                ensure_generation(conn, &name, &now)?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM generations ORDER BY id")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, generation: &str) -> Result<bool, Error> {
        let name = generation.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM generations WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn match_in(&self, generation: &str, request: &Request) -> Result<Option<Response>, Error> {
        let name = generation.to_string();
        let key_hash = compute_entry_key(&request.method, &request.cache_url());
        self.conn
            .call(move |conn| -> Result<Option<Response>, Error> {
                let raw = conn
                    .query_row(
                        "SELECT e.status, e.headers_json, e.body
                         FROM entries e JOIN generations g ON g.id = e.generation_id
                         WHERE g.name = ?1 AND e.key_hash = ?2",
                        params![name, key_hash],
                        raw_entry,
                    )
                    .optional()?;

                raw.map(|(status, headers, body)| decode_response(status, &headers, body))
                    .transpose()
            })
            .await
            .map_err(Error::from)
    }

    async fn match_any(&self, request: &Request) -> Result<Option<Response>, Error> {
        let key_hash = compute_entry_key(&request.method, &request.cache_url());
        self.conn
            .call(move |conn| -> Result<Option<Response>, Error> {
                let raw = conn
                    .query_row(
                        "SELECT e.status, e.headers_json, e.body
                         FROM entries e JOIN generations g ON g.id = e.generation_id
                         WHERE e.key_hash = ?1
                         ORDER BY g.id
                         LIMIT 1",
                        params![key_hash],
                        raw_entry,
                    )
                    .optional()?;

                raw.map(|(status, headers, body)| decode_response(status, &headers, body))
                    .transpose()
            })
            .await
            .map_err(Error::from)
    }

    async fn put(&self, generation: &str, request: &Request, response: &Response) -> Result<(), Error> {
        let name = generation.to_string();
        let row = EntryRow::new(request, response)?;
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.unchecked_transaction()?;
                let generation_id = ensure_generation(&tx, &name, &now)?;
                insert_entry(&tx, generation_id, &row, &now)?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn put_all(&self, generation: &str, entries: &[(Request, Response)]) -> Result<(), Error> {
        let name = generation.to_string();
        let rows = entries
            .iter()
            .map(|(request, response)| EntryRow::new(request, response))
            .collect::<Result<Vec<_>, _>>()?;
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.unchecked_transaction()?;
                let generation_id = ensure_generation(&tx, &name, &now)?;
                for row in &rows {
                    insert_entry(&tx, generation_id, row, &now)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn entry_count(&self, generation: &str) -> Result<u64, Error> {
        let name = generation.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM entries e JOIN generations g ON g.id = e.generation_id WHERE g.name = ?1",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

impl CacheDb {
    /// Delete entries of one generation stored more than `days` days ago.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_entries_older_than(&self, generation: &str, days: i64) -> Result<u64, Error> {
        if days < 0 {
            return Err(Error::InvalidInput("days must not be negative".into()));
        }
        // A cutoff before the representable range means nothing is old enough.
        let Some(cutoff) = chrono::Duration::try_days(days).and_then(|age| chrono::Utc::now().checked_sub_signed(age))
        else {
            return Ok(0);
        };
        let name = generation.to_string();
        let cutoff = cutoff.to_rfc3339();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute(
                    "DELETE FROM entries
                     WHERE stored_at < ?2
                     AND generation_id = (SELECT id FROM generations WHERE name = ?1)",
                    params![name, cutoff],
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn request(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    fn html(body: &str) -> Response {
        Response::new(200, body.to_string()).with_header("Content-Type", "text/html")
    }

    #[tokio::test]
    async fn test_put_and_match_in() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let req = request("https://example.com/index.html");

        db.put("app-static-v1", &req, &html("<h1>hi</h1>")).await.unwrap();

        let hit = db.match_in("app-static-v1", &req).await.unwrap().unwrap();
        assert_eq!(hit.status, 200);
        assert_eq!(hit.content_type(), Some("text/html"));
        assert_eq!(hit.text(), Some("<h1>hi</h1>"));

        assert!(db.match_in("app-dynamic-v1", &req).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_match_ignores_fragment() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put("app-static-v1", &request("https://example.com/page"), &html("page"))
            .await
            .unwrap();

        let hit = db.match_any(&request("https://example.com/page#section")).await.unwrap();
        assert!(hit.is_some());
    }

    #[tokio::test]
    async fn test_match_any_prefers_oldest_generation() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let req = request("https://example.com/app.js");
        db.put("app-static-v1", &req, &html("static")).await.unwrap();
        db.put("app-dynamic-v1", &req, &html("dynamic")).await.unwrap();

        let hit = db.match_any(&req).await.unwrap().unwrap();
        assert_eq!(hit.text(), Some("static"));
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let req = request("https://example.com/data.json");
        db.put("app-dynamic-v1", &req, &html("old")).await.unwrap();
        db.put("app-dynamic-v1", &req, &html("new")).await.unwrap();

        let hit = db.match_in("app-dynamic-v1", &req).await.unwrap().unwrap();
        assert_eq!(hit.text(), Some("new"));
        assert_eq!(db.entry_count("app-dynamic-v1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_keys_in_creation_order() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open("app-static-v2").await.unwrap();
        db.open("app-dynamic-v2").await.unwrap();
        db.open("app-static-v2").await.unwrap();

        assert_eq!(db.keys().await.unwrap(), vec!["app-static-v2", "app-dynamic-v2"]);
    }

    #[tokio::test]
    async fn test_delete_cascades_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let req = request("https://example.com/");
        db.put("app-static-v1", &req, &html("root")).await.unwrap();

        assert!(db.delete("app-static-v1").await.unwrap());
        assert!(!db.delete("app-static-v1").await.unwrap());
        assert!(db.match_any(&req).await.unwrap().is_none());
        assert_eq!(db.entry_count("app-static-v1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_put_all() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let entries = vec![
            (request("https://example.com/"), html("root")),
            (request("https://example.com/main.css"), html("css")),
        ];

        db.put_all("app-static-v1", &entries).await.unwrap();

        assert_eq!(db.entry_count("app-static-v1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_binary_body_survives() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let req = request("https://example.com/logo.jpg");
        let jpeg = Response::new(200, vec![0xff, 0xd8, 0xff, 0xe0, 0x00]).with_header("content-type", "image/jpeg");
        db.put("app-static-v1", &req, &jpeg).await.unwrap();

        let hit = db.match_any(&req).await.unwrap().unwrap();
        assert_eq!(hit, jpeg);
    }

    #[tokio::test]
    async fn test_purge_entries_older_than() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put("app-dynamic-v1", &request("https://example.com/a"), &html("a"))
            .await
            .unwrap();
        db.conn
            .call(|conn| {
                conn.execute(
                    "UPDATE entries SET stored_at = '2000-01-01T00:00:00+00:00' WHERE url = 'https://example.com/a'",
                    [],
                )
            })
            .await
            .unwrap();
        db.put("app-dynamic-v1", &request("https://example.com/b"), &html("b"))
            .await
            .unwrap();

        let deleted = db.purge_entries_older_than("app-dynamic-v1", 7).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(db.entry_count("app-dynamic-v1").await.unwrap(), 1);

        assert!(db.purge_entries_older_than("app-dynamic-v1", -1).await.is_err());
    }

    #[tokio::test]
    async fn test_purge_entries_with_huge_age_deletes_nothing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put("app-dynamic-v1", &request("https://example.com/a"), &html("a"))
            .await
            .unwrap();

        assert_eq!(db.purge_entries_older_than("app-dynamic-v1", i64::MAX).await.unwrap(), 0);
        assert_eq!(db.purge_entries_older_than("app-dynamic-v1", 1_000_000_000_000).await.unwrap(), 0);
        assert_eq!(db.entry_count("app-dynamic-v1").await.unwrap(), 1);
    }
}
