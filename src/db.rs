use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

pub const DB_PATH: &str = "data/wod.sqlite";

/// One post as fetched from the API, with the rendered HTML body intact.
#[derive(Debug, Clone)]
pub struct RawPostRow {
    pub id: i64,
    pub slug: String,
    pub link: String,
    pub title: String,
    /// Site-local publish timestamp, `%Y-%m-%dT%H:%M:%S`.
    pub published: Option<String>,
    pub content: String,
}

#[derive(Debug)]
pub struct Stats {
    pub posts: u64,
    pub with_comments: u64,
    pub first_published: Option<String>,
    pub last_published: Option<String>,
}

pub fn connect(path: &str) -> Result<Connection> {
    if let Some(dir) = Path::new(path).parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
        }
    }
    let conn = Connection::open(path).with_context(|| format!("opening {}", path))?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS raw_posts (
            id         INTEGER PRIMARY KEY,
            slug       TEXT NOT NULL,
            link       TEXT NOT NULL,
            title      TEXT NOT NULL,
            published  TEXT,
            content    TEXT NOT NULL,
            fetched_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE TABLE IF NOT EXISTS comment_counts (
            post_id    INTEGER PRIMARY KEY,
            count      INTEGER NOT NULL,
            fetched_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )
    .context("initializing schema")?;
    Ok(())
}

/// Upsert a batch of fetched posts. Returns the number written.
pub fn insert_raw_posts(conn: &Connection, rows: &[RawPostRow]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut written = 0usize;
    {
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO raw_posts (id, slug, link, title, published, content)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for row in rows {
            stmt.execute(params![
                row.id,
                row.slug,
                row.link,
                row.title,
                row.published,
                row.content
            ])?;
            written += 1;
        }
    }
    tx.commit()?;
    Ok(written)
}

pub fn fetch_raw_posts(conn: &Connection, limit: Option<usize>) -> Result<Vec<RawPostRow>> {
    let sql = match limit {
        Some(n) => format!(
            "SELECT id, slug, link, title, published, content FROM raw_posts ORDER BY id LIMIT {}",
            n
        ),
        None => {
            "SELECT id, slug, link, title, published, content FROM raw_posts ORDER BY id".to_string()
        }
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |r| {
            Ok(RawPostRow {
                id: r.get(0)?,
                slug: r.get(1)?,
                link: r.get(2)?,
                title: r.get(3)?,
                published: r.get(4)?,
                content: r.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Post ids that have no cached comment count yet.
pub fn fetch_posts_missing_comments(conn: &Connection, limit: Option<usize>) -> Result<Vec<i64>> {
    let sql = match limit {
        Some(n) => format!(
            "SELECT p.id FROM raw_posts p
             LEFT JOIN comment_counts c ON c.post_id = p.id
             WHERE c.post_id IS NULL ORDER BY p.id LIMIT {}",
            n
        ),
        None => "SELECT p.id FROM raw_posts p
             LEFT JOIN comment_counts c ON c.post_id = p.id
             WHERE c.post_id IS NULL ORDER BY p.id"
            .to_string(),
    };
    let mut stmt = conn.prepare(&sql)?;
    let ids = stmt
        .query_map([], |r| r.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

pub fn upsert_comment_count(conn: &Connection, post_id: i64, count: u32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO comment_counts (post_id, count) VALUES (?1, ?2)",
        params![post_id, count],
    )?;
    Ok(())
}

pub fn fetch_comment_counts(conn: &Connection) -> Result<HashMap<i64, u32>> {
    let mut stmt = conn.prepare("SELECT post_id, count FROM comment_counts")?;
    let mut map = HashMap::new();
    let rows = stmt.query_map([], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, u32>(1)?)))?;
    for row in rows {
        let (id, count) = row?;
        map.insert(id, count);
    }
    Ok(map)
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let posts: u64 = conn.query_row("SELECT COUNT(*) FROM raw_posts", [], |r| r.get(0))?;
    let with_comments: u64 =
        conn.query_row("SELECT COUNT(*) FROM comment_counts", [], |r| r.get(0))?;
    let (first_published, last_published) = conn.query_row(
        "SELECT MIN(published), MAX(published) FROM raw_posts",
        [],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;
    Ok(Stats {
        posts,
        with_comments,
        first_published,
        last_published,
    })
}
