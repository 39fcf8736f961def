use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Client, StatusCode};
use rusqlite::Connection;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::db::{self, RawPostRow};

const POSTS_URL: &str = "https://www.crossfitsouthbrooklyn.com/wp-json/wp/v2/posts";
const COMMENTS_URL: &str = "https://www.crossfitsouthbrooklyn.com/wp-json/wp/v2/comments";
/// The blog's "Workout of the Day" category.
const WOD_CATEGORY: u32 = 1;
const USER_AGENT: &str = "wod-etl/0.1 (archive tooling)";

const CONCURRENCY: usize = 8;
const PAGE_PAUSE_MS: u64 = 500;
const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;

#[derive(Deserialize)]
struct Rendered {
    rendered: String,
}

#[derive(Deserialize)]
struct WpPost {
    id: i64,
    date: Option<String>,
    slug: String,
    link: String,
    title: Rendered,
    content: Rendered,
}

impl WpPost {
    fn into_row(self) -> RawPostRow {
        RawPostRow {
            id: self.id,
            slug: self.slug,
            link: self.link,
            title: self.title.rendered,
            published: self.date,
            content: self.content.rendered,
        }
    }
}

fn client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(30))
        .build()
        .context("building http client")
}

/// Page through the posts endpoint, oldest-first isn't guaranteed so rows are
/// keyed by id and upserted by the caller. Stops at `max_pages` when set, at
/// the reported page count, or at the API's out-of-range error.
pub async fn fetch_posts(per_page: u32, max_pages: Option<u32>) -> Result<Vec<RawPostRow>> {
    let client = client()?;
    let mut rows: Vec<RawPostRow> = Vec::new();
    let mut total_pages: Option<u32> = None;
    let mut page = 1u32;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner} page {msg}")?);

    loop {
        if let Some(max) = max_pages {
            if page > max {
                break;
            }
        }
        if let Some(total) = total_pages {
            if page > total {
                break;
            }
        }
        pb.set_message(format!("{} ({} posts)", page, rows.len()));

        let resp = client
            .get(POSTS_URL)
            .query(&[
                ("categories", WOD_CATEGORY.to_string()),
                ("per_page", per_page.to_string()),
                ("page", page.to_string()),
            ])
            .send()
            .await
            .with_context(|| format!("requesting posts page {}", page))?;

        if resp.status() == StatusCode::BAD_REQUEST {
            // Past the last page; the API reports this as a 400.
            let body = resp.text().await.unwrap_or_default();
            if body.contains("rest_post_invalid_page_number") {
                break;
            }
            bail!("posts page {} rejected: {}", page, body);
        }
        if !resp.status().is_success() {
            bail!("posts page {} failed with {}", page, resp.status());
        }

        if total_pages.is_none() {
            total_pages = resp
                .headers()
                .get("X-WP-TotalPages")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
        }

        let posts: Vec<WpPost> = resp
            .json()
            .await
            .with_context(|| format!("decoding posts page {}", page))?;
        if posts.is_empty() {
            break;
        }
        rows.extend(posts.into_iter().map(WpPost::into_row));

        page += 1;
        tokio::time::sleep(Duration::from_millis(PAGE_PAUSE_MS)).await;
    }

    pb.finish_and_clear();
    info!("fetched {} posts over {} pages", rows.len(), page - 1);
    Ok(rows)
}

struct CommentCountRow {
    post_id: i64,
    count: Option<u32>,
    error: Option<String>,
}

pub struct CommentFetchStats {
    pub total: usize,
    pub ok: usize,
    pub errors: usize,
}

/// Fetch per-post comment counts concurrently, caching each as it arrives.
/// The count comes from the X-WP-Total header of a 1-item comments query.
pub async fn fetch_comment_counts_streaming(
    conn: &Connection,
    post_ids: Vec<i64>,
) -> Result<CommentFetchStats> {
    let client = Arc::new(client()?);
    let semaphore = Arc::new(Semaphore::new(CONCURRENCY));
    let total = post_ids.len();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    // Channel: workers send results, main loop saves to DB.
    let (tx, mut rx) = tokio::sync::mpsc::channel::<CommentCountRow>(CONCURRENCY * 2);

    for post_id in post_ids {
        let client = Arc::clone(&client);
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let _permit = match sem.acquire().await {
                Ok(p) => p,
                Err(_) => return,
            };
            let row = match fetch_count_with_retry(&client, post_id).await {
                Ok(count) => CommentCountRow {
                    post_id,
                    count: Some(count),
                    error: None,
                },
                Err(e) => CommentCountRow {
                    post_id,
                    count: None,
                    error: Some(e.to_string()),
                },
            };
            let _ = tx.send(row).await;
        });
    }

    // Drop our copy of tx so rx closes when all spawned tasks finish.
    drop(tx);

    let mut ok = 0usize;
    let mut errors = 0usize;

    while let Some(row) = rx.recv().await {
        match (row.count, row.error) {
            (Some(count), _) => {
                db::upsert_comment_count(conn, row.post_id, count)?;
                ok += 1;
            }
            (None, err) => {
                warn!("comment count for post {} failed: {:?}", row.post_id, err);
                errors += 1;
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!("comment counts: {} fetched, {} errors of {}", ok, errors, total);
    Ok(CommentFetchStats { total, ok, errors })
}

async fn fetch_count_with_retry(client: &Client, post_id: i64) -> Result<u32> {
    for attempt in 0..MAX_RETRIES {
        match fetch_one_count(client, post_id).await {
            Ok(count) => return Ok(count),
            Err(e) => {
                let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
                warn!(
                    "comment count for {} failed (attempt {}/{}): {:#}; backing off {:.1}s",
                    post_id,
                    attempt + 1,
                    MAX_RETRIES,
                    e,
                    backoff.as_secs_f64()
                );
                tokio::time::sleep(backoff).await;
            }
        }
    }
    fetch_one_count(client, post_id).await
}

async fn fetch_one_count(client: &Client, post_id: i64) -> Result<u32> {
    let resp = client
        .get(COMMENTS_URL)
        .query(&[("post", post_id.to_string()), ("per_page", "1".to_string())])
        .send()
        .await
        .with_context(|| format!("requesting comments for post {}", post_id))?;
    if !resp.status().is_success() {
        bail!("comments query for {} failed with {}", post_id, resp.status());
    }
    let count = resp
        .headers()
        .get("X-WP-Total")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    Ok(count)
}
