//! # GitHub Storage
//!
//! Keeps the catalog as a JSON file committed to a GitHub repository through
//! the Contents API. Every write is a commit.
//!
//! Writes carry the blob sha we last saw, so GitHub rejects them when someone
//! else committed in between. On such a conflict the backend fetches the
//! current sha and retries exactly once; the second rejection is reported as
//! [`StorageError::Conflict`].

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::traits::{SnapshotBackend, StorageError};
use crate::config::GithubConfig;
use crate::domain::models::catalog::CatalogSnapshot;

const API_VERSION_HEADER: &str = "X-GitHub-Api-Version";
const API_VERSION: &str = "2022-11-28";
const CLIENT_NAME: &str = "catalog-backend";
const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw";

#[derive(Debug, Deserialize)]
struct FileMeta {
    sha: String,
    #[serde(default)]
    content: String,
    /// "base64" for inline content; "none" when the file is too large to inline
    #[serde(default)]
    encoding: String,
}

#[derive(Debug, Serialize)]
struct Committer<'a> {
    name: &'a str,
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct PutFileRequest<'a> {
    message: String,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
    committer: Committer<'a>,
}

#[derive(Debug, Deserialize)]
struct PutFileResponse {
    content: PutFileContent,
}

#[derive(Debug, Deserialize)]
struct PutFileContent {
    sha: String,
}

enum PutOutcome {
    Written { sha: String },
    Conflict,
}

pub struct GithubBackend {
    client: Client,
    config: GithubConfig,
    contents_url: Url,
    last_sha: Mutex<Option<String>>,
}

impl GithubBackend {
    pub fn new(config: GithubConfig) -> Result<Self, StorageError> {
        let contents_url = contents_url(&config)?;
        let client = Client::builder()
            .user_agent(CLIENT_NAME)
            .build()
            .map_err(|e| StorageError::Unavailable(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            contents_url,
            last_sha: Mutex::new(None),
        })
    }

    fn request(&self, method: reqwest::Method, accept: &'static str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.contents_url.clone())
            .bearer_auth(&self.config.token)
            .header(ACCEPT, accept)
            .header(USER_AGENT, CLIENT_NAME)
            .header(API_VERSION_HEADER, API_VERSION)
    }

    async fn fetch_meta(&self) -> Result<Option<FileMeta>, StorageError> {
        let response = self
            .request(reqwest::Method::GET, JSON_MEDIA_TYPE)
            .query(&[("ref", self.config.branch.as_str())])
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => Err(StorageError::Unavailable(format!(
                "GitHub returned {} reading {}",
                status, self.config.path
            ))),
        }
    }

    /// Downloads the file body directly; used when the JSON listing does not inline it
    async fn fetch_raw(&self) -> Result<Vec<u8>, StorageError> {
        let response = self
            .request(reqwest::Method::GET, RAW_MEDIA_TYPE)
            .query(&[("ref", self.config.branch.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Unavailable(format!(
                "GitHub returned {} downloading {}",
                status, self.config.path
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn read_document(&self, meta: &FileMeta) -> Result<CatalogSnapshot, StorageError> {
        if meta.encoding == "base64" {
            return decode_content(&meta.content);
        }

        debug!(encoding = %meta.encoding, path = %self.config.path, "Catalog not inlined, downloading raw file");
        parse_document(&self.fetch_raw().await?)
    }

    async fn put_file(&self, content: &str, sha: Option<String>) -> Result<PutOutcome, StorageError> {
        let body = PutFileRequest {
            message: format!("chore(data): update catalog at {}", Utc::now().to_rfc3339()),
            content: content.to_string(),
            branch: &self.config.branch,
            sha,
            committer: Committer {
                name: &self.config.committer_name,
                email: &self.config.committer_email,
            },
        };

        let response = self
            .request(reqwest::Method::PUT, JSON_MEDIA_TYPE)
            .json(&body)
            .send()
            .await?;

        match response.status() {
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => Ok(PutOutcome::Conflict),
            status if status.is_success() => {
                let written: PutFileResponse = response.json().await?;
                Ok(PutOutcome::Written {
                    sha: written.content.sha,
                })
            }
            status => Err(StorageError::Unavailable(format!(
                "GitHub returned {} writing {}",
                status, self.config.path
            ))),
        }
    }
}

fn contents_url(config: &GithubConfig) -> Result<Url, StorageError> {
    let invalid = |reason: &str| StorageError::Unavailable(format!("invalid GitHub API URL: {}", reason));

    let mut url = Url::parse(&config.api_url).map_err(|e| invalid(&e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| invalid("cannot be a base"))?
        .pop_if_empty()
        .push("repos")
        .extend(config.repo.split('/').filter(|segment| !segment.is_empty()))
        .push("contents")
        .extend(config.path.split('/').filter(|segment| !segment.is_empty()));
    Ok(url)
}

fn decode_content(encoded: &str) -> Result<CatalogSnapshot, StorageError> {
    // GitHub wraps the base64 payload at 60 columns
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| StorageError::Unavailable(format!("catalog content is not valid base64: {}", e)))?;
    parse_document(&bytes)
}

fn parse_document(bytes: &[u8]) -> Result<CatalogSnapshot, StorageError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(CatalogSnapshot::default());
    }
    serde_json::from_slice(bytes)
        .map_err(|e| StorageError::Unavailable(format!("catalog content is not a valid catalog: {}", e)))
}

#[async_trait]
impl SnapshotBackend for GithubBackend {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn fetch(&self) -> Result<Option<CatalogSnapshot>, StorageError> {
        let meta = self.fetch_meta().await?;
        let mut last_sha = self.last_sha.lock().await;

        match meta {
            None => {
                info!(repo = %self.config.repo, path = %self.config.path, "Catalog file not found on GitHub");
                *last_sha = None;
                Ok(None)
            }
            Some(meta) => {
                let snapshot = self.read_document(&meta).await?;
                *last_sha = Some(meta.sha);
                Ok(Some(snapshot))
            }
        }
    }

    async fn persist(&self, snapshot: &CatalogSnapshot) -> Result<(), StorageError> {
        let content = STANDARD.encode(serde_json::to_vec_pretty(snapshot)?);
        let mut last_sha = self.last_sha.lock().await;

        let sha = match self.put_file(&content, last_sha.clone()).await? {
            PutOutcome::Written { sha } => sha,
            PutOutcome::Conflict => {
                warn!(repo = %self.config.repo, "Catalog changed on GitHub, retrying with a fresh sha");
                let fresh_sha = self.fetch_meta().await?.map(|meta| meta.sha);
                match self.put_file(&content, fresh_sha).await? {
                    PutOutcome::Written { sha } => sha,
                    PutOutcome::Conflict => {
                        return Err(StorageError::Conflict(format!(
                            "{} in {} was modified concurrently",
                            self.config.path, self.config.repo
                        )))
                    }
                }
            }
        };

        debug!(sha = %sha, "Catalog committed to GitHub");
        *last_sha = Some(sha);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::catalog::SettingsChange;
    use crate::storage::snapshot::SnapshotStorage;
    use crate::storage::traits::CatalogStorage;
    use axum::extract::State;
    use axum::http::{header, HeaderMap, StatusCode as AxumStatus};
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::Arc;

    /// In-process stand-in for the Contents API of one file
    #[derive(Default)]
    struct FakeRepo {
        file: Option<(String, String)>,
        commits: u64,
        put_attempts: u64,
        reject_all_writes: bool,
        /// Serve the listing the way GitHub does for files over 1 MB
        oversized: bool,
        raw_downloads: u64,
    }

    type SharedRepo = Arc<std::sync::Mutex<FakeRepo>>;

    async fn get_file(State(repo): State<SharedRepo>, headers: HeaderMap) -> Response {
        let mut repo = repo.lock().unwrap();
        let wants_raw = headers
            .get(header::ACCEPT)
            .and_then(|value| value.to_str().ok())
            == Some(RAW_MEDIA_TYPE);

        let Some((sha, content)) = repo.file.clone() else {
            return (AxumStatus::NOT_FOUND, Json(json!({ "message": "Not Found" }))).into_response();
        };

        if wants_raw {
            repo.raw_downloads += 1;
            return STANDARD.decode(content).unwrap().into_response();
        }
        if repo.oversized {
            return Json(json!({ "sha": sha, "content": "", "encoding": "none" })).into_response();
        }
        Json(json!({ "sha": sha, "content": content, "encoding": "base64" })).into_response()
    }

    async fn put_file(State(repo): State<SharedRepo>, Json(body): Json<Value>) -> Response {
        let mut repo = repo.lock().unwrap();
        repo.put_attempts += 1;

        let given_sha = body["sha"].as_str().map(str::to_string);
        let current_sha = repo.file.as_ref().map(|(sha, _)| sha.clone());
        if repo.reject_all_writes || given_sha != current_sha {
            return (AxumStatus::CONFLICT, Json(json!({ "message": "sha mismatch" }))).into_response();
        }

        repo.commits += 1;
        let sha = format!("sha-{}", repo.commits);
        let content = body["content"].as_str().unwrap_or_default().to_string();
        repo.file = Some((sha.clone(), content));
        (AxumStatus::CREATED, Json(json!({ "content": { "sha": sha } }))).into_response()
    }

    async fn start_fake_github(repo: SharedRepo) -> String {
        let app = Router::new()
            .route("/repos/:owner/:name/contents/*path", get(get_file).put(put_file))
            .with_state(repo);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn github_config(api_url: String) -> GithubConfig {
        GithubConfig {
            token: "test-token".to_string(),
            repo: "acme/catalog-data".to_string(),
            branch: "main".to_string(),
            path: "data/catalogo.json".to_string(),
            committer_name: "Catalog Bot".to_string(),
            committer_email: "bot@example.com".to_string(),
            api_url,
        }
    }

    fn stored_snapshot(repo: &SharedRepo) -> CatalogSnapshot {
        let repo = repo.lock().unwrap();
        let (_, content) = repo.file.as_ref().unwrap();
        decode_content(content).unwrap()
    }

    async fn setup_test() -> (SnapshotStorage<GithubBackend>, SharedRepo, String) {
        let repo = SharedRepo::default();
        let api_url = start_fake_github(repo.clone()).await;
        let storage = SnapshotStorage::new(GithubBackend::new(github_config(api_url.clone())).unwrap());
        storage.load().await.unwrap();
        (storage, repo, api_url)
    }

    #[test]
    fn test_contents_url_layout() {
        let url = contents_url(&github_config("https://api.github.com".to_string())).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/acme/catalog-data/contents/data/catalogo.json"
        );
    }

    #[test]
    fn test_decode_content_ignores_line_wrapping() {
        let encoded = STANDARD.encode(r#"{"products":[],"settings":{"categoriesOrder":["Drinks"]}}"#);
        let (head, tail) = encoded.split_at(10);
        let wrapped = format!("{}\n{}\n", head, tail);

        let snapshot = decode_content(&wrapped).unwrap();
        assert_eq!(snapshot.settings.categories_order, vec!["Drinks".to_string()]);
        assert!(snapshot.settings.show_prices);
    }

    #[tokio::test]
    async fn test_load_creates_missing_file() {
        let (storage, repo, _) = setup_test().await;

        assert_eq!(repo.lock().unwrap().commits, 1);
        assert_eq!(stored_snapshot(&repo), CatalogSnapshot::default());
        assert_eq!(storage.backend_name(), "github");
    }

    fn hide_prices() -> SettingsChange {
        SettingsChange {
            show_prices: Some(false),
            ..SettingsChange::default()
        }
    }

    #[test]
    fn test_invalid_document_is_not_an_empty_catalog() {
        let encoded = STANDARD.encode("{ truncated");
        assert!(matches!(decode_content(&encoded), Err(StorageError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_writes_are_visible_to_a_new_instance() {
        let (storage, repo, api_url) = setup_test().await;
        let settings = storage
            .update_settings(SettingsChange {
                categories_order: Some(vec!["Drinks".to_string()]),
                ..SettingsChange::default()
            })
            .await
            .unwrap();

        assert_eq!(stored_snapshot(&repo).settings, settings);

        let reopened = SnapshotStorage::new(GithubBackend::new(github_config(api_url)).unwrap());
        reopened.load().await.unwrap();
        assert_eq!(reopened.get_settings().await.unwrap(), settings);
    }

    #[tokio::test]
    async fn test_conflict_is_retried_once_with_fresh_sha() {
        let (storage, repo, _) = setup_test().await;

        {
            // someone else commits behind our back
            let mut repo = repo.lock().unwrap();
            let content = repo.file.as_ref().unwrap().1.clone();
            repo.file = Some(("sha-external".to_string(), content));
        }

        storage.update_settings(hide_prices()).await.unwrap();

        let attempts = repo.lock().unwrap().put_attempts;
        assert_eq!(attempts, 3);
        assert!(!stored_snapshot(&repo).settings.show_prices);
    }

    #[tokio::test]
    async fn test_second_conflict_surfaces_and_keeps_cache() {
        let (storage, repo, _) = setup_test().await;
        repo.lock().unwrap().reject_all_writes = true;

        let result = storage.update_settings(hide_prices()).await;

        assert!(matches!(result, Err(StorageError::Conflict(_))));
        assert!(storage.get_settings().await.unwrap().show_prices);
        assert_eq!(repo.lock().unwrap().put_attempts, 3);
    }

    #[tokio::test]
    async fn test_oversized_file_is_downloaded_raw() {
        let (storage, repo, api_url) = setup_test().await;
        storage
            .update_settings(SettingsChange {
                categories_order: Some(vec!["Drinks".to_string()]),
                show_prices: Some(false),
            })
            .await
            .unwrap();
        repo.lock().unwrap().oversized = true;

        let reopened = SnapshotStorage::new(GithubBackend::new(github_config(api_url)).unwrap());
        reopened.load().await.unwrap();

        let settings = reopened.get_settings().await.unwrap();
        assert_eq!(settings.categories_order, vec!["Drinks"]);
        assert!(!settings.show_prices);
        assert_eq!(repo.lock().unwrap().raw_downloads, 1);

        // the next write must build on the downloaded document, not an empty one
        reopened.update_settings(hide_prices()).await.unwrap();
        assert_eq!(stored_snapshot(&repo).settings.categories_order, vec!["Drinks"]);
    }

    #[tokio::test]
    async fn test_unreachable_api_fails_load() {
        let storage = SnapshotStorage::new(
            GithubBackend::new(github_config("http://127.0.0.1:9".to_string())).unwrap(),
        );

        assert!(matches!(storage.load().await, Err(StorageError::Unavailable(_))));
    }
}
