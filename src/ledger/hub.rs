//! Ledger stored as a file in a Hugging Face Hub repository.
//!
//! Reads go through the `resolve` download endpoint; writes are single-file
//! commits through the NDJSON commit API.

use super::store::LedgerStore;
use crate::error::{Result, TrendError};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_ENDPOINT: &str = "https://huggingface.co";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(60);
const WRITE_TIMEOUT: Duration = Duration::from_secs(60);
const USER_AGENT: &str = concat!("quality-trend/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RepoType {
    #[default]
    Space,
    Dataset,
    Model,
}

impl RepoType {
    /// Path segment used by the download URLs (models have none).
    fn url_prefix(self) -> &'static str {
        match self {
            RepoType::Space => "spaces/",
            RepoType::Dataset => "datasets/",
            RepoType::Model => "",
        }
    }

    fn api_segment(self) -> &'static str {
        match self {
            RepoType::Space => "spaces",
            RepoType::Dataset => "datasets",
            RepoType::Model => "models",
        }
    }
}

impl std::fmt::Display for RepoType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RepoType::Space => "space",
            RepoType::Dataset => "dataset",
            RepoType::Model => "model",
        })
    }
}

pub struct HubStore {
    endpoint: String,
    repo_id: String,
    repo_type: RepoType,
    path: String,
    revision: String,
    token: Option<String>,
    agent: ureq::Agent,
}

#[derive(Serialize)]
#[serde(tag = "key", content = "value", rename_all = "lowercase")]
enum CommitLine<'a> {
    Header { summary: &'a str, description: &'a str },
    File { content: String, path: &'a str, encoding: &'a str },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitResponse {
    commit_oid: String,
}

impl HubStore {
    pub fn new(repo_id: &str, repo_type: RepoType, path: &str, revision: &str) -> Result<Self> {
        if repo_id.split('/').filter(|s| !s.is_empty()).count() != 2 {
            return Err(TrendError::Configuration(format!(
                "hub repo must look like 'owner/name', got '{repo_id}'"
            )));
        }
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(READ_TIMEOUT)
            .timeout_write(WRITE_TIMEOUT)
            .user_agent(USER_AGENT)
            .build();
        Ok(HubStore {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            repo_id: repo_id.to_string(),
            repo_type,
            path: path.trim_start_matches('/').to_string(),
            revision: revision.to_string(),
            token: None,
            agent,
        })
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    fn download_url(&self) -> String {
        format!(
            "{}/{}{}/resolve/{}/{}",
            self.endpoint,
            self.repo_type.url_prefix(),
            self.repo_id,
            encode_segment(&self.revision),
            self.path
        )
    }

    fn commit_url(&self) -> String {
        format!(
            "{}/api/{}/{}/commit/{}",
            self.endpoint,
            self.repo_type.api_segment(),
            self.repo_id,
            encode_segment(&self.revision)
        )
    }

    fn authorized(&self, request: ureq::Request) -> ureq::Request {
        match &self.token {
            Some(token) => request.set("Authorization", &format!("Bearer {token}")),
            None => request,
        }
    }
}

/// Branch names may contain `/`, which must not split the URL path.
fn encode_segment(value: &str) -> String {
    value.replace('%', "%25").replace('/', "%2F")
}

fn commit_body(message: &str, path: &str, content: &str) -> Result<String> {
    let lines = [
        CommitLine::Header { summary: message, description: "" },
        CommitLine::File {
            content: base64::engine::general_purpose::STANDARD.encode(content.as_bytes()),
            path,
            encoding: "base64",
        },
    ];
    let mut body = String::new();
    for line in &lines {
        let json = serde_json::to_string(line)
            .map_err(|e| TrendError::RemoteStore(format!("cannot encode commit: {e}")))?;
        body.push_str(&json);
        body.push('\n');
    }
    Ok(body)
}

fn status_error(action: &str, code: u16, response: ureq::Response) -> TrendError {
    let body = response.into_string().unwrap_or_default();
    TrendError::RemoteStore(format!("{action} failed with HTTP {code}: {}", body.trim()))
}

impl LedgerStore for HubStore {
    fn read(&self) -> Result<Option<String>> {
        let url = self.download_url();
        debug!(url = %url, "downloading ledger");
        match self.authorized(self.agent.get(&url)).call() {
            Ok(response) => response
                .into_string()
                .map(Some)
                .map_err(|e| TrendError::RemoteStore(format!("reading {url}: {e}"))),
            Err(ureq::Error::Status(404, response)) => {
                // A missing file is an empty ledger; a missing repo or branch is not.
                match response.header("X-Error-Code") {
                    Some(code @ ("RepoNotFound" | "RevisionNotFound")) => Err(TrendError::RemoteStore(
                        format!("{code} for {} {}@{}", self.repo_type, self.repo_id, self.revision),
                    )),
                    _ => Ok(None),
                }
            }
            Err(ureq::Error::Status(code, response)) => Err(status_error("download", code, response)),
            Err(ureq::Error::Transport(e)) => Err(TrendError::RemoteStore(e.to_string())),
        }
    }

    fn replace(&self, content: &str, message: &str) -> Result<String> {
        let url = self.commit_url();
        let body = commit_body(message, &self.path, content)?;
        debug!(url = %url, bytes = content.len(), "committing ledger");
        let request = self
            .authorized(self.agent.post(&url))
            .set("Content-Type", "application/x-ndjson");
        let response = match request.send_string(&body) {
            Ok(response) => response,
            Err(ureq::Error::Status(code, response)) => return Err(status_error("commit", code, response)),
            Err(ureq::Error::Transport(e)) => return Err(TrendError::RemoteStore(e.to_string())),
        };
        response
            .into_json::<CommitResponse>()
            .map(|r| r.commit_oid)
            .map_err(|e| TrendError::RemoteStore(format!("unexpected commit response: {e}")))
    }

    fn describe(&self) -> String {
        format!("{} {}/{}@{}", self.repo_type, self.repo_id, self.path, self.revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    /// Answers one request with `response` and hands back the raw request text.
    fn serve_once(response: String) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let request = read_request(&mut stream);
                let _ = stream.write_all(response.as_bytes());
                let _ = tx.send(request);
            }
        });
        (format!("http://{addr}"), rx)
    }

    fn read_request(stream: &mut std::net::TcpStream) -> String {
        let mut data = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = stream.read(&mut buf).unwrap_or(0);
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&data);
            if let Some(head_end) = text.find("\r\n\r\n") {
                let length = text[..head_end]
                    .lines()
                    .find_map(|l| {
                        let (k, v) = l.split_once(':')?;
                        if k.eq_ignore_ascii_case("content-length") {
                            v.trim().parse::<usize>().ok()
                        } else {
                            None
                        }
                    })
                    .unwrap_or(0);
                if data.len() >= head_end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&data).into_owned()
    }

    fn http(status: &str, headers: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n{headers}\r\n{body}",
            body.len()
        )
    }

    fn store(endpoint: &str) -> HubStore {
        HubStore::new("owner/metrics", RepoType::Space, "metrics.csv", "main")
            .unwrap()
            .with_endpoint(endpoint)
            .with_token(Some("hf_secret".into()))
    }

    #[test]
    fn test_urls_follow_repo_type() {
        let space = store("https://hub.test");
        assert_eq!(space.download_url(), "https://hub.test/spaces/owner/metrics/resolve/main/metrics.csv");
        assert_eq!(space.commit_url(), "https://hub.test/api/spaces/owner/metrics/commit/main");

        let model = HubStore::new("owner/m", RepoType::Model, "data/m.csv", "feature/x")
            .unwrap()
            .with_endpoint("https://hub.test/");
        assert_eq!(model.download_url(), "https://hub.test/owner/m/resolve/feature%2Fx/data/m.csv");
        assert_eq!(model.commit_url(), "https://hub.test/api/models/owner/m/commit/feature%2Fx");
    }

    #[test]
    fn test_rejects_repo_without_owner() {
        assert!(matches!(
            HubStore::new("metrics", RepoType::Dataset, "m.csv", "main"),
            Err(TrendError::Configuration(_))
        ));
    }

    #[test]
    fn test_commit_body_is_header_then_base64_file() {
        let body = commit_body("Append metrics for 2024-01-01", "metrics.csv", "date\n").unwrap();
        let lines: Vec<serde_json::Value> =
            body.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["key"], "header");
        assert_eq!(lines[0]["value"]["summary"], "Append metrics for 2024-01-01");
        assert_eq!(lines[1]["key"], "file");
        assert_eq!(lines[1]["value"]["path"], "metrics.csv");
        assert_eq!(lines[1]["value"]["encoding"], "base64");
        assert_eq!(lines[1]["value"]["content"], "ZGF0ZQo=");
    }

    #[test]
    fn test_read_returns_content_with_auth() {
        let (url, requests) = serve_once(http("200 OK", "", "date,a\n2024-01-01,1\n"));
        let text = store(&url).read().unwrap();
        assert_eq!(text.as_deref(), Some("date,a\n2024-01-01,1\n"));

        let request = requests.recv().unwrap();
        assert!(request.starts_with("GET /spaces/owner/metrics/resolve/main/metrics.csv "));
        assert!(request.contains("Bearer hf_secret"));
    }

    #[test]
    fn test_missing_file_reads_as_none() {
        let (url, _) = serve_once(http("404 Not Found", "X-Error-Code: EntryNotFound\r\n", "Entry not found"));
        assert_eq!(store(&url).read().unwrap(), None);
    }

    #[test]
    fn test_missing_repo_is_an_error() {
        let (url, _) = serve_once(http("404 Not Found", "X-Error-Code: RepoNotFound\r\n", "Repository not found"));
        assert!(matches!(store(&url).read(), Err(TrendError::RemoteStore(_))));
    }

    #[test]
    fn test_replace_posts_ndjson_and_returns_oid() {
        let (url, requests) = serve_once(http(
            "200 OK",
            "Content-Type: application/json\r\n",
            r#"{"success":true,"commitOid":"abc123","commitUrl":"https://hub.test/c/abc123"}"#,
        ));
        let oid = store(&url).replace("date\n", "Append metrics for 2024-01-01").unwrap();
        assert_eq!(oid, "abc123");

        let request = requests.recv().unwrap();
        assert!(request.starts_with("POST /api/spaces/owner/metrics/commit/main "));
        assert!(request.to_ascii_lowercase().contains("content-type: application/x-ndjson"));
        assert!(request.contains(r#""summary":"Append metrics for 2024-01-01""#));
    }

    #[test]
    fn test_rejected_commit_surfaces_status() {
        let (url, _) = serve_once(http("403 Forbidden", "", "You don't have the rights"));
        let err = store(&url).replace("date\n", "msg").unwrap_err();
        match err {
            TrendError::RemoteStore(msg) => assert!(msg.contains("403"), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
