//! Integration tests for the Boutique server.
//!
//! These tests run the real `boutique-server` binary and drive it over HTTP,
//! from signup to token expiry.

// Allow unwrap() in tests - panics are acceptable for test assertions
#![allow(clippy::disallowed_methods)]

use std::process::{Child, Command, Stdio};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tempfile::TempDir;

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// The JSON body every error response carries.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub path: String,
    pub message: String,
    pub status: u16,
    pub timestamp: String,
}

// ============================================================================
// Test Server
// ============================================================================

/// A test server instance that manages its own data directory and process.
pub struct TestServer {
    process: Child,
    pub base_url: String,
    pub port: u16,
    data_dir: TempDir,
}

impl TestServer {
    /// Start a dev mode server on the specified port.
    pub async fn start(port: u16, extra_args: &[&str]) -> Result<Self> {
        let data_dir = TempDir::new().context("Failed to create temp dir")?;
        let mut args = vec!["--dev"];
        args.extend_from_slice(extra_args);
        Self::start_in(data_dir, port, &args).await
    }

    /// Start a server with explicit arguments over an existing data directory.
    pub async fn start_in(data_dir: TempDir, port: u16, args: &[&str]) -> Result<Self> {
        let server_binary = find_server_binary()?;

        let process = Command::new(&server_binary)
            .args(args)
            .arg("--data-dir")
            .arg(data_dir.path())
            .arg("--bind")
            .arg(format!("127.0.0.1:{}", port))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to start server: {:?}", server_binary))?;

        let server = Self {
            process,
            base_url: format!("http://127.0.0.1:{}", port),
            port,
            data_dir,
        };

        server.wait_for_ready().await?;

        Ok(server)
    }

    /// Stop the server and hand back its data directory.
    pub fn stop(mut self) -> Result<TempDir> {
        let _ = self.process.kill();
        let _ = self.process.wait();

        let placeholder = TempDir::new().context("Failed to create temp dir")?;
        Ok(std::mem::replace(&mut self.data_dir, placeholder))
    }

    /// Wait for the server to be ready to accept connections.
    async fn wait_for_ready(&self) -> Result<()> {
        let client = Client::new();
        let url = format!("{}/health", self.base_url);

        for _ in 0..50 {
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                _ => tokio::time::sleep(Duration::from_millis(100)).await,
            }
        }

        bail!("Server failed to start within 5 seconds")
    }

    /// Get a configured HTTP client for this server.
    pub fn client(&self) -> BoutiqueClient {
        BoutiqueClient::new(&self.base_url)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.process.kill();
        let _ = self.process.wait();
    }
}

/// Find the server binary in the target directory.
fn find_server_binary() -> Result<std::path::PathBuf> {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());

    // Try debug build first, then release
    let candidates = [
        std::path::Path::new(&manifest_dir).join("../../target/debug/boutique-server"),
        std::path::Path::new(&manifest_dir).join("../../target/debug/boutique-server.exe"),
        std::path::Path::new(&manifest_dir).join("../../target/release/boutique-server"),
        std::path::Path::new(&manifest_dir).join("../../target/release/boutique-server.exe"),
    ];

    for candidate in &candidates {
        if candidate.exists() {
            return Ok(candidate.canonicalize()?);
        }
    }

    bail!(
        "Could not find boutique-server binary. Run 'cargo build -p boutique-server' first. Searched in: {:?}",
        candidates
    )
}

// ============================================================================
// Test Client
// ============================================================================

/// HTTP client for testing the Boutique API.
pub struct BoutiqueClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl BoutiqueClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends a request and returns the status with the decoded body
    /// (`Null` when empty).
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut req = self.client.request(method, self.url(path));
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };

        Ok((status, body))
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let resp = self.client.get(self.url("/health")).send().await?;
        Ok(resp.json().await?)
    }

    pub async fn signup(&self, username: &str, password: &str, role: Option<&str>) -> Result<Value> {
        let mut body = json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": password,
        });
        if let Some(role) = role {
            body["role"] = json!(role);
        }

        let (status, body) = self.call(Method::POST, "/user/signup", Some(body)).await?;
        if status != StatusCode::CREATED {
            bail!("Signup failed: {} {}", status, body);
        }
        Ok(body)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        let resp = self
            .client
            .post(self.url("/user/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?;
        if !resp.status().is_success() {
            bail!("Login failed: {}", resp.text().await?);
        }
        Ok(resp.json().await?)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use std::sync::atomic::{AtomicU16, Ordering};

    // Port counter to avoid conflicts between parallel tests
    static PORT_COUNTER: AtomicU16 = AtomicU16::new(18080);

    fn next_port() -> u16 {
        PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
    }

    const PASSWORD: &str = "correct-horse";

    fn error_body(body: Value) -> ErrorBody {
        serde_json::from_value(body).unwrap()
    }

    #[tokio::test]
    async fn test_server_health_in_dev_mode() {
        let server = TestServer::start(next_port(), &[]).await.unwrap();
        let health = server.client().health().await.unwrap();

        assert_eq!(health.status, "ok");
        assert!(!health.version.is_empty());
    }

    #[tokio::test]
    async fn test_alice_token_lifecycle() {
        // Expiry has whole-second granularity, so a 1s token may only live
        // a few milliseconds.
        let server = TestServer::start(next_port(), &["--token-ttl-secs", "2"])
            .await
            .unwrap();
        let client = server.client();

        client.signup("alice", PASSWORD, None).await.unwrap();
        let login = client.login("alice", PASSWORD).await.unwrap();
        assert_eq!(login.token_type, "Bearer");
        assert_eq!(login.expires_in, 2);

        let client = client.with_token(&login.token);

        // 1. USER route
        let (status, body) = client.call(Method::GET, "/users/me", None).await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "alice");

        // 2. ADMIN route
        let (status, body) = client.call(Method::GET, "/users", None).await.unwrap();
        assert_eq!(status, StatusCode::FORBIDDEN);
        let error = error_body(body);
        assert_eq!(error.message, "access denied");
        assert_eq!(error.path, "/users");
        assert_eq!(error.status, 403);
        assert!(!error.timestamp.is_empty());

        // 3. After the TTL
        tokio::time::sleep(Duration::from_millis(3100)).await;
        let (status, body) = client.call(Method::GET, "/users/me", None).await.unwrap();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error_body(body).message, "token expired");
    }

    #[tokio::test]
    async fn test_authentication_required() {
        let server = TestServer::start(next_port(), &[]).await.unwrap();
        let client = server.client(); // No token

        let (status, body) = client.call(Method::GET, "/products", None).await.unwrap();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            error_body(body).message,
            "full authentication is required to access this resource"
        );

        // Allow-listed paths stay reachable.
        let (status, _) = client.call(Method::GET, "/role/", None).await.unwrap();
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_invalid_token_rejected() {
        let server = TestServer::start(next_port(), &[]).await.unwrap();
        let client = server.client().with_token("invalid-token");

        let (status, body) = client.call(Method::GET, "/products", None).await.unwrap();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error_body(body).message, "invalid token");
    }

    #[tokio::test]
    async fn test_extra_public_path() {
        let server = TestServer::start(next_port(), &["--public-path", "/docs/*"])
            .await
            .unwrap();
        let client = server.client();

        // Public but unrouted: the gate lets it through, the router answers 404.
        let (status, _) = client
            .call(Method::GET, "/docs/index.html", None)
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_admin_manages_catalogue() {
        let server = TestServer::start(next_port(), &[]).await.unwrap();
        let anonymous = server.client();

        anonymous.signup("root", PASSWORD, Some("ADMIN")).await.unwrap();
        anonymous.signup("alice", PASSWORD, None).await.unwrap();

        let admin = server
            .client()
            .with_token(&anonymous.login("root", PASSWORD).await.unwrap().token);
        let alice = server
            .client()
            .with_token(&anonymous.login("alice", PASSWORD).await.unwrap().token);

        let (status, product) = admin
            .call(
                Method::POST,
                "/products",
                Some(json!({ "name": "Teapot", "price_cents": 3500, "stock": 1 })),
            )
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        let purchase = format!("/products/{}/purchase", product["id"].as_str().unwrap());

        let (status, _) = alice.call(Method::POST, &purchase, None).await.unwrap();
        assert_eq!(status, StatusCode::OK);

        let (status, body) = alice.call(Method::POST, &purchase, None).await.unwrap();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(error_body(body).path, purchase);
    }

    #[tokio::test]
    async fn test_accounts_survive_restart() {
        let secret = BASE64.encode([42u8; 32]);
        let args = ["--jwt-secret", secret.as_str()];

        let server = TestServer::start_in(TempDir::new().unwrap(), next_port(), &args)
            .await
            .unwrap();
        server.client().signup("bob", PASSWORD, None).await.unwrap();
        let token = server.client().login("bob", PASSWORD).await.unwrap().token;

        // Privileged self-signup is refused outside dev mode.
        let err = server.client().signup("eve", PASSWORD, Some("ADMIN")).await;
        assert!(err.is_err());

        let data_dir = server.stop().unwrap();
        let server = TestServer::start_in(data_dir, next_port(), &args)
            .await
            .unwrap();

        // Same key, same store: the old token is still good.
        let (status, body) = server
            .client()
            .with_token(&token)
            .call(Method::GET, "/users/me", None)
            .await
            .unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "bob");
    }
}
