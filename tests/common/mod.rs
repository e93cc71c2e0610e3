use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;

static SERVER: OnceLock<TestServer> = OnceLock::new();

/// Credentials the suite bootstraps via /api/auth/setup on a fresh database
/// and reuses on every later run against the same database.
pub const ADMIN_EMAIL: &str = "admin@teste.local";
pub const ADMIN_PASSWORD: &str = "senha-admin-1";

/// Encryption key and JWT secret injected into the spawned server whenever
/// the environment does not provide its own.
pub const TEST_ENCRYPTION_KEY: &str = "0123456789abcdef0123456789abcdef";
pub const TEST_JWT_SECRET: &str = "integration-test-secret";

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    #[allow(dead_code)]
    child: Child,
}

/// End-to-end tests need a PostgreSQL instance; they skip when DATABASE_URL
/// is absent so the unit suite stays runnable anywhere.
pub fn database_configured() -> bool {
    let _ = dotenvy::dotenv();
    std::env::var("DATABASE_URL").is_ok()
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        // Spawn the already-built binary to keep start fast during tests
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_registro-api"));
        cmd.env("PORT", port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        if std::env::var("JWT_SECRET").is_err() {
            cmd.env("JWT_SECRET", TEST_JWT_SECRET);
        }
        if std::env::var("ENCRYPTION_KEY").is_err() {
            cmd.env("ENCRYPTION_KEY", TEST_ENCRYPTION_KEY);
        }

        // Inherit the rest of the environment so the server sees DATABASE_URL
        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self {
            port,
            base_url,
            child,
        })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!(
            "server did not become ready on {} within {:?}",
            self.base_url,
            timeout
        )
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(15)).await?;
    Ok(server)
}

/// Bootstrap (or reuse) the suite's admin account and return a bearer token.
///
/// Setup races between parallel tests are fine: whoever loses just signs in.
#[allow(dead_code)]
pub async fn admin_token(server: &TestServer) -> Result<String> {
    let client = reqwest::Client::new();

    let _ = client
        .post(format!("{}/api/auth/setup", server.base_url))
        .json(&serde_json::json!({
            "email": ADMIN_EMAIL,
            "password": ADMIN_PASSWORD,
            "fullName": "Admin de Teste",
        }))
        .send()
        .await?;

    let res = client
        .post(format!("{}/api/auth/signin", server.base_url))
        .json(&serde_json::json!({
            "email": ADMIN_EMAIL,
            "password": ADMIN_PASSWORD,
        }))
        .send()
        .await?;
    anyhow::ensure!(
        res.status() == StatusCode::OK,
        "admin signin failed: {} (is the test database dedicated to this suite?)",
        res.status()
    );

    let body = res.json::<serde_json::Value>().await?;
    body.get("token")
        .and_then(|t| t.as_str())
        .map(str::to_owned)
        .context("signin response missing token")
}
