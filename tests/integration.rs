use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn astro_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("astro");
    path
}

/// Writes a knowledge base and a config pointing at it. `embed_url` is the
/// embedding server base URL.
fn setup_test_env(embed_url: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let kb = root.join("knowledge_base");
    fs::create_dir_all(&kb).unwrap();
    fs::write(
        kb.join("houses.md"),
        "# The Twelve Houses\n\nThe first house is the self and the body.\n\nThe tenth house governs career and public standing.",
    )
    .unwrap();
    fs::write(
        kb.join("planets.txt"),
        "Saturn is slow and disciplined.\n\nJupiter expands whatever it touches.",
    )
    .unwrap();

    let config_content = format!(
        r#"[index]
path = "{root}/data/vector_index.json"
top_k = 2

[ingest]
documents_path = "{root}/knowledge_base"

[chunking]
chunk_size = 80
chunk_overlap = 10

[embedding]
provider = "ollama"
model = "nomic-embed-text"
base_url = "{embed_url}"
max_retries = 0
timeout_secs = 5

[llm]
api_key_env = "ASTRO_INTEGRATION_KEY_NEVER_SET"
"#,
        root = root.display(),
        embed_url = embed_url,
    );

    let config_path = config_dir.join("astro.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_astro(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = astro_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("ASTRO_INTEGRATION_KEY_NEVER_SET")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run astro binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

/// Answers `/api/embed` with one `[len, 1.0]` vector per input text.
struct EchoEmbeddings;

impl Respond for EchoEmbeddings {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = request.body_json().unwrap();
        let embeddings: Vec<Vec<f32>> = body["input"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| vec![t.as_str().unwrap().len() as f32, 1.0])
            .collect();
        ResponseTemplate::new(200).set_body_json(serde_json::json!({ "embeddings": embeddings }))
    }
}

#[test]
fn test_chart_without_config_file() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.toml");

    let (stdout, stderr, success) = run_astro(&missing, &["chart"]);
    assert!(success, "chart failed: stdout={}, stderr={}", stdout, stderr);

    let chart_lines: Vec<&str> = stdout.lines().filter(|l| l.starts_with("House ")).collect();
    assert_eq!(chart_lines.len(), 12);
    assert_eq!(chart_lines[0], "House 1: Ruling Planet - Mars, Planet - Sun");
    assert_eq!(chart_lines[1], "House 2: Ruling Planet - Venus, Planet - None");
    assert!(stdout.contains("House 1: Sun is exalted in house 1, giving strong positive effects."));
    assert!(stdout.contains("House 1: significators Sun; Sun regards ruler Mars as friendly"));
}

#[test]
fn test_chart_uses_configured_positions() {
    let (_tmp, config_path) = setup_test_env("http://127.0.0.1:9");
    let mut content = fs::read_to_string(&config_path).unwrap();
    content.push_str("\n[chart.positions]\nSaturn = 1\n");
    fs::write(&config_path, content).unwrap();

    let (stdout, stderr, success) = run_astro(&config_path, &["chart"]);
    assert!(success, "chart failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("House 1: Ruling Planet - Mars, Planet - Saturn"));
    assert!(stdout.contains("Saturn is debilitated in house 1"));

    let occupied: Vec<&str> = stdout
        .lines()
        .filter(|l| l.starts_with("House ") && !l.ends_with("Planet - None"))
        .collect();
    assert_eq!(occupied, vec!["House 1: Ruling Planet - Mars, Planet - Saturn"]);
}

#[test]
fn test_chart_positions_apply_in_file_order() {
    let (_tmp, config_path) = setup_test_env("http://127.0.0.1:9");
    let mut content = fs::read_to_string(&config_path).unwrap();
    content.push_str("\n[chart.positions]\nSun = 5\nJupiter = 5\n");
    fs::write(&config_path, content).unwrap();

    let (stdout, stderr, success) = run_astro(&config_path, &["chart"]);
    assert!(success, "chart failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("House 5: Ruling Planet - Sun, Planet - Jupiter"));
    assert!(stdout.contains("House 5: Jupiter is neutral in house 5."));
}

#[test]
fn test_index_stats_missing_index() {
    let (_tmp, config_path) = setup_test_env("http://127.0.0.1:9");
    let (_, stderr, success) = run_astro(&config_path, &["index", "stats"]);
    assert!(!success);
    assert!(stderr.contains("Vector store not found"), "stderr={}", stderr);
}

#[test]
fn test_index_build_missing_documents_dir() {
    let (tmp, config_path) = setup_test_env("http://127.0.0.1:9");
    fs::remove_dir_all(tmp.path().join("knowledge_base")).unwrap();

    let (_, stderr, success) = run_astro(&config_path, &["index", "build"]);
    assert!(!success);
    assert!(stderr.contains("knowledge_base"), "stderr={}", stderr);
}

#[test]
fn test_invalid_config_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("astro.toml");
    fs::write(&config_path, "[chunking]\nchunk_size = 100\nchunk_overlap = 100\n").unwrap();

    let (_, stderr, success) = run_astro(&config_path, &["index", "stats"]);
    assert!(!success);
    assert!(stderr.contains("chunk_overlap"), "stderr={}", stderr);
}

#[test]
fn test_ask_without_credential() {
    let (_tmp, config_path) = setup_test_env("http://127.0.0.1:9");
    let (_, stderr, success) = run_astro(&config_path, &["ask", "--query", "How is my career?"]);
    assert!(!success);
    assert!(
        stderr.contains("ASTRO_INTEGRATION_KEY_NEVER_SET"),
        "stderr={}",
        stderr
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_index_build_then_stats() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(EchoEmbeddings)
        .mount(&server)
        .await;

    let (tmp, config_path) = setup_test_env(&server.uri());

    let build_cfg = config_path.clone();
    let (stdout, stderr, success) =
        tokio::task::spawn_blocking(move || run_astro(&build_cfg, &["index", "build"]))
            .await
            .unwrap();
    assert!(success, "build failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("documents: 2"));
    assert!(stdout.contains("dims: 2"));
    assert!(stdout.contains("ok"));
    assert!(tmp.path().join("data/vector_index.json").exists());

    let (stdout, stderr, success) = run_astro(&config_path, &["index", "stats"]);
    assert!(success, "stats failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("sources: 2"));
    assert!(stdout.contains("model: nomic-embed-text"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_index_build_embedding_server_down() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let (tmp, config_path) = setup_test_env(&server.uri());
    let (_, stderr, success) =
        tokio::task::spawn_blocking(move || run_astro(&config_path, &["index", "build"]))
            .await
            .unwrap();
    assert!(!success);
    assert!(stderr.contains("503"), "stderr={}", stderr);
    assert!(!tmp.path().join("data/vector_index.json").exists());
}
