use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::thread::JoinHandle;

use orgmirror_core::config::{MirrorConfig, RawConfig};
use orgmirror_sync::git_ops;

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git(dir: &Path, args: &[&str]) {
    let out = Command::new("git")
        .args(["-c", "user.name=test", "-c", "user.email=test@example.com"])
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(out.status.success(), "git {args:?}: {}", String::from_utf8_lossy(&out.stderr));
}

fn make_upstream(root: &Path, name: &str) -> PathBuf {
    let src = root.join("upstream").join(name);
    std::fs::create_dir_all(&src).unwrap();
    git(&src, &["init", "-q"]);
    std::fs::write(src.join("README"), format!("{name} v1\n")).unwrap();
    git(&src, &["add", "README"]);
    git(&src, &["commit", "-q", "-m", "v1"]);
    src
}

/// Serve `responses` (status, body) to consecutive connections.
fn serve(responses: Vec<(u16, String)>) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let handle = std::thread::spawn(move || {
        let mut seen = Vec::new();
        for (status, body) in responses {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut chunk).unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            let request = String::from_utf8_lossy(&buf).to_string();
            seen.push(request.lines().next().unwrap_or_default().to_string());
            let response = format!(
                "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
        }
        seen
    });
    (base, handle)
}

fn orgmirror(home: &Path, envs: &[(&str, &str)], args: &[&str]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_orgmirror"));
    cmd.env_clear()
        .env("PATH", std::env::var("PATH").unwrap_or_default())
        .env("HOME", home)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .current_dir(home)
        .args(args);
    for (k, v) in envs {
        cmd.env(k, v);
    }
    cmd.output().unwrap()
}

fn listing(repos: &[(&str, &Path)]) -> String {
    let items: Vec<String> = repos
        .iter()
        .map(|(name, path)| {
            format!(
                r#"{{"name":"{name}","full_name":"acme/{name}","clone_url":"{}","archived":false,"fork":false}}"#,
                path.display()
            )
        })
        .collect();
    format!("[{}]", items.join(","))
}

#[test]
fn test_sync_clones_then_pulls() {
    if !git_available() {
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let home = tmp.path();
    let data = home.join("data");
    let widgets = make_upstream(home, "widgets");
    let gadgets = make_upstream(home, "gadgets");
    let body = listing(&[("widgets", &widgets), ("gadgets", &gadgets)]);

    let (base, server) = serve(vec![(200, body.clone()), (200, body)]);
    let data_str = data.to_string_lossy().to_string();
    let envs = [
        ("ORGANIZATION", "acme"),
        ("ACCESS_TOKEN", "tok"),
        ("USERNAME", "bot"),
        ("EMAIL", "bot@acme.test"),
        ("TIMEZONE", "Europe/Amsterdam"),
        ("DATA_DIR", data_str.as_str()),
        ("GITHUB_API_URL", base.as_str()),
    ];

    let first = orgmirror(home, &envs, &["sync"]);
    assert!(first.status.success(), "{}", String::from_utf8_lossy(&first.stderr));
    assert!(git_ops::is_working_copy(&data, "widgets"));
    assert!(git_ops::is_working_copy(&data, "gadgets"));

    std::fs::write(widgets.join("README"), "widgets v2\n").unwrap();
    git(&widgets, &["commit", "-q", "-am", "v2"]);

    let second = orgmirror(home, &envs, &["sync"]);
    assert!(second.status.success(), "{}", String::from_utf8_lossy(&second.stderr));
    assert_eq!(
        std::fs::read_to_string(data.join("widgets").join("README")).unwrap(),
        "widgets v2\n"
    );

    let gitconfig = std::fs::read_to_string(home.join(".gitconfig")).unwrap();
    assert!(gitconfig.contains("name = bot"), "{gitconfig}");
    assert!(gitconfig.contains("email = bot@acme.test"), "{gitconfig}");

    let stdout = String::from_utf8_lossy(&second.stdout);
    assert!(stdout.contains("pull"));
    assert!(stdout.contains("2 synced | 0 failed"));

    let requests = server.join().unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].starts_with("GET /orgs/acme/repos?per_page=100"));
}

#[test]
fn test_one_failing_repo_does_not_stop_the_rest() {
    if !git_available() {
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let home = tmp.path();
    let data = home.join("data");
    let a = make_upstream(home, "a");
    let c = make_upstream(home, "c");
    let missing = home.join("upstream").join("b");
    let body = listing(&[("a", &a), ("b", &missing), ("c", &c)]);

    let (base, server) = serve(vec![(200, body)]);
    let data_str = data.to_string_lossy().to_string();
    let out = orgmirror(
        home,
        &[
            ("ORGANIZATION", "acme"),
            ("ACCESS_TOKEN", "tok"),
            ("USERNAME", "bot"),
            ("EMAIL", "bot@acme.test"),
            ("TIMEZONE", "Europe/Amsterdam"),
            ("DATA_DIR", data_str.as_str()),
            ("GITHUB_API_URL", base.as_str()),
        ],
        &["sync"],
    );
    server.join().unwrap();

    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(git_ops::is_working_copy(&data, "a"));
    assert!(!git_ops::is_working_copy(&data, "b"));
    assert!(git_ops::is_working_copy(&data, "c"));
    assert!(String::from_utf8_lossy(&out.stdout).contains("2 synced | 1 failed"));
}

#[test]
fn test_listing_404_attempts_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let home = tmp.path();
    let data = home.join("data");

    let (base, server) = serve(vec![(404, r#"{"message":"Not Found"}"#.to_string())]);
    let data_str = data.to_string_lossy().to_string();
    let out = orgmirror(
        home,
        &[
            ("ORGANIZATION", "nobody"),
            ("ACCESS_TOKEN", "tok"),
            ("USERNAME", "bot"),
            ("EMAIL", "bot@acme.test"),
            ("TIMEZONE", "Europe/Amsterdam"),
            ("DATA_DIR", data_str.as_str()),
            ("GITHUB_API_URL", base.as_str()),
        ],
        &["sync"],
    );
    server.join().unwrap();

    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("404"));
    let entries = std::fs::read_dir(&data).map(|d| d.count()).unwrap_or(0);
    assert_eq!(entries, 0);
}

#[test]
fn test_missing_required_config_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let out = orgmirror(
        tmp.path(),
        &[("TIMEZONE", "Europe/Amsterdam")],
        &["daemon"],
    );
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("ORGANIZATION"));
}

#[test]
fn test_next_lists_triggers() {
    let tmp = tempfile::tempdir().unwrap();
    let out = orgmirror(
        tmp.path(),
        &[],
        &["next", "--timezone", "Europe/Amsterdam", "--backup-time", "3:15", "--count", "3"],
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Every day at 03:15 - Europe/Amsterdam"));
    assert_eq!(stdout.lines().filter(|l| l.contains("03:15 CE")).count(), 3);
}

#[test]
fn test_next_rejects_unbounded_count() {
    let tmp = tempfile::tempdir().unwrap();
    let out = orgmirror(
        tmp.path(),
        &[],
        &["next", "--timezone", "Europe/Amsterdam", "--count", "18446744073709551615"],
    );
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("--count"));
}

#[test]
fn test_status_reports_mirrors() {
    let tmp = tempfile::tempdir().unwrap();
    let data = tmp.path().join("data");
    std::fs::create_dir_all(data.join("widgets").join(".git")).unwrap();
    std::fs::create_dir_all(data.join("stray")).unwrap();

    let data_str = data.to_string_lossy().to_string();
    let out = orgmirror(tmp.path(), &[("DATA_DIR", data_str.as_str())], &["status"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("widgets"));
    assert!(stdout.contains("stray"));
    assert!(stdout.contains("1 without a working copy"));
}

#[test]
fn test_config_file_layer_with_env_override() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
organization = "from-file"
access_token = "file-token"
username = "bot"
email = "bot@acme.test"
timezone = "Europe/Amsterdam"
backup_time = "4:30"
concurrency = 3
"#,
    )
    .unwrap();

    let file = RawConfig::load_from(&path).unwrap();
    let env = RawConfig {
        organization: Some("from-env".into()),
        ..RawConfig::default()
    };
    let config = MirrorConfig::from_raw(file.merge(env)).unwrap();
    assert_eq!(config.organization, "from-env");
    assert_eq!(config.access_token.expose(), "file-token");
    assert_eq!(config.backup_time.to_string(), "04:30");
    assert_eq!(config.concurrency, 3);

    let shown = toml::to_string(&RawConfig::load_from(&path).unwrap()).unwrap();
    assert!(shown.contains("from-file"));
}
