use std::io::{ErrorKind, Write};
use std::path::Path;
use std::process::{Command, Output, Stdio};

/// Runs the binary in `dir` with HOME pointed there too, so no user config
/// leaks into the test.
fn collapser_bin(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_collapser"));
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env("USERPROFILE", dir)
        .env_remove("RUST_LOG");
    cmd
}

fn run_with_stdin(dir: &Path, args: &[&str], stdin: &str) -> Output {
    let mut child = collapser_bin(dir)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to execute collapser");
    let mut pipe = child.stdin.take().expect("stdin is piped");
    // The child may exit before reading stdin (e.g. on a config error).
    if let Err(e) = pipe.write_all(stdin.as_bytes()) {
        assert_eq!(e.kind(), ErrorKind::BrokenPipe, "failed to write stdin: {e}");
    }
    drop(pipe);
    child.wait_with_output().expect("failed to wait on collapser")
}

const CONTACTS: &str = r#"{"email":"ada@example.com","times_used":3,"label":"home"}
{"email":"grace@example.com","times_used":1,"label":"work"}
{"email":"ada@example.com","times_used":4,"label":"work"}
"#;

#[test]
fn run_collapses_json_lines_by_key() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_with_stdin(
        dir.path(),
        &["run", "--key", "email", "--merge", "times_used=sum"],
        CONTACTS,
    );

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout,
        concat!(
            "{\"email\":\"ada@example.com\",\"times_used\":7,\"label\":\"home\"}\n",
            "{\"email\":\"grace@example.com\",\"times_used\":1,\"label\":\"work\"}\n",
        )
    );
}

#[test]
fn run_distinct_input_passes_through() {
    let dir = tempfile::tempdir().unwrap();
    let input = "{\"id\":1}\n{\"id\":2}\n{\"id\":3}\n";
    let output = run_with_stdin(dir.path(), &["run", "-k", "id"], input);

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), input);
}

#[test]
fn run_reads_json_array_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("phones.json");
    std::fs::write(
        &file,
        r#"[{"number":"555-0100","primary":false},{"number":"(555) 0100","primary":true}]"#,
    )
    .unwrap();
    std::fs::write(
        dir.path().join(".collapser.toml"),
        "key = [\"number\"]\n[normalize]\nstrip = \"[^0-9]\"\n[merge]\nprimary = \"any\"\n",
    )
    .unwrap();

    let output = collapser_bin(dir.path())
        .args(["run", "--format", "json", "phones.json"])
        .output()
        .expect("failed to execute collapser");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        value,
        serde_json::json!([{"number": "555-0100", "primary": true}])
    );
}

#[test]
fn run_report_prints_summary() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_with_stdin(
        dir.path(),
        &["run", "--key", "email", "--merge", "label=sum", "--report"],
        CONTACTS,
    );

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("collapser: 3 -> 2 records (1 merged, 1 rejected)"),
        "Expected summary, got: {stderr}"
    );
}

#[test]
fn run_strict_fails_on_rejected_merge() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_with_stdin(
        dir.path(),
        &["run", "--key", "email", "--merge", "label=sum", "--strict"],
        CONTACTS,
    );

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("record 2 conflicts with record 0"),
        "Expected conflict report, got: {stderr}"
    );
}

#[test]
fn run_without_key_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = collapser_bin(dir.path())
        .args(["run"])
        .stdin(Stdio::null())
        .output()
        .expect("failed to execute collapser");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("no key fields configured"),
        "Expected missing key error, got: {stderr}"
    );
}

#[test]
fn run_reports_bad_input_line() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_with_stdin(dir.path(), &["run", "-k", "id"], "{\"id\":1}\n42\n");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("reading records from stdin: line 2: expected a JSON object"),
        "Expected line error, got: {stderr}"
    );
}

#[test]
fn unknown_strategy_is_rejected_by_argument_parser() {
    let dir = tempfile::tempdir().unwrap();
    let output = collapser_bin(dir.path())
        .args(["run", "--key", "id", "--merge", "n=avg"])
        .stdin(Stdio::null())
        .output()
        .expect("failed to execute collapser");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("unknown merge strategy 'avg'"),
        "Expected strategy error, got: {stderr}"
    );
}

#[test]
fn show_prints_effective_rules() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(".collapser.toml"),
        "description = \"contacts\"\nkey = [\"email\"]\n[normalize]\nignore_case = true\n[merge]\ntimes_used = \"sum\"\n",
    )
    .unwrap();

    let output = collapser_bin(dir.path())
        .args(["show", "--merge", "last_used=max"])
        .output()
        .expect("failed to execute collapser");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(".collapser.toml (local)"), "got: {stdout}");
    assert!(stdout.contains("Description: contacts"), "got: {stdout}");
    assert!(stdout.contains("Key:         email"), "got: {stdout}");
    assert!(stdout.contains("Normalize:   ignore_case"), "got: {stdout}");
    assert!(stdout.contains("last_used   →  max"), "got: {stdout}");
    assert!(stdout.contains("times_used  →  sum"), "got: {stdout}");
}

#[test]
fn show_without_config_uses_default() {
    let dir = tempfile::tempdir().unwrap();
    let output = collapser_bin(dir.path())
        .args(["show"])
        .output()
        .expect("failed to execute collapser");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Source:      built-in default"), "got: {stdout}");
    assert!(stdout.contains("Key:         (none"), "got: {stdout}");
}

#[test]
fn run_without_key_tolerates_unread_stdin() {
    let dir = tempfile::tempdir().unwrap();
    let big_input = CONTACTS.repeat(20_000);
    let output = run_with_stdin(dir.path(), &["run"], &big_input);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("no key fields configured"),
        "Expected missing key error, got: {stderr}"
    );
}

#[test]
fn show_lists_normalization_and_rejects_bad_pattern() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(".collapser.toml"),
        "key = [\"number\"]\n[normalize]\ntrim = true\nstrip = \"[^0-9]\"\n",
    )
    .unwrap();

    let output = collapser_bin(dir.path())
        .args(["show"])
        .output()
        .expect("failed to execute collapser");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Normalize:   trim, strip /[^0-9]/"), "got: {stdout}");
    assert!(stdout.contains("Default:     first"), "got: {stdout}");

    std::fs::write(
        dir.path().join(".collapser.toml"),
        "[normalize]\nstrip = \"[\"\n",
    )
    .unwrap();
    let output = collapser_bin(dir.path())
        .args(["show"])
        .output()
        .expect("failed to execute collapser");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("invalid normalize.strip pattern"),
        "Expected pattern error, got: {stderr}"
    );
}
