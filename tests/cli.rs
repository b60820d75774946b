use assert_cmd::Command;

#[test]
fn unknown_flag_exits_with_usage_error() {
    Command::cargo_bin("gasoline")
        .expect("binary")
        .arg("--no-such-flag")
        .assert()
        .code(2);
}

#[test]
fn version_flag_exits_cleanly() {
    let output = Command::cargo_bin("gasoline")
        .expect("binary")
        .arg("--version")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf8");
    assert!(text.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn closed_stdin_shuts_the_daemon_down() {
    let state = tempfile::tempdir().expect("tempdir");
    let output = Command::cargo_bin("gasoline")
        .expect("binary")
        .env("GASOLINE_STATE_DIR", state.path())
        .args(["--http-port", "0", "--config", "/nonexistent/gasoline.yaml"])
        .write_stdin("{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n")
        .timeout(std::time::Duration::from_secs(20))
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf8");
    assert!(text.contains("\"id\":1"), "stdout: {text}");
}
