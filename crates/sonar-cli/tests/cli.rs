use assert_cmd::Command;
use tempfile::TempDir;

fn sonar() -> Command {
    Command::cargo_bin("sonar").expect("binary builds")
}

#[test]
fn missing_credential_exits_with_code_one() {
    let dir = TempDir::new().expect("workspace");
    let output = sonar()
        .current_dir(dir.path())
        .env_remove("PPLX_API_KEY")
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("PPLX_API_KEY"), "stderr was: {stderr}");
}

#[test]
fn help_flag_describes_the_binary() {
    let output = sonar().arg("--help").output().expect("run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("terminal development assistant"));
}

#[test]
fn quit_command_ends_the_session_cleanly() {
    let dir = TempDir::new().expect("workspace");
    let output = sonar()
        .current_dir(dir.path())
        .env("PPLX_API_KEY", "test-key")
        .env("NO_COLOR", "1")
        .write_stdin("quit\n")
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Thanks for using Sonar CLI"));
}

#[test]
fn at_token_lists_files_then_eof_exits() {
    let dir = TempDir::new().expect("workspace");
    std::fs::write(dir.path().join("README.md"), "# demo").expect("seed file");
    let output = sonar()
        .current_dir(dir.path())
        .env("PPLX_API_KEY", "test-key")
        .env("NO_COLOR", "1")
        .write_stdin("@\n")
        .output()
        .expect("run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("README.md"), "stdout was: {stdout}");
}

#[test]
fn unknown_slash_command_hints_at_help() {
    let dir = TempDir::new().expect("workspace");
    let output = sonar()
        .current_dir(dir.path())
        .env("PPLX_API_KEY", "test-key")
        .env("NO_COLOR", "1")
        .write_stdin("/frobnicate\nquit\n")
        .output()
        .expect("run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Unknown command"));
    assert!(stdout.contains("/help"));
}

#[test]
fn settings_survive_between_runs() {
    let dir = TempDir::new().expect("workspace");
    sonar()
        .current_dir(dir.path())
        .env("PPLX_API_KEY", "test-key")
        .env("NO_COLOR", "1")
        .write_stdin("/settings set maxHistory 4\nquit\n")
        .output()
        .expect("run");

    let output = sonar()
        .current_dir(dir.path())
        .env("PPLX_API_KEY", "test-key")
        .env("NO_COLOR", "1")
        .write_stdin("/settings\nquit\n")
        .output()
        .expect("run");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("maxHistory: 4"), "stdout was: {stdout}");
}
