use std::path::Path;
use std::process::Command;

fn run_zapgen(dir: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_zapgen"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("failed to execute zapgen");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn assert_success(dir: &Path, args: &[&str]) -> (String, String) {
    let (stdout, stderr, success) = run_zapgen(dir, args);
    assert!(success, "zapgen {:?} should succeed, stderr:\n{}", args, stderr);
    (stdout, stderr)
}

fn assert_failure(dir: &Path, args: &[&str]) -> String {
    let (_, stderr, success) = run_zapgen(dir, args);
    assert!(!success, "zapgen {:?} should fail", args);
    stderr
}

const CLOAK: &str = r#"
[game]
name = "Cloak"
greeting = "Hurrying through the rainswept November night..."

[[properties]]
name = "SIZE"

[[globals]]
name = "SCORE"

[[globals]]
name = "HERE"
default = "FOYER"

[[objects]]
name = "ROOMS"

[[objects]]
name = "FOYER"
desc = "Foyer of the Opera House"
parent = "ROOMS"
properties = { SIZE = 3 }
"#;

#[test]
fn test_sanitize() {
    let temp = tempfile::tempdir().unwrap();
    let (stdout, _) = assert_success(temp.path(), &["sanitize", ".", "FOO-BAR", "A B"]);
    assert_eq!(stdout, "PERIOD\nFOO-BAR\nA$0020B\n");
}

#[test]
fn test_init_then_build() {
    let temp = tempfile::tempdir().unwrap();
    assert_success(temp.path(), &["init", "demo"]);
    assert!(temp.path().join("zapgen.toml").exists());

    let stderr = assert_failure(temp.path(), &["init", "demo"]);
    assert!(stderr.contains("already exists"), "stderr:\n{}", stderr);

    let (stdout, _) = assert_success(temp.path(), &["build"]);
    assert!(stdout.contains("demo.zap"), "stdout:\n{}", stdout);
    for file in ["demo.zap", "demo_data.zap", "demo_str.zap", "demo_freq.zap"] {
        assert!(temp.path().join(file).exists(), "{} missing", file);
    }

    let main = std::fs::read_to_string(temp.path().join("demo.zap")).unwrap();
    assert!(main.starts_with("\t.NEW 3\n"));
    assert!(main.contains("\tPRINTI \"Welcome to demo!\"\n\tCRLF\n\tQUIT\n"));
}

#[test]
fn test_build_with_overrides() {
    let temp = tempfile::tempdir().unwrap();
    std::fs::write(temp.path().join("cloak.toml"), CLOAK).unwrap();

    let (_, stderr) = assert_success(
        temp.path(),
        &["build", "cloak.toml", "--out", "out", "--zversion", "5", "--debug", "--dump-symbols"],
    );
    assert!(stderr.contains("\"FOYER\": \"object\""), "stderr:\n{}", stderr);
    assert!(stderr.contains("\"P?SIZE\": \"property\""));

    let out = temp.path().join("out");
    let main = std::fs::read_to_string(out.join("cloak.zap")).unwrap();
    assert!(main.starts_with("\t.NEW 5\n\t.BYTE 5\n"));
    assert!(main.contains(".DEBUG-ROUTINE 1,1,1,\"GO\""));

    let data = std::fs::read_to_string(out.join("cloak_data.zap")).unwrap();
    assert!(data.contains("\tP?SIZE=63\n"));
    // Version 5 keeps the global definition order.
    assert!(data.contains("GLOBAL::\n\t.GVAR SCORE\n\t.GVAR HERE=FOYER\n"));
    assert!(data.contains(".DEBUG-FILE 1,\"cloak\",\"cloak.toml\""));
}

#[test]
fn test_frequent_words_file_preserved() {
    let temp = tempfile::tempdir().unwrap();
    std::fs::write(temp.path().join("zapgen.toml"), CLOAK).unwrap();
    let freq = temp.path().join("cloak_freq.zap");
    std::fs::write(&freq, "; hand written\n").unwrap();

    let (stdout, _) = assert_success(temp.path(), &["build"]);
    assert!(!stdout.contains("cloak_freq.zap"));
    assert_eq!(std::fs::read_to_string(&freq).unwrap(), "; hand written\n");

    assert_success(temp.path(), &["build", "--force-freq"]);
    assert!(std::fs::read_to_string(&freq).unwrap().contains("WORDS::"));
}

#[test]
fn test_dump_symbols_to_file() {
    let temp = tempfile::tempdir().unwrap();
    std::fs::write(temp.path().join("zapgen.toml"), CLOAK).unwrap();
    assert_success(temp.path(), &["build", "--dump-symbols=symbols.json"]);

    let json = std::fs::read_to_string(temp.path().join("symbols.json")).unwrap();
    let symbols: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(symbols["GO"], "routine");
    assert_eq!(symbols["HERE"], "global");
}

#[test]
fn test_build_errors() {
    let temp = tempfile::tempdir().unwrap();
    let stderr = assert_failure(temp.path(), &["build", "missing.toml"]);
    assert!(stderr.contains("failed to read"), "stderr:\n{}", stderr);

    std::fs::write(temp.path().join("zapgen.toml"), CLOAK).unwrap();
    let stderr = assert_failure(temp.path(), &["build", "--zversion", "9"]);
    assert!(stderr.contains("unsupported"), "stderr:\n{}", stderr);

    let broken = CLOAK.replace("default = \"FOYER\"", "default = \"ATTIC\"");
    std::fs::write(temp.path().join("broken.toml"), broken).unwrap();
    let stderr = assert_failure(temp.path(), &["build", "broken.toml"]);
    assert!(stderr.contains("unknown symbol 'ATTIC'"), "stderr:\n{}", stderr);
}
