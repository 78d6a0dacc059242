use std::fs;
use std::path::PathBuf;
use std::process::Command;

fn bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_delivery_latency"))
}

#[test]
fn no_root_argument_exits_with_one() {
    let output = Command::new(bin()).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("please give a path"), "stderr: {}", stderr);
}

#[test]
fn missing_root_directory_fails() {
    let root = tempfile::tempdir().unwrap();
    let output = Command::new(bin())
        .arg(root.path().join("absent"))
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn prints_run_summary_and_writes_files() {
    let root = tempfile::tempdir().unwrap();
    let csv_dir = root.path().join("run1").join("csv");
    fs::create_dir_all(&csv_dir).unwrap();
    fs::write(csv_dir.join("config.csv"), "2,60\nname,id\nna,A\nnb,B\n").unwrap();
    fs::write(csv_dir.join("A.csv"), "h\nOUT,100,e1,d1,0,0,0\n").unwrap();
    fs::write(csv_dir.join("B.csv"), "h\nIN,150,e1,d1,0,0,0\n").unwrap();

    let output = Command::new(bin())
        .arg(root.path())
        .arg("--no-table")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("avg delivery latency: 50.0 ms"), "stdout: {}", stdout);
    assert!(stdout.contains("error count: 0"));
    assert!(stdout.contains("missing message count: 0"));
    assert_eq!(
        fs::read_to_string(csv_dir.join("result.csv")).unwrap(),
        "100,e1-d1,50.0\n"
    );
    assert!(csv_dir.join("latency.csv").exists());
}
