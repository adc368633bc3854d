use std::fs;

use assert_cmd::Command;
use tempfile::tempdir;

fn dump_pages(stdout: &str) -> Vec<(String, String)> {
    let mut pages: Vec<(String, String)> = Vec::new();
    for line in stdout.lines() {
        if line.starts_with("--- page ") {
            pages.push((line.to_string(), String::new()));
        } else if let Some((_, body)) = pages.last_mut() {
            body.push_str(line);
        }
    }
    pages
}

#[test]
fn dump_covers_the_whole_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("story.txt");
    let text = "the quiet lamp burned low while the rain kept on. ".repeat(30);
    fs::write(&path, &text).unwrap();

    let output = Command::cargo_bin("hushread")
        .unwrap()
        .args(["--dump", "--columns", "24", "--rows", "6"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let pages = dump_pages(&stdout);
    assert!(pages.len() > 1);
    assert!(pages[0].0.starts_with("--- page 1 @0.."));
    let rebuilt: String = pages.iter().map(|(_, body)| body.as_str()).collect();
    assert_eq!(rebuilt, text);
}

#[test]
fn dump_starts_at_requested_percent() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("digits.txt");
    fs::write(&path, "0123456789".repeat(100)).unwrap();

    let output = Command::cargo_bin("hushread")
        .unwrap()
        .args(["--dump", "--percent", "50"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("--- page 1 @500.."), "{stdout}");
}

#[test]
fn dump_at_full_percent_shows_last_char() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("digits.txt");
    fs::write(&path, "0123456789".repeat(100)).unwrap();

    let output = Command::cargo_bin("hushread")
        .unwrap()
        .args(["--dump", "--percent", "100"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let pages = dump_pages(&stdout);
    assert_eq!(pages.len(), 1);
    assert!(pages[0].0.starts_with("--- page 1 @999..1000"), "{stdout}");
    assert_eq!(pages[0].1, "9");
}

#[test]
fn missing_file_fails() {
    let dir = tempdir().unwrap();
    let output = Command::cargo_bin("hushread")
        .unwrap()
        .arg("--dump")
        .arg(dir.path().join("absent.txt"))
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not found"));
}
