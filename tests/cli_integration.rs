use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

fn bin_path() -> String {
    std::env::var("CARGO_BIN_EXE_snipdeck").expect("CARGO_BIN_EXE_snipdeck is set by cargo test")
}

fn run(args: &[&str]) -> Output {
    eprintln!("[TEST] args={:?}", args);
    Command::new(bin_path())
        .args(args)
        .output()
        .expect("run snipdeck")
}

fn run_with_stdin(args: &[&str], stdin: &str) -> Output {
    eprintln!("[TEST] args={:?} stdin_bytes={}", args, stdin.len());
    let mut child = Command::new(bin_path())
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn snipdeck");
    child
        .stdin
        .take()
        .expect("child stdin")
        .write_all(stdin.as_bytes())
        .expect("write stdin");
    child.wait_with_output().expect("collect output")
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn context(output: &Output) -> String {
    format!(
        "status={}\nstdout:\n{}\nstderr:\n{}",
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("write fixture");
    path
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("utf-8 temp path")
}

#[test]
fn test_normalize_stdin() {
    let output = run_with_stdin(&["normalize"], "\n\n  \nfoo\n\nbar\n\n\n");
    assert!(output.status.success(), "{}", context(&output));
    assert_eq!(stdout_of(&output), "foo\n\nbar\n");
}

#[test]
fn test_normalize_all_blank_prints_nothing() {
    let output = run_with_stdin(&["normalize", "-"], "\n \t\n\n");
    assert!(output.status.success(), "{}", context(&output));
    assert_eq!(stdout_of(&output), "");
}

#[test]
fn test_normalize_file() {
    let tmp = TempDir::new().expect("tempdir");
    let snippet = write(tmp.path(), "snippet.scala", "\n\nval x = 1\n  \n");

    let output = run(&["normalize", path_arg(&snippet)]);
    assert!(output.status.success(), "{}", context(&output));
    assert_eq!(stdout_of(&output), "val x = 1\n");
}

#[test]
fn test_normalize_unicode_whitespace_flag() {
    let input = "\u{a0}\nfoo\n";

    let ascii = run_with_stdin(&["normalize"], input);
    assert_eq!(stdout_of(&ascii), "\u{a0}\nfoo\n");

    let unicode = run_with_stdin(&["normalize", "--unicode-whitespace"], input);
    assert_eq!(stdout_of(&unicode), "foo\n");
}

#[test]
fn test_normalize_missing_file() {
    let output = run(&["normalize", "/definitely/not/here.txt"]);
    assert_eq!(output.status.code(), Some(1), "{}", context(&output));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Error: file not found"),
        "{}",
        context(&output)
    );
}

#[test]
fn test_page_to_stdout() {
    let tmp = TempDir::new().expect("tempdir");
    let page = write(
        tmp.path(),
        "page.html",
        "<PRE class=\"x\"><Code>\n\nfn main() {}\n\n</code></PRE>\n<code>\n\nuntouched\n</code>\n",
    );

    let output = run(&["page", path_arg(&page)]);
    assert!(output.status.success(), "{}", context(&output));
    assert_eq!(
        stdout_of(&output),
        "<PRE class=\"x\"><Code>fn main() {}</code></PRE>\n<code>\n\nuntouched\n</code>\n"
    );
}

#[test]
fn test_page_to_output_file() {
    let tmp = TempDir::new().expect("tempdir");
    let page = write(tmp.path(), "page.html", "<pre><code>\n a\n\n</code></pre>");
    let out = tmp.path().join("out.html");

    let output = run(&["page", path_arg(&page), "-o", path_arg(&out)]);
    assert!(output.status.success(), "{}", context(&output));
    assert_eq!(stdout_of(&output), "");
    assert_eq!(
        fs::read_to_string(&out).expect("read output"),
        "<pre><code> a</code></pre>"
    );
}

#[test]
fn test_check_reports_findings() {
    let tmp = TempDir::new().expect("tempdir");
    let deck = write(
        tmp.path(),
        "talk.md",
        "# Talk\n\n```scala\n\nval x = 1\n```\n\n```\nclean\n```\n",
    );

    let output = run(&["check", path_arg(&deck)]);
    assert!(output.status.success(), "{}", context(&output));
    let stdout = stdout_of(&output);
    assert_eq!(stdout.lines().count(), 1, "{}", context(&output));
    assert!(
        stdout.contains("talk.md:3-6: scala block has 1 leading and 0 trailing blank line(s)"),
        "{}",
        context(&output)
    );
}

#[test]
fn test_check_strict_exit_status() {
    let tmp = TempDir::new().expect("tempdir");
    let dirty = write(tmp.path(), "dirty.md", "```\n\nx\n```\n");
    let clean = write(tmp.path(), "clean.md", "```\nx\n```\n");

    let output = run(&["check", "--strict", path_arg(&dirty)]);
    assert_eq!(output.status.code(), Some(1), "{}", context(&output));

    let output = run(&["check", "--strict", path_arg(&clean)]);
    assert!(output.status.success(), "{}", context(&output));
    assert_eq!(stdout_of(&output), "");
}

#[test]
fn test_check_html_summary() {
    let tmp = TempDir::new().expect("tempdir");
    let page = write(
        tmp.path(),
        "page.html",
        "<pre><code>\nx\n</code></pre><pre><code>y</code></pre>",
    );

    let output = run(&["check", path_arg(&page)]);
    assert!(output.status.success(), "{}", context(&output));
    assert!(
        stdout_of(&output).contains("page.html: 1 of 2 block(s) have boundary blank lines"),
        "{}",
        context(&output)
    );
}

#[test]
fn test_check_rejects_unknown_extension() {
    let tmp = TempDir::new().expect("tempdir");
    let other = write(tmp.path(), "notes.txt", "hello\n");

    let output = run(&["check", path_arg(&other)]);
    assert_eq!(output.status.code(), Some(1), "{}", context(&output));
}

#[test]
fn test_build_standalone_page() {
    let tmp = TempDir::new().expect("tempdir");
    let deck = write(
        tmp.path(),
        "talk.md",
        "---\ntitle: Build Test\ncontrols: true\n---\n\n# One\n\n---\n\n```rust\n\nfn main() {}\n\n```\n",
    );
    let out = tmp.path().join("talk.html");

    let output = run(&["build", path_arg(&deck), "-o", path_arg(&out)]);
    assert!(output.status.success(), "{}", context(&output));

    let page = fs::read_to_string(&out).expect("read built page");
    assert!(page.starts_with("<!DOCTYPE html>"), "{page}");
    assert!(page.contains("<title>Build Test</title>"), "{page}");
    assert_eq!(page.matches("<section>").count(), 2, "{page}");
    assert!(page.contains("\"controls\":true"), "{page}");
    assert!(page.contains("hl-code language-rust"), "{page}");
    assert!(
        !page.contains("/assets/snipdeck.css"),
        "standalone page must inline its stylesheet\n{page}"
    );
}

#[test]
fn test_build_unknown_theme() {
    let tmp = TempDir::new().expect("tempdir");
    let deck = write(tmp.path(), "talk.md", "# One\n");

    let output = run(&["build", path_arg(&deck), "--theme", "no-such-theme"]);
    assert_eq!(output.status.code(), Some(1), "{}", context(&output));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown highlight theme"), "{}", context(&output));
}

#[test]
fn test_themes_lists_default() {
    let output = run(&["themes"]);
    assert!(output.status.success(), "{}", context(&output));
    let stdout = stdout_of(&output);
    assert!(
        stdout.lines().any(|l| l == "base16-ocean.dark"),
        "{}",
        context(&output)
    );
}
