use std::fs;

use predicates::prelude::*;

const CACHED_PAGE: &str = r#"<html><body><ol>
<li class="work blurb group">
  <h4 class="heading"><a href="/works/1">Only Work</a></h4>
  <h5 class="fandoms heading"><a class="tag">Fandom</a></h5>
  <p class="datetime">03 Mar 2023</p>
  <ul class="tags"><li class="characters"><a class="tag">Alice</a></li></ul>
</li>
</ol></body></html>"#;

#[test]
fn help_lists_the_phases() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("tagtally");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("crawl"))
        .stdout(predicate::str::contains("analyze"))
        .stdout(predicate::str::contains("run"));
}

#[test]
fn crawl_has_no_delay_flag() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("tagtally");
    cmd.args(["crawl", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("delay").not());
}

#[test]
fn analyze_reports_a_cache_without_manifest() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    let pages = temp.path().join("pages");
    let out = temp.path().join("csv");
    fs::create_dir_all(&pages)?;
    fs::write(pages.join("page_1.html"), CACHED_PAGE)?;
    fs::write(pages.join("notes.txt"), "not a page")?;

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("tagtally");
    cmd.args([
        "analyze",
        "--pages",
        pages.to_str().unwrap(),
        "--out",
        out.to_str().unwrap(),
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains("Analyzed 1 works from 1 of 1 pages"))
    .stdout(predicate::str::contains("1. Alice: 1"))
    .stderr(predicate::str::contains("no download manifest"));

    let characters = fs::read(out.join("characters.csv"))?;
    assert!(characters.starts_with(b"\xEF\xBB\xBFtag,count,ground_truth"));
    assert!(out.join("works.csv").exists());
    assert!(out.join("yearly/characters.csv").exists());
    assert!(out.join("reconciliation/summary.csv").exists());
    assert!(!out.join("relationships.csv").exists());

    Ok(())
}

#[test]
fn rust_log_debug_emits_debug_line_to_stderr() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    let pages = temp.path().join("pages");
    fs::create_dir_all(&pages)?;

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("tagtally");
    cmd.env("RUST_LOG", "debug")
        .args([
            "analyze",
            "--pages",
            pages.to_str().unwrap(),
            "--out",
            temp.path().join("csv").to_str().unwrap(),
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("parsed cli"));

    Ok(())
}

#[test]
fn non_http_url_fails_with_context() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("tagtally");
    cmd.args([
        "crawl",
        "--url",
        "ftp://archive.test/tags/X/works",
        "--out",
        temp.path().join("pages").to_str().unwrap(),
    ])
    .assert()
    .failure()
    .code(1)
    .stderr(predicate::str::contains("crawl"))
    .stderr(predicate::str::contains("http/https"));

    Ok(())
}

#[test]
fn prompt_without_answer_fails_before_creating_a_workspace() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("tagtally");
    cmd.current_dir(temp.path())
        .write_stdin("")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Tag listing URL: "))
        .stderr(predicate::str::contains("no tag listing URL given"));

    assert_eq!(fs::read_dir(temp.path())?.count(), 0);
    Ok(())
}
