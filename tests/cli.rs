use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn bin() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("keyfort"))
}

#[test]
fn format_creates_store_image() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("test.img");

    bin()
        .arg("--store")
        .arg(&store)
        .arg("format")
        .arg("--name")
        .arg("TESTDEV")
        .write_stdin("pw\npw\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("store formatted"));

    assert!(store.exists());
}

#[test]
fn format_fails_if_image_exists() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("test.img");

    bin()
        .arg("--store")
        .arg(&store)
        .arg("format")
        .write_stdin("pw\npw\n")
        .assert()
        .success();

    bin()
        .arg("--store")
        .arg(&store)
        .arg("format")
        .write_stdin("pw\npw\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn format_with_mismatched_confirmation_fails() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("test.img");

    bin()
        .arg("--store")
        .arg(&store)
        .arg("format")
        .write_stdin("pw\nother\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("do not match"));

    assert!(!store.exists());
}

#[test]
fn insert_and_show_roundtrip() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("test.img");

    bin()
        .arg("--store")
        .arg(&store)
        .arg("format")
        .write_stdin("pw\npw\n")
        .assert()
        .success();

    bin()
        .env("KEYFORT_PASSPHRASE", "pw")
        .arg("--store")
        .arg(&store)
        .arg("insert")
        .arg("mail")
        .arg("alice")
        .arg("hunter2")
        .assert()
        .success()
        .stdout(predicate::str::contains("stored 'mail' at index 0"));

    bin()
        .env("KEYFORT_PASSPHRASE", "pw")
        .arg("--store")
        .arg(&store)
        .arg("show")
        .arg("0")
        .assert()
        .success()
        .stdout(predicate::str::contains("login:  alice"))
        .stdout(predicate::str::contains("secret: hunter2"));
}

#[test]
fn listing_is_sorted_by_title() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("test.img");

    bin()
        .arg("--store")
        .arg(&store)
        .arg("format")
        .write_stdin("pw\npw\n")
        .assert()
        .success();

    for (title, login) in [("Zebra", "u1"), ("Apple", "u2")] {
        bin()
            .env("KEYFORT_PASSPHRASE", "pw")
            .arg("--store")
            .arg(&store)
            .arg("insert")
            .arg(title)
            .arg(login)
            .arg("s")
            .assert()
            .success();
    }

    bin()
        .env("KEYFORT_PASSPHRASE", "pw")
        .arg("--store")
        .arg(&store)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains(" 0  Apple"))
        .stdout(predicate::str::contains(" 1  Zebra"));
}

#[test]
fn wrong_passphrase_fails() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("test.img");

    bin()
        .arg("--store")
        .arg(&store)
        .arg("format")
        .write_stdin("pw\npw\n")
        .assert()
        .success();

    bin()
        .env("KEYFORT_PASSPHRASE", "wrong_pw")
        .arg("--store")
        .arg(&store)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("wrong passphrase"));
}

#[test]
fn actions_fail_if_image_is_missing() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("missing.img");

    bin()
        .env("KEYFORT_PASSPHRASE", "pw")
        .arg("--store")
        .arg(&store)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to open store image"));
}

#[test]
fn remove_compacts_indices() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("test.img");

    bin()
        .arg("--store")
        .arg(&store)
        .arg("format")
        .write_stdin("pw\npw\n")
        .assert()
        .success();

    for title in ["alpha", "beta"] {
        bin()
            .env("KEYFORT_PASSPHRASE", "pw")
            .arg("--store")
            .arg(&store)
            .arg("insert")
            .arg(title)
            .arg("u")
            .arg("s")
            .assert()
            .success();
    }

    bin()
        .env("KEYFORT_PASSPHRASE", "pw")
        .arg("--store")
        .arg(&store)
        .arg("remove")
        .arg("0")
        .assert()
        .success()
        .stdout(predicate::str::contains("entry 0 removed"));

    bin()
        .env("KEYFORT_PASSPHRASE", "pw")
        .arg("--store")
        .arg(&store)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains(" 0  beta"))
        .stdout(predicate::str::contains("alpha").not());
}

#[test]
fn remove_out_of_range_fails() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("test.img");

    bin()
        .arg("--store")
        .arg(&store)
        .arg("format")
        .write_stdin("pw\npw\n")
        .assert()
        .success();

    bin()
        .env("KEYFORT_PASSPHRASE", "pw")
        .arg("--store")
        .arg(&store)
        .arg("remove")
        .arg("7")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no entry at index 7"));
}

#[test]
fn change_pass_rekeys_the_store() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("test.img");

    bin()
        .arg("--store")
        .arg(&store)
        .arg("format")
        .write_stdin("old\nold\n")
        .assert()
        .success();

    bin()
        .env("KEYFORT_PASSPHRASE", "old")
        .arg("--store")
        .arg(&store)
        .arg("insert")
        .arg("mail")
        .arg("alice")
        .arg("s3cret")
        .assert()
        .success();

    // Current passphrase from the environment, new one from stdin.
    bin()
        .env("KEYFORT_PASSPHRASE", "old")
        .arg("--store")
        .arg(&store)
        .arg("change-pass")
        .write_stdin("new\nnew\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("passphrase changed"));

    bin()
        .env("KEYFORT_PASSPHRASE", "old")
        .arg("--store")
        .arg(&store)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("wrong passphrase"));

    bin()
        .env("KEYFORT_PASSPHRASE", "new")
        .arg("--store")
        .arg(&store)
        .arg("show")
        .arg("0")
        .assert()
        .success()
        .stdout(predicate::str::contains("secret: s3cret"));
}

#[test]
fn info_reports_header_without_passphrase() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("test.img");

    bin()
        .arg("--store")
        .arg(&store)
        .arg("format")
        .arg("--name")
        .arg("POCKETDEV")
        .write_stdin("pw\npw\n")
        .assert()
        .success();

    bin()
        .arg("--store")
        .arg(&store)
        .arg("info")
        .assert()
        .success()
        .stdout(predicate::str::contains("device:  POCKETDEV"))
        .stdout(predicate::str::contains("entries: 0/64"));
}

#[test]
fn generate_prints_password_of_requested_length() {
    bin()
        .arg("generate")
        .arg("--length")
        .arg("16")
        .assert()
        .success()
        .stdout(predicate::function(|out: &str| out.trim().len() == 16));
}
