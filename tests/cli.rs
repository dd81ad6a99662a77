//! Command line behaviour of the `kodegen_bundler_pack` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::{fs::File, io::Write, path::Path};
use tempfile::TempDir;
use zip::{ZipWriter, write::SimpleFileOptions};

fn write_apk(path: &Path, entries: &[&str]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    for name in entries {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(name.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

fn project(entries: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("Pack.toml"),
        r#"
[pack]
name = "Demo"
project_name = "app"

[attributes]
Pack-Name = "Demo"

[signing]
config_file = "missing.properties"

[push]
device_config = "pack-config/devices.json"
"#,
    )
    .unwrap();
    write_apk(
        &dir.path().join("build/outputs/apk/release/app-release.apk"),
        entries,
    );
    dir
}

fn pack() -> Command {
    let mut cmd = Command::cargo_bin("kodegen_bundler_pack").unwrap();
    cmd.env_remove("PACK_CONFIG").env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_describes_tool() {
    pack()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--no-sign"))
        .stdout(predicate::str::contains("--build-type"));
}

#[test]
fn missing_config_fails() {
    let dir = TempDir::new().unwrap();
    pack()
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config"));
}

#[test]
fn packs_without_signing_or_push() {
    let dir = project(&["classes.dex", "classes2.dex", "res/x.png"]);

    pack()
        .current_dir(dir.path())
        .args(["--no-sign", "--no-push"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Extracted 2 payload(s)"))
        .stdout(predicate::str::contains("SHA256:"));

    assert!(
        dir.path()
            .join("build/outputs/pack/release/Demo_unsigned.jar")
            .is_file()
    );
    assert!(!dir.path().join("build/outputs/pack/release/Demo.jar").exists());
}

#[test]
fn quiet_run_prints_nothing() {
    let dir = project(&["classes.dex"]);

    pack()
        .arg("--config")
        .arg(dir.path().join("Pack.toml"))
        .args(["--no-sign", "--no-push", "--quiet"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn archive_without_payload_fails() {
    let dir = project(&["res/x.png"]);

    pack()
        .current_dir(dir.path())
        .args(["--no-sign", "--no-push"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not find a single entry matching"));
}

#[test]
fn missing_signing_properties_fails() {
    let dir = project(&["classes.dex"]);

    pack()
        .current_dir(dir.path())
        .arg("--no-push")
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing.properties"));
}

#[test]
fn invalid_build_type_is_rejected() {
    let dir = project(&["classes.dex"]);

    pack()
        .current_dir(dir.path())
        .args(["--build-type", "../etc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid build type"));
}
