//! Integration tests for the `pic` binary.

use assert_cmd::Command;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

/// `pic` isolated from the user's config and database.
fn pic(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("pic").unwrap();
    cmd.current_dir(temp_dir.path())
        .env("HOME", temp_dir.path())
        .arg("--db")
        .arg(temp_dir.path().join("pictura.db"));
    cmd
}

fn write_png(path: &Path, color: [u8; 3]) {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(12, 12, Rgb(color)))
        .save_with_format(path, ImageFormat::Png)
        .unwrap();
}

/// Two classes, "dark" and "bright", with three images each.
fn seed_images(temp_dir: &TempDir) {
    for (class, base) in [("dark", 20u8), ("bright", 220u8)] {
        let dir = temp_dir.path().join(class);
        std::fs::create_dir_all(&dir).unwrap();
        for i in 0..3u8 {
            write_png(&dir.join(format!("{i}.png")), [base + i * 5, base, base]);
        }
        pic(temp_dir).args(["class", "add", class]).assert().success();
        pic(temp_dir).args(["image", "add", class]).arg(&dir).assert().success();
    }
}

#[test]
fn test_class_add_and_list() {
    let temp_dir = TempDir::new().unwrap();

    pic(&temp_dir)
        .args(["class", "add", "cats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added class cats"));

    let output = pic(&temp_dir).args(["class", "list", "--json"]).output().unwrap();
    assert!(output.status.success());
    let classes: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(classes[0]["name"], "cats");
    assert_eq!(classes[0]["images"], 0);
}

#[test]
fn test_class_add_rejects_blank_name() {
    let temp_dir = TempDir::new().unwrap();

    pic(&temp_dir)
        .args(["class", "add", "  "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must not be empty"));
}

#[test]
fn test_image_add_to_unknown_class() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("a.png");
    write_png(&file, [1, 2, 3]);

    pic(&temp_dir)
        .args(["image", "add", "ghosts"])
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not found"));
}

#[test]
fn test_train_requires_enough_data() {
    let temp_dir = TempDir::new().unwrap();
    pic(&temp_dir).args(["class", "add", "only"]).assert().success();

    pic(&temp_dir)
        .arg("train")
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least 2 classes"));
}

#[test]
fn test_train_predict_and_inspect() {
    let temp_dir = TempDir::new().unwrap();
    seed_images(&temp_dir);

    pic(&temp_dir)
        .args([
            "train",
            "--epochs",
            "8",
            "--batch-size",
            "4",
            "--learning-rate",
            "0.05",
            "--validation-split",
            "0",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Epoch   8/8"))
        .stdout(predicate::str::contains("Model saved"));

    let probe = temp_dir.path().join("probe.png");
    write_png(&probe, [25, 20, 20]);
    let output = pic(&temp_dir).arg("predict").arg(&probe).arg("--json").output().unwrap();
    assert!(output.status.success());
    let predictions: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(predictions[0]["class_name"], "dark");

    let output = pic(&temp_dir).args(["model", "info", "--json"]).output().unwrap();
    let info: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(info["model"]["epochs_trained"], 8);
    assert_eq!(info["stale"], false);
    assert_eq!(info["last_hyperparams"]["epochs"], 8);
}

#[test]
fn test_train_json_streams_events() {
    let temp_dir = TempDir::new().unwrap();
    seed_images(&temp_dir);

    let output = pic(&temp_dir)
        .args(["train", "--epochs", "2", "--no-save", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let events: Vec<serde_json::Value> = String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let epochs: Vec<_> = events.iter().filter(|e| e["type"] == "epoch_end").map(|e| e["epoch"].clone()).collect();
    assert_eq!(epochs, vec![serde_json::json!(0), serde_json::json!(1)]);
    assert_eq!(events.last().unwrap()["type"], "training_end");

    pic(&temp_dir)
        .args(["predict", "dark/0.png"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No saved model"));
}

#[test]
fn test_reset_requires_confirmation() {
    let temp_dir = TempDir::new().unwrap();
    pic(&temp_dir).args(["class", "add", "cats"]).assert().success();

    pic(&temp_dir).arg("reset").assert().failure().stderr(predicate::str::contains("--yes"));
    pic(&temp_dir).args(["reset", "--yes"]).assert().success();

    pic(&temp_dir)
        .args(["class", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No classes yet"));
}

#[test]
fn test_local_config_sets_training_defaults() {
    let temp_dir = TempDir::new().unwrap();
    seed_images(&temp_dir);
    std::fs::write(temp_dir.path().join(".picturarc"), "[training]\nepochs = 3\n").unwrap();

    pic(&temp_dir)
        .args(["train", "--no-save"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Epoch   3/3"));
}
