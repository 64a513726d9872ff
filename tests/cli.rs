use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

fn asset_root() -> TempDir {
    let scene = r#"<scene>
  <object>
    <name>view</name>
    <type>camera</type>
    <position>400 300</position>
  </object>
  <object>
    <name>player</name>
    <type>quad</type>
    <position>10 20</position>
    <size>16 16</size>
    <color>255 255 0</color>
  </object>
</scene>
"#;
    let dir = tempfile::tempdir().expect("temp dir");
    fs::create_dir(dir.path().join("levels")).expect("create levels dir");
    fs::write(dir.path().join("levels/start.xml"), scene).expect("write scene");
    dir
}

#[test]
fn cli_runs_frames_and_prints_final_state() {
    let root = asset_root();
    let mut cmd = Command::cargo_bin("crystal-2d").expect("binary exists");
    cmd.arg(root.path())
        .args(["--scene", "levels/start.xml", "--frames", "3", "--fps", "200"]);
    cmd.assert()
        .success()
        .stdout(contains("Loaded scene with 2 objects"))
        .stdout(contains(" - player (Quad)"))
        .stdout(contains("Ran 3 frame(s)"))
        .stdout(contains("Final object states:"))
        .stdout(contains(" - player pos=(10.00, 20.00)"));
}

#[test]
fn held_escape_stops_the_loop_early() {
    let root = asset_root();
    let mut cmd = Command::cargo_bin("crystal-2d").expect("binary exists");
    cmd.arg(root.path())
        .args(["--scene", "levels/start.xml", "--frames", "1000"])
        .args(["--fps", "30", "--hold", "Escape"]);
    cmd.assert()
        .success()
        .stdout(contains("Ran 1000 frame(s)").not());
}

#[test]
fn missing_scene_reports_the_path() {
    let root = asset_root();
    let mut cmd = Command::cargo_bin("crystal-2d").expect("binary exists");
    cmd.arg(root.path()).args(["--scene", "nowhere.xml"]);
    cmd.assert()
        .failure()
        .stderr(contains("failed to start scene nowhere.xml"));
}

#[test]
fn usage_error_without_arguments() {
    let mut cmd = Command::cargo_bin("crystal-2d").expect("binary exists");
    cmd.assert().failure().stderr(contains("Usage: crystal-2d"));
}

#[test]
fn rejects_non_positive_update_rate() {
    let root = asset_root();
    let mut cmd = Command::cargo_bin("crystal-2d").expect("binary exists");
    cmd.arg(root.path()).args(["--tps", "0"]);
    cmd.assert()
        .failure()
        .stderr(contains("--tps must be positive"));
}
