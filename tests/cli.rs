use assert_cmd::prelude::*;
use predicates::str::contains;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

fn binary() -> Command {
    Command::cargo_bin("tutorial-scenes").expect("binary exists")
}

#[test]
fn cli_runs_builtin_scene_and_applies_edits() {
    let mut cmd = binary();
    cmd.arg("basics")
        .arg("--summary-only")
        .arg("--set")
        .arg("PointLight Intensity=1.5")
        .arg("--set")
        .arg("Sphere XZ Plane=1,-20");
    cmd.assert()
        .success()
        .stdout(contains(
            "Loaded scene 'basics' with 10 objects (3 lights, 5 controls)",
        ))
        .stdout(contains(" - SpotLight (spot-light)"))
        .stdout(contains(" - SpotLightHelper (spot-light-helper)"))
        .stdout(contains("Set PointLight Intensity = 1.50"))
        .stdout(contains("Set Sphere XZ Plane = (1.00, -16.00)"))
        .stdout(contains("Rendered 120 frame(s)"))
        .stdout(contains("fps=60"))
        .stdout(contains(
            " - Cube pos=(-5.00, 3.00, 5.00) color=(0.98, 0.00, 0.54)",
        ))
        .stdout(contains(
            " - Sphere pos=(1.00, 5.00, -16.00) color=(0.00, 0.54, 0.98)",
        ))
        .stdout(contains(
            " - PointLight pos=(16.00, 16.00, 16.00) color=(1.00, 1.00, 1.00) intensity=1.50",
        ));
}

#[test]
fn cli_loads_scene_file_with_model_relative_to_it() {
    let dir = TempDir::new().expect("temp dir");
    fs::write(
        dir.path().join("tri.obj"),
        "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n",
    )
    .expect("write model");
    let scene = r#"<scene name="custom">
  <object>
    <name>Light</name>
    <type>point-light</type>
    <position>0 4 0</position>
  </object>
  <object>
    <name>Tri</name>
    <type>model</type>
    <model>tri.obj</model>
    <color>0xff0000</color>
  </object>
  <animation>
    <target>Tri</target>
    <kind>spin</kind>
    <per-frame>0 0.01 0</per-frame>
  </animation>
</scene>
"#;
    let path = dir.path().join("scene.xml");
    fs::write(&path, scene).expect("write scene");

    let mut cmd = binary();
    cmd.arg(&path).arg("--summary-only").arg("--frames").arg("3");
    cmd.assert()
        .success()
        .stdout(contains(
            "Loaded scene 'custom' with 2 objects (1 lights, 0 controls)",
        ))
        .stdout(contains(" - Tri (model)"))
        .stdout(contains("Rendered 3 frame(s), 1 draw(s) in the last frame"))
        .stdout(contains(
            " - Tri pos=(0.00, 0.00, 0.00) color=(1.00, 0.00, 0.00)",
        ));
}

#[test]
fn cli_rejects_edit_of_unknown_control() {
    let mut cmd = binary();
    cmd.arg("basics")
        .arg("--summary-only")
        .arg("--set")
        .arg("Moon=1");
    cmd.assert()
        .failure()
        .stderr(contains("failed to set Moon"));
}

#[test]
fn cli_reports_unknown_scene() {
    let mut cmd = binary();
    cmd.arg("teapot").arg("--summary-only");
    cmd.assert()
        .failure()
        .stderr(contains("unknown scene teapot"));
}

#[test]
fn cli_lists_builtin_scenes() {
    let mut cmd = binary();
    cmd.arg("--list");
    cmd.assert()
        .success()
        .stdout(contains("boilerplate"))
        .stdout(contains("basics"))
        .stdout(contains("animation-hierarchy"));
}
