//! End-to-end scene lifecycle against the counting device double.
//!
//! Exercises the full path: scene text parsing, OBJ/MTL decode, material
//! and texture staging, cubemap synthesis, aggregate upload, and reverse
//! order release, asserting the net-zero allocation property throughout.

use std::fs;
use std::path::PathBuf;

use arttracer::device::testing::CountingBackend;
use arttracer::scene::data::Face;
use arttracer::{Scene, SceneState};

fn scene_dir(tag: &str) -> PathBuf {
    // Surfaces the loader's warn!/info! diagnostics under `cargo test`.
    let _ = env_logger::builder().is_test(true).try_init();

    let dir = std::env::temp_dir().join(format!("arttracer-e2e-{}-{}", tag, std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// One triangle with full position/texcoord/normal attributes and a
/// trivial untextured material.
fn write_triangle_assets(dir: &PathBuf) {
    fs::write(
        dir.join("tri.mtl"),
        "newmtl simple\nKd 0.8 0.8 0.8\n",
    )
    .unwrap();
    fs::write(
        dir.join("tri.obj"),
        "\
mtllib tri.mtl
v 0 0 0
v 1 0 0
v 0 1 0
vt 0 0
vt 1 0
vt 0 1
vn 0 0 1
usemtl simple
f 1/1/1 2/2/1 3/3/1
",
    )
    .unwrap();
}

#[test]
fn full_scene_uploads_with_expected_shape() {
    let dir = scene_dir("full");
    write_triangle_assets(&dir);
    fs::write(
        dir.join("crate.scene"),
        "\
# hand-authored test scene
camera 0 1 3  0 0 -1  90
p_light 0 5 0  1 1 1  10 0.5
p_light 2 2 2  1 0.5 0  3 0.1
scene tri.obj
",
    )
    .unwrap();

    let backend = CountingBackend::new();
    let mut scene = Scene::new(dir.join("crate.scene"));

    let camera = scene.upload(&backend).expect("upload should succeed");

    assert_eq!(scene.state(), SceneState::Uploaded);
    assert!((camera.fov_x - std::f32::consts::FRAC_PI_2).abs() < 1e-6);

    let data = scene.data().expect("uploaded scene exposes its aggregate");
    assert_eq!(data.lights.len, 2);
    assert_eq!(data.meshes.len, 1);
    assert_eq!(data.materials.len, 1);
    // Untextured material set: no texture table entries.
    assert_eq!(data.textures.len, 0);
    // No cubemap directive: default uniform-color synthesis, 1x1 faces.
    assert_eq!(data.cubemap.edge, 1);
    assert_eq!(data.cubemap.layers, 6);

    // The single shape uploaded exactly one face record.
    let uploads = backend.uploads();
    let faces = uploads
        .iter()
        .find(|(label, _)| label == "scene.mesh[0].faces")
        .expect("face buffer uploaded");
    assert_eq!(faces.1, std::mem::size_of::<Face>());

    assert!(scene.device_root().is_some());
}

#[test]
fn upload_then_release_nets_zero_allocations() {
    let dir = scene_dir("lifecycle");
    write_triangle_assets(&dir);
    fs::write(
        dir.join("crate.scene"),
        "camera 0 0 2  0 0 -1  75\np_light 0 5 0 1 1 1 10 0.5\nscene tri.obj\ncubemap 0x05070A\n",
    )
    .unwrap();

    let backend = CountingBackend::new();
    let mut scene = Scene::new(dir.join("crate.scene"));

    scene.upload(&backend).unwrap();
    assert!(backend.live() > 0);

    scene.release(&backend);
    assert_eq!(scene.state(), SceneState::Released);
    assert_eq!(backend.live(), 0);
    assert!(scene.device_root().is_none());

    // Double release is guarded by the state machine.
    scene.release(&backend);
    assert_eq!(backend.live(), 0);
}

#[test]
fn release_order_is_reverse_of_allocation_order() {
    let dir = scene_dir("order");
    write_triangle_assets(&dir);
    fs::write(dir.join("crate.scene"), "scene tri.obj\n").unwrap();

    let backend = CountingBackend::new();
    let mut scene = Scene::new(dir.join("crate.scene"));
    scene.upload(&backend).unwrap();
    scene.release(&backend);

    let destroyed = backend.destroyed_labels();
    // Strict reverse allocation order: the aggregate goes first (it was
    // allocated last, once every nested buffer existed), so no
    // device-visible record ever references freed storage.
    assert_eq!(destroyed.first().map(String::as_str), Some("scene.data"));
    assert_eq!(destroyed.len() as u64, backend.created());

    let meshes = destroyed.iter().position(|l| l == "scene.meshes").unwrap();
    let faces = destroyed
        .iter()
        .position(|l| l == "scene.mesh[0].faces")
        .unwrap();
    assert!(meshes < faces);
}

#[test]
fn second_upload_after_release_rebuilds_the_scene() {
    let dir = scene_dir("reupload");
    write_triangle_assets(&dir);
    fs::write(dir.join("crate.scene"), "scene tri.obj\n").unwrap();

    let backend = CountingBackend::new();
    let mut scene = Scene::new(dir.join("crate.scene"));

    scene.upload(&backend).unwrap();
    scene.release(&backend);
    scene.upload(&backend).unwrap();

    assert_eq!(scene.state(), SceneState::Uploaded);
    assert!(backend.live() > 0);

    scene.release(&backend);
    assert_eq!(backend.live(), 0);
}
