// End-to-end loads of every supported dialect through the public entry
// points, against the fixtures under test_artifacts/.

use mesh_tools_lib::error::MeshError;
use mesh_tools_lib::md5::anim::decode_md5anim;
use mesh_tools_lib::{load_mesh, load_mesh_with_format, Format};

#[path = "common/mod.rs"]
mod common;

#[test]
fn cube_obj_unifies_with_every_material_resolved() {
    let mesh = load_mesh(&common::artifact("cube.obj")).expect("load cube");

    assert_eq!(mesh.positions.len(), 8);
    assert_eq!(mesh.texcoords.len(), 20);
    assert!(mesh.normals.is_empty());
    assert_eq!(mesh.faces.len(), 6);
    assert_eq!(mesh.groups.len(), 6);
    assert_eq!(mesh.materials.len(), 6);

    for face in &mesh.faces {
        assert_eq!(face.corners.len(), 4);
        let material = face.material.as_deref().expect("face without material");
        assert!(
            mesh.materials.contains_key(material),
            "unresolved material {:?}",
            material
        );
    }

    let bound: std::collections::BTreeSet<_> =
        mesh.faces.iter().filter_map(|f| f.material.clone()).collect();
    assert_eq!(bound.len(), 6, "each face binds its own material");
    assert!(bound.contains("Matte Gray"));
    assert!(bound.contains("Brushed Steel"));

    let steel = &mesh.materials["Brushed Steel"];
    assert_eq!(steel.diffuse_map.as_deref(), Some("textures/brushed steel.png"));

    let summary = mesh.summarize();
    assert!(summary.has_texcoords);
    assert!(!summary.has_normals);
    assert!(summary.warnings.iter().any(|w| w.contains("normals")));
}

#[test]
fn cube_without_its_library_fails_unresolved() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let obj_path = dir.path().join("cube.obj");
    std::fs::copy(common::artifact("cube.obj"), &obj_path).expect("copy cube.obj");

    match load_mesh(&obj_path) {
        Err(MeshError::UnresolvedMaterial { tokens }) => {
            assert_eq!(tokens, vec!["Red".to_string()]);
        }
        other => panic!("expected unresolved material, got {:?}", other),
    }
}

#[test]
fn md2_fixture_reconstructs_positions_and_texcoords() {
    let mesh = load_mesh(&common::artifact("tank.md2")).expect("load md2");

    assert_eq!(mesh.positions.len(), 4);
    let first = mesh.positions[0].to_slice();
    for (got, expected) in first.iter().zip([1.0f32, 2.0, 3.0]) {
        assert!((got - expected).abs() < 1e-5, "got {:?}", first);
    }

    assert_eq!(mesh.texcoords.len(), 4);
    assert_eq!(mesh.texcoords[2].to_slice(), [1.0, 1.0]);
    assert_eq!(mesh.normals[1].to_slice(), [0.0, 0.0, 1.0]);

    assert_eq!(mesh.faces.len(), 2);
    let winding: Vec<u32> = mesh.faces[0].corners.iter().map(|c| c.position).collect();
    assert_eq!(winding, vec![0, 2, 1], "triangle order must come through untouched");

    assert_eq!(mesh.groups.len(), 1);
    assert_eq!(mesh.groups[0].name, "tank");
    assert_eq!(mesh.groups[0].object.as_deref(), Some("models/tank.pcx"));
    assert!(mesh.materials.is_empty());
}

#[test]
fn md5mesh_fixture_builds_bind_pose_and_skeleton() {
    let mesh = load_mesh(&common::artifact("simple.md5mesh")).expect("load md5mesh");

    let skeleton = mesh.skeleton.as_ref().expect("md5mesh without skeleton");
    assert_eq!(skeleton.joints.len(), 3);
    assert_eq!(skeleton.joints[2].name, "left arm");
    assert_eq!(skeleton.joints[2].parent, Some(1));
    assert_eq!(skeleton.depth(), 3);

    // All joints are unrotated, so bind positions are weight offsets plus
    // joint origins, blended by bias.
    let near = |idx: usize, expected: [f32; 3]| {
        let got = mesh.positions[idx].to_slice();
        for k in 0..3 {
            assert!(
                (got[k] - expected[k]).abs() < 1e-5,
                "position {}: got {:?}, expected {:?}",
                idx,
                got,
                expected
            );
        }
    };
    near(0, [0.0, 0.0, 0.0]);
    near(1, [1.0, 0.0, 1.0]);
    near(2, [0.25, 0.0, 1.0]);
    near(3, [0.5, 1.0, 1.0]);

    assert_eq!(mesh.faces.len(), 2);
    assert_eq!(mesh.groups.len(), 1);
    assert_eq!(mesh.groups[0].name, "models/simple/body");
    assert_eq!(
        mesh.materials["models/simple/body"].diffuse_map.as_deref(),
        Some("models/simple/body")
    );
    assert!(mesh.normals.is_empty());
}

#[test]
fn md5anim_fixture_is_a_skeleton_only_mesh() {
    let mesh = load_mesh(&common::artifact("simple.md5anim")).expect("load md5anim");

    assert!(mesh.faces.is_empty());
    assert!(mesh.positions.is_empty());
    let skeleton = mesh.skeleton.as_ref().expect("md5anim without skeleton");
    assert_eq!(skeleton.joints.len(), 3);
    assert_eq!(skeleton.joints[1].position.to_slice(), [0.0, 0.0, 1.0]);
}

#[test]
fn md5anim_frames_rebuild_from_base_frame_and_flags() {
    let raw = decode_md5anim(include_str!("../test_artifacts/simple.md5anim"))
        .expect("decode md5anim");

    assert_eq!(raw.frame_rate, 24);
    assert_eq!(raw.commandline.as_deref(), Some("anim export simple bob"));
    assert_eq!(raw.frame_seq.len(), 2);

    // Only the origin joint animates; frame 1 lifts it to z = 2.
    assert_eq!(raw.frame_seq[1][0].position.to_slice(), [0.0, 0.0, 2.0]);
    assert_eq!(raw.frame_seq[1][1].position.to_slice(), [0.0, 0.0, 1.0]);
    assert_eq!(raw.bounds_seq[1].max.to_slice(), [1.0, 1.0, 3.0]);
}

#[test]
fn loading_the_same_file_twice_is_identical() {
    let first = load_mesh(&common::artifact("cube.obj")).expect("first load");
    let second = load_mesh(&common::artifact("cube.obj")).expect("second load");
    assert_eq!(first, second);

    let first = load_mesh(&common::artifact("tank.md2")).expect("first load");
    let second =
        load_mesh_with_format(&common::artifact("tank.md2"), Format::Md2).expect("second load");
    assert_eq!(first, second);
}
