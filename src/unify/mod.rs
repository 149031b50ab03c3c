//! Assembly of raw per-format structures into the canonical [`Mesh`].
//!
//! Decoders stay record-local; everything relational is enforced here.
//! Indices must land inside their pools, material references must resolve,
//! joint parents must precede their children. A mesh that fails any of
//! these never leaves this module.

use std::collections::BTreeMap;

use log::debug;

use crate::error::{MeshError, Result};
use crate::math::{Vec2, Vec3};
use crate::md2::RawMd2;
use crate::md5::anim::RawMd5Anim;
use crate::md5::mesh::{Md5Joint, Md5SubMesh, Md5Vertex, RawMd5Mesh};
use crate::mesh::{Face, Group, Joint, Material, Mesh, Skeleton, VertexRef};
use crate::obj::material::resolve_material_name;
use crate::obj::mesh::RawObj;

/// Every chunk becomes one group window over the face list, and every
/// `usemtl` reference is resolved against the merged material map.
pub fn unify_obj(
    name: &str,
    raw: RawObj,
    materials: BTreeMap<String, Material>,
) -> Result<Mesh> {
    let mut faces = Vec::new();
    let mut groups = Vec::with_capacity(raw.chunks.len());

    for chunk in raw.chunks {
        let material = match &chunk.material {
            Some(tokens) => Some(resolve_material_name(tokens, &materials)?),
            None => None,
        };

        let start_face = faces.len() as u32;
        for face in chunk.faces {
            let corners = face
                .corners
                .iter()
                .map(|c| VertexRef {
                    position: c.position,
                    texcoord: c.texcoord,
                    normal: c.normal,
                })
                .collect();
            faces.push(Face {
                corners,
                material: material.clone(),
            });
        }

        groups.push(Group {
            name: chunk.group,
            start_face,
            face_count: faces.len() as u32 - start_face,
            object: chunk.object,
            smoothing: chunk.smoothing,
        });
    }

    let mesh = Mesh {
        name: name.to_string(),
        positions: raw.positions,
        texcoords: raw.texcoords,
        normals: raw.normals,
        faces,
        groups,
        materials,
        skeleton: None,
    };
    mesh.validate()?;
    debug!(
        "unified {:?}: {} faces in {} groups",
        mesh.name,
        mesh.faces.len(),
        mesh.groups.len()
    );
    Ok(mesh)
}

/// The first frame supplies the attribute pools; texture coordinates are
/// normalized by the skin dimensions on the way in. The whole model
/// becomes a single group, with the first skin path as its object name.
pub fn unify_md2(name: &str, raw: RawMd2) -> Result<Mesh> {
    let width = raw.header.skin_width as f32;
    let height = raw.header.skin_height as f32;
    let texcoords: Vec<Vec2> = raw
        .st_seq
        .iter()
        .map(|st| Vec2::new(st.s as f32 / width, st.t as f32 / height))
        .collect();
    let object = raw.skin_seq.first().cloned();

    let (positions, normals) = match raw.frame_seq.into_iter().next() {
        Some(frame) => (frame.positions, frame.normals),
        None => (Vec::new(), Vec::new()),
    };

    let has_texcoords = !texcoords.is_empty();
    let has_normals = !normals.is_empty();
    let mut faces = Vec::with_capacity(raw.tri_seq.len());
    for tri in raw.tri_seq {
        let corners = (0..3)
            .map(|k| {
                let position = tri.vertex_indices[k] as u32;
                VertexRef {
                    position,
                    texcoord: has_texcoords.then(|| tri.st_indices[k] as u32),
                    normal: has_normals.then_some(position),
                }
            })
            .collect();
        faces.push(Face {
            corners,
            material: None,
        });
    }

    let mut groups = Vec::new();
    if !faces.is_empty() {
        groups.push(Group {
            name: name.to_string(),
            start_face: 0,
            face_count: faces.len() as u32,
            object,
            smoothing: None,
        });
    }

    let mesh = Mesh {
        name: name.to_string(),
        positions,
        texcoords,
        normals,
        faces,
        groups,
        materials: BTreeMap::new(),
        skeleton: None,
    };
    mesh.validate()?;
    debug!(
        "unified {:?}: {} faces from the first frame",
        mesh.name,
        mesh.faces.len()
    );
    Ok(mesh)
}

/// Skinned submeshes flatten into shared pools: each vertex gets its
/// bind-pose position (the bias-weighted sum of its weights, each carried
/// into joint space), each submesh becomes a group named after its shader,
/// and each shader becomes a material whose diffuse map is the shader path.
pub fn unify_md5mesh(name: &str, raw: RawMd5Mesh) -> Result<Mesh> {
    let joints: Vec<Joint> = raw
        .joint_seq
        .iter()
        .map(|j| Joint {
            name: j.name.clone(),
            parent: (j.parent >= 0).then_some(j.parent as u32),
            position: j.position,
            orientation: j.orientation,
        })
        .collect();

    let mut positions = Vec::new();
    let mut texcoords = Vec::new();
    let mut faces = Vec::new();
    let mut groups = Vec::with_capacity(raw.submesh_seq.len());
    let mut materials = BTreeMap::new();

    for (mesh_idx, sub) in raw.submesh_seq.iter().enumerate() {
        let base = positions.len() as u32;
        let start_face = faces.len() as u32;

        for (vert_idx, vertex) in sub.vertex_seq.iter().enumerate() {
            positions.push(bind_position(sub, vert_idx, vertex, &raw.joint_seq)?);
            texcoords.push(vertex.texcoord);
        }

        for tri in &sub.tri_seq {
            let face_idx = faces.len();
            let mut corners = Vec::with_capacity(3);
            for &idx in tri {
                if idx >= sub.vertex_seq.len() {
                    return Err(MeshError::InvalidMesh {
                        face: Some(face_idx),
                        message: format!(
                            "corner index {} out of range ({} vertices in submesh {})",
                            idx,
                            sub.vertex_seq.len(),
                            mesh_idx
                        ),
                    });
                }
                let global = base + idx as u32;
                corners.push(VertexRef {
                    position: global,
                    texcoord: Some(global),
                    normal: None,
                });
            }
            faces.push(Face {
                corners,
                material: Some(sub.shader.clone()),
            });
        }

        groups.push(Group {
            name: sub.shader.clone(),
            start_face,
            face_count: faces.len() as u32 - start_face,
            object: None,
            smoothing: None,
        });
        materials.entry(sub.shader.clone()).or_insert_with(|| {
            let mut material = Material::named(sub.shader.clone());
            material.diffuse_map = Some(sub.shader.clone());
            material
        });
    }

    let mesh = Mesh {
        name: name.to_string(),
        positions,
        texcoords,
        normals: Vec::new(),
        faces,
        groups,
        materials,
        skeleton: Some(Skeleton { joints }),
    };
    mesh.validate()?;
    debug!(
        "unified {:?}: {} faces in {} submeshes, {} joints",
        mesh.name,
        mesh.faces.len(),
        mesh.groups.len(),
        raw.joint_seq.len()
    );
    Ok(mesh)
}

/// An animation alone has no surface to show; what it does carry is the
/// skeleton in its base-frame pose. Frame data stays on [`RawMd5Anim`].
pub fn unify_md5anim(name: &str, raw: RawMd5Anim) -> Result<Mesh> {
    let joints = raw
        .hierarchy_seq
        .iter()
        .zip(&raw.base_frame)
        .map(|(h, base)| Joint {
            name: h.name.clone(),
            parent: (h.parent >= 0).then_some(h.parent as u32),
            position: base.position,
            orientation: base.orientation,
        })
        .collect();

    let mesh = Mesh {
        name: name.to_string(),
        positions: Vec::new(),
        texcoords: Vec::new(),
        normals: Vec::new(),
        faces: Vec::new(),
        groups: Vec::new(),
        materials: BTreeMap::new(),
        skeleton: Some(Skeleton { joints }),
    };
    mesh.validate()?;
    Ok(mesh)
}

fn bind_position(
    sub: &Md5SubMesh,
    vert_idx: usize,
    vertex: &Md5Vertex,
    joints: &[Md5Joint],
) -> Result<Vec3> {
    let end = vertex
        .weight_start
        .checked_add(vertex.weight_count)
        .filter(|&end| end <= sub.weight_seq.len())
        .ok_or_else(|| MeshError::InvalidMesh {
            face: None,
            message: format!(
                "vertex {} references weights {}..{} but only {} exist",
                vert_idx,
                vertex.weight_start,
                vertex.weight_start as u64 + vertex.weight_count as u64,
                sub.weight_seq.len()
            ),
        })?;

    let mut sum = Vec3::new(0.0, 0.0, 0.0);
    for weight in &sub.weight_seq[vertex.weight_start..end] {
        let joint = joints.get(weight.joint).ok_or_else(|| MeshError::InvalidMesh {
            face: None,
            message: format!(
                "weight on vertex {} references joint {} but the skeleton has {}",
                vert_idx,
                weight.joint,
                joints.len()
            ),
        })?;
        let in_model = joint.orientation.rotate(weight.position).0 + joint.position.0;
        sum = Vec3(sum.0 + in_model * weight.bias);
    }
    Ok(sum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::md2::{Md2Frame, Md2Header, Md2TexCoord, Md2Triangle};
    use crate::md5::anim::decode_md5anim;
    use crate::md5::mesh::decode_md5mesh;
    use crate::obj::material::decode_mtl;
    use crate::obj::mesh::decode_obj;

    #[test]
    fn obj_chunks_become_group_windows() {
        let obj = "mtllib scene.mtl\nv 0 0 0\nv 1 0 0\nv 0 1 0\nv 1 1 0\n\
                   g left\nusemtl Red\nf 1 2 3\n\
                   g right\nusemtl Brushed Steel\nf 2 4 3\nf 1 3 4\n";
        let materials =
            decode_mtl("newmtl Red\nKd 1 0 0\nnewmtl Brushed Steel\nKd 0.5 0.5 0.6\n").unwrap();
        let mesh = unify_obj("scene", decode_obj(obj).unwrap(), materials).unwrap();

        assert_eq!(mesh.groups.len(), 2);
        assert_eq!(mesh.groups[0].name, "left");
        assert_eq!(mesh.groups[0].start_face, 0);
        assert_eq!(mesh.groups[0].face_count, 1);
        assert_eq!(mesh.groups[1].start_face, 1);
        assert_eq!(mesh.groups[1].face_count, 2);

        assert_eq!(mesh.faces[0].material.as_deref(), Some("Red"));
        assert_eq!(mesh.faces[2].material.as_deref(), Some("Brushed Steel"));
        assert_eq!(
            mesh.faces[0].corners[0],
            VertexRef {
                position: 0,
                texcoord: None,
                normal: None
            }
        );
    }

    #[test]
    fn unresolved_material_reference_fails() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl Chrome\nf 1 2 3\n";
        match unify_obj("m", decode_obj(obj).unwrap(), BTreeMap::new()) {
            Err(MeshError::UnresolvedMaterial { tokens }) => {
                assert_eq!(tokens, vec!["Chrome".to_string()]);
            }
            other => panic!("expected unresolved material, got {:?}", other),
        }
    }

    #[test]
    fn out_of_range_corner_fails_validation() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 9\n";
        match unify_obj("m", decode_obj(obj).unwrap(), BTreeMap::new()) {
            Err(MeshError::InvalidMesh { face, .. }) => assert_eq!(face, Some(0)),
            other => panic!("expected invalid mesh, got {:?}", other),
        }
    }

    fn md2_fixture() -> RawMd2 {
        RawMd2 {
            header: Md2Header {
                magic: *b"IDP2",
                version: 8,
                skin_width: 64,
                skin_height: 32,
                frame_size: 0,
                skin_num: 1,
                vertex_num: 3,
                st_num: 2,
                tri_num: 1,
                glcmd_num: 0,
                frame_num: 2,
                skin_offset: 0,
                st_offset: 0,
                tri_offset: 0,
                frame_offset: 0,
                glcmd_offset: 0,
                end_offset: 0,
            },
            skin_seq: vec!["models/tank.pcx".to_string()],
            st_seq: vec![Md2TexCoord { s: 32, t: 16 }, Md2TexCoord { s: 64, t: 32 }],
            tri_seq: vec![Md2Triangle {
                vertex_indices: [0, 2, 1],
                st_indices: [0, 1, 0],
            }],
            frame_seq: vec![
                Md2Frame {
                    name: "stand01".to_string(),
                    positions: vec![
                        Vec3::new(0.0, 0.0, 0.0),
                        Vec3::new(1.0, 0.0, 0.0),
                        Vec3::new(0.0, 1.0, 0.0),
                    ],
                    normals: vec![
                        Vec3::new(0.0, 0.0, 1.0),
                        Vec3::new(0.0, 0.0, 1.0),
                        Vec3::new(0.0, 0.0, 1.0),
                    ],
                },
                Md2Frame {
                    name: "stand02".to_string(),
                    positions: vec![
                        Vec3::new(9.0, 9.0, 9.0),
                        Vec3::new(9.0, 9.0, 9.0),
                        Vec3::new(9.0, 9.0, 9.0),
                    ],
                    normals: vec![
                        Vec3::new(0.0, 0.0, 1.0),
                        Vec3::new(0.0, 0.0, 1.0),
                        Vec3::new(0.0, 0.0, 1.0),
                    ],
                },
            ],
        }
    }

    #[test]
    fn md2_takes_the_first_frame_and_normalizes_texcoords() {
        let mesh = unify_md2("tank", md2_fixture()).unwrap();

        assert_eq!(mesh.positions[1].to_slice(), [1.0, 0.0, 0.0]);
        assert_eq!(mesh.texcoords[0].to_slice(), [0.5, 0.5]);
        assert_eq!(mesh.texcoords[1].to_slice(), [1.0, 1.0]);

        assert_eq!(mesh.groups.len(), 1);
        assert_eq!(mesh.groups[0].name, "tank");
        assert_eq!(mesh.groups[0].object.as_deref(), Some("models/tank.pcx"));

        // Triangle order comes through untouched.
        let corners = &mesh.faces[0].corners;
        assert_eq!(
            corners.iter().map(|c| c.position).collect::<Vec<_>>(),
            vec![0, 2, 1]
        );
        assert_eq!(corners[1].texcoord, Some(1));
        assert_eq!(corners[1].normal, Some(2));
    }

    const GRUNT: &str = r#"MD5Version 10
numJoints 2
numMeshes 1
joints {
	"root" -1 ( 0 0 0 ) ( 0 0 0 )
	"arm" 0 ( 0 1 0 ) ( 0.5 0.5 0.5 )
}
mesh {
	shader "models/grunt/skin"
	numverts 3
	vert 0 ( 0 0 ) 0 1
	vert 1 ( 1 0 ) 1 1
	vert 2 ( 0 1 ) 2 2
	numtris 1
	tri 0 0 1 2
	numweights 4
	weight 0 0 1.0 ( 0 0 0 )
	weight 1 1 1.0 ( 1 0 0 )
	weight 2 0 0.5 ( 2 0 0 )
	weight 3 1 0.5 ( 0 0 1 )
}
"#;

    #[test]
    fn md5mesh_bind_pose_blends_weights_in_joint_space() {
        let mesh = unify_md5mesh("grunt", decode_md5mesh(GRUNT).unwrap()).unwrap();

        // The arm quaternion is a 120 degree turn about (1,1,1): it cycles
        // x to y to z. Weight 1 lands at arm + (0,1,0) = (0,2,0).
        let near = |v: Vec3, expected: [f32; 3]| {
            let got = v.to_slice();
            for k in 0..3 {
                assert!(
                    (got[k] - expected[k]).abs() < 1e-5,
                    "got {:?}, expected {:?}",
                    got,
                    expected
                );
            }
        };
        near(mesh.positions[0], [0.0, 0.0, 0.0]);
        near(mesh.positions[1], [0.0, 2.0, 0.0]);
        near(mesh.positions[2], [1.5, 0.5, 0.0]);

        assert_eq!(mesh.texcoords.len(), 3);
        assert!(mesh.normals.is_empty());

        assert_eq!(mesh.groups.len(), 1);
        assert_eq!(mesh.groups[0].name, "models/grunt/skin");
        assert_eq!(mesh.faces[0].material.as_deref(), Some("models/grunt/skin"));
        let material = &mesh.materials["models/grunt/skin"];
        assert_eq!(material.diffuse_map.as_deref(), Some("models/grunt/skin"));

        let skeleton = mesh.skeleton.as_ref().unwrap();
        assert_eq!(skeleton.joints.len(), 2);
        assert_eq!(skeleton.joints[1].parent, Some(0));
    }

    #[test]
    fn md5mesh_weight_range_past_the_pool_fails() {
        let src = r#"MD5Version 10
numJoints 1
numMeshes 1
joints {
	"root" -1 ( 0 0 0 ) ( 0 0 0 )
}
mesh {
	shader "skin"
	numverts 1
	vert 0 ( 0 0 ) 0 2
	numtris 0
	numweights 1
	weight 0 0 1.0 ( 0 0 0 )
}
"#;
        match unify_md5mesh("m", decode_md5mesh(src).unwrap()) {
            Err(MeshError::InvalidMesh { message, .. }) => {
                assert!(message.contains("weights"), "message: {}", message);
            }
            other => panic!("expected invalid mesh, got {:?}", other),
        }
    }

    #[test]
    fn md5mesh_weight_joint_past_the_skeleton_fails() {
        let src = r#"MD5Version 10
numJoints 1
numMeshes 1
joints {
	"root" -1 ( 0 0 0 ) ( 0 0 0 )
}
mesh {
	shader "skin"
	numverts 1
	vert 0 ( 0 0 ) 0 1
	numtris 0
	numweights 1
	weight 0 7 1.0 ( 0 0 0 )
}
"#;
        match unify_md5mesh("m", decode_md5mesh(src).unwrap()) {
            Err(MeshError::InvalidMesh { message, .. }) => {
                assert!(message.contains("joint 7"), "message: {}", message);
            }
            other => panic!("expected invalid mesh, got {:?}", other),
        }
    }

    #[test]
    fn md5anim_becomes_a_skeleton_only_mesh() {
        let src = r#"MD5Version 10
numFrames 1
numJoints 2
frameRate 30
numAnimatedComponents 0
hierarchy {
	"root" -1 0 0
	"tip" 0 0 0
}
bounds {
	( 0 0 0 ) ( 1 1 1 )
}
baseframe {
	( 0 0 0 ) ( 0 0 0 )
	( 0 3 0 ) ( 0 0 0.5 )
}
frame 0 {
}
"#;
        let mesh = unify_md5anim("wave", decode_md5anim(src).unwrap()).unwrap();
        assert!(mesh.faces.is_empty());
        assert!(mesh.positions.is_empty());

        let skeleton = mesh.skeleton.as_ref().unwrap();
        assert_eq!(skeleton.joints.len(), 2);
        assert_eq!(skeleton.joints[0].parent, None);
        assert_eq!(skeleton.joints[1].parent, Some(0));
        assert_eq!(skeleton.joints[1].position.to_slice(), [0.0, 3.0, 0.0]);

        let summary = mesh.summarize();
        assert!(summary.has_skeleton);
        assert_eq!(summary.joint_count, 2);
        assert_eq!(summary.skeleton_depth, 2);
    }
}
