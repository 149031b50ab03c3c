//! `.md5mesh` decoding: a joint hierarchy plus one or more skinned
//! submeshes. Vertices carry no positions of their own, only weight
//! ranges; bind-pose positions are computed downstream from the joints.

use log::debug;

use crate::error::Result;
use crate::math::{Quat, Vec2, Vec3};
use crate::md5::{read_md5_header, Cursor, Md5Blocks};

#[derive(Debug, Clone, PartialEq)]
pub struct Md5Joint {
    pub name: String,
    /// Index of the parent joint, `-1` for a root.
    pub parent: i32,
    pub position: Vec3,
    pub orientation: Quat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Md5Vertex {
    pub texcoord: Vec2,
    pub weight_start: usize,
    pub weight_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Md5Weight {
    pub joint: usize,
    pub bias: f32,
    pub position: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Md5SubMesh {
    pub shader: String,
    pub vertex_seq: Vec<Md5Vertex>,
    pub tri_seq: Vec<[usize; 3]>,
    pub weight_seq: Vec<Md5Weight>,
}

#[derive(Debug, Clone)]
pub struct RawMd5Mesh {
    pub version: i32,
    pub commandline: Option<String>,
    pub joint_seq: Vec<Md5Joint>,
    pub submesh_seq: Vec<Md5SubMesh>,
}

pub fn decode_md5mesh(src: &str) -> Result<RawMd5Mesh> {
    let mut blocks = Md5Blocks::new(src);
    let (version, commandline) = read_md5_header(&mut blocks)?;

    let joint_count = blocks.scan_to("numJoints")?.usize_arg(0)?;
    let mesh_count = blocks.scan_to("numMeshes")?.usize_arg(0)?;

    blocks.scan_block("joints")?;
    let mut joint_seq = Vec::with_capacity(joint_count);
    for _ in 0..joint_count {
        joint_seq.push(read_joint(&mut blocks)?);
    }

    let mut submesh_seq = Vec::with_capacity(mesh_count);
    for _ in 0..mesh_count {
        submesh_seq.push(read_submesh(&mut blocks)?);
    }

    debug!(
        "md5mesh: {} joints, {} meshes",
        joint_seq.len(),
        submesh_seq.len()
    );

    Ok(RawMd5Mesh {
        version,
        commandline,
        joint_seq,
        submesh_seq,
    })
}

/// `"name" parent ( px py pz ) ( qx qy qz )`, the quaternion W left
/// implicit and recovered as the positive square root.
fn read_joint(blocks: &mut Md5Blocks) -> Result<Md5Joint> {
    let rec = blocks.next_record("joint")?;
    let name = rec.keyword.clone();
    let mut cursor = Cursor::args(&rec);
    let parent = cursor.i32()?;
    if parent < -1 {
        return Err(rec.malformed(format!("joint parent index {} out of range", parent)));
    }
    let position = cursor.vec3()?;
    let q = cursor.vec3()?.to_slice();
    Ok(Md5Joint {
        name,
        parent,
        position,
        orientation: Quat::from_xyz(q[0], q[1], q[2]),
    })
}

fn read_submesh(blocks: &mut Md5Blocks) -> Result<Md5SubMesh> {
    blocks.scan_block("mesh")?;

    let shader_rec = blocks.scan_to("shader")?;
    let shader = shader_rec.arg(0)?.to_string();

    // Entry indices are implied by declaration order; the stored ones are
    // not trusted.
    let vertex_count = blocks.scan_to("numverts")?.usize_arg(0)?;
    let mut vertex_seq = Vec::with_capacity(vertex_count);
    for _ in 0..vertex_count {
        let rec = expect_entry(blocks, "vert")?;
        let mut cursor = Cursor::args(&rec);
        cursor.usize()?;
        let texcoord = cursor.vec2()?;
        let weight_start = cursor.usize()?;
        let weight_count = cursor.usize()?;
        vertex_seq.push(Md5Vertex {
            texcoord,
            weight_start,
            weight_count,
        });
    }

    let tri_count = blocks.scan_to("numtris")?.usize_arg(0)?;
    let mut tri_seq = Vec::with_capacity(tri_count);
    for _ in 0..tri_count {
        let rec = expect_entry(blocks, "tri")?;
        let mut cursor = Cursor::args(&rec);
        cursor.usize()?;
        tri_seq.push([cursor.usize()?, cursor.usize()?, cursor.usize()?]);
    }

    let weight_count = blocks.scan_to("numweights")?.usize_arg(0)?;
    let mut weight_seq = Vec::with_capacity(weight_count);
    for _ in 0..weight_count {
        let rec = expect_entry(blocks, "weight")?;
        let mut cursor = Cursor::args(&rec);
        cursor.usize()?;
        let joint = cursor.usize()?;
        let bias = cursor.f32()?;
        let position = cursor.vec3()?;
        weight_seq.push(Md5Weight {
            joint,
            bias,
            position,
        });
    }

    Ok(Md5SubMesh {
        shader,
        vertex_seq,
        tri_seq,
        weight_seq,
    })
}

fn expect_entry(blocks: &mut Md5Blocks, keyword: &str) -> Result<crate::record::Record> {
    let rec = blocks.next_record(keyword)?;
    if rec.keyword != keyword {
        return Err(rec.malformed(format!(
            "expected a {} entry, found {:?}",
            keyword, rec.keyword
        )));
    }
    Ok(rec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MeshError;

    const BODY: &str = r#"MD5Version 10
commandline "exported from blender"

numJoints 2
numMeshes 1

joints {
	"origin" -1 ( 0 0 0 ) ( 0 0 0 )
	"left arm" 0 ( 0 1 0 ) ( 0.5 0.5 0.5 )
}

mesh {
	// first and only mesh
	shader "models/characters/grunt/body"

	numverts 3
	vert 0 ( 0 0 ) 0 1
	vert 1 ( 1 0 ) 1 1
	vert 2 ( 0 1 ) 2 1

	numtris 1
	tri 0 0 1 2

	numweights 3
	weight 0 0 1.0 ( 0 0 0 )
	weight 1 1 1.0 ( 1 0 0 )
	weight 2 1 1.0 ( 0 0 1 )
}
"#;

    #[test]
    fn joints_keep_quoted_names_and_recover_w() {
        let raw = decode_md5mesh(BODY).unwrap();
        assert_eq!(raw.version, 10);
        assert_eq!(raw.commandline.as_deref(), Some("exported from blender"));
        assert_eq!(raw.joint_seq.len(), 2);

        assert_eq!(raw.joint_seq[0].name, "origin");
        assert_eq!(raw.joint_seq[0].parent, -1);
        assert_eq!(raw.joint_seq[0].orientation.to_slice(), [0.0, 0.0, 0.0, 1.0]);

        let arm = &raw.joint_seq[1];
        assert_eq!(arm.name, "left arm");
        assert_eq!(arm.parent, 0);
        let [x, y, z, w] = arm.orientation.to_slice();
        assert_eq!((x, y, z), (0.5, 0.5, 0.5));
        assert!((w - 0.5).abs() < 1e-6);
    }

    #[test]
    fn submesh_carries_shader_verts_tris_weights() {
        let raw = decode_md5mesh(BODY).unwrap();
        assert_eq!(raw.submesh_seq.len(), 1);

        let sub = &raw.submesh_seq[0];
        assert_eq!(sub.shader, "models/characters/grunt/body");
        assert_eq!(sub.vertex_seq.len(), 3);
        assert_eq!(sub.vertex_seq[1].texcoord.to_slice(), [1.0, 0.0]);
        assert_eq!(sub.vertex_seq[2].weight_start, 2);
        assert_eq!(sub.tri_seq, vec![[0, 1, 2]]);
        assert_eq!(sub.weight_seq[1].joint, 1);
        assert_eq!(sub.weight_seq[1].position.to_slice(), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn several_mesh_blocks_are_read_in_order() {
        let src = r#"MD5Version 10
numJoints 1
numMeshes 2
joints {
	"origin" -1 ( 0 0 0 ) ( 0 0 0 )
}
mesh {
	shader "a"
	numverts 1
	vert 0 ( 0 0 ) 0 1
	numtris 0
	numweights 1
	weight 0 0 1.0 ( 0 0 0 )
}
mesh {
	shader "b"
	numverts 0
	numtris 0
	numweights 0
}
"#;
        let raw = decode_md5mesh(src).unwrap();
        assert_eq!(raw.submesh_seq.len(), 2);
        assert_eq!(raw.submesh_seq[0].shader, "a");
        assert_eq!(raw.submesh_seq[1].shader, "b");
        assert!(raw.submesh_seq[1].vertex_seq.is_empty());
    }

    #[test]
    fn short_vertex_list_is_malformed() {
        let src = r#"MD5Version 10
numJoints 0
numMeshes 1
joints {
}
mesh {
	shader "a"
	numverts 2
	vert 0 ( 0 0 ) 0 1
	numtris 0
	numweights 0
}
"#;
        match decode_md5mesh(src) {
            Err(MeshError::MalformedRecord { message, .. }) => {
                assert!(message.contains("vert"), "message: {}", message);
            }
            other => panic!("expected malformed record, got {:?}", other),
        }
    }

    #[test]
    fn truncated_file_is_malformed() {
        let src = "MD5Version 10\nnumJoints 2\nnumMeshes 1\njoints {\n\t\"origin\" -1 ( 0 0 0 ) ( 0 0 0 )\n";
        match decode_md5mesh(src) {
            Err(MeshError::MalformedRecord { message, .. }) => {
                assert!(message.contains("end of file"), "message: {}", message);
            }
            other => panic!("expected malformed record, got {:?}", other),
        }
    }

    #[test]
    fn parent_below_minus_one_is_malformed() {
        let src = r#"MD5Version 10
numJoints 1
numMeshes 0
joints {
	"origin" -2 ( 0 0 0 ) ( 0 0 0 )
}
"#;
        assert!(matches!(
            decode_md5mesh(src),
            Err(MeshError::MalformedRecord { .. })
        ));
    }
}
