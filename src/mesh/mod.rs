use std::collections::BTreeMap;

use ptree::{print_tree, TreeBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{MeshError, Result};
use crate::math::{Quat, Vec2, Vec3};

/// One corner of a face: indices into the mesh attribute pools.
///
/// Texcoord and normal stay `None` when the source omitted the component,
/// so "no data" remains distinguishable from "data at the origin" all the
/// way through to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VertexRef {
    pub position: u32,
    pub texcoord: Option<u32>,
    pub normal: Option<u32>,
}

/// Ordered corner list (at least 3) plus the material bound when the face
/// was declared. Winding is kept exactly as the source stored it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Face {
    pub corners: Vec<VertexRef>,
    pub material: Option<String>,
}

/// Contiguous window of the face list belonging to one named group.
///
/// Groups are kept in declaration order and never merged; two groups with
/// the same name stay distinct. `object` and `smoothing` carry the `o` name
/// and `s` group number in force when the group opened (`s off` and `s 0`
/// both mean no smoothing).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    pub name: String,
    pub start_face: u32,
    pub face_count: u32,
    pub object: Option<String>,
    pub smoothing: Option<u32>,
}

/// Declared optical properties from a material library.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Material {
    pub name: String,
    pub ambient: [f32; 3],
    pub diffuse: [f32; 3],
    pub specular: [f32; 3],
    pub alpha: f32,
    pub shininess: f32,
    pub optical_density: f32,
    pub illum: u32,
    pub sharpness: f32,
    pub ambient_map: Option<String>,
    pub diffuse_map: Option<String>,
    pub specular_map: Option<String>,
}

impl Material {
    /// A material with the conventional library defaults; keyword records
    /// then overwrite individual fields.
    pub fn named(name: impl Into<String>) -> Self {
        Material {
            name: name.into(),
            ambient: [0.2, 0.2, 0.2],
            diffuse: [0.8, 0.8, 0.8],
            specular: [1.0, 1.0, 1.0],
            alpha: 1.0,
            shininess: 0.0,
            optical_density: 1.0,
            illum: 1,
            sharpness: 60.0,
            ambient_map: None,
            diffuse_map: None,
            specular_map: None,
        }
    }
}

/// One bone of a skeleton, in bind pose.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Joint {
    pub name: String,
    /// Index of the parent joint; roots have none. A present parent always
    /// references an earlier index.
    pub parent: Option<u32>,
    pub position: Vec3,
    pub orientation: Quat,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Skeleton {
    pub joints: Vec<Joint>,
}

impl Skeleton {
    /// Longest root-to-leaf chain, counted in joints. Parents precede
    /// children, so one forward pass suffices.
    pub fn depth(&self) -> u32 {
        let mut depth = vec![0u32; self.joints.len()];
        let mut deepest = 0;
        for (idx, joint) in self.joints.iter().enumerate() {
            depth[idx] = match joint.parent {
                Some(p) if (p as usize) < idx => depth[p as usize] + 1,
                _ => 1,
            };
            deepest = deepest.max(depth[idx]);
        }
        deepest
    }

    /// Print the joint hierarchy to stdout.
    pub fn print_joint_tree(&self) -> std::io::Result<()> {
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); self.joints.len()];
        let mut roots = Vec::new();
        for (idx, joint) in self.joints.iter().enumerate() {
            match joint.parent {
                Some(p) if (p as usize) < self.joints.len() => children[p as usize].push(idx),
                _ => roots.push(idx),
            }
        }

        let mut tree = TreeBuilder::new("skeleton".to_string());
        for &root in &roots {
            self.add_joint(&mut tree, &children, root);
        }
        print_tree(&tree.build())
    }

    fn add_joint(&self, tree: &mut TreeBuilder, children: &[Vec<usize>], idx: usize) {
        let label = format!("[{}] {}", idx, self.joints[idx].name);
        if children[idx].is_empty() {
            tree.add_empty_child(label);
        } else {
            tree.begin_child(label);
            for &child in &children[idx] {
                self.add_joint(tree, children, child);
            }
            tree.end_child();
        }
    }
}

/// The canonical, format-agnostic mesh.
///
/// Built once per source file and immutable afterward. Attribute pools are
/// shared by all groups; faces index into them zero-based. Every material
/// identifier referenced by a face exists in `materials`; `validate` is the
/// pass that guarantees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mesh {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub texcoords: Vec<Vec2>,
    pub normals: Vec<Vec3>,
    pub faces: Vec<Face>,
    pub groups: Vec<Group>,
    pub materials: BTreeMap<String, Material>,
    pub skeleton: Option<Skeleton>,
}

impl Mesh {
    /// Final invariant pass over an assembled mesh. Any violation names the
    /// offending face (or joint) and no partial mesh survives the failure.
    pub fn validate(&self) -> Result<()> {
        for (face_idx, face) in self.faces.iter().enumerate() {
            if face.corners.len() < 3 {
                return Err(MeshError::InvalidMesh {
                    face: Some(face_idx),
                    message: format!("face has {} corner(s), need at least 3", face.corners.len()),
                });
            }
            for (corner_idx, corner) in face.corners.iter().enumerate() {
                if corner.position as usize >= self.positions.len() {
                    return Err(MeshError::InvalidMesh {
                        face: Some(face_idx),
                        message: format!(
                            "corner {}: position index {} out of range ({} in pool)",
                            corner_idx,
                            corner.position,
                            self.positions.len()
                        ),
                    });
                }
                if let Some(t) = corner.texcoord {
                    if t as usize >= self.texcoords.len() {
                        return Err(MeshError::InvalidMesh {
                            face: Some(face_idx),
                            message: format!(
                                "corner {}: texcoord index {} out of range ({} in pool)",
                                corner_idx,
                                t,
                                self.texcoords.len()
                            ),
                        });
                    }
                }
                if let Some(n) = corner.normal {
                    if n as usize >= self.normals.len() {
                        return Err(MeshError::InvalidMesh {
                            face: Some(face_idx),
                            message: format!(
                                "corner {}: normal index {} out of range ({} in pool)",
                                corner_idx,
                                n,
                                self.normals.len()
                            ),
                        });
                    }
                }
            }
            if let Some(material) = &face.material {
                if !self.materials.contains_key(material) {
                    return Err(MeshError::InvalidMesh {
                        face: Some(face_idx),
                        message: format!("material {:?} is not in the material map", material),
                    });
                }
            }
        }

        for group in &self.groups {
            let end = group.start_face as usize + group.face_count as usize;
            if end > self.faces.len() {
                return Err(MeshError::InvalidMesh {
                    face: None,
                    message: format!(
                        "group {:?} spans faces {}..{} but the mesh has {}",
                        group.name, group.start_face, end, self.faces.len()
                    ),
                });
            }
        }

        if let Some(skeleton) = &self.skeleton {
            for (idx, joint) in skeleton.joints.iter().enumerate() {
                if let Some(parent) = joint.parent {
                    if parent as usize >= idx {
                        return Err(MeshError::InvalidMesh {
                            face: None,
                            message: format!(
                                "joint {} ({:?}) has parent {} which is not an earlier joint",
                                idx, joint.name, parent
                            ),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    /// Summary statistics for reporting and inspection.
    pub fn summarize(&self) -> MeshSummary {
        let faces_without_material = self
            .faces
            .iter()
            .filter(|f| f.material.is_none())
            .count() as u32;

        let has_texcoords = self.faces.iter().any(|f| {
            f.corners.iter().any(|c| c.texcoord.is_some())
        });
        let has_normals = self.faces.iter().any(|f| {
            f.corners.iter().any(|c| c.normal.is_some())
        });

        let mut warnings = vec![];
        if !self.faces.is_empty() && !has_normals {
            warnings.push("Mesh has no normals - lighting will not work correctly".to_string());
        }
        if !self.faces.is_empty() && !has_texcoords {
            warnings.push("Mesh has no texture coordinates".to_string());
        }
        if faces_without_material > 0 && !self.materials.is_empty() {
            warnings.push(format!(
                "{} face(s) have no material bound",
                faces_without_material
            ));
        }

        MeshSummary {
            name: self.name.clone(),
            position_count: self.positions.len() as u32,
            texcoord_count: self.texcoords.len() as u32,
            normal_count: self.normals.len() as u32,
            face_count: self.faces.len() as u32,
            group_count: self.groups.len() as u32,
            material_count: self.materials.len() as u32,
            joint_count: self
                .skeleton
                .as_ref()
                .map_or(0, |s| s.joints.len() as u32),
            skeleton_depth: self.skeleton.as_ref().map_or(0, Skeleton::depth),
            has_texcoords,
            has_normals,
            has_skeleton: self.skeleton.is_some(),
            warnings,
        }
    }
}

/// Summary statistics for a decoded mesh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshSummary {
    pub name: String,
    pub position_count: u32,
    pub texcoord_count: u32,
    pub normal_count: u32,
    pub face_count: u32,
    pub group_count: u32,
    pub material_count: u32,
    pub joint_count: u32,
    /// Longest root-to-leaf joint chain; 0 without a skeleton.
    pub skeleton_depth: u32,
    pub has_texcoords: bool,
    pub has_normals: bool,
    pub has_skeleton: bool,
    /// Warnings about data consumers often expect but the source lacked.
    pub warnings: Vec<String>,
}
