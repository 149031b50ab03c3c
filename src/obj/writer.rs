//! OBJ and MTL text export of a canonical mesh.
//!
//! Emitted indices are 1-based and positive; each corner is written in the
//! narrowest of the four index forms that covers its present components, so
//! attribute presence survives a decode of the emitted text.

use std::io::{self, Write};

use crate::mesh::{Group, Material, Mesh, VertexRef};

/// Collapse whitespace runs in a name to single underscores.
///
/// Emitted `usemtl` statements must stay single-token to reference
/// unambiguously, and the library writer applies the same collapse so the
/// pair keeps matching. Names differing only in whitespace collide; callers
/// that care must rename before export.
pub fn collapse_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Write `mesh` as OBJ text. `mtl_file` is the library file name to
/// reference from a `mtllib` statement, if the caller writes one alongside.
pub fn write_obj<W: Write>(mesh: &Mesh, mtl_file: Option<&str>, out: &mut W) -> io::Result<()> {
    if let Some(lib) = mtl_file {
        writeln!(out, "mtllib {}", lib)?;
    }

    for position in &mesh.positions {
        let [x, y, z] = position.to_slice();
        writeln!(out, "v {} {} {}", x, y, z)?;
    }
    for texcoord in &mesh.texcoords {
        let [u, v] = texcoord.to_slice();
        writeln!(out, "vt {} {}", u, v)?;
    }
    for normal in &mesh.normals {
        let [x, y, z] = normal.to_slice();
        writeln!(out, "vn {} {} {}", x, y, z)?;
    }

    let mut object: Option<&str> = None;
    let mut smoothing: Option<u32> = None;
    if mesh.groups.is_empty() {
        write_faces(mesh, 0..mesh.faces.len(), out)?;
    }
    for group in &mesh.groups {
        writeln!(out, "g {}", group.name)?;
        if group.object.as_deref() != object {
            if let Some(name) = group.object.as_deref() {
                writeln!(out, "o {}", name)?;
            }
            object = group.object.as_deref();
        }
        if group.smoothing != smoothing {
            match group.smoothing {
                Some(n) => writeln!(out, "s {}", n)?,
                None => writeln!(out, "s off")?,
            }
            smoothing = group.smoothing;
        }
        write_faces(mesh, face_range(group), out)?;
    }
    Ok(())
}

fn face_range(group: &Group) -> std::ops::Range<usize> {
    let start = group.start_face as usize;
    start..start + group.face_count as usize
}

/// Faces of one group. The material binding restarts at every `g`, so the
/// first bound face of a group always re-emits its `usemtl`.
fn write_faces<W: Write>(
    mesh: &Mesh,
    range: std::ops::Range<usize>,
    out: &mut W,
) -> io::Result<()> {
    let mut material: Option<&str> = None;
    for face in &mesh.faces[range] {
        if face.material.as_deref() != material {
            if let Some(name) = face.material.as_deref() {
                writeln!(out, "usemtl {}", collapse_name(name))?;
            }
            material = face.material.as_deref();
        }
        write!(out, "f")?;
        for corner in &face.corners {
            write_corner(corner, out)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn write_corner<W: Write>(corner: &VertexRef, out: &mut W) -> io::Result<()> {
    let v = corner.position + 1;
    match (corner.texcoord, corner.normal) {
        (None, None) => write!(out, " {}", v),
        (Some(t), None) => write!(out, " {}/{}", v, t + 1),
        (Some(t), Some(n)) => write!(out, " {}/{}/{}", v, t + 1, n + 1),
        (None, Some(n)) => write!(out, " {}//{}", v, n + 1),
    }
}

/// Write every material of `mesh` as MTL text, names collapsed the same way
/// `write_obj` collapses its `usemtl` references.
pub fn write_mtl<W: Write>(mesh: &Mesh, out: &mut W) -> io::Result<()> {
    for (idx, material) in mesh.materials.values().enumerate() {
        if idx > 0 {
            writeln!(out)?;
        }
        write_material(material, out)?;
    }
    Ok(())
}

fn write_material<W: Write>(material: &Material, out: &mut W) -> io::Result<()> {
    writeln!(out, "newmtl {}", collapse_name(&material.name))?;
    let [r, g, b] = material.ambient;
    writeln!(out, "Ka {} {} {}", r, g, b)?;
    let [r, g, b] = material.diffuse;
    writeln!(out, "Kd {} {} {}", r, g, b)?;
    let [r, g, b] = material.specular;
    writeln!(out, "Ks {} {} {}", r, g, b)?;
    writeln!(out, "d {}", material.alpha)?;
    writeln!(out, "Ns {}", material.shininess)?;
    writeln!(out, "Ni {}", material.optical_density)?;
    writeln!(out, "illum {}", material.illum)?;
    writeln!(out, "sharpness {}", material.sharpness)?;
    if let Some(path) = &material.ambient_map {
        writeln!(out, "map_Ka {}", path)?;
    }
    if let Some(path) = &material.diffuse_map {
        writeln!(out, "map_Kd {}", path)?;
    }
    if let Some(path) = &material.specular_map {
        writeln!(out, "map_Ks {}", path)?;
    }
    Ok(())
}
