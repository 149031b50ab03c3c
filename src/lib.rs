//! Multi-format 3D mesh decoding and normalization.
//!
//! Four source dialects (Wavefront OBJ with its MTL libraries, Quake II
//! MD2, Doom 3 MD5 mesh and MD5 animation) decode into one canonical
//! [`mesh::Mesh`]: zero-based indexed faces over shared attribute pools,
//! with groups, materials and an optional skeleton. Loading is strictly
//! per file; nothing carries over from one file to the next, and a file
//! either yields a validated mesh or a single terminal [`error::MeshError`].

pub mod error;
pub mod math;
pub mod md2;
pub mod md5;
pub mod mesh;
pub mod obj;
pub mod record;
pub mod unify;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::info;

use crate::error::{MeshError, Position, Result};
use crate::mesh::Mesh;

/// Source dialects, told apart by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Obj,
    Md2,
    Md5Mesh,
    Md5Anim,
}

impl Format {
    /// Picks the dialect from the extension, case-insensitively. `None`
    /// when the extension is missing or not one of ours.
    pub fn from_path(path: &Path) -> Option<Format> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "obj" => Some(Format::Obj),
            "md2" => Some(Format::Md2),
            "md5mesh" => Some(Format::Md5Mesh),
            "md5anim" => Some(Format::Md5Anim),
            _ => None,
        }
    }
}

/// Loads a mesh, picking the decoder from the file extension.
pub fn load_mesh(path: &Path) -> Result<Mesh> {
    let format = Format::from_path(path).ok_or_else(|| MeshError::UnsupportedFeature {
        position: Position::Offset(0),
        keyword: format!("file extension of {:?}", path.display().to_string()),
    })?;
    load_mesh_with_format(path, format)
}

/// Loads a mesh with an explicitly chosen decoder, for files whose names
/// don't follow the usual extensions.
pub fn load_mesh_with_format(path: &Path, format: Format) -> Result<Mesh> {
    info!("loading {} as {:?}", path.display(), format);
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("mesh")
        .to_string();

    match format {
        Format::Obj => obj::load(path),
        Format::Md2 => {
            let mut reader = BufReader::new(File::open(path)?);
            let raw = md2::decode_md2(&mut reader)?;
            unify::unify_md2(&name, raw)
        }
        Format::Md5Mesh => {
            let src = std::fs::read_to_string(path)?;
            unify::unify_md5mesh(&name, md5::mesh::decode_md5mesh(&src)?)
        }
        Format::Md5Anim => {
            let src = std::fs::read_to_string(path)?;
            unify::unify_md5anim(&name, md5::anim::decode_md5anim(&src)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_detection_is_case_insensitive() {
        assert_eq!(Format::from_path(Path::new("a/b/tank.md2")), Some(Format::Md2));
        assert_eq!(Format::from_path(Path::new("Cube.OBJ")), Some(Format::Obj));
        assert_eq!(
            Format::from_path(Path::new("walk.MD5Anim")),
            Some(Format::Md5Anim)
        );
        assert_eq!(
            Format::from_path(Path::new("body.md5mesh")),
            Some(Format::Md5Mesh)
        );
    }

    #[test]
    fn unknown_extensions_are_not_detected() {
        assert_eq!(Format::from_path(Path::new("model.gltf")), None);
        assert_eq!(Format::from_path(Path::new("no_extension")), None);
    }

    #[test]
    fn load_without_a_known_extension_is_unsupported() {
        match load_mesh(Path::new("model.gltf")) {
            Err(MeshError::UnsupportedFeature { keyword, .. }) => {
                assert!(keyword.contains("model.gltf"));
            }
            other => panic!("expected unsupported feature, got {:?}", other),
        }
    }
}
