//! Wavefront OBJ and MTL support: decoding, material resolution and
//! re-export as text.

pub mod material;
pub mod mesh;
pub mod writer;

use std::io::ErrorKind;
use std::path::Path;

use log::{info, warn};

use crate::error::Result;
use crate::mesh::Mesh;
use crate::unify;

/// Loads an OBJ file and every material library it names, then folds the
/// result into a canonical [`Mesh`].
///
/// Library paths are taken relative to the OBJ file's directory. A library
/// that does not exist is skipped with a warning so geometry referencing
/// only resolvable materials still loads; any material reference left
/// dangling fails later, during unification.
pub fn load(path: &Path) -> Result<Mesh> {
    let src = std::fs::read_to_string(path)?;
    let raw = mesh::decode_obj(&src)?;

    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let mut materials = std::collections::BTreeMap::new();
    for lib in &raw.material_libs {
        let lib_path = dir.join(lib);
        let lib_src = match std::fs::read_to_string(&lib_path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(
                    "material library {} not found, continuing without it",
                    lib_path.display()
                );
                continue;
            }
            Err(err) => return Err(err.into()),
        };
        // later libraries override earlier definitions of the same name
        materials.extend(material::decode_mtl(&lib_src)?);
    }

    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("mesh")
        .to_string();
    info!("loaded obj {:?} with {} material(s)", name, materials.len());

    unify::unify_obj(&name, raw, materials)
}
