//! Material library (`.mtl`) decoding and `usemtl` name resolution.

use std::collections::BTreeMap;

use crate::error::{MeshError, Result};
use crate::mesh::Material;
use crate::record::{Record, RecordReader, Syntax};

/// Decode one material library. Later definitions of an already seen name
/// replace the earlier ones, both within a library and across libraries
/// when the caller merges several maps.
pub fn decode_mtl(src: &str) -> Result<BTreeMap<String, Material>> {
    let mut materials = BTreeMap::new();
    let mut current: Option<Material> = None;

    for rec in RecordReader::new(src, Syntax::Obj) {
        match rec.keyword.as_str() {
            "newmtl" => {
                if rec.rest.is_empty() {
                    return Err(rec.malformed("newmtl requires a name"));
                }
                flush(&mut materials, current.take());
                current = Some(Material::named(rec.rest.clone()));
            }
            "Ka" => current_mut(&mut current, &rec)?.ambient = parse_color(&rec)?,
            "Kd" => current_mut(&mut current, &rec)?.diffuse = parse_color(&rec)?,
            "Ks" => current_mut(&mut current, &rec)?.specular = parse_color(&rec)?,
            "d" | "Tr" => {
                if rec.arg(0)? == "-halo" {
                    return Err(rec.unsupported());
                }
                current_mut(&mut current, &rec)?.alpha = rec.f32_arg(0)?;
            }
            "Ns" => current_mut(&mut current, &rec)?.shininess = rec.f32_arg(0)?,
            "Ni" => current_mut(&mut current, &rec)?.optical_density = rec.f32_arg(0)?,
            "illum" => {
                current_mut(&mut current, &rec)?.illum = rec.usize_arg(0)? as u32;
            }
            "sharpness" => current_mut(&mut current, &rec)?.sharpness = rec.f32_arg(0)?,
            "map_Ka" => current_mut(&mut current, &rec)?.ambient_map = Some(map_path(&rec)?),
            "map_Kd" => current_mut(&mut current, &rec)?.diffuse_map = Some(map_path(&rec)?),
            "map_Ks" => current_mut(&mut current, &rec)?.specular_map = Some(map_path(&rec)?),
            _ => return Err(rec.unsupported()),
        }
    }
    flush(&mut materials, current.take());

    Ok(materials)
}

/// The `usemtl` resolution policy: join the tokens with single spaces and
/// look the joined name up. A miss fails with the original token list; the
/// format gives no way to tell one multi-word name from several names on one
/// line, so no guessing is attempted.
pub fn resolve_material_name(
    tokens: &[String],
    materials: &BTreeMap<String, Material>,
) -> Result<String> {
    let candidate = tokens.join(" ");
    if materials.contains_key(&candidate) {
        Ok(candidate)
    } else {
        Err(MeshError::UnresolvedMaterial {
            tokens: tokens.to_vec(),
        })
    }
}

fn flush(materials: &mut BTreeMap<String, Material>, finished: Option<Material>) {
    if let Some(material) = finished {
        materials.insert(material.name.clone(), material);
    }
}

fn current_mut<'a>(
    current: &'a mut Option<Material>,
    rec: &Record,
) -> Result<&'a mut Material> {
    current
        .as_mut()
        .ok_or_else(|| rec.malformed(format!("{} before any newmtl", rec.keyword)))
}

/// `Ka r g b`, or the single-value form that replicates across channels.
fn parse_color(rec: &Record) -> Result<[f32; 3]> {
    match rec.args.len() {
        1 => {
            let v = rec.f32_arg(0)?;
            Ok([v, v, v])
        }
        3 => Ok([rec.f32_arg(0)?, rec.f32_arg(1)?, rec.f32_arg(2)?]),
        n => Err(rec.malformed(format!(
            "{} expects 1 or 3 color values, found {}",
            rec.keyword, n
        ))),
    }
}

/// Texture map path: the remainder of the line, spaces included.
fn map_path(rec: &Record) -> Result<String> {
    if rec.rest.is_empty() {
        return Err(rec.malformed(format!("{} requires a file name", rec.keyword)));
    }
    Ok(rec.rest.clone())
}
