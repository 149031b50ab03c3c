//! OBJ geometry decoding into raw, format-native structures.
//!
//! Supported statements: `v`, `vt`, `vn`, `f`, `g`, `o`, `s`, `usemtl`,
//! `mtllib`. Everything else the format defines (`vp`, `p`, `l`, free-form
//! geometry, `call`, render attributes) is outside the documented subset
//! and fails decoding instead of being dropped.

use log::debug;

use crate::error::Result;
use crate::math::{Vec2, Vec3};
use crate::record::{Record, RecordReader, Syntax};

pub const DEFAULT_GROUP: &str = "default";

/// One corner of a raw face. Indices are zero-based and absolute; negative
/// source indices have already been resolved against the pool sizes seen at
/// the face record. Positive indices are taken as written (minus one) and
/// bounds-checked later, once the pools are complete.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawCorner {
    pub position: u32,
    pub texcoord: Option<u32>,
    pub normal: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawFace {
    pub corners: Vec<RawCorner>,
}

/// A run of faces sharing one binding state: group name, object name,
/// smoothing group and the unresolved `usemtl` token list.
#[derive(Debug, Clone, PartialEq)]
pub struct RawChunk {
    pub group: String,
    pub object: Option<String>,
    pub smoothing: Option<u32>,
    pub material: Option<Vec<String>>,
    pub faces: Vec<RawFace>,
}

/// Decoded OBJ content, still in source addressing conventions apart from
/// index resolution. Material references stay unresolved token lists until
/// the libraries in `material_libs` have been read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawObj {
    pub positions: Vec<Vec3>,
    pub texcoords: Vec<Vec2>,
    pub normals: Vec<Vec3>,
    pub chunks: Vec<RawChunk>,
    pub material_libs: Vec<String>,
}

/// Binding state carried between statements; chunks are cut whenever a
/// state-changing statement follows at least one face.
struct ChunkState {
    group: String,
    object: Option<String>,
    smoothing: Option<u32>,
    material: Option<Vec<String>>,
    faces: Vec<RawFace>,
}

impl ChunkState {
    fn new() -> Self {
        ChunkState {
            group: DEFAULT_GROUP.to_string(),
            object: None,
            smoothing: None,
            material: None,
            faces: Vec::new(),
        }
    }

    /// Close the current run if it holds any faces. Consecutive setup
    /// statements without intervening geometry just mutate the pending
    /// state instead of emitting empty chunks.
    fn flush(&mut self, chunks: &mut Vec<RawChunk>) {
        if self.faces.is_empty() {
            return;
        }
        chunks.push(RawChunk {
            group: self.group.clone(),
            object: self.object.clone(),
            smoothing: self.smoothing,
            material: self.material.clone(),
            faces: std::mem::take(&mut self.faces),
        });
    }
}

pub fn decode_obj(src: &str) -> Result<RawObj> {
    let mut obj = RawObj::default();
    let mut state = ChunkState::new();

    for rec in RecordReader::new(src, Syntax::Obj) {
        match rec.keyword.as_str() {
            "v" => obj.positions.push(parse_vec3(&rec)?),
            "vt" => obj.texcoords.push(parse_vec2(&rec)?),
            "vn" => obj.normals.push(parse_vec3(&rec)?),
            "f" => state.faces.push(parse_face(&rec, &obj)?),
            "g" => {
                state.flush(&mut obj.chunks);
                state.group = if rec.args.is_empty() {
                    DEFAULT_GROUP.to_string()
                } else {
                    rec.args.join(" ")
                };
                // a group statement also drops the material binding
                state.material = None;
            }
            "o" => {
                state.flush(&mut obj.chunks);
                rec.arg(0)?;
                state.object = Some(rec.args.join(" "));
            }
            "s" => {
                state.flush(&mut obj.chunks);
                let value = rec.arg(0)?;
                state.smoothing = if value == "off" || value == "0" {
                    None
                } else {
                    Some(rec.usize_arg(0)? as u32)
                };
            }
            "usemtl" => {
                state.flush(&mut obj.chunks);
                if rec.args.is_empty() {
                    return Err(rec.malformed("usemtl requires a material name"));
                }
                state.material = Some(rec.args.clone());
            }
            "mtllib" => {
                if rec.args.is_empty() {
                    return Err(rec.malformed("mtllib requires a file name"));
                }
                obj.material_libs.extend(rec.args.iter().cloned());
            }
            _ => return Err(rec.unsupported()),
        }
    }
    state.flush(&mut obj.chunks);

    debug!(
        "decoded obj: {} positions, {} texcoords, {} normals, {} chunk(s)",
        obj.positions.len(),
        obj.texcoords.len(),
        obj.normals.len(),
        obj.chunks.len()
    );
    Ok(obj)
}

/// `v x y z [w]` and `vn i j k [w]`; a fourth value divides the first three.
fn parse_vec3(rec: &Record) -> Result<Vec3> {
    let (x, y, z) = (rec.f32_arg(0)?, rec.f32_arg(1)?, rec.f32_arg(2)?);
    match rec.args.len() {
        3 => Ok(Vec3::new(x, y, z)),
        4 => {
            let w = rec.f32_arg(3)?;
            if w == 0.0 {
                return Err(rec.malformed(format!("{}: w divisor is zero", rec.keyword)));
            }
            Ok(Vec3::new(x / w, y / w, z / w))
        }
        n => Err(rec.malformed(format!(
            "{} expects 3 or 4 values, found {}",
            rec.keyword, n
        ))),
    }
}

/// `vt u [v] [w]`; the v component defaults to 0 and w is ignored.
fn parse_vec2(rec: &Record) -> Result<Vec2> {
    let u = rec.f32_arg(0)?;
    let v = match rec.args.len() {
        1 => 0.0,
        2 | 3 => rec.f32_arg(1)?,
        n => {
            return Err(rec.malformed(format!("vt expects 1 to 3 values, found {}", n)));
        }
    };
    Ok(Vec2::new(u, v))
}

fn parse_face(rec: &Record, obj: &RawObj) -> Result<RawFace> {
    if rec.args.len() < 3 {
        return Err(rec.unsupported());
    }

    let mut corners = Vec::with_capacity(rec.args.len());
    for raw in &rec.args {
        corners.push(parse_corner(rec, raw, obj)?);
    }
    Ok(RawFace { corners })
}

/// One `v[/vt[/vn]]` index group. The four legal shapes (`v`, `v/vt`,
/// `v/vt/vn`, `v//vn`) are told apart by the separators actually present,
/// never by assuming a component count.
fn parse_corner(rec: &Record, raw: &str, obj: &RawObj) -> Result<RawCorner> {
    let mut parts = raw.split('/');
    let position_part = parts.next().unwrap_or("");
    let texcoord_part = parts.next();
    let normal_part = parts.next();
    if parts.next().is_some() {
        return Err(rec.malformed(format!("face corner {:?} has too many '/' separators", raw)));
    }

    let position = resolve_index(rec, position_part, obj.positions.len())?.ok_or_else(|| {
        rec.malformed(format!("face corner {:?} is missing a position index", raw))
    })?;
    let texcoord = match texcoord_part {
        Some(part) => resolve_index(rec, part, obj.texcoords.len())?,
        None => None,
    };
    let normal = match normal_part {
        Some(part) => resolve_index(rec, part, obj.normals.len())?,
        None => None,
    };

    Ok(RawCorner {
        position,
        texcoord,
        normal,
    })
}

/// Resolve one 1-based source index against its own pool. Negative values
/// address backwards from the pool size at this point in the stream; zero
/// is never legal. An empty component (the `v//vn` shape) is absent.
fn resolve_index(rec: &Record, part: &str, pool_len: usize) -> Result<Option<u32>> {
    if part.is_empty() {
        return Ok(None);
    }
    let value: i64 = part
        .parse()
        .map_err(|_| rec.malformed(format!("not an index: {:?}", part)))?;
    if value == 0 {
        return Err(rec.malformed("index 0 is not legal, indices are 1-based"));
    }
    if value > 0 {
        Ok(Some((value - 1) as u32))
    } else {
        let resolved = pool_len as i64 + value;
        if resolved < 0 {
            return Err(rec.malformed(format!(
                "relative index {} reaches before the start of a pool of {}",
                value, pool_len
            )));
        }
        Ok(Some(resolved as u32))
    }
}
