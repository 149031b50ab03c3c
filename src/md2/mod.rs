//! Quake II MD2 binary model decoding.
//!
//! The format is a 68-byte little-endian header of counts and section byte
//! offsets, followed by skin names, texture coordinates in texel units,
//! triangle index pairs and quantized key frames. Frame vertices are packed
//! into one byte per axis and reconstructed as
//! `packed * frame.scale + frame.translate`; per-vertex normals are indices
//! into the published 162-entry table. Triangle winding and axis
//! conventions are kept exactly as stored.

use std::io::{Read, Seek, SeekFrom};

use binrw::{BinRead, VecArgs};
use log::debug;

use crate::error::{MeshError, Position, Result};
use crate::math::Vec3;

pub const MD2_MAGIC: [u8; 4] = *b"IDP2";
pub const MD2_VERSION: i32 = 8;

const SKIN_NAME_LEN: usize = 64;
const FRAME_NAME_LEN: usize = 16;

/// Fixed header, 17 little-endian 32-bit fields.
#[derive(Debug, Clone, BinRead)]
#[br(little)]
pub struct Md2Header {
    pub magic: [u8; 4],
    pub version: i32,
    pub skin_width: i32,
    pub skin_height: i32,
    pub frame_size: i32,
    pub skin_num: i32,
    /// Vertices per frame; every frame carries the same count.
    pub vertex_num: i32,
    pub st_num: i32,
    pub tri_num: i32,
    pub glcmd_num: i32,
    pub frame_num: i32,
    pub skin_offset: i32,
    pub st_offset: i32,
    pub tri_offset: i32,
    pub frame_offset: i32,
    pub glcmd_offset: i32,
    pub end_offset: i32,
}

/// Texture coordinate in texel units; normalization by the skin dimensions
/// happens at unification.
#[derive(Debug, Clone, Copy, PartialEq, BinRead)]
#[br(little)]
pub struct Md2TexCoord {
    pub s: i16,
    pub t: i16,
}

/// Triangle referencing the per-frame vertex pool and the texcoord pool,
/// stored winding preserved.
#[derive(Debug, Clone, Copy, PartialEq, BinRead)]
#[br(little)]
pub struct Md2Triangle {
    pub vertex_indices: [u16; 3],
    pub st_indices: [u16; 3],
}

#[derive(Debug, Clone, Copy, BinRead)]
#[br(little)]
struct PackedVertex {
    x: u8,
    y: u8,
    z: u8,
    normal: u8,
}

#[derive(Debug, Clone, BinRead)]
#[br(little)]
struct FrameChunk {
    scale: Vec3,
    translate: Vec3,
    #[br(map = |raw: [u8; FRAME_NAME_LEN]| nul_terminated(&raw))]
    name: String,
}

/// One key frame with reconstructed floating-point data.
#[derive(Debug, Clone, PartialEq)]
pub struct Md2Frame {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
}

/// Decoded MD2 content. Texture coordinates stay in texel units here; all
/// frames are kept, callers wanting a static mesh take the first.
#[derive(Debug, Clone)]
pub struct RawMd2 {
    pub header: Md2Header,
    pub skin_seq: Vec<String>,
    pub st_seq: Vec<Md2TexCoord>,
    pub tri_seq: Vec<Md2Triangle>,
    pub frame_seq: Vec<Md2Frame>,
}

pub fn decode_md2<R: Read + Seek>(reader: &mut R) -> Result<RawMd2> {
    let header: Md2Header = read_one(reader)?;

    if header.magic != MD2_MAGIC {
        return Err(MeshError::MalformedRecord {
            position: Position::Offset(0),
            message: format!("not an MD2 stream, magic is {:?}", header.magic),
        });
    }
    if header.version != MD2_VERSION {
        return Err(MeshError::UnsupportedFeature {
            position: Position::Offset(4),
            keyword: format!("MD2 version {}", header.version),
        });
    }

    let skin_num = checked_count(header.skin_num, "skin count")?;
    let vertex_num = checked_count(header.vertex_num, "vertex count")?;
    let st_num = checked_count(header.st_num, "texture coordinate count")?;
    let tri_num = checked_count(header.tri_num, "triangle count")?;
    let frame_num = checked_count(header.frame_num, "frame count")?;

    if st_num > 0 && (header.skin_width <= 0 || header.skin_height <= 0) {
        return Err(MeshError::MalformedRecord {
            position: Position::Offset(8),
            message: format!(
                "skin dimensions {}x{} cannot normalize texture coordinates",
                header.skin_width, header.skin_height
            ),
        });
    }

    reader.seek(SeekFrom::Start(header.skin_offset as u64))?;
    let raw_skins: Vec<[u8; SKIN_NAME_LEN]> = read_seq(reader, skin_num)?;
    let skin_seq = raw_skins.iter().map(|raw| nul_terminated(raw)).collect();

    reader.seek(SeekFrom::Start(header.st_offset as u64))?;
    let st_seq: Vec<Md2TexCoord> = read_seq(reader, st_num)?;

    reader.seek(SeekFrom::Start(header.tri_offset as u64))?;
    let tri_seq: Vec<Md2Triangle> = read_seq(reader, tri_num)?;

    reader.seek(SeekFrom::Start(header.frame_offset as u64))?;
    let mut frame_seq = Vec::with_capacity(frame_num);
    for frame_idx in 0..frame_num {
        frame_seq.push(read_frame(reader, &header, frame_idx, vertex_num)?);
    }

    debug!(
        "decoded md2: {} skin(s), {} st, {} triangle(s), {} frame(s) of {} vertices",
        skin_num, st_num, tri_num, frame_num, vertex_num
    );

    Ok(RawMd2 {
        header,
        skin_seq,
        st_seq,
        tri_seq,
        frame_seq,
    })
}

fn read_frame<R: Read + Seek>(
    reader: &mut R,
    header: &Md2Header,
    frame_idx: usize,
    vertex_num: usize,
) -> Result<Md2Frame> {
    let chunk: FrameChunk = read_one(reader)?;
    let packed: Vec<PackedVertex> = read_seq(reader, vertex_num)?;

    let [sx, sy, sz] = chunk.scale.to_slice();
    let [tx, ty, tz] = chunk.translate.to_slice();

    let mut positions = Vec::with_capacity(vertex_num);
    let mut normals = Vec::with_capacity(vertex_num);
    for (vertex_idx, vertex) in packed.iter().enumerate() {
        positions.push(Vec3::new(
            vertex.x as f32 * sx + tx,
            vertex.y as f32 * sy + ty,
            vertex.z as f32 * sz + tz,
        ));
        let normal_idx = vertex.normal as usize;
        if normal_idx >= NORMAL_TABLE.len() {
            return Err(MeshError::MalformedRecord {
                position: Position::Offset(normal_byte_offset(header, vertex_num, frame_idx, vertex_idx)),
                message: format!(
                    "normal index {} outside the {}-entry table",
                    normal_idx,
                    NORMAL_TABLE.len()
                ),
            });
        }
        let [nx, ny, nz] = NORMAL_TABLE[normal_idx];
        normals.push(Vec3::new(nx, ny, nz));
    }

    Ok(Md2Frame {
        name: chunk.name,
        positions,
        normals,
    })
}

/// Byte position of one packed vertex's normal index, for error reporting.
/// Each frame is scale + translate (24) + name (16) + 4 bytes per vertex.
fn normal_byte_offset(header: &Md2Header, vertex_num: usize, frame_idx: usize, vertex_idx: usize) -> u64 {
    let frame_len = 24 + FRAME_NAME_LEN + 4 * vertex_num;
    header.frame_offset as u64
        + (frame_idx * frame_len) as u64
        + (24 + FRAME_NAME_LEN) as u64
        + (4 * vertex_idx + 3) as u64
}

fn checked_count(value: i32, what: &str) -> Result<usize> {
    usize::try_from(value).map_err(|_| MeshError::MalformedRecord {
        position: Position::Offset(0),
        message: format!("header {} is negative: {}", what, value),
    })
}

fn nul_terminated(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).to_string()
}

fn read_one<T, R>(reader: &mut R) -> Result<T>
where
    R: Read + Seek,
    T: for<'a> BinRead<Args<'a> = ()>,
{
    let result = BinRead::read_options(&mut *reader, binrw::Endian::Little, ());
    match result {
        Ok(value) => Ok(value),
        Err(err) => Err(malformed(reader, err)),
    }
}

fn read_seq<T, R>(reader: &mut R, count: usize) -> Result<Vec<T>>
where
    R: Read + Seek,
    T: for<'a> BinRead<Args<'a> = ()> + 'static,
{
    let result = BinRead::read_options(
        &mut *reader,
        binrw::Endian::Little,
        VecArgs { count, inner: () },
    );
    match result {
        Ok(value) => Ok(value),
        Err(err) => Err(malformed(reader, err)),
    }
}

/// Truncation and bad data surface with the stream position the reader
/// stopped at.
fn malformed<R: Seek>(reader: &mut R, err: binrw::Error) -> MeshError {
    let offset = reader.stream_position().unwrap_or(0);
    MeshError::MalformedRecord {
        position: Position::Offset(offset),
        message: err.to_string(),
    }
}

/// The fixed normal table every MD2 model shares, from Quake II's anorms.h.
pub const NORMAL_TABLE: [[f32; 3]; 162] = [
    [-0.525731, 0.000000, 0.850651],
    [-0.442863, 0.238856, 0.864188],
    [-0.295242, 0.000000, 0.955423],
    [-0.309017, 0.500000, 0.809017],
    [-0.162460, 0.262866, 0.951056],
    [0.000000, 0.000000, 1.000000],
    [0.000000, 0.850651, 0.525731],
    [-0.147621, 0.716567, 0.681718],
    [0.147621, 0.716567, 0.681718],
    [0.000000, 0.525731, 0.850651],
    [0.309017, 0.500000, 0.809017],
    [0.525731, 0.000000, 0.850651],
    [0.295242, 0.000000, 0.955423],
    [0.442863, 0.238856, 0.864188],
    [0.162460, 0.262866, 0.951056],
    [-0.681718, 0.147621, 0.716567],
    [-0.809017, 0.309017, 0.500000],
    [-0.587785, 0.425325, 0.688191],
    [-0.850651, 0.525731, 0.000000],
    [-0.864188, 0.442863, 0.238856],
    [-0.716567, 0.681718, 0.147621],
    [-0.688191, 0.587785, 0.425325],
    [-0.500000, 0.809017, 0.309017],
    [-0.238856, 0.864188, 0.442863],
    [-0.425325, 0.688191, 0.587785],
    [-0.716567, 0.681718, -0.147621],
    [-0.500000, 0.809017, -0.309017],
    [-0.525731, 0.850651, 0.000000],
    [0.000000, 0.850651, -0.525731],
    [-0.238856, 0.864188, -0.442863],
    [0.000000, 0.955423, -0.295242],
    [-0.262866, 0.951056, -0.162460],
    [0.000000, 1.000000, 0.000000],
    [0.000000, 0.955423, 0.295242],
    [-0.262866, 0.951056, 0.162460],
    [0.238856, 0.864188, 0.442863],
    [0.262866, 0.951056, 0.162460],
    [0.500000, 0.809017, 0.309017],
    [0.238856, 0.864188, -0.442863],
    [0.262866, 0.951056, -0.162460],
    [0.500000, 0.809017, -0.309017],
    [0.850651, 0.525731, 0.000000],
    [0.716567, 0.681718, 0.147621],
    [0.716567, 0.681718, -0.147621],
    [0.525731, 0.850651, 0.000000],
    [0.425325, 0.688191, 0.587785],
    [0.864188, 0.442863, 0.238856],
    [0.688191, 0.587785, 0.425325],
    [0.809017, 0.309017, 0.500000],
    [0.681718, 0.147621, 0.716567],
    [0.587785, 0.425325, 0.688191],
    [0.955423, 0.295242, 0.000000],
    [1.000000, 0.000000, 0.000000],
    [0.951056, 0.162460, 0.262866],
    [0.850651, -0.525731, 0.000000],
    [0.955423, -0.295242, 0.000000],
    [0.864188, -0.442863, 0.238856],
    [0.951056, -0.162460, 0.262866],
    [0.809017, -0.309017, 0.500000],
    [0.681718, -0.147621, 0.716567],
    [0.850651, 0.000000, 0.525731],
    [0.864188, 0.442863, -0.238856],
    [0.809017, 0.309017, -0.500000],
    [0.951056, 0.162460, -0.262866],
    [0.525731, 0.000000, -0.850651],
    [0.681718, 0.147621, -0.716567],
    [0.681718, -0.147621, -0.716567],
    [0.850651, 0.000000, -0.525731],
    [0.809017, -0.309017, -0.500000],
    [0.864188, -0.442863, -0.238856],
    [0.951056, -0.162460, -0.262866],
    [0.147621, 0.716567, -0.681718],
    [0.309017, 0.500000, -0.809017],
    [0.425325, 0.688191, -0.587785],
    [0.442863, 0.238856, -0.864188],
    [0.587785, 0.425325, -0.688191],
    [0.688191, 0.587785, -0.425325],
    [-0.147621, 0.716567, -0.681718],
    [-0.309017, 0.500000, -0.809017],
    [0.000000, 0.525731, -0.850651],
    [-0.525731, 0.000000, -0.850651],
    [-0.442863, 0.238856, -0.864188],
    [-0.295242, 0.000000, -0.955423],
    [-0.162460, 0.262866, -0.951056],
    [0.000000, 0.000000, -1.000000],
    [0.295242, 0.000000, -0.955423],
    [0.162460, 0.262866, -0.951056],
    [-0.442863, -0.238856, -0.864188],
    [-0.309017, -0.500000, -0.809017],
    [-0.162460, -0.262866, -0.951056],
    [0.000000, -0.850651, -0.525731],
    [-0.147621, -0.716567, -0.681718],
    [0.147621, -0.716567, -0.681718],
    [0.000000, -0.525731, -0.850651],
    [0.309017, -0.500000, -0.809017],
    [0.442863, -0.238856, -0.864188],
    [0.162460, -0.262866, -0.951056],
    [0.238856, -0.864188, -0.442863],
    [0.500000, -0.809017, -0.309017],
    [0.425325, -0.688191, -0.587785],
    [0.716567, -0.681718, -0.147621],
    [0.688191, -0.587785, -0.425325],
    [0.587785, -0.425325, -0.688191],
    [0.000000, -0.955423, -0.295242],
    [0.000000, -1.000000, 0.000000],
    [0.262866, -0.951056, -0.162460],
    [0.000000, -0.850651, 0.525731],
    [0.000000, -0.955423, 0.295242],
    [0.238856, -0.864188, 0.442863],
    [0.262866, -0.951056, 0.162460],
    [0.500000, -0.809017, 0.309017],
    [0.716567, -0.681718, 0.147621],
    [0.525731, -0.850651, 0.000000],
    [-0.238856, -0.864188, -0.442863],
    [-0.500000, -0.809017, -0.309017],
    [-0.262866, -0.951056, -0.162460],
    [-0.850651, -0.525731, 0.000000],
    [-0.716567, -0.681718, -0.147621],
    [-0.716567, -0.681718, 0.147621],
    [-0.525731, -0.850651, 0.000000],
    [-0.500000, -0.809017, 0.309017],
    [-0.238856, -0.864188, 0.442863],
    [-0.262866, -0.951056, 0.162460],
    [-0.864188, -0.442863, 0.238856],
    [-0.809017, -0.309017, 0.500000],
    [-0.688191, -0.587785, 0.425325],
    [-0.681718, -0.147621, 0.716567],
    [-0.442863, -0.238856, 0.864188],
    [-0.587785, -0.425325, 0.688191],
    [-0.309017, -0.500000, 0.809017],
    [-0.147621, -0.716567, 0.681718],
    [-0.425325, -0.688191, 0.587785],
    [-0.162460, -0.262866, 0.951056],
    [0.442863, -0.238856, 0.864188],
    [0.162460, -0.262866, 0.951056],
    [0.309017, -0.500000, 0.809017],
    [0.147621, -0.716567, 0.681718],
    [0.000000, -0.525731, 0.850651],
    [0.425325, -0.688191, 0.587785],
    [0.587785, -0.425325, 0.688191],
    [0.688191, -0.587785, 0.425325],
    [-0.955423, 0.295242, 0.000000],
    [-0.951056, 0.162460, 0.262866],
    [-1.000000, 0.000000, 0.000000],
    [-0.850651, 0.000000, 0.525731],
    [-0.955423, -0.295242, 0.000000],
    [-0.951056, -0.162460, 0.262866],
    [-0.864188, 0.442863, -0.238856],
    [-0.951056, 0.162460, -0.262866],
    [-0.809017, 0.309017, -0.500000],
    [-0.864188, -0.442863, -0.238856],
    [-0.951056, -0.162460, -0.262866],
    [-0.809017, -0.309017, -0.500000],
    [-0.681718, 0.147621, -0.716567],
    [-0.681718, -0.147621, -0.716567],
    [-0.850651, 0.000000, -0.525731],
    [-0.688191, 0.587785, -0.425325],
    [-0.587785, 0.425325, -0.688191],
    [-0.425325, 0.688191, -0.587785],
    [-0.425325, -0.688191, -0.587785],
    [-0.587785, -0.425325, -0.688191],
    [-0.688191, -0.587785, -0.425325],
];
