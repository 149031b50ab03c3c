//! `.md5anim` decoding. Frames store only the transform components that
//! actually animate, as one flat float block per frame; each hierarchy
//! entry says which of its six components (tx ty tz qx qy qz, low bit
//! first) are present and where its run starts. Decoding rebuilds a full
//! per-joint pose per frame from the base frame plus those overrides.

use log::debug;

use crate::error::Result;
use crate::math::{Quat, Vec3};
use crate::md5::{read_md5_header, Cursor, Md5Blocks};
use crate::record::Record;

#[derive(Debug, Clone, PartialEq)]
pub struct Md5HierarchyJoint {
    pub name: String,
    /// Index of the parent joint, `-1` for a root.
    pub parent: i32,
    /// Six component-present bits, tx first.
    pub flags: u32,
    /// Offset of this joint's first override in each frame's float block.
    pub start_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Md5Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Md5JointPose {
    pub position: Vec3,
    pub orientation: Quat,
}

#[derive(Debug, Clone)]
pub struct RawMd5Anim {
    pub version: i32,
    pub commandline: Option<String>,
    pub frame_rate: u32,
    pub num_animated_components: usize,
    pub hierarchy_seq: Vec<Md5HierarchyJoint>,
    /// One axis-aligned box per frame.
    pub bounds_seq: Vec<Md5Bounds>,
    pub base_frame: Vec<Md5JointPose>,
    /// One fully reconstructed pose per joint per frame.
    pub frame_seq: Vec<Vec<Md5JointPose>>,
}

pub fn decode_md5anim(src: &str) -> Result<RawMd5Anim> {
    let mut blocks = Md5Blocks::new(src);
    let (version, commandline) = read_md5_header(&mut blocks)?;

    let frame_count = blocks.scan_to("numFrames")?.usize_arg(0)?;
    let joint_count = blocks.scan_to("numJoints")?.usize_arg(0)?;
    let frame_rate = blocks.scan_to("frameRate")?.usize_arg(0)? as u32;
    let num_animated_components = blocks.scan_to("numAnimatedComponents")?.usize_arg(0)?;

    blocks.scan_block("hierarchy")?;
    let mut hierarchy_seq = Vec::with_capacity(joint_count);
    for _ in 0..joint_count {
        hierarchy_seq.push(read_hierarchy_joint(&mut blocks)?);
    }

    blocks.scan_block("bounds")?;
    let mut bounds_seq = Vec::with_capacity(frame_count);
    for _ in 0..frame_count {
        let rec = blocks.next_record("bounds entry")?;
        let mut cursor = Cursor::full(&rec);
        bounds_seq.push(Md5Bounds {
            min: cursor.vec3()?,
            max: cursor.vec3()?,
        });
    }

    blocks.scan_block("baseframe")?;
    let mut base_frame = Vec::with_capacity(joint_count);
    for _ in 0..joint_count {
        let rec = blocks.next_record("baseframe entry")?;
        let mut cursor = Cursor::full(&rec);
        let position = cursor.vec3()?;
        let q = cursor.vec3()?.to_slice();
        base_frame.push(Md5JointPose {
            position,
            orientation: Quat::from_xyz(q[0], q[1], q[2]),
        });
    }

    let mut frame_seq = Vec::with_capacity(frame_count);
    for _ in 0..frame_count {
        let opener = blocks.scan_block("frame")?;
        let floats = read_frame_floats(&mut blocks)?;
        if floats.len() != num_animated_components {
            return Err(opener.malformed(format!(
                "frame block carries {} floats, expected {}",
                floats.len(),
                num_animated_components
            )));
        }

        let mut poses = Vec::with_capacity(joint_count);
        for (joint, base) in hierarchy_seq.iter().zip(&base_frame) {
            poses.push(frame_pose(base, joint, &floats, &opener)?);
        }
        frame_seq.push(poses);
    }

    debug!(
        "md5anim: {} joints, {} frames at {} fps, {} animated components",
        joint_count, frame_count, frame_rate, num_animated_components
    );

    Ok(RawMd5Anim {
        version,
        commandline,
        frame_rate,
        num_animated_components,
        hierarchy_seq,
        bounds_seq,
        base_frame,
        frame_seq,
    })
}

/// `"name" parent flags startIndex`.
fn read_hierarchy_joint(blocks: &mut Md5Blocks) -> Result<Md5HierarchyJoint> {
    let rec = blocks.next_record("hierarchy entry")?;
    let name = rec.keyword.clone();
    let mut cursor = Cursor::args(&rec);
    let parent = cursor.i32()?;
    if parent < -1 {
        return Err(rec.malformed(format!("joint parent index {} out of range", parent)));
    }
    let flags = cursor.i32()?;
    if !(0..64).contains(&flags) {
        return Err(rec.malformed(format!(
            "joint flags {} use more than the six transform bits",
            flags
        )));
    }
    let start_index = cursor.usize()?;
    Ok(Md5HierarchyJoint {
        name,
        parent,
        flags: flags as u32,
        start_index,
    })
}

/// Collects every float between a frame's `{` and `}`, however the lines
/// are wrapped.
fn read_frame_floats(blocks: &mut Md5Blocks) -> Result<Vec<f32>> {
    let mut floats = Vec::new();
    loop {
        let rec = blocks.next_record("}")?;
        if rec.keyword == "}" {
            return Ok(floats);
        }
        let mut cursor = Cursor::full(&rec);
        while !cursor.done() {
            floats.push(cursor.f32()?);
        }
    }
}

fn frame_pose(
    base: &Md5JointPose,
    joint: &Md5HierarchyJoint,
    floats: &[f32],
    opener: &Record,
) -> Result<Md5JointPose> {
    let p = base.position.to_slice();
    let q = base.orientation.to_slice();
    let mut parts = [p[0], p[1], p[2], q[0], q[1], q[2]];

    let mut take = joint.start_index;
    for (bit, part) in parts.iter_mut().enumerate() {
        if joint.flags & (1 << bit) != 0 {
            *part = *floats.get(take).ok_or_else(|| {
                opener.malformed(format!(
                    "frame data ends before the components of joint {:?}",
                    joint.name
                ))
            })?;
            take += 1;
        }
    }

    Ok(Md5JointPose {
        position: Vec3::new(parts[0], parts[1], parts[2]),
        orientation: Quat::from_xyz(parts[3], parts[4], parts[5]),
    })
}
