use binrw::binrw;
use cgmath::{InnerSpace, Quaternion, Rotation, Vector2, Vector3};
use serde::Serialize;

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[br(little)]
pub struct Vec3(
    #[br(map = |raw: [f32; 3]| Vector3::new(raw[0], raw[1], raw[2]))]
    #[bw(map = |v: &Vector3<f32>| [v.x, v.y, v.z])]
    pub Vector3<f32>,
);

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Vec3(Vector3::new(x, y, z))
    }

    pub fn to_slice(&self) -> [f32; 3] {
        let v = &self.0;
        [v.x, v.y, v.z]
    }
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[br(little)]
pub struct Vec2(
    #[br(map = |raw: [f32; 2]| Vector2::new(raw[0], raw[1]))]
    #[bw(map = |v: &Vector2<f32>| [v.x, v.y])]
    pub Vector2<f32>,
);

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Vec2(Vector2::new(x, y))
    }

    pub fn to_slice(&self) -> [f32; 2] {
        let v = &self.0;
        [v.x, v.y]
    }
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[br(little)]
pub struct Quat(
    #[br(map = |raw: [f32; 4]| Quaternion::new(raw[3], raw[0], raw[1], raw[2])) ]
    #[bw(map = |q: &Quaternion<f32>| [q.v.x, q.v.y, q.v.z, q.s])]
    pub Quaternion<f32>,
);

impl Quat {
    /// Rebuild a unit quaternion from its vector part alone.
    ///
    /// MD5 files store only (x, y, z) and rely on the reader to recompute
    /// the scalar part as sqrt(1 - x^2 - y^2 - z^2). Accumulated rounding
    /// can push the radicand slightly negative, in which case w is 0.
    pub fn from_xyz(x: f32, y: f32, z: f32) -> Self {
        let t = 1.0 - x * x - y * y - z * z;
        let w = if t < 0.0 { 0.0 } else { t.sqrt() };
        Quat(Quaternion::new(w, x, y, z))
    }

    pub fn to_slice(&self) -> [f32; 4] {
        let q = &self.0;
        [q.v.x, q.v.y, q.v.z, q.s]
    }

    /// Rotate a point by this quaternion (q * v * q^-1).
    pub fn rotate(&self, v: Vec3) -> Vec3 {
        Vec3(self.0.rotate_vector(v.0))
    }

    pub fn normalize(&self) -> Quat {
        Quat(self.0.normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_xyz_recovers_scalar_part() {
        let q = Quat::from_xyz(0.5, 0.5, 0.5);
        assert!((q.0.s - 0.5).abs() < 1e-6);
    }

    #[test]
    fn from_xyz_clamps_negative_radicand() {
        // vector part longer than a unit quaternion allows
        let q = Quat::from_xyz(0.8, 0.8, 0.8);
        assert_eq!(q.0.s, 0.0);
    }

    #[test]
    fn identity_rotation_is_noop() {
        let q = Quat::from_xyz(0.0, 0.0, 0.0);
        let v = q.rotate(Vec3::new(1.0, 2.0, 3.0));
        assert!((v.0.x - 1.0).abs() < 1e-6);
        assert!((v.0.y - 2.0).abs() < 1e-6);
        assert!((v.0.z - 3.0).abs() < 1e-6);
    }

    #[test]
    fn quarter_turn_about_z_moves_x_to_y() {
        // 90 degrees about Z: (x, y, z) -> (-y, x, z)
        let half = std::f32::consts::FRAC_PI_4;
        let q = Quat::from_xyz(0.0, 0.0, half.sin());
        let v = q.rotate(Vec3::new(1.0, 0.0, 0.0));
        assert!(v.0.x.abs() < 1e-6);
        assert!((v.0.y - 1.0).abs() < 1e-6);
        assert!(v.0.z.abs() < 1e-6);
    }
}
