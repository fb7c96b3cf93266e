// Transform value type shared by the sampler, the replicated list and the interpolator.

use glam::{EulerRot, Quat, Vec3};

/// Position plus Euler orientation of one proxy object.
///
/// Orientation is kept as Euler angles in degrees (applied Z, then X, then Y) and is only
/// turned into a quaternion when two records are blended.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TransformRecord {
    pub position: Vec3,
    pub euler: Vec3,
}

impl TransformRecord {
    pub const fn new(position: Vec3, euler: Vec3) -> Self {
        Self { position, euler }
    }

    /// Builds a record from a position and a rotation, normalizing angles into `[0, 360)`.
    pub fn from_pose(position: Vec3, rotation: Quat) -> Self {
        let (y, x, z) = rotation.to_euler(EulerRot::YXZ);
        Self {
            position,
            euler: Vec3::new(wrap_degrees(x), wrap_degrees(y), wrap_degrees(z)),
        }
    }

    /// Reconstructs the rotation described by the stored Euler angles.
    pub fn rotation(&self) -> Quat {
        Quat::from_euler(
            EulerRot::YXZ,
            self.euler.y.to_radians(),
            self.euler.x.to_radians(),
            self.euler.z.to_radians(),
        )
    }

    /// Blends towards `target`: linear for position, spherical for rotation.
    pub fn blend(&self, target: &TransformRecord, t: f32) -> TransformRecord {
        let position = self.position.lerp(target.position, t);
        let rotation = self.rotation().slerp(target.rotation(), t);
        TransformRecord::from_pose(position, rotation)
    }
}

fn wrap_degrees(radians: f32) -> f32 {
    let degrees = radians.to_degrees().rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs.
    if degrees >= 360.0 { 0.0 } else { degrees }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rotations_match(a: Quat, b: Quat) -> bool {
        // q and -q describe the same rotation.
        a.dot(b).abs() > 1.0 - 1e-5
    }

    #[test]
    fn when_euler_is_round_tripped_through_pose_then_rotation_is_preserved() {
        let record = TransformRecord::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(30.0, 45.0, 60.0));

        let rebuilt = TransformRecord::from_pose(record.position, record.rotation());

        assert_eq!(rebuilt.position, record.position);
        assert!(rotations_match(rebuilt.rotation(), record.rotation()));
    }

    #[test]
    fn when_angles_are_negative_then_from_pose_wraps_into_positive_range() {
        let rotation = Quat::from_rotation_y((-90.0f32).to_radians());

        let record = TransformRecord::from_pose(Vec3::ZERO, rotation);

        assert!((record.euler.y - 270.0).abs() < 1e-3);
        assert!(record.euler.x >= 0.0 && record.euler.z >= 0.0);
    }

    #[test]
    fn when_blending_at_zero_then_output_equals_start() {
        let start = TransformRecord::new(Vec3::ZERO, Vec3::new(0.0, 10.0, 0.0));
        let end = TransformRecord::new(Vec3::new(10.0, 0.0, 0.0), Vec3::new(0.0, 90.0, 0.0));

        let out = start.blend(&end, 0.0);

        assert_eq!(out.position, start.position);
        assert!(rotations_match(out.rotation(), start.rotation()));
    }

    #[test]
    fn when_blending_halfway_then_position_is_midpoint_and_rotation_is_halfway() {
        let start = TransformRecord::new(Vec3::ZERO, Vec3::ZERO);
        let end = TransformRecord::new(Vec3::new(10.0, -4.0, 2.0), Vec3::new(0.0, 90.0, 0.0));

        let out = start.blend(&end, 0.5);

        assert!((out.position - Vec3::new(5.0, -2.0, 1.0)).length() < 1e-5);
        assert!((out.euler.y - 45.0).abs() < 1e-3);
    }

    #[test]
    fn when_target_crosses_zero_degrees_then_slerp_takes_short_arc() {
        let start = TransformRecord::new(Vec3::ZERO, Vec3::new(0.0, 350.0, 0.0));
        let end = TransformRecord::new(Vec3::ZERO, Vec3::new(0.0, 10.0, 0.0));

        let out = start.blend(&end, 0.5);

        // Halfway along the short arc is 0 degrees, not 180.
        let yaw = out.euler.y;
        assert!(yaw < 1e-2 || yaw > 360.0 - 1e-2, "yaw was {yaw}");
    }
}
