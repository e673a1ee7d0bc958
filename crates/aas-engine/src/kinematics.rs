//! Planar AGV motion.

use aas_core::PoseModel;

/// Euclidean distance between two points.
pub fn dist(a: (f64, f64), b: (f64, f64)) -> f64 {
    (b.0 - a.0).hypot(b.1 - a.1)
}

/// Move `pose` up to `step` meters towards `target`. Returns true on arrival.
pub fn move_pose_towards(pose: &mut PoseModel, target: (f64, f64), step: f64) -> bool {
    let (dx, dy) = (target.0 - pose.pos_x, target.1 - pose.pos_y);
    let d = dx.hypot(dy);
    if d == 0.0 {
        return true;
    }
    if step >= d {
        pose.pos_x = target.0;
        pose.pos_y = target.1;
        return true;
    }
    pose.pos_x += dx / d * step;
    pose.pos_y += dy / d * step;
    false
}
