//! SDF-based collision detection
//!
//! Uses signed distance fields for contact detection and response between
//! the ball and planks, plus a separating-axis test for plank/plank overlap.

use glam::Vec2;

use crate::rotate;

/// Signed distance to a circle
#[inline]
pub fn sd_circle(p: Vec2, center: Vec2, radius: f32) -> f32 {
    (p - center).length() - radius
}

/// Signed distance to an oriented box
///
/// `half` is the half extent along the box's local x (length) and y (width)
/// axes; `angle` rotates the local frame counter-clockwise.
pub fn sd_box(p: Vec2, center: Vec2, angle: f32, half: Vec2) -> f32 {
    let local = rotate(p - center, -angle);
    let q = local.abs() - half;
    q.max(Vec2::ZERO).length() + q.x.max(q.y).min(0.0)
}

/// Compute SDF gradient (surface normal) using central differences
pub fn sdf_gradient<F>(p: Vec2, sdf: F) -> Vec2
where
    F: Fn(Vec2) -> f32,
{
    let eps = 0.05;
    let dx = sdf(p + Vec2::new(eps, 0.0)) - sdf(p - Vec2::new(eps, 0.0));
    let dy = sdf(p + Vec2::new(0.0, eps)) - sdf(p - Vec2::new(0.0, eps));
    Vec2::new(dx, dy).normalize_or_zero()
}

/// Result of SDF collision check
#[derive(Debug, Clone)]
pub struct SdfCollision {
    pub hit: bool,
    pub distance: f32,
    pub normal: Vec2,
    pub penetration: f32,
}

impl SdfCollision {
    pub fn miss() -> Self {
        Self {
            hit: false,
            distance: f32::MAX,
            normal: Vec2::ZERO,
            penetration: 0.0,
        }
    }
}

/// Check collision between ball and an SDF shape
pub fn check_sdf_collision<F>(ball_pos: Vec2, ball_radius: f32, sdf: F) -> SdfCollision
where
    F: Fn(Vec2) -> f32,
{
    let dist = sdf(ball_pos);

    if dist < ball_radius {
        let normal = sdf_gradient(ball_pos, &sdf);
        SdfCollision {
            hit: true,
            distance: dist,
            normal,
            penetration: ball_radius - dist,
        }
    } else {
        SdfCollision::miss()
    }
}

/// Reflect velocity off a surface with given normal
#[inline]
pub fn reflect(vel: Vec2, normal: Vec2) -> Vec2 {
    vel - 2.0 * vel.dot(normal) * normal
}

/// Bounce velocity off a surface, scaling the normal component by `restitution`
///
/// Only an approaching velocity (moving against the normal) is changed.
#[inline]
pub fn bounce(vel: Vec2, normal: Vec2, restitution: f32) -> Vec2 {
    let vn = vel.dot(normal);
    if vn >= 0.0 {
        return vel;
    }
    vel - (1.0 + restitution) * vn * normal
}

/// Separating-axis overlap test for two oriented boxes
pub fn boxes_overlap(a: (Vec2, f32, Vec2), b: (Vec2, f32, Vec2)) -> bool {
    let (ca, aa, ha) = a;
    let (cb, ab, hb) = b;
    let axes_a = [rotate(Vec2::X, aa), rotate(Vec2::Y, aa)];
    let axes_b = [rotate(Vec2::X, ab), rotate(Vec2::Y, ab)];
    let d = cb - ca;

    axes_a.iter().chain(axes_b.iter()).all(|&axis| {
        let ra = ha.x * axes_a[0].dot(axis).abs() + ha.y * axes_a[1].dot(axis).abs();
        let rb = hb.x * axes_b[0].dot(axis).abs() + hb.y * axes_b[1].dot(axis).abs();
        d.dot(axis).abs() < ra + rb
    })
}
