//! Host camera as seen by the gizmo.

use glam::{Mat4, Vec2, Vec3};

/// View-projection of the host camera and the size of the screen in pixels.
///
/// Screen coordinates have their origin at the top-left with y pointing
/// down, matching pointer events.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub view_proj: Mat4,
    pub size: Vec2,
}

impl Viewport {
    pub fn new(view_proj: Mat4, size: Vec2) -> Self {
        Self { view_proj, size }
    }

    /// Project a world point to screen pixels and normalized depth.
    ///
    /// Returns `None` for points behind the camera.
    pub fn project(&self, world: Vec3) -> Option<(Vec2, f32)> {
        let clip = self.view_proj * world.extend(1.0);
        if clip.w <= f32::EPSILON {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        let screen = Vec2::new(
            (ndc.x + 1.0) * 0.5 * self.size.x,
            (1.0 - ndc.y) * 0.5 * self.size.y,
        );
        Some((screen, ndc.z))
    }

    pub fn world_to_screen(&self, world: Vec3) -> Option<Vec2> {
        self.project(world).map(|(screen, _)| screen)
    }
}

/// Distance from a point to a line segment.
pub fn point_to_segment_dist(point: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON {
        return (point - a).length();
    }
    let t = ((point - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    (point - (a + ab * t)).length()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ortho() -> Viewport {
        // 100 pixels per world unit, looking down -Z
        Viewport::new(
            Mat4::orthographic_rh(-4.0, 4.0, -3.0, 3.0, -100.0, 100.0),
            Vec2::new(800.0, 600.0),
        )
    }

    #[test]
    fn test_origin_projects_to_centre() {
        let screen = ortho().world_to_screen(Vec3::ZERO).unwrap();
        assert_relative_eq!(screen.x, 400.0, epsilon = 1e-3);
        assert_relative_eq!(screen.y, 300.0, epsilon = 1e-3);
    }

    #[test]
    fn test_y_up_is_screen_up() {
        let screen = ortho().world_to_screen(Vec3::Y).unwrap();
        assert_relative_eq!(screen.y, 200.0, epsilon = 1e-3);
    }

    #[test]
    fn test_behind_perspective_camera() {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        let proj = Mat4::perspective_rh(1.0, 1.0, 0.1, 100.0);
        let viewport = Viewport::new(proj * view, Vec2::splat(512.0));
        assert!(viewport.world_to_screen(Vec3::ZERO).is_some());
        assert!(viewport.world_to_screen(Vec3::new(0.0, 0.0, 10.0)).is_none());
    }

    #[test]
    fn test_segment_distance() {
        let d = point_to_segment_dist(Vec2::new(5.0, 3.0), Vec2::ZERO, Vec2::new(10.0, 0.0));
        assert_relative_eq!(d, 3.0);
        let end = point_to_segment_dist(Vec2::new(13.0, 4.0), Vec2::ZERO, Vec2::new(10.0, 0.0));
        assert_relative_eq!(end, 5.0);
    }
}
