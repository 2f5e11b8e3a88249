use serde::{Deserialize, Serialize};
use strata_blocks::AIR_IDENTIFIER;
use strata_geom::Vec3;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RayOptions {
    /// Block identifiers the ray passes through.
    pub ignore: Vec<String>,
    pub max_distance: f32,
}

impl Default for RayOptions {
    fn default() -> Self {
        Self {
            ignore: vec![AIR_IDENTIFIER.to_string()],
            max_distance: 16.0,
        }
    }
}

/// First block a ray stopped on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RayHit {
    pub position: [i32; 3],
    /// Face the ray entered through; zero when it started inside the block.
    pub normal: [i32; 3],
    pub block: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct VoxelHit {
    pub position: [i32; 3],
    pub normal: [i32; 3],
}

#[inline]
fn inv_or_max(v: f32) -> f32 {
    if v.abs() < 1e-8 { f32::MAX } else { 1.0 / v.abs() }
}

#[inline]
fn step_of(v: f32) -> i32 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}

/// Walks voxel cells along the ray (Amanatides and Woo) until `stops` accepts
/// one or `max_dist` is exceeded. A non-finite `max_dist` never hits, and the
/// walk ends where a cell coordinate would leave the `i32` range.
pub(crate) fn first_hit<F>(origin: Vec3, dir: Vec3, max_dist: f32, mut stops: F) -> Option<VoxelHit>
where
    F: FnMut(i32, i32, i32) -> bool,
{
    if dir.length() < 1e-6 || !max_dist.is_finite() {
        return None;
    }
    let d = dir.normalized();

    let mut cell = [origin.x.floor() as i32, origin.y.floor() as i32, origin.z.floor() as i32];
    let step = [step_of(d.x), step_of(d.y), step_of(d.z)];
    let inv = [inv_or_max(d.x), inv_or_max(d.y), inv_or_max(d.z)];
    let frac = [
        origin.x - origin.x.floor(),
        origin.y - origin.y.floor(),
        origin.z - origin.z.floor(),
    ];

    let mut t_delta = [f32::MAX; 3];
    let mut t_max = [f32::MAX; 3];
    for axis in 0..3 {
        match step[axis] {
            1 => {
                t_delta[axis] = inv[axis];
                t_max[axis] = (1.0 - frac[axis]) * inv[axis];
            }
            -1 => {
                t_delta[axis] = inv[axis];
                t_max[axis] = frac[axis] * inv[axis];
            }
            _ => {}
        }
    }

    let mut normal = [0; 3];
    let mut t = 0.0f32;
    while t <= max_dist {
        if stops(cell[0], cell[1], cell[2]) {
            return Some(VoxelHit { position: cell, normal });
        }
        let axis = if t_max[0] < t_max[1] {
            if t_max[0] < t_max[2] { 0 } else { 2 }
        } else if t_max[1] < t_max[2] {
            1
        } else {
            2
        };
        cell[axis] = cell[axis].checked_add(step[axis])?;
        t = t_max[axis];
        t_max[axis] += t_delta[axis];
        normal = [0; 3];
        normal[axis] = -step[axis];
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn hits_the_wall_in_front() {
        let hit = first_hit(Vec3::new(0.5, 0.5, 0.5), Vec3::new(1.0, 0.0, 0.0), 16.0, |x, _, _| x == 4);
        assert_eq!(
            hit,
            Some(VoxelHit {
                position: [4, 0, 0],
                normal: [-1, 0, 0]
            })
        );
    }

    #[test]
    fn stops_at_max_distance() {
        let hit = first_hit(Vec3::new(0.5, 0.5, 0.5), Vec3::new(0.0, -1.0, 0.0), 3.0, |_, y, _| y == -10);
        assert!(hit.is_none());
    }

    #[test]
    fn long_diagonal_rays_reach_distant_blocks() {
        let hit = first_hit(Vec3::new(0.5, 0.5, 0.5), Vec3::new(1.0, 1.0, 1.0), 1000.0, |x, y, z| {
            x >= 350 && y >= 350 && z >= 350
        })
        .expect("block about 606 units away");
        assert!(hit.position.iter().all(|c| (350..=351).contains(c)));

        let short = first_hit(Vec3::new(0.5, 0.5, 0.5), Vec3::new(1.0, 1.0, 1.0), 500.0, |x, y, z| {
            x >= 350 && y >= 350 && z >= 350
        });
        assert!(short.is_none());
    }

    #[test]
    fn walk_stops_at_the_edge_of_the_grid() {
        let origin = Vec3::new(i32::MAX as f32, 0.5, 0.5);
        assert!(first_hit(origin, Vec3::new(1.0, 0.0, 0.0), 64.0, |_, _, _| false).is_none());
        assert!(first_hit(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), f32::INFINITY, |_, _, _| true).is_none());
    }

    #[test]
    fn zero_direction_never_hits() {
        assert!(first_hit(Vec3::ZERO, Vec3::ZERO, 16.0, |_, _, _| true).is_none());
    }

    #[test]
    fn starting_inside_reports_no_normal() {
        let hit = first_hit(Vec3::new(2.2, 3.7, -1.5), Vec3::new(0.0, 0.0, 1.0), 16.0, |_, _, _| true);
        assert_eq!(hit.map(|h| (h.position, h.normal)), Some(([2, 3, -2], [0, 0, 0])));
    }

    proptest! {
        #[test]
        fn walk_visits_face_adjacent_cells(
            ox in -50.0f32..50.0, oy in -50.0f32..50.0, oz in -50.0f32..50.0,
            dx in -1.0f32..1.0, dy in -1.0f32..1.0, dz in -1.0f32..1.0,
        ) {
            prop_assume!(Vec3::new(dx, dy, dz).length() > 0.01);
            let mut visited = Vec::new();
            let hit = first_hit(Vec3::new(ox, oy, oz), Vec3::new(dx, dy, dz), 20.0, |x, y, z| {
                visited.push([x, y, z]);
                false
            });
            prop_assert!(hit.is_none());
            prop_assert_eq!(visited[0], [ox.floor() as i32, oy.floor() as i32, oz.floor() as i32]);
            for pair in visited.windows(2) {
                let moved: i32 = (0..3).map(|a| (pair[1][a] - pair[0][a]).abs()).sum();
                prop_assert_eq!(moved, 1);
            }
        }
    }
}
