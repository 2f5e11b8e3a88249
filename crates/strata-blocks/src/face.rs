use serde::{Deserialize, Serialize};
use strata_geom::Vec3;

/// Cube faces, ordered so that `index ^ 1` is the opposite face.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Face {
    Left = 0,
    Right = 1,
    Bottom = 2,
    Top = 3,
    Back = 4,
    Front = 5,
}

impl Face {
    pub const ALL: [Face; 6] = [
        Face::Left,
        Face::Right,
        Face::Bottom,
        Face::Top,
        Face::Back,
        Face::Front,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Falls back to `Left` for out-of-range indices.
    #[inline]
    pub fn from_index(i: usize) -> Face {
        Face::ALL.get(i).copied().unwrap_or(Face::Left)
    }

    #[inline]
    pub fn opposite(self) -> Face {
        Face::ALL[self.index() ^ 1]
    }

    /// Axis the face is perpendicular to (0 = x, 1 = y, 2 = z).
    #[inline]
    pub fn axis(self) -> usize {
        self.index() / 2
    }

    #[inline]
    pub fn delta(self) -> (i32, i32, i32) {
        match self {
            Face::Left => (-1, 0, 0),
            Face::Right => (1, 0, 0),
            Face::Bottom => (0, -1, 0),
            Face::Top => (0, 1, 0),
            Face::Back => (0, 0, -1),
            Face::Front => (0, 0, 1),
        }
    }

    #[inline]
    pub fn normal(self) -> Vec3 {
        let (x, y, z) = self.delta();
        Vec3::new(x as f32, y as f32, z as f32)
    }

    /// Unit-cube corners: bottom-left, bottom-right, top-left, top-right as
    /// seen from outside, so `(0,1,2)` and `(1,3,2)` wind CCW about the normal.
    #[inline]
    pub fn corners(self) -> [[f32; 3]; 4] {
        match self {
            Face::Left => [[0., 0., 0.], [0., 0., 1.], [0., 1., 0.], [0., 1., 1.]],
            Face::Right => [[1., 0., 1.], [1., 0., 0.], [1., 1., 1.], [1., 1., 0.]],
            Face::Bottom => [[0., 0., 0.], [1., 0., 0.], [0., 0., 1.], [1., 0., 1.]],
            Face::Top => [[0., 1., 1.], [1., 1., 1.], [0., 1., 0.], [1., 1., 0.]],
            Face::Back => [[1., 0., 0.], [0., 0., 0.], [1., 1., 0.], [0., 1., 0.]],
            Face::Front => [[0., 0., 1.], [1., 0., 1.], [0., 1., 1.], [1., 1., 1.]],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Face::Left => "left",
            Face::Right => "right",
            Face::Bottom => "bottom",
            Face::Top => "top",
            Face::Back => "back",
            Face::Front => "front",
        }
    }
}

/// Bit set of faces, used for a block's cull set.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct FaceSet(u8);

impl FaceSet {
    pub const EMPTY: FaceSet = FaceSet(0);
    pub const ALL: FaceSet = FaceSet(0b11_1111);

    #[inline]
    pub fn contains(self, face: Face) -> bool {
        self.0 & (1 << face.index()) != 0
    }

    #[inline]
    pub fn insert(&mut self, face: Face) {
        self.0 |= 1 << face.index();
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn iter(self) -> impl Iterator<Item = Face> {
        Face::ALL.into_iter().filter(move |f| self.contains(*f))
    }
}

impl FromIterator<Face> for FaceSet {
    fn from_iter<I: IntoIterator<Item = Face>>(iter: I) -> Self {
        let mut set = FaceSet::EMPTY;
        for face in iter {
            set.insert(face);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_faces_pair_up() {
        for face in Face::ALL {
            assert_ne!(face, face.opposite());
            assert_eq!(face.opposite().opposite(), face);
            assert_eq!(face.normal() + face.opposite().normal(), Vec3::ZERO);
        }
    }

    #[test]
    fn corners_wind_ccw_about_the_normal() {
        for face in Face::ALL {
            let c = face.corners().map(Vec3::from);
            let n = face.normal();
            assert!((c[1] - c[0]).cross(c[2] - c[0]).dot(n) > 0.0, "{face:?} first");
            assert!((c[3] - c[1]).cross(c[2] - c[1]).dot(n) > 0.0, "{face:?} second");
        }
    }

    #[test]
    fn corners_lie_on_the_face_plane() {
        for face in Face::ALL {
            let n = face.normal();
            let plane = if n.x + n.y + n.z > 0.0 { 1.0 } else { 0.0 };
            for c in face.corners() {
                assert_eq!(c[face.axis()], plane, "{face:?}");
            }
        }
    }

    #[test]
    fn face_set_membership() {
        let set: FaceSet = [Face::Top, Face::Front].into_iter().collect();
        assert!(set.contains(Face::Top));
        assert!(!set.contains(Face::Bottom));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Face::Top, Face::Front]);
        assert_eq!(FaceSet::ALL.iter().count(), 6);
    }
}
