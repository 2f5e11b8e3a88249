use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Edge length of a chunk in voxels.
pub const CHUNK_SIZE: i32 = 16;
pub const CHUNK_VOLUME: usize = (CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE) as usize;

const _: () = assert!(CHUNK_SIZE > 0 && CHUNK_SIZE <= 1024, "morton offsets use 10 bits per axis");

/// Chunk-grid coordinates; renders as `"cx:cy:cz"`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ChunkId {
    pub cx: i32,
    pub cy: i32,
    pub cz: i32,
}

impl ChunkId {
    pub const ORIGIN: ChunkId = ChunkId::new(0, 0, 0);

    #[inline]
    pub const fn new(cx: i32, cy: i32, cz: i32) -> Self {
        Self { cx, cy, cz }
    }

    #[inline]
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            cx: self.cx + dx,
            cy: self.cy + dy,
            cz: self.cz + dz,
        }
    }

    /// The six face-adjacent chunks.
    pub fn neighbors(self) -> [ChunkId; 6] {
        [
            self.offset(1, 0, 0),
            self.offset(-1, 0, 0),
            self.offset(0, 1, 0),
            self.offset(0, -1, 0),
            self.offset(0, 0, 1),
            self.offset(0, 0, -1),
        ]
    }

    #[inline]
    pub fn distance_sq(self, other: ChunkId) -> i64 {
        let dx = i64::from(self.cx - other.cx);
        let dy = i64::from(self.cy - other.cy);
        let dz = i64::from(self.cz - other.cz);
        dx * dx + dy * dy + dz * dz
    }

    /// World coordinates of the chunk's minimum corner.
    #[inline]
    pub fn world_origin(self) -> (i32, i32, i32) {
        (self.cx * CHUNK_SIZE, self.cy * CHUNK_SIZE, self.cz * CHUNK_SIZE)
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.cx, self.cy, self.cz)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid chunk id `{0}`")]
pub struct ParseChunkIdError(pub String);

impl FromStr for ChunkId {
    type Err = ParseChunkIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':').map(str::parse::<i32>);
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(Ok(cx)), Some(Ok(cy)), Some(Ok(cz)), None) => Ok(ChunkId::new(cx, cy, cz)),
            _ => Err(ParseChunkIdError(s.to_string())),
        }
    }
}

impl From<ChunkId> for String {
    fn from(id: ChunkId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for ChunkId {
    type Error = ParseChunkIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<(i32, i32, i32)> for ChunkId {
    fn from(value: (i32, i32, i32)) -> Self {
        Self::new(value.0, value.1, value.2)
    }
}

impl From<ChunkId> for (i32, i32, i32) {
    fn from(value: ChunkId) -> Self {
        (value.cx, value.cy, value.cz)
    }
}

/// Chunk containing world voxel `(wx, wy, wz)`, using floor division.
#[inline]
pub fn chunk_id_of(wx: i32, wy: i32, wz: i32) -> ChunkId {
    ChunkId::new(
        wx.div_euclid(CHUNK_SIZE),
        wy.div_euclid(CHUNK_SIZE),
        wz.div_euclid(CHUNK_SIZE),
    )
}

/// Splits a world coordinate into its chunk and the local coordinate inside it.
#[inline]
pub fn to_local(wx: i32, wy: i32, wz: i32) -> (ChunkId, i32, i32, i32) {
    (
        chunk_id_of(wx, wy, wz),
        wx.rem_euclid(CHUNK_SIZE),
        wy.rem_euclid(CHUNK_SIZE),
        wz.rem_euclid(CHUNK_SIZE),
    )
}

#[inline]
fn part1by2(n: u32) -> u32 {
    let mut n = n & 0x0000_03ff;
    n = (n ^ (n << 16)) & 0xff00_00ff;
    n = (n ^ (n << 8)) & 0x0300_f00f;
    n = (n ^ (n << 4)) & 0x030c_30c3;
    (n ^ (n << 2)) & 0x0924_9249
}

#[inline]
fn compact1by2(n: u32) -> u32 {
    let mut n = n & 0x0924_9249;
    n = (n ^ (n >> 2)) & 0x030c_30c3;
    n = (n ^ (n >> 4)) & 0x0300_f00f;
    n = (n ^ (n >> 8)) & 0xff00_00ff;
    (n ^ (n >> 16)) & 0x0000_03ff
}

/// Morton (Z-order) offset of a local coordinate, or `-1` when any axis is
/// outside `[0, CHUNK_SIZE)`.
#[inline]
pub fn local_offset(x: i32, y: i32, z: i32) -> i32 {
    let range = 0..CHUNK_SIZE;
    if !(range.contains(&x) && range.contains(&y) && range.contains(&z)) {
        return -1;
    }
    ((part1by2(z as u32) << 2) | (part1by2(y as u32) << 1) | part1by2(x as u32)) as i32
}

/// Inverse of [`local_offset`] for offsets in `[0, CHUNK_VOLUME)`.
#[inline]
pub fn offset_to_local(offset: i32) -> (i32, i32, i32) {
    let i = offset as u32;
    (
        compact1by2(i) as i32,
        compact1by2(i >> 1) as i32,
        compact1by2(i >> 2) as i32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn morton_interleaves_axes() {
        assert_eq!(local_offset(0, 0, 0), 0);
        assert_eq!(local_offset(1, 0, 0), 1);
        assert_eq!(local_offset(0, 1, 0), 2);
        assert_eq!(local_offset(0, 0, 1), 4);
        assert_eq!(local_offset(15, 15, 15), CHUNK_VOLUME as i32 - 1);
    }

    #[test]
    fn display_and_parse_agree() {
        let id = ChunkId::new(-3, 0, 12);
        assert_eq!(id.to_string(), "-3:0:12");
        assert_eq!("-3:0:12".parse::<ChunkId>(), Ok(id));
        assert!("1:2".parse::<ChunkId>().is_err());
        assert!("1:2:3:4".parse::<ChunkId>().is_err());
        assert!("a:b:c".parse::<ChunkId>().is_err());
    }
}
