use fastnoise_lite::{CellularDistanceFunction, CellularReturnType, FastNoiseLite, NoiseType};

/// Smooth gradient noise in roughly `[-1, 1]`, sampled at raw coordinates.
pub struct Simplex {
    noise: FastNoiseLite,
}

impl Simplex {
    pub fn new(seed: i32) -> Self {
        let mut noise = FastNoiseLite::with_seed(seed);
        noise.set_noise_type(Some(NoiseType::OpenSimplex2));
        noise.set_frequency(Some(1.0));
        Self { noise }
    }

    #[inline]
    pub fn noise(&self, x: f32, y: f32, z: f32) -> f32 {
        self.noise.get_noise_3d(x, y, z)
    }
}

/// Distance to the nearest cellular feature point, in cell units.
pub struct Worley {
    noise: FastNoiseLite,
}

impl Worley {
    pub fn new(seed: i32) -> Self {
        let mut noise = FastNoiseLite::with_seed(seed);
        noise.set_noise_type(Some(NoiseType::Cellular));
        noise.set_frequency(Some(1.0));
        noise.set_cellular_distance_function(Some(CellularDistanceFunction::Euclidean));
        noise.set_cellular_return_type(Some(CellularReturnType::Distance));
        Self { noise }
    }

    #[inline]
    pub fn distance(&self, x: f32, y: f32, z: f32) -> f32 {
        // the library reports distance - 1
        (self.noise.get_noise_3d(x, y, z) + 1.0).max(0.0)
    }
}

fn hash3(ix: i32, iy: i32, iz: i32, seed: u32) -> u32 {
    let mut h = (ix as u32).wrapping_mul(0x85eb_ca6b)
        ^ (iy as u32).wrapping_mul(0x27d4_eb2f)
        ^ (iz as u32).wrapping_mul(0xc2b2_ae35)
        ^ seed.wrapping_mul(0x1656_67b1);
    h ^= h >> 16;
    h = h.wrapping_mul(0x7feb_352d);
    h ^= h >> 15;
    h = h.wrapping_mul(0x846c_a68b);
    h ^= h >> 16;
    h
}

/// Deterministic value in `[0, 1)` for a voxel.
#[inline]
pub fn rand01(seed: u32, ix: i32, iy: i32, iz: i32, salt: u32) -> f32 {
    let h = hash3(ix, iy, iz, (seed ^ salt).wrapping_add(0x9E37_79B9));
    ((h & 0x00FF_FFFF) as f32) / 16_777_216.0
}

/// Small seeded sequence for shapes that need several draws.
pub struct Random {
    state: u64,
}

impl Random {
    pub fn new(seed: i64) -> Self {
        Self {
            state: (seed as u64) ^ 0x9E37_79B9_7F4A_7C15,
        }
    }

    /// Next value in `[0, 1)`.
    pub fn next_f32(&mut self) -> f32 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^= z >> 31;
        ((z >> 40) as f32) / 16_777_216.0
    }
}
