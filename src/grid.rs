//! Uniform spatial hash grid (component B).
//!
//! A dense `Gx * Gy * Gz` grid with cell size `s` and origin `o`. Cell ids
//! are computed by flooring `(position - o) / s` and wrapping each axis by
//! positive modulo against the grid dimensions, then flattened into a single
//! index. Construction is a single counting-sort pass over the flattened
//! cell id — effectively a one-digit radix sort, since the key is already a
//! dense small integer rather than something that needs multiple passes.

use std::sync::atomic::{AtomicU64, Ordering};

use glam::Vec3;

/// Sentinel written into `cell_start` for cells with no particles.
pub const EMPTY_CELL: i32 = -1;

/// Dense uniform grid used to answer "who is near this point" queries.
///
/// `query_neighbors` takes `&self`, not `&mut self`: once `update` has built
/// the sorted arrays for a sub-step, every later query in that sub-step only
/// reads them, so many particles' neighbourhoods can be walked concurrently
/// (see the `parallel` feature in `constraints::fluid` and
/// `constraints::contact`). The one piece of query-time state,
/// `truncated_cell_scans`, is an atomic counter for exactly this reason.
pub struct SpatialGrid {
    origin: Vec3,
    cell_size: f32,
    dims: (u32, u32, u32),
    num_cells: usize,

    /// Unsorted cell id per particle, indexed by particle id.
    cell_id: Vec<u32>,
    /// Unsorted particle id per particle (identity before sort).
    particle_id: Vec<u32>,
    /// Cell id per sorted slot, non-decreasing after `update`.
    sorted_cell_id: Vec<u32>,
    /// Particle id per sorted slot.
    sorted_particle_id: Vec<u32>,
    /// First sorted-slot index whose cell id equals `c`, or `EMPTY_CELL`.
    cell_start: Vec<i32>,
    /// Per-cell count scratch reused across builds (counting sort).
    cell_count: Vec<u32>,

    /// Number of per-cell scan truncations observed since the last `update`
    /// (component B's correctness/speed knob).
    truncated_cell_scans: AtomicU64,
}

impl SpatialGrid {
    pub fn new(origin: Vec3, cell_size: f32, dims: (u32, u32, u32), max_particles: usize) -> Self {
        let num_cells = (dims.0 as usize) * (dims.1 as usize) * (dims.2 as usize);
        Self {
            origin,
            cell_size,
            dims,
            num_cells,
            cell_id: vec![0; max_particles],
            particle_id: vec![0; max_particles],
            sorted_cell_id: vec![0; max_particles],
            sorted_particle_id: vec![0; max_particles],
            cell_start: vec![EMPTY_CELL; num_cells],
            cell_count: vec![0; num_cells],
            truncated_cell_scans: AtomicU64::new(0),
        }
    }

    /// Per-cell scan truncations observed since the last `update`.
    pub fn truncated_cell_scans(&self) -> u64 {
        self.truncated_cell_scans.load(Ordering::Relaxed)
    }

    /// Grow the grid's per-particle arrays to cover at least `capacity`
    /// particles. Monotonic: never shrinks.
    pub fn reserve(&mut self, capacity: usize) {
        if capacity > self.cell_id.len() {
            self.cell_id.resize(capacity, 0);
            self.particle_id.resize(capacity, 0);
            self.sorted_cell_id.resize(capacity, 0);
            self.sorted_particle_id.resize(capacity, 0);
        }
    }

    #[inline]
    fn cell_coords(&self, pos: Vec3) -> (i64, i64, i64) {
        let rel = (pos - self.origin) / self.cell_size;
        (
            rel.x.floor() as i64,
            rel.y.floor() as i64,
            rel.z.floor() as i64,
        )
    }

    /// Positive modulo wrap: out-of-domain particles still hash to a valid
    /// cell. This is purely a hashing convenience, not toroidal physics —
    /// neighbour queries near the wrap boundary may alias across distant
    /// cells, so callers must size the domain to cover expected motion.
    #[inline]
    fn wrap(v: i64, dim: u32) -> u32 {
        let dim = dim as i64;
        (((v % dim) + dim) % dim) as u32
    }

    #[inline]
    fn flatten(&self, x: u32, y: u32, z: u32) -> usize {
        (x as usize)
            + (y as usize) * self.dims.0 as usize
            + (z as usize) * self.dims.0 as usize * self.dims.1 as usize
    }

    #[inline]
    fn cell_index(&self, pos: Vec3) -> usize {
        let (cx, cy, cz) = self.cell_coords(pos);
        let x = Self::wrap(cx, self.dims.0);
        let y = Self::wrap(cy, self.dims.1);
        let z = Self::wrap(cz, self.dims.2);
        self.flatten(x, y, z)
    }

    /// Rebuild the grid from `positions[0..count]`.
    ///
    /// 1. Reset `cell_start` to `EMPTY_CELL`.
    /// 2. Compute `cell_id[i]` for every particle.
    /// 3. Counting-sort the (cellId, particleId) pairs by cellId ascending.
    /// 4. Record the first sorted index of each distinct cell id.
    pub fn update(&mut self, positions: &[Vec3], count: usize) {
        self.reserve(count);

        for v in self.cell_start.iter_mut() {
            *v = EMPTY_CELL;
        }
        for v in self.cell_count.iter_mut() {
            *v = 0;
        }

        for i in 0..count {
            let cell = self.cell_index(positions[i]) as u32;
            self.cell_id[i] = cell;
            self.particle_id[i] = i as u32;
            self.cell_count[cell as usize] += 1;
        }

        // Prefix sum -> start offset per cell.
        let mut offsets = vec![0u32; self.num_cells];
        let mut running = 0u32;
        for c in 0..self.num_cells {
            offsets[c] = running;
            running += self.cell_count[c];
        }

        // Scatter into sorted arrays using a mutable copy of offsets.
        let mut cursor = offsets.clone();
        for i in 0..count {
            let cell = self.cell_id[i] as usize;
            let slot = cursor[cell] as usize;
            self.sorted_cell_id[slot] = self.cell_id[i];
            self.sorted_particle_id[slot] = self.particle_id[i];
            cursor[cell] += 1;
        }

        for c in 0..self.num_cells {
            if self.cell_count[c] > 0 {
                self.cell_start[c] = offsets[c] as i32;
            }
        }

        self.truncated_cell_scans.store(0, Ordering::Relaxed);
    }

    /// Walk the `(2k+1)^3` neighbourhood of `q`'s cell, calling `callback`
    /// for every candidate particle id found, up to `max_per_cell` entries
    /// per cell. Over-dense cells are silently truncated (see
    /// `truncated_cell_scans`); the caller is responsible for distance
    /// checks against the actual query radius.
    pub fn query_neighbors<F: FnMut(u32)>(
        &self,
        q: Vec3,
        radius_in_cells: i32,
        max_per_cell: usize,
        mut callback: F,
    ) {
        let (cx, cy, cz) = self.cell_coords(q);
        let k = radius_in_cells;
        for dz in -k..=k {
            for dy in -k..=k {
                for dx in -k..=k {
                    let x = Self::wrap(cx + dx as i64, self.dims.0);
                    let y = Self::wrap(cy + dy as i64, self.dims.1);
                    let z = Self::wrap(cz + dz as i64, self.dims.2);
                    let cell = self.flatten(x, y, z);

                    let start = self.cell_start[cell];
                    if start == EMPTY_CELL {
                        continue;
                    }
                    let start = start as usize;
                    let count = self.cell_count[cell] as usize;
                    let scan_len = count.min(max_per_cell);
                    if scan_len < count {
                        self.truncated_cell_scans.fetch_add(1, Ordering::Relaxed);
                    }
                    for slot in start..start + scan_len {
                        callback(self.sorted_particle_id[slot]);
                    }
                }
            }
        }
    }

    pub fn cell_start_for(&self, pos: Vec3) -> i32 {
        self.cell_start[self.cell_index(pos)]
    }

    pub fn cell_id_of(&self, pos: Vec3) -> u32 {
        self.cell_index(pos) as u32
    }

    pub fn sorted_particle_ids(&self) -> &[u32] {
        &self.sorted_particle_id
    }

    pub fn sorted_cell_ids(&self) -> &[u32] {
        &self.sorted_cell_id
    }
}
