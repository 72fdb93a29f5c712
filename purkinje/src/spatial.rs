//! Uniform hash grid for nearest-point queries.
//!
//! Points live in cubic cells keyed by integer coordinates. Queries walk
//! shells of cells outward from the first shell touching the occupied cells
//! and stop once no unvisited shell can hold a closer point. Queries far
//! outside the occupied cells scan every point instead.

use std::collections::HashMap;

use glam::DVec3;

type CellKey = [i64; 3];

/// Cell coordinates are clamped to this magnitude so key arithmetic cannot overflow.
const KEY_LIMIT: f64 = 1e15;
/// Queries more than this many shells outside the occupied cells use a linear scan.
const FAR_RING: i64 = 2;

#[derive(Debug, Clone)]
pub(crate) struct PointGrid {
    cell_size: f64,
    cells: HashMap<CellKey, Vec<usize>>,
    points: Vec<DVec3>,
    min: CellKey,
    max: CellKey,
}

impl PointGrid {
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size,
            cells: HashMap::new(),
            points: Vec::new(),
            min: [i64::MAX; 3],
            max: [i64::MIN; 3],
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn point(&self, id: usize) -> DVec3 {
        self.points[id]
    }

    /// Insert a point and return its id (insertion order).
    pub fn insert(&mut self, point: DVec3) -> usize {
        let id = self.points.len();
        let key = self.key(point);
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(key[axis]);
            self.max[axis] = self.max[axis].max(key[axis]);
        }
        self.cells.entry(key).or_default().push(id);
        self.points.push(point);
        id
    }

    /// Nearest point accepted by `keep`, with its distance.
    pub fn nearest_where(&self, point: DVec3, keep: impl Fn(usize) -> bool) -> Option<(usize, f64)> {
        if self.points.is_empty() {
            return None;
        }
        let center = self.key(point);
        let first = self.min_ring(center);
        if first > FAR_RING {
            return self.scan_nearest(point, keep);
        }
        let mut best: Option<(usize, f64)> = None;
        for ring in first..=self.max_ring(center) {
            if let Some((_, distance)) = best
                && distance <= self.shell_lower_bound(ring)
            {
                break;
            }
            self.for_each_in_shell(center, ring, |id| {
                if !keep(id) {
                    return;
                }
                let distance = self.points[id].distance(point);
                let closer = match best {
                    Some((best_id, best_distance)) => {
                        distance < best_distance || (distance == best_distance && id < best_id)
                    }
                    None => true,
                };
                if closer {
                    best = Some((id, distance));
                }
            });
        }
        best
    }

    /// Up to `k` nearest points ordered by distance (ties by id).
    pub fn k_nearest(&self, point: DVec3, k: usize) -> Vec<(usize, f64)> {
        if self.points.is_empty() || k == 0 {
            return Vec::new();
        }
        let center = self.key(point);
        let first = self.min_ring(center);
        let mut found: Vec<(usize, f64)> = Vec::new();
        if first > FAR_RING {
            found.extend(self.points.iter().enumerate().map(|(id, p)| (id, p.distance(point))));
            sort_by_distance(&mut found);
            found.truncate(k);
            return found;
        }
        for ring in first..=self.max_ring(center) {
            if found.len() >= k {
                sort_by_distance(&mut found);
                if found[k - 1].1 <= self.shell_lower_bound(ring) {
                    break;
                }
            }
            self.for_each_in_shell(center, ring, |id| {
                found.push((id, self.points[id].distance(point)));
            });
        }
        sort_by_distance(&mut found);
        found.truncate(k);
        found
    }

    /// Nearest accepted point by checking every point.
    fn scan_nearest(&self, point: DVec3, keep: impl Fn(usize) -> bool) -> Option<(usize, f64)> {
        self.points
            .iter()
            .enumerate()
            .filter(|(id, _)| keep(*id))
            .map(|(id, p)| (id, p.distance(point)))
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
    }

    fn key(&self, point: DVec3) -> CellKey {
        point
            .to_array()
            .map(|coord| (coord / self.cell_size).floor().clamp(-KEY_LIMIT, KEY_LIMIT) as i64)
    }

    /// Smallest distance from the query point to any cell in shell `ring`.
    fn shell_lower_bound(&self, ring: i64) -> f64 {
        (ring - 1).max(0) as f64 * self.cell_size
    }

    /// First shell index that intersects the occupied cell range.
    fn min_ring(&self, center: CellKey) -> i64 {
        (0..3)
            .map(|axis| {
                (self.min[axis] - center[axis])
                    .max(center[axis] - self.max[axis])
                    .max(0)
            })
            .max()
            .unwrap_or(0)
    }

    /// Largest shell index that still intersects the occupied cell range.
    fn max_ring(&self, center: CellKey) -> i64 {
        (0..3)
            .map(|axis| {
                (center[axis] - self.min[axis])
                    .abs()
                    .max((self.max[axis] - center[axis]).abs())
            })
            .max()
            .unwrap_or(0)
    }

    fn for_each_in_shell(&self, center: CellKey, ring: i64, mut visit: impl FnMut(usize)) {
        let lo = |axis: usize| (center[axis] - ring).max(self.min[axis]);
        let hi = |axis: usize| (center[axis] + ring).min(self.max[axis]);
        for x in lo(0)..=hi(0) {
            for y in lo(1)..=hi(1) {
                for z in lo(2)..=hi(2) {
                    let offset = (x - center[0])
                        .abs()
                        .max((y - center[1]).abs())
                        .max((z - center[2]).abs());
                    if offset != ring {
                        continue;
                    }
                    if let Some(ids) = self.cells.get(&[x, y, z]) {
                        ids.iter().copied().for_each(&mut visit);
                    }
                }
            }
        }
    }
}

fn sort_by_distance(found: &mut [(usize, f64)]) {
    found.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
}
