//! Grid assembly: label X-junctions with integer board coordinates.

use crate::PatternSize;
use courtcal_core::{Pt2, Real, Vec2};
use kiddo::{KdTree, SquaredEuclidean};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridParams {
    /// Search radius around a predicted neighbour, relative to the local
    /// step length.
    pub tolerance: Real,
    /// Number of strongest candidates tried as growth seeds.
    pub max_seeds: usize,
}

impl Default for GridParams {
    fn default() -> Self {
        Self {
            tolerance: 0.35,
            max_seeds: 32,
        }
    }
}

type Coord = (i32, i32);

/// Neighbours to pull from the tree when estimating seed axes.
const SEED_NEIGHBOURS: usize = 9;

/// Kd-tree over candidate positions.
struct CornerIndex<'a> {
    points: &'a [Pt2],
    tree: KdTree<f64, 2>,
}

impl<'a> CornerIndex<'a> {
    fn new(points: &'a [Pt2]) -> Self {
        let coords: Vec<[f64; 2]> = points.iter().map(|p| [p.x, p.y]).collect();
        Self {
            points,
            tree: (&coords).into(),
        }
    }

    /// Up to `k` candidates closest to `target` as `(index, distance)`, nearest first.
    fn nearest(&self, target: &Pt2, k: usize) -> Vec<(usize, Real)> {
        self.tree
            .nearest_n::<SquaredEuclidean>(&[target.x, target.y], k)
            .into_iter()
            .map(|nn| (nn.item as usize, nn.distance.sqrt()))
            .collect()
    }

    fn nearest_within(&self, target: &Pt2, radius: Real, skip: usize) -> Option<usize> {
        self.nearest(target, 2)
            .into_iter()
            .find(|&(i, d)| i != skip && d <= radius)
            .map(|(i, _)| i)
    }

    /// Two roughly perpendicular steps from `seed` to its closest neighbours.
    fn seed_axes(&self, seed: usize) -> Option<(Vec2, Vec2)> {
        let p = self.points[seed];
        let by_dist: Vec<(usize, Real)> = self
            .nearest(&p, SEED_NEIGHBOURS)
            .into_iter()
            .filter(|&(i, _)| i != seed)
            .collect();

        let (first, d1) = *by_dist.first()?;
        let u = self.points[first] - p;
        by_dist
            .iter()
            .skip(1)
            .take_while(|(_, d)| *d < 2.0 * d1)
            .map(|(i, d)| (self.points[*i] - p, *d))
            .find(|(v, d)| (v.dot(&u) / (d * d1)).abs() < 0.5)
            .map(|(v, _)| (u, v))
    }
}

/// Breadth-first labelling of the component connected to `seed`.
fn grow(index: &CornerIndex<'_>, seed: usize, params: &GridParams) -> HashMap<Coord, usize> {
    let points = index.points;
    let mut grid = HashMap::new();
    let Some((u0, v0)) = index.seed_axes(seed) else {
        return grid;
    };

    let mut label: Vec<Option<Coord>> = vec![None; points.len()];
    label[seed] = Some((0, 0));
    grid.insert((0, 0), seed);

    let mut queue = VecDeque::from([(seed, (0, 0), u0, v0)]);
    while let Some((idx, (i, j), u, v)) = queue.pop_front() {
        let p = points[idx];
        let steps = [
            (u, (i + 1, j), true, 1.0),
            (-u, (i - 1, j), true, -1.0),
            (v, (i, j + 1), false, 1.0),
            (-v, (i, j - 1), false, -1.0),
        ];
        for (step, coord, along_u, sign) in steps {
            if grid.contains_key(&coord) {
                continue;
            }
            let predicted = p + step;
            let Some(found) = index.nearest_within(&predicted, params.tolerance * step.norm(), idx)
            else {
                continue;
            };
            if label[found].is_some() {
                continue;
            }
            label[found] = Some(coord);
            grid.insert(coord, found);

            let measured = (points[found] - p) * sign;
            let (nu, nv) = if along_u { (measured, v) } else { (u, measured) };
            queue.push_back((found, coord, nu, nv));
        }
    }
    grid
}

/// Fully populated `w × h` windows of the labelled component.
fn complete_windows(grid: &HashMap<Coord, usize>, w: i32, h: i32) -> Vec<Coord> {
    let (mut min_i, mut min_j, mut max_i, mut max_j) = (i32::MAX, i32::MAX, i32::MIN, i32::MIN);
    for &(i, j) in grid.keys() {
        min_i = min_i.min(i);
        min_j = min_j.min(j);
        max_i = max_i.max(i);
        max_j = max_j.max(j);
    }
    let mut out = Vec::new();
    for j0 in min_j..=max_j - h + 1 {
        for i0 in min_i..=max_i - w + 1 {
            let full = (0..h).all(|dj| (0..w).all(|di| grid.contains_key(&(i0 + di, j0 + dj))));
            if full {
                out.push((i0, j0));
            }
        }
    }
    out
}

/// Corner indices of a `w × h` window, `cells[j][i]`.
fn extract(grid: &HashMap<Coord, usize>, origin: Coord, w: i32, h: i32, transpose: bool) -> Vec<Vec<usize>> {
    (0..h)
        .map(|j| {
            (0..w)
                .map(|i| {
                    let key = if transpose {
                        (origin.0 + j, origin.1 + i)
                    } else {
                        (origin.0 + i, origin.1 + j)
                    };
                    grid[&key]
                })
                .collect()
        })
        .collect()
}

/// Reorder so that board x/y map onto image axes with positive orientation
/// and the first corner is the one nearest the image's top-left.
fn canonicalize(points: &[Pt2], mut cells: Vec<Vec<usize>>) -> Vec<Pt2> {
    let u = points[cells[0][1]] - points[cells[0][0]];
    let v = points[cells[1][0]] - points[cells[0][0]];
    if u.x * v.y - u.y * v.x < 0.0 {
        for row in cells.iter_mut() {
            row.reverse();
        }
    }

    let first = points[cells[0][0]];
    let last = points[*cells.last().and_then(|r| r.last()).unwrap_or(&cells[0][0])];
    if first.x + first.y > last.x + last.y {
        cells.reverse();
        for row in cells.iter_mut() {
            row.reverse();
        }
    }

    cells.iter().flatten().map(|&k| points[k]).collect()
}

/// Label candidate corners and return the `pattern` grid in object-point
/// order, or `None` when no unambiguous complete grid is found.
pub(crate) fn assemble_grid(points: &[Pt2], pattern: PatternSize, params: &GridParams) -> Option<Vec<Pt2>> {
    if points.len() < pattern.count() {
        return None;
    }
    let (w, h) = (pattern.per_row as i32, pattern.rows as i32);
    let index = CornerIndex::new(points);

    for seed in 0..points.len().min(params.max_seeds) {
        let grid = grow(&index, seed, params);
        if grid.len() < pattern.count() {
            continue;
        }

        let mut matches = Vec::new();
        for origin in complete_windows(&grid, w, h) {
            matches.push((origin, false));
        }
        if w != h {
            for origin in complete_windows(&grid, h, w) {
                matches.push((origin, true));
            }
        }
        if matches.len() != 1 {
            debug!(
                "seed {seed}: component of {} corners holds {} complete {}x{} windows",
                grid.len(),
                matches.len(),
                w,
                h
            );
            continue;
        }

        let (origin, transpose) = matches[0];
        let cells = extract(&grid, origin, w, h, transpose);
        return Some(canonicalize(points, cells));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lattice(w: i32, h: i32, origin: Pt2, u: Vec2, v: Vec2) -> Vec<Pt2> {
        let mut pts = Vec::new();
        for j in 0..h {
            for i in 0..w {
                pts.push(origin + u * i as Real + v * j as Real);
            }
        }
        pts
    }

    #[test]
    fn shuffled_lattice_is_reordered() {
        let truth = lattice(7, 5, Pt2::new(100.0, 80.0), Vec2::new(40.0, 3.0), Vec2::new(-2.0, 38.0));
        let mut shuffled = truth.clone();
        shuffled.reverse();
        shuffled.swap(3, 20);

        let got = assemble_grid(&shuffled, PatternSize::new(7, 5), &GridParams::default()).unwrap();
        for (a, b) in got.iter().zip(&truth) {
            assert!((a - b).norm() < 1e-9);
        }
    }

    #[test]
    fn transposed_lattice_is_recognised() {
        // 5 corners per row in the image, 7 rows: the board is rotated.
        let pts = lattice(5, 7, Pt2::new(300.0, 50.0), Vec2::new(35.0, 0.0), Vec2::new(0.0, 35.0));
        let got = assemble_grid(&pts, PatternSize::new(7, 5), &GridParams::default()).unwrap();
        assert_eq!(got.len(), 35);
        let u = got[1] - got[0];
        let v = got[7] - got[0];
        assert!(u.x * v.y - u.y * v.x > 0.0);
    }

    #[test]
    fn index_answers_radius_queries() {
        let pts = lattice(4, 3, Pt2::new(0.0, 0.0), Vec2::new(10.0, 0.0), Vec2::new(0.0, 10.0));
        let index = CornerIndex::new(&pts);
        assert_eq!(index.nearest_within(&Pt2::new(11.0, 9.0), 3.0, usize::MAX), Some(5));
        assert_eq!(index.nearest_within(&Pt2::new(15.0, 15.0), 3.0, usize::MAX), None);
        // The query point itself is skipped in favour of the next one in range.
        assert_eq!(index.nearest_within(&Pt2::new(10.0, 0.0), 10.5, 1), Some(0));

        let (u, v) = index.seed_axes(5).unwrap();
        assert!((u.norm() - 10.0).abs() < 1e-9 && (v.norm() - 10.0).abs() < 1e-9);
        assert!(u.dot(&v).abs() < 1e-9);
    }

    #[test]
    fn distant_clutter_is_ignored() {
        let truth = lattice(9, 6, Pt2::new(200.0, 150.0), Vec2::new(30.0, 2.0), Vec2::new(-1.0, 29.0));
        let mut pts = truth.clone();
        for k in 0..40 {
            let t = k as Real;
            pts.push(Pt2::new(20.0 + 13.7 * t, 20.0 + (t * 1.3).sin() * 8.0));
        }
        let got = assemble_grid(&pts, PatternSize::new(9, 6), &GridParams::default()).unwrap();
        for (a, b) in got.iter().zip(&truth) {
            assert!((a - b).norm() < 1e-9);
        }
    }

    #[test]
    fn incomplete_grid_is_rejected() {
        let mut pts = lattice(7, 5, Pt2::new(100.0, 80.0), Vec2::new(40.0, 0.0), Vec2::new(0.0, 40.0));
        pts.remove(17);
        assert!(assemble_grid(&pts, PatternSize::new(7, 5), &GridParams::default()).is_none());
    }
}
