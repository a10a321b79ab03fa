//! Map geometry: tile coordinates, continuous positions and bounds.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// A tile coordinate on the map.
///
/// Signed so that positions overshooting the map edge still map to a
/// (out of bounds) tile instead of wrapping around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coord {
    /// X coordinate (column).
    pub x: i32,
    /// Y coordinate (row).
    pub y: i32,
}

impl Coord {
    /// Create a new coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another tile.
    #[must_use]
    pub fn distance_sq(self, other: Coord) -> i64 {
        let dx = i64::from(self.x) - i64::from(other.x);
        let dy = i64::from(self.y) - i64::from(other.y);
        dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
    }

    /// Pixel position of the tile's center.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn center(self, tile_size: f32) -> Position {
        Position::new(
            (self.x as f32 + 0.5) * tile_size,
            (self.y as f32 + 0.5) * tile_size,
        )
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A continuous position in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal pixel offset.
    pub x: f32,
    /// Vertical pixel offset.
    pub y: f32,
}

impl Position {
    /// Create a new position.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// The tile containing this position.
    ///
    /// Floor division on both axes. Every tile lookup in the engine goes
    /// through here so boundary pixels always land on the same tile.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn tile(self, tile_size: f32) -> Coord {
        Coord::new(
            (self.x / tile_size).floor() as i32,
            (self.y / tile_size).floor() as i32,
        )
    }

    /// Euclidean distance to another position.
    #[must_use]
    pub fn distance(self, other: Position) -> f32 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Move towards `target` by at most `step` pixels.
    #[must_use]
    pub fn step_towards(self, target: Position, step: f32) -> Position {
        let distance = self.distance(target);
        if distance <= step || distance <= f32::EPSILON {
            return target;
        }
        let t = step / distance;
        Position::new(
            self.x + (target.x - self.x) * t,
            self.y + (target.y - self.y) * t,
        )
    }
}

/// The game map. Only its extent matters to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MapExtent")]
pub struct Map {
    /// Width of the map in tiles.
    width: i32,
    /// Height of the map in tiles.
    height: i32,
}

/// Unchecked map extent as it appears in files.
#[derive(Debug, Deserialize)]
struct MapExtent {
    width: i32,
    height: i32,
}

impl TryFrom<MapExtent> for Map {
    type Error = EngineError;

    fn try_from(extent: MapExtent) -> Result<Self> {
        Self::new(extent.width, extent.height)
    }
}

impl Map {
    /// Create a new map.
    ///
    /// # Errors
    ///
    /// Returns an error if width or height is not positive.
    pub fn new(width: i32, height: i32) -> Result<Self> {
        if width <= 0 || height <= 0 {
            return Err(EngineError::InvalidMapSize { width, height });
        }
        Ok(Self { width, height })
    }

    /// Get the width of the map.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width
    }

    /// Get the height of the map.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.height
    }

    /// Number of tiles on the map.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Check if a coordinate is within the map bounds.
    #[must_use]
    pub const fn in_bounds(&self, coord: Coord) -> bool {
        coord.x >= 0 && coord.y >= 0 && coord.x < self.width && coord.y < self.height
    }

    /// Row-major index of a coordinate, `None` when out of bounds.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn index(&self, coord: Coord) -> Option<usize> {
        if self.in_bounds(coord) {
            Some(coord.y as usize * self.width as usize + coord.x as usize)
        } else {
            None
        }
    }

    /// Iterate over every coordinate in row-major order.
    pub fn coords(&self) -> impl Iterator<Item = Coord> + use<> {
        let width = self.width;
        (0..self.height).flat_map(move |y| (0..width).map(move |x| Coord::new(x, y)))
    }

    /// Tiles within Euclidean distance `range` of `center`, clipped to the map.
    ///
    /// Only the part of the bounding square that lies on the map is visited.
    pub fn disk(&self, center: Coord, range: u32) -> impl Iterator<Item = Coord> + use<> {
        let r = i32::try_from(range).unwrap_or(i32::MAX);
        let r_sq = i64::from(range).saturating_mul(i64::from(range));
        let min_x = center.x.saturating_sub(r).max(0);
        let max_x = center.x.saturating_add(r).min(self.width - 1);
        let min_y = center.y.saturating_sub(r).max(0);
        let max_y = center.y.saturating_add(r).min(self.height - 1);
        (min_y..=max_y).flat_map(move |y| {
            (min_x..=max_x).filter_map(move |x| {
                let coord = Coord::new(x, y);
                (coord.distance_sq(center) <= r_sq).then_some(coord)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_tile_floor() {
        assert_eq!(Position::new(0.0, 0.0).tile(32.0), Coord::new(0, 0));
        assert_eq!(Position::new(31.9, 63.9).tile(32.0), Coord::new(0, 1));
        assert_eq!(Position::new(32.0, 64.0).tile(32.0), Coord::new(1, 2));
    }

    #[test]
    fn test_position_tile_negative_overshoot() {
        // Overshoot past the top-left edge must not round toward zero.
        assert_eq!(Position::new(-0.5, -33.0).tile(32.0), Coord::new(-1, -2));
    }

    #[test]
    fn test_center_round_trips_to_tile() {
        let coord = Coord::new(7, 3);
        assert_eq!(coord.center(32.0).tile(32.0), coord);
    }

    #[test]
    fn test_step_towards_clamps() {
        let from = Position::new(0.0, 0.0);
        let to = Position::new(10.0, 0.0);
        let mid = from.step_towards(to, 4.0);
        assert!((mid.x - 4.0).abs() < 1e-4);
        assert_eq!(from.step_towards(to, 50.0), to);
    }

    #[test]
    fn test_map_creation() {
        let map = Map::new(10, 8).unwrap();
        assert_eq!(map.width(), 10);
        assert_eq!(map.height(), 8);
        assert_eq!(map.area(), 80);
    }

    #[test]
    fn test_map_zero_size() {
        assert!(Map::new(0, 10).is_err());
        assert!(Map::new(10, -1).is_err());
    }

    #[test]
    fn test_map_bounds() {
        let map = Map::new(10, 10).unwrap();
        assert!(map.in_bounds(Coord::new(0, 0)));
        assert!(map.in_bounds(Coord::new(9, 9)));
        assert!(!map.in_bounds(Coord::new(10, 0)));
        assert!(!map.in_bounds(Coord::new(-1, 0)));
        assert_eq!(map.index(Coord::new(3, 2)), Some(23));
        assert_eq!(map.index(Coord::new(0, 10)), None);
    }

    #[test]
    fn test_disk_radius() {
        let map = Map::new(20, 20).unwrap();
        let tiles: Vec<_> = map.disk(Coord::new(10, 10), 1).collect();
        assert_eq!(tiles.len(), 5);
        assert!(tiles.contains(&Coord::new(10, 9)));
        assert!(!tiles.contains(&Coord::new(11, 11)));
    }

    #[test]
    fn test_disk_clipped_at_corner() {
        let map = Map::new(20, 20).unwrap();
        let tiles: Vec<_> = map.disk(Coord::new(0, 0), 2).collect();
        // (0,0) (1,0) (2,0) (0,1) (1,1) (0,2)
        assert_eq!(tiles.len(), 6);
        assert!(tiles.iter().all(|c| map.in_bounds(*c)));
    }

    #[test]
    fn test_disk_huge_radius_stays_on_map() {
        let map = Map::new(6, 4).unwrap();
        assert_eq!(map.disk(Coord::new(2, 2), u32::MAX).count(), map.area());
        assert_eq!(map.disk(Coord::new(i32::MIN, i32::MAX), 3).count(), 0);
    }

    #[test]
    fn test_distance_sq_far_apart() {
        let far = Coord::new(1_500_000_000, 0).distance_sq(Coord::new(-1_500_000_000, 0));
        assert_eq!(far, 9_000_000_000_000_000_000);
        let corners = Coord::new(i32::MAX, i32::MAX).distance_sq(Coord::new(i32::MIN, i32::MIN));
        assert_eq!(corners, i64::MAX);
        assert_eq!(Coord::new(0, 0).distance_sq(Coord::new(3, 4)), 25);
    }

    #[test]
    fn test_map_deserialize_validates_size() {
        let map: Map = serde_json::from_str(r#"{"width": 5, "height": 3}"#).unwrap();
        assert_eq!(map.area(), 15);
        assert!(serde_json::from_str::<Map>(r#"{"width": -3, "height": 3}"#).is_err());
        assert!(serde_json::from_str::<Map>(r#"{"width": 4, "height": 0}"#).is_err());
    }
}
