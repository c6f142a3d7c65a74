//! Boarding/alighting heatmap.
//!
//! Points are binned into a sparse grid of roughly square cells measured in
//! meters at the latitude of the first point. Only non-empty cells are
//! returned, each with its centre and a density normalized to the busiest
//! cell.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::trip::{GeoPoint, Trip};

const METERS_PER_DEGREE_LAT: f64 = 111_320.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HeatmapKind {
    Boarding,
    Alighting,
    #[default]
    Both,
}

#[derive(Debug, Clone)]
pub struct HeatmapConfig {
    /// Grid cell size in meters.
    pub cell_size_meters: f64,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            cell_size_meters: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapCell {
    pub row: i32,
    pub col: i32,
    pub center_lat: f64,
    pub center_lng: f64,
    pub count: u32,
    /// 0.0-1.0 relative to the busiest cell.
    pub density: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Heatmap {
    pub kind: HeatmapKind,
    pub cell_size_meters: f64,
    pub bounds: Option<HeatmapBounds>,
    pub total_points: u32,
    pub cells: Vec<HeatmapCell>,
}

type CellCoord = (i32, i32);

struct Grid {
    cell_size_meters: f64,
    ref_lat: Option<f64>,
    cells: HashMap<CellCoord, u32>,
    bounds: Option<HeatmapBounds>,
    total_points: u32,
}

impl Grid {
    fn new(cell_size_meters: f64) -> Self {
        Self {
            cell_size_meters: cell_size_meters.max(1.0),
            ref_lat: None,
            cells: HashMap::new(),
            bounds: None,
            total_points: 0,
        }
    }

    fn lng_meters_per_degree(&self) -> f64 {
        let ref_lat = self.ref_lat.unwrap_or(0.0);
        (METERS_PER_DEGREE_LAT * ref_lat.to_radians().cos()).max(1.0)
    }

    fn to_grid_coords(&self, point: GeoPoint) -> CellCoord {
        let ref_lat = self.ref_lat.unwrap_or(point.lat);
        let row = ((point.lat - ref_lat) * METERS_PER_DEGREE_LAT / self.cell_size_meters).floor();
        let col = (point.lng * self.lng_meters_per_degree() / self.cell_size_meters).floor();
        (row as i32, col as i32)
    }

    fn cell_center(&self, (row, col): CellCoord) -> (f64, f64) {
        let ref_lat = self.ref_lat.unwrap_or(0.0);
        let lat = ref_lat + (row as f64 + 0.5) * self.cell_size_meters / METERS_PER_DEGREE_LAT;
        let lng = (col as f64 + 0.5) * self.cell_size_meters / self.lng_meters_per_degree();
        (lat, lng)
    }

    fn add(&mut self, point: GeoPoint) {
        if self.ref_lat.is_none() {
            self.ref_lat = Some(point.lat);
        }
        let bounds = self.bounds.get_or_insert(HeatmapBounds {
            min_lat: point.lat,
            max_lat: point.lat,
            min_lng: point.lng,
            max_lng: point.lng,
        });
        bounds.min_lat = bounds.min_lat.min(point.lat);
        bounds.max_lat = bounds.max_lat.max(point.lat);
        bounds.min_lng = bounds.min_lng.min(point.lng);
        bounds.max_lng = bounds.max_lng.max(point.lng);

        let coord = self.to_grid_coords(point);
        *self.cells.entry(coord).or_default() += 1;
        self.total_points += 1;
    }

    fn build(self, kind: HeatmapKind) -> Heatmap {
        let max = self.cells.values().copied().max().unwrap_or(1).max(1) as f32;
        let mut cells: Vec<HeatmapCell> = self
            .cells
            .iter()
            .map(|(&coord, &count)| {
                let (center_lat, center_lng) = self.cell_center(coord);
                HeatmapCell {
                    row: coord.0,
                    col: coord.1,
                    center_lat,
                    center_lng,
                    count,
                    density: count as f32 / max,
                }
            })
            .collect();
        cells.sort_by(|a, b| b.count.cmp(&a.count).then((a.row, a.col).cmp(&(b.row, b.col))));

        Heatmap {
            kind,
            cell_size_meters: self.cell_size_meters,
            bounds: self.bounds,
            total_points: self.total_points,
            cells,
        }
    }
}

pub fn build_heatmap(trips: &[Trip], kind: HeatmapKind, config: &HeatmapConfig) -> Heatmap {
    let mut grid = Grid::new(config.cell_size_meters);
    for trip in trips {
        if matches!(kind, HeatmapKind::Boarding | HeatmapKind::Both) {
            if let Some(point) = trip.boarding_location() {
                grid.add(point);
            }
        }
        if matches!(kind, HeatmapKind::Alighting | HeatmapKind::Both) {
            if let Some(point) = trip.exit_location() {
                grid.add(point);
            }
        }
    }
    grid.build(kind)
}
