//! Maps coordinates to discrete hexagonal cells and back.
//!
//! The resolution is fixed for an entire run: changing it changes the
//! granularity of every enrichment key downstream.

use crate::records::{normalize, Record};
use h3o::{CellIndex, LatLng, Resolution};
use log::warn;

/// A geographical coordinate: latitude first, longitude second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon(pub f64, pub f64);

/// Assigns hexagonal cells at a fixed resolution.
#[derive(Debug, Clone, Copy)]
pub struct HexIndexer {
    resolution: Resolution,
}

impl HexIndexer {
    pub fn new(resolution: Resolution) -> Self {
        Self { resolution }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Maps a coordinate pair to its cell.
    ///
    /// Fails closed: sentinel coordinates and out-of-range values yield
    /// `None` with a diagnostic instead of an error, so one bad record
    /// never aborts a run.
    pub fn index(&self, lat: f64, lon: f64) -> Option<CellIndex> {
        if normalize::is_sentinel(lat, lon) {
            return None;
        }
        // LatLng::new accepts any finite value and wraps it onto the
        // sphere, so an out-of-range coordinate would index into a valid
        // but wrong cell. Reject it here instead.
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            warn!("Failed to index lat: {lat}, lon: {lon}: coordinate out of range");
            return None;
        }
        match LatLng::new(lat, lon) {
            Ok(coord) => Some(coord.to_cell(self.resolution)),
            Err(e) => {
                warn!("Failed to index lat: {lat}, lon: {lon}: {e}");
                None
            }
        }
    }

    /// Assigns a cell to every record with usable coordinates.
    pub fn assign(&self, records: &mut [Record]) {
        for record in records.iter_mut() {
            record.cell = self.index(record.lat, record.lon);
        }
    }

    /// Centroid of a cell. Deterministic for a given cell id.
    pub fn centroid(cell: CellIndex) -> LatLon {
        let center = LatLng::from(cell);
        LatLon(center.lat(), center.lng())
    }

    /// Boundary of a cell as a closed ring (first vertex repeated at the
    /// end), the shape the enrichment services expect for polygon queries.
    pub fn boundary(cell: CellIndex) -> Vec<LatLon> {
        let mut ring: Vec<LatLon> = cell
            .boundary()
            .iter()
            .map(|vertex| LatLon(vertex.lat(), vertex.lng()))
            .collect();
        if let Some(first) = ring.first().copied() {
            ring.push(first);
        }
        ring
    }
}
