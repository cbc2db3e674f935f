#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Thin wrapper over the H3 hexagonal spatial index (§4.2).
//!
//! The engine operates exclusively at resolution 10 (~73 m edge cells);
//! [`require_resolution_ten`] is the single choke point that turns any
//! other resolution into a configuration error.

use h3o::{CellIndex, LatLng, Resolution};

/// Resolution used everywhere in the engine.
pub const RESOLUTION: Resolution = Resolution::Ten;

/// Errors surfaced by the grid index. All variants are configuration or
/// input errors — the H3 library itself is pure and stateless.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GridError {
    #[error("invalid coordinate: lat={lat}, lon={lon}")]
    InvalidCoordinate { lat: f64, lon: f64 },

    #[error("cell {cell} is at resolution {actual}, expected resolution {expected}")]
    WrongResolution {
        cell: String,
        expected: u8,
        actual: u8,
    },

    #[error("failed to parse h3 index: {raw}")]
    ParseFailed { raw: String },
}

/// Encodes a WGS84 point as the resolution-10 H3 cell containing it.
///
/// # Errors
///
/// Returns [`GridError::InvalidCoordinate`] if `lat`/`lon` are out of the
/// valid WGS84 range (e.g. `NaN`, or `|lat| > 90`).
pub fn cell_of(lat: f64, lon: f64) -> Result<CellIndex, GridError> {
    let latlng =
        LatLng::new(lat, lon).map_err(|_| GridError::InvalidCoordinate { lat, lon })?;
    Ok(latlng.to_cell(RESOLUTION))
}

/// Parses a hex-encoded H3 index, rejecting anything not at resolution
/// 10 (§4.2: "the engine rejects events whose cell id is not at
/// resolution 10 with a configuration error").
///
/// # Errors
///
/// Returns [`GridError::ParseFailed`] if `raw` is not a valid H3 index,
/// or [`GridError::WrongResolution`] if it is valid but not resolution
/// 10.
pub fn parse_cell(raw: &str) -> Result<CellIndex, GridError> {
    let cell: CellIndex = raw
        .parse()
        .map_err(|_| GridError::ParseFailed { raw: raw.to_string() })?;
    require_resolution_ten(cell)?;
    Ok(cell)
}

/// Checks that `cell` is at [`RESOLUTION`], returning a
/// [`GridError::WrongResolution`] otherwise.
///
/// # Errors
///
/// See above.
pub fn require_resolution_ten(cell: CellIndex) -> Result<(), GridError> {
    let actual = cell.resolution();
    if actual != RESOLUTION {
        return Err(GridError::WrongResolution {
            cell: cell.to_string(),
            expected: u8::from(RESOLUTION),
            actual: u8::from(actual),
        });
    }
    Ok(())
}

/// Returns the resolution encoded in `cell`.
#[must_use]
pub fn resolution(cell: CellIndex) -> u8 {
    u8::from(cell.resolution())
}

/// Returns `true` if `a` and `b` are grid neighbors (share an edge).
///
/// Cells at different resolutions are never neighbors.
#[must_use]
pub fn are_neighbors(a: CellIndex, b: CellIndex) -> bool {
    a.is_neighbor_with(b).unwrap_or(false)
}

/// Returns the closed polygon boundary of `cell` as `(lon, lat)` pairs,
/// with the first coordinate repeated as the last.
#[must_use]
pub fn boundary_of(cell: CellIndex) -> Vec<(f64, f64)> {
    let mut ring: Vec<(f64, f64)> = cell.boundary().iter().map(|ll| (ll.lng(), ll.lat())).collect();
    if let Some(&first) = ring.first() {
        if ring.last() != Some(&first) {
            ring.push(first);
        }
    }
    ring
}

#[cfg(test)]
mod tests {
    use super::*;

    // Approximately central London; any real-world coordinate works for
    // exercising the encode/decode/boundary round trip.
    const LAT: f64 = 50.9097;
    const LON: f64 = -1.4044;

    #[test]
    fn cell_of_is_resolution_ten() {
        let cell = cell_of(LAT, LON).unwrap();
        assert_eq!(resolution(cell), 10);
        assert!(require_resolution_ten(cell).is_ok());
    }

    #[test]
    fn boundary_is_closed() {
        let cell = cell_of(LAT, LON).unwrap();
        let boundary = boundary_of(cell);
        assert!(boundary.len() >= 4);
        assert_eq!(boundary.first(), boundary.last());
    }

    #[test]
    fn parse_round_trips_through_string() {
        let cell = cell_of(LAT, LON).unwrap();
        let raw = cell.to_string();
        let parsed = parse_cell(&raw).unwrap();
        assert_eq!(cell, parsed);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_cell("not-an-h3-index").is_err());
    }

    #[test]
    fn parse_rejects_wrong_resolution() {
        let cell = cell_of(LAT, LON).unwrap();
        let coarser = cell.parent(Resolution::Five).unwrap();
        let err = parse_cell(&coarser.to_string()).unwrap_err();
        assert!(matches!(err, GridError::WrongResolution { .. }));
    }

    #[test]
    fn invalid_coordinate_is_rejected() {
        assert!(cell_of(f64::NAN, LON).is_err());
        assert!(cell_of(200.0, LON).is_err());
    }

    #[test]
    fn neighbors_of_self_is_false() {
        let cell = cell_of(LAT, LON).unwrap();
        assert!(!are_neighbors(cell, cell));
    }
}
