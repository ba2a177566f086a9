//! Forecast region lookup.
//!
//! Rules are checked in order and the first box containing the point wins,
//! so narrower boxes must come before the wider ones that overlap them.

use crate::types::Region;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    pub const fn new(min_lat: f64, max_lat: f64, min_lng: f64, max_lng: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        }
    }

    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        latitude >= self.min_lat
            && latitude <= self.max_lat
            && longitude >= self.min_lng
            && longitude <= self.max_lng
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionRule {
    pub bounds: Bounds,
    pub region: Region,
    /// Preferred upstream data source
    pub source: &'static str,
    /// Open-Meteo `models` value for that source
    pub model: &'static str,
}

pub const REGION_TABLE: &[RegionRule] = &[
    // Hong Kong / South China
    RegionRule {
        bounds: Bounds::new(18.0, 26.0, 108.0, 118.0),
        region: Region::AsiaPacific,
        source: "hko",
        model: "cma_grapes_global",
    },
    // Japan
    RegionRule {
        bounds: Bounds::new(24.0, 46.0, 122.0, 146.0),
        region: Region::AsiaPacific,
        source: "jma",
        model: "jma_seamless",
    },
    // Australia / New Zealand
    RegionRule {
        bounds: Bounds::new(-50.0, -10.0, 110.0, 180.0),
        region: Region::AsiaPacific,
        source: "bom",
        model: "bom_access_global",
    },
    RegionRule {
        bounds: Bounds::new(15.0, 72.0, -170.0, -50.0),
        region: Region::NorthAmerica,
        source: "noaa",
        model: "gfs_seamless",
    },
    RegionRule {
        bounds: Bounds::new(35.0, 72.0, -25.0, 45.0),
        region: Region::Europe,
        source: "ecmwf",
        model: "ecmwf_ifs025",
    },
];

pub const GLOBAL_RULE: RegionRule = RegionRule {
    bounds: Bounds::new(-90.0, 90.0, -180.0, 180.0),
    region: Region::Global,
    source: "open-meteo",
    model: "best_match",
};

/// First rule whose bounds contain the point, or the global default
pub fn select_region(latitude: f64, longitude: f64) -> &'static RegionRule {
    REGION_TABLE
        .iter()
        .find(|rule| rule.bounds.contains(latitude, longitude))
        .unwrap_or(&GLOBAL_RULE)
}
