//! Built-in city catalog for global digests

use rand::seq::SliceRandom;
use rand::Rng;

use crate::news::{Coordinates, Location};

/// A catalog entry: city, state, country, latitude, longitude
pub struct CatalogCity {
    pub city: &'static str,
    pub state: Option<&'static str>,
    pub country: &'static str,
    pub lat: f64,
    pub lon: f64,
}

impl CatalogCity {
    pub fn location(&self) -> Location {
        Location {
            city: self.city.to_string(),
            state: self.state.map(str::to_string),
            country: Some(self.country.to_string()),
            coordinates: Coordinates::new(self.lat, self.lon),
        }
    }
}

macro_rules! city {
    ($city:expr, $state:expr, $country:expr, $lat:expr, $lon:expr) => {
        CatalogCity {
            city: $city,
            state: $state,
            country: $country,
            lat: $lat,
            lon: $lon,
        }
    };
}

pub const CITY_CATALOG: &[CatalogCity] = &[
    city!("New York", Some("New York"), "United States", 40.7128, -74.0060),
    city!("Los Angeles", Some("California"), "United States", 34.0522, -118.2437),
    city!("Chicago", Some("Illinois"), "United States", 41.8781, -87.6298),
    city!("Houston", Some("Texas"), "United States", 29.7604, -95.3698),
    city!("San Francisco", Some("California"), "United States", 37.7749, -122.4194),
    city!("Seattle", Some("Washington"), "United States", 47.6062, -122.3321),
    city!("Boston", Some("Massachusetts"), "United States", 42.3601, -71.0589),
    city!("Toronto", Some("Ontario"), "Canada", 43.6532, -79.3832),
    city!("Vancouver", Some("British Columbia"), "Canada", 49.2827, -123.1207),
    city!("Mexico City", None, "Mexico", 19.4326, -99.1332),
    city!("London", Some("England"), "United Kingdom", 51.5074, -0.1278),
    city!("Paris", Some("Ile-de-France"), "France", 48.8566, 2.3522),
    city!("Berlin", None, "Germany", 52.5200, 13.4050),
    city!("Madrid", None, "Spain", 40.4168, -3.7038),
    city!("Rome", Some("Lazio"), "Italy", 41.9028, 12.4964),
    city!("Amsterdam", Some("North Holland"), "Netherlands", 52.3676, 4.9041),
    city!("Dubai", None, "United Arab Emirates", 25.2048, 55.2708),
    city!("Mumbai", Some("Maharashtra"), "India", 19.0760, 72.8777),
    city!("Singapore", None, "Singapore", 1.3521, 103.8198),
    city!("Tokyo", None, "Japan", 35.6762, 139.6503),
    city!("Sydney", Some("New South Wales"), "Australia", -33.8688, 151.2093),
    city!("Cape Town", Some("Western Cape"), "South Africa", -33.9249, 18.4241),
    city!("Nairobi", None, "Kenya", -1.2921, 36.8219),
    city!("Sao Paulo", Some("Sao Paulo"), "Brazil", -23.5505, -46.6333),
    city!("Buenos Aires", None, "Argentina", -34.6037, -58.3816),
];

/// Pick `count` distinct cities at random (capped at the catalog size)
pub fn sample_cities<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Vec<Location> {
    CITY_CATALOG
        .choose_multiple(rng, count)
        .map(CatalogCity::location)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn test_sample_is_distinct_and_capped() {
        let mut rng = StdRng::seed_from_u64(7);

        let sample = sample_cities(&mut rng, 3);
        assert_eq!(sample.len(), 3);
        let names: HashSet<_> = sample.iter().map(|l| l.city.clone()).collect();
        assert_eq!(names.len(), 3);

        let everything = sample_cities(&mut rng, 1000);
        assert_eq!(everything.len(), CITY_CATALOG.len());
    }

    #[test]
    fn test_catalog_entries_carry_coordinates() {
        for entry in CITY_CATALOG {
            let location = entry.location();
            assert!(location.coordinates.lat.abs() <= 90.0, "{}", entry.city);
            assert!(location.coordinates.lon.abs() <= 180.0, "{}", entry.city);
            assert!(location.country.is_some());
        }
    }
}
