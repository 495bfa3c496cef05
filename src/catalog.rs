//! Static property catalog — the read-only collaborator of the booking
//! engine. Loaded once per process from a JSON fixture.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use ulid::Ulid;

use crate::engine::EngineError;
use crate::model::{Destination, Property, Stay};

/// One search hit. `stay_total` is present only when the query carried a
/// stay: `price_per_night * nights`.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyMatch {
    pub property: Property,
    pub stay_total: Option<f64>,
}

/// Structured search criteria. Destination matches field-wise on
/// city/state/country; `guests` is the minimum standard capacity to keep.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub destination: Option<Destination>,
    pub guests: Option<u32>,
    pub stay: Option<Stay>,
}

pub struct PropertyCatalog {
    properties: Vec<Property>,
    by_id: HashMap<Ulid, usize>,
}

impl PropertyCatalog {
    pub fn from_properties(properties: Vec<Property>) -> Self {
        let by_id = properties
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id, i))
            .collect();
        Self { properties, by_id }
    }

    /// Load the fixture catalog from a JSON file (an array of properties).
    pub fn load(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let properties: Vec<Property> = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(Self::from_properties(properties))
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn get(&self, id: &Ulid) -> Option<&Property> {
        self.by_id.get(id).map(|&i| &self.properties[i])
    }

    pub fn all(&self) -> &[Property] {
        &self.properties
    }

    /// Distinct destinations in catalog order, for autocomplete.
    pub fn destinations(&self) -> Vec<Destination> {
        let mut seen: Vec<Destination> = Vec::new();
        for p in &self.properties {
            let d = Destination {
                city: p.location.city.clone(),
                state: p.location.state.clone(),
                country: p.location.country.clone(),
            };
            if !seen.contains(&d) {
                seen.push(d);
            }
        }
        seen
    }

    /// Filter the catalog. No ranking beyond catalog order.
    pub fn search(&self, query: &SearchQuery) -> Result<Vec<PropertyMatch>, EngineError> {
        let nights = match &query.stay {
            Some(stay) => {
                let n = stay.nights();
                if n <= 0 {
                    return Err(EngineError::InvalidRange);
                }
                Some(n)
            }
            None => None,
        };

        Ok(self
            .properties
            .iter()
            .filter(|p| {
                query
                    .destination
                    .as_ref()
                    .is_none_or(|d| d.matches(&p.location))
            })
            .filter(|p| query.guests.is_none_or(|g| p.guests >= g))
            .map(|p| PropertyMatch {
                property: p.clone(),
                stay_total: nights.map(|n| p.price_per_night * n as f64),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Location, NIGHT_MS};
    use std::collections::BTreeMap;

    fn property(city: &str, state: &str, price: f64, capacity: u32) -> Property {
        Property {
            id: Ulid::new(),
            title: format!("Stay in {city}"),
            description: String::new(),
            image: String::new(),
            price_per_night: price,
            amenities: BTreeMap::new(),
            rating: 4.5,
            reviews: 10,
            guests: capacity,
            bedrooms: 2,
            bathrooms: 1,
            location: Location {
                city: city.into(),
                state: state.into(),
                country: "United States".into(),
            },
        }
    }

    fn catalog() -> PropertyCatalog {
        PropertyCatalog::from_properties(vec![
            property("Malibu", "California", 120.0, 8),
            property("Aspen", "Colorado", 250.0, 4),
            property("Malibu", "California", 95.0, 2),
        ])
    }

    #[test]
    fn lookup_by_id() {
        let c = catalog();
        let id = c.all()[1].id;
        assert_eq!(c.get(&id).unwrap().location.city, "Aspen");
        assert!(c.get(&Ulid::new()).is_none());
    }

    #[test]
    fn search_no_criteria_returns_catalog_order() {
        let c = catalog();
        let hits = c.search(&SearchQuery::default()).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].property.id, c.all()[0].id);
        assert!(hits.iter().all(|h| h.stay_total.is_none()));
    }

    #[test]
    fn search_by_destination() {
        let c = catalog();
        let hits = c
            .search(&SearchQuery {
                destination: Some(Destination {
                    city: "Malibu".into(),
                    state: "California".into(),
                    country: "United States".into(),
                }),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.property.location.city == "Malibu"));
    }

    #[test]
    fn search_by_min_capacity() {
        let c = catalog();
        let hits = c
            .search(&SearchQuery {
                guests: Some(4),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.property.guests >= 4));
    }

    #[test]
    fn search_with_stay_computes_total() {
        let c = catalog();
        let hits = c
            .search(&SearchQuery {
                stay: Some(Stay::new(0, 7 * NIGHT_MS)),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(hits[0].stay_total, Some(840.0));
        assert_eq!(hits[1].stay_total, Some(1750.0));
    }

    #[test]
    fn search_with_invalid_stay_rejected() {
        let c = catalog();
        let result = c.search(&SearchQuery {
            stay: Some(Stay {
                check_in: NIGHT_MS,
                check_out: NIGHT_MS,
            }),
            ..Default::default()
        });
        assert!(matches!(result, Err(EngineError::InvalidRange)));
    }

    #[test]
    fn destinations_distinct_in_catalog_order() {
        let c = catalog();
        let ds = c.destinations();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds[0].city, "Malibu");
        assert_eq!(ds[1].city, "Aspen");
    }
}
