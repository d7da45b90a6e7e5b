//! Data models shared across the service layers

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Decoded geolocation record for one address
///
/// Every field mirrors what the database decoder returned: an absent block
/// (e.g. no `country` at all) stays distinguishable from a block that is
/// present with empty fields. A record where everything is `None` is a valid
/// "no data for this address" result and is cached like any other.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoRecord {
    pub country: Option<CountryInfo>,
    pub city: Option<CityInfo>,
    pub location: Option<LocationInfo>,
}

/// Country block of a decoded record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountryInfo {
    pub iso_code: Option<String>,
    pub name: Option<String>,
}

/// City block of a decoded record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CityInfo {
    pub name: Option<String>,
}

/// Location block of a decoded record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationInfo {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub time_zone: Option<String>,
}

/// Request body accepted by the lookup endpoint
#[derive(Debug, Deserialize)]
pub struct LookupRequest {
    pub ip: String,
}

/// Response payload returned by the lookup endpoint
#[derive(Debug, Serialize)]
pub struct LookupResponse {
    pub ip: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub location: Option<LocationInfo>,
}

impl LookupResponse {
    pub fn new(addr: IpAddr, record: &GeoRecord) -> Self {
        Self {
            ip: addr.to_string(),
            country: record
                .country
                .as_ref()
                .and_then(|country| country.iso_code.clone()),
            city: record.city.as_ref().and_then(|city| city.name.clone()),
            location: record.location.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_flattens_record_fields() {
        let record = GeoRecord {
            country: Some(CountryInfo {
                iso_code: Some("EE".to_string()),
                name: Some("Estonia".to_string()),
            }),
            city: None,
            location: Some(LocationInfo {
                latitude: Some(59.0),
                longitude: Some(26.0),
                time_zone: Some("Europe/Tallinn".to_string()),
            }),
        };

        let response = LookupResponse::new("195.50.209.246".parse().unwrap(), &record);
        assert_eq!(response.ip, "195.50.209.246");
        assert_eq!(response.country.as_deref(), Some("EE"));
        assert_eq!(response.city, None);
        assert_eq!(response.location.unwrap().time_zone.as_deref(), Some("Europe/Tallinn"));
    }

    #[test]
    fn response_distinguishes_missing_country_from_empty_iso_code() {
        let no_block = GeoRecord::default();
        let empty_block = GeoRecord {
            country: Some(CountryInfo::default()),
            ..GeoRecord::default()
        };

        assert_ne!(no_block, empty_block);

        let addr: IpAddr = "10.0.0.1".parse().unwrap();
        assert_eq!(LookupResponse::new(addr, &no_block).country, None);
        assert_eq!(LookupResponse::new(addr, &empty_block).country, None);
    }
}
