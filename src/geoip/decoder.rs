//! Record decoder over one open database file version
//!
//! The decoder is an external capability as far as the rest of the service is
//! concerned: `open(path)` yields a handle, `lookup(addr)` yields a record.
//! The handle closes when it is dropped, which the manager defers until no
//! in-flight lookup can still reach it.

use maxminddb::{geoip2, MaxMindDBError};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::Path;

use crate::errors::DecodeError;
use crate::models::{CityInfo, CountryInfo, GeoRecord, LocationInfo};

/// Decoding capability the database manager consumes
pub trait GeoDecoder: Send + Sync {
    /// Look up `addr`, returning an empty record when the database holds no
    /// data for it
    fn lookup(&self, addr: IpAddr) -> Result<GeoRecord, DecodeError>;
}

/// Production decoder backed by a memory-loaded MaxMind database
pub struct MmdbDecoder {
    reader: maxminddb::Reader<Vec<u8>>,
}

impl MmdbDecoder {
    pub fn open(path: &Path) -> Result<Self, MaxMindDBError> {
        Ok(Self {
            reader: maxminddb::Reader::open_readfile(path)?,
        })
    }
}

impl GeoDecoder for MmdbDecoder {
    fn lookup(&self, addr: IpAddr) -> Result<GeoRecord, DecodeError> {
        match self.reader.lookup::<geoip2::City>(addr) {
            Ok(city) => Ok(record_from_city(city)),
            // An address the database does not cover is a valid, cacheable
            // "no data" result, not a failure.
            Err(MaxMindDBError::AddressNotFoundError(_)) => Ok(GeoRecord::default()),
            Err(err) => Err(DecodeError::from(err)),
        }
    }
}

/// Convert the decoder's borrowed record into an owned one
///
/// The `geoip2::City` struct works for country-only editions as well; the
/// city and location blocks simply come back absent.
fn record_from_city(city: geoip2::City<'_>) -> GeoRecord {
    GeoRecord {
        country: city.country.map(|country| CountryInfo {
            iso_code: country.iso_code.map(str::to_owned),
            name: english_name(country.names),
        }),
        city: city.city.map(|city| CityInfo {
            name: english_name(city.names),
        }),
        location: city.location.map(|location| LocationInfo {
            latitude: location.latitude,
            longitude: location.longitude,
            time_zone: location.time_zone.map(str::to_owned),
        }),
    }
}

fn english_name(names: Option<BTreeMap<&str, &str>>) -> Option<String> {
    names.and_then(|names| names.get("en").map(|name| (*name).to_string()))
}
