//! Record decoding
//!
//! A `RecordDecoder` turns a resolved data section offset into a flat
//! `GeoInfo`. The enricher treats it as a black box; `MmdbRecordDecoder` is
//! the default implementation for standard MMDB data sections.

use crate::data_section::{DataDecoder, DataValue};
use crate::database::GeoDatabase;
use crate::error::{EnrichError, Result};
use serde::Serialize;

/// Attributes written into enriched records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    /// Province / state
    Region,
    /// City
    City,
    /// Country name
    Country,
    /// Internet service provider
    Isp,
    /// ISO country code
    CountryCode,
    /// Latitude, as decimal text
    Latitude,
    /// Longitude, as decimal text
    Longitude,
    /// Administrative district code
    DistrictCode,
}

impl Attribute {
    /// Every attribute, in write order
    pub const ALL: [Attribute; 8] = [
        Attribute::Region,
        Attribute::City,
        Attribute::Country,
        Attribute::Isp,
        Attribute::CountryCode,
        Attribute::Latitude,
        Attribute::Longitude,
        Attribute::DistrictCode,
    ];

    /// Key written into records
    pub fn key(self) -> &'static str {
        match self {
            Attribute::Region => "Region",
            Attribute::City => "City",
            Attribute::Country => "Country",
            Attribute::Isp => "Isp",
            Attribute::CountryCode => "CountryCode",
            Attribute::Latitude => "Latitude",
            Attribute::Longitude => "Longitude",
            Attribute::DistrictCode => "DistrictCode",
        }
    }
}

/// Flat geolocation record; absent attributes are not written
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GeoInfo {
    /// Province / state
    pub region: Option<String>,
    /// City
    pub city: Option<String>,
    /// Country name
    pub country: Option<String>,
    /// Internet service provider
    pub isp: Option<String>,
    /// ISO country code
    pub country_code: Option<String>,
    /// Latitude
    pub latitude: Option<String>,
    /// Longitude
    pub longitude: Option<String>,
    /// Administrative district code
    pub district_code: Option<String>,
}

impl GeoInfo {
    /// Value of one attribute
    pub fn get(&self, attr: Attribute) -> Option<&str> {
        let value = match attr {
            Attribute::Region => &self.region,
            Attribute::City => &self.city,
            Attribute::Country => &self.country,
            Attribute::Isp => &self.isp,
            Attribute::CountryCode => &self.country_code,
            Attribute::Latitude => &self.latitude,
            Attribute::Longitude => &self.longitude,
            Attribute::DistrictCode => &self.district_code,
        };
        value.as_deref()
    }

    /// Present attributes, in write order
    pub fn attributes(&self) -> impl Iterator<Item = (Attribute, &str)> + '_ {
        Attribute::ALL
            .into_iter()
            .filter_map(move |attr| self.get(attr).map(|v| (attr, v)))
    }

    /// True when no attribute is present
    pub fn is_empty(&self) -> bool {
        self.attributes().next().is_none()
    }
}

/// Turns a resolved data offset into a flat attribute record
///
/// Decoders should report bad data as `EnrichError::Decode`. A panic inside
/// `decode` is caught by `BatchEnricher::enrich` and fails only that record,
/// as `EnrichError::Panicked`.
pub trait RecordDecoder: Send + Sync {
    /// Decode the record at `data_offset` (relative to the data section)
    fn decode(&self, db: &GeoDatabase, data_offset: u32) -> Result<GeoInfo>;
}

impl<F> RecordDecoder for F
where
    F: Fn(&GeoDatabase, u32) -> Result<GeoInfo> + Send + Sync,
{
    fn decode(&self, db: &GeoDatabase, data_offset: u32) -> Result<GeoInfo> {
        self(db, data_offset)
    }
}

/// Decoder for MMDB data sections
///
/// Understands the GeoIP2 layout (`country.names`, `subdivisions[0].names`,
/// `city.names`, `country.iso_code`, `location.latitude`, `traits.isp`) and a
/// flat layout with plain string fields (`region`, `city`, `country`, `isp`,
/// `country_code`, `latitude`, `longitude`, `district_code`).
#[derive(Debug, Clone)]
pub struct MmdbRecordDecoder {
    languages: Vec<String>,
}

impl Default for MmdbRecordDecoder {
    fn default() -> Self {
        Self {
            languages: vec!["zh-CN".to_string(), "en".to_string()],
        }
    }
}

impl RecordDecoder for MmdbRecordDecoder {
    fn decode(&self, db: &GeoDatabase, data_offset: u32) -> Result<GeoInfo> {
        let value = DataDecoder::new(db.data_section())
            .decode(data_offset)
            .map_err(|e| EnrichError::Decode(e.to_string()))?;
        if !matches!(value, DataValue::Map(_)) {
            return Err(EnrichError::Decode(format!(
                "record at offset {} is not a map",
                data_offset
            )));
        }
        Ok(self.to_geo_info(&value))
    }
}

impl MmdbRecordDecoder {
    /// Map a decoded record onto `GeoInfo`
    pub fn to_geo_info(&self, record: &DataValue) -> GeoInfo {
        let subdivision = record.get("subdivisions").and_then(|s| s.index(0));

        GeoInfo {
            region: self
                .flat(record, "region")
                .or_else(|| subdivision.and_then(|s| self.name(s))),
            city: record.get("city").and_then(|c| self.text_or_name(c)),
            country: record.get("country").and_then(|c| self.text_or_name(c)),
            isp: self.flat(record, "isp").or_else(|| {
                record
                    .get("traits")
                    .and_then(|t| t.get("isp"))
                    .and_then(text)
            }),
            country_code: self.flat(record, "country_code").or_else(|| {
                record
                    .get("country")
                    .and_then(|c| c.get("iso_code"))
                    .and_then(text)
            }),
            latitude: self.coordinate(record, "latitude"),
            longitude: self.coordinate(record, "longitude"),
            district_code: self.flat(record, "district_code"),
        }
    }

    fn flat(&self, record: &DataValue, key: &str) -> Option<String> {
        record.get(key).and_then(text)
    }

    fn text_or_name(&self, value: &DataValue) -> Option<String> {
        text(value).or_else(|| self.name(value))
    }

    fn name(&self, value: &DataValue) -> Option<String> {
        let names = value.get("names")?;
        self.languages
            .iter()
            .find_map(|lang| names.get(lang).and_then(text))
    }

    fn coordinate(&self, record: &DataValue, key: &str) -> Option<String> {
        record
            .get(key)
            .or_else(|| record.get("location").and_then(|l| l.get(key)))
            .and_then(|v| text(v).or_else(|| v.as_f64().map(|f| f.to_string())))
    }
}

/// Non-empty string contents
fn text(value: &DataValue) -> Option<String> {
    value
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
