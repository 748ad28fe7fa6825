//! GeoIP lookup over the MaxMind City and ASN databases.
//!
//! Readers are explicitly constructed service values passed into the
//! enricher at startup; there is no global reader state.

use std::path::Path;

use maxminddb::Reader;

use crate::error_handling::InitializationError;

/// Open City + ASN database readers.
pub struct GeoIp {
    city: Reader<Vec<u8>>,
    asn: Reader<Vec<u8>>,
}

/// What one IP lookup contributes to a row.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GeoLookup {
    /// `"<subdivision-iso>/<country-iso>"`, or the country code alone when
    /// no subdivision is known
    pub location: String,
    /// Autonomous-system organization name
    pub asn_org: Option<String>,
}

impl GeoIp {
    /// Opens both GeoLite2 database files.
    pub fn open(city_path: &Path, asn_path: &Path) -> Result<Self, InitializationError> {
        let city = Reader::open_readfile(city_path)?;
        let asn = Reader::open_readfile(asn_path)?;
        Ok(GeoIp { city, asn })
    }

    /// Looks up an IP in both databases.
    ///
    /// The two databases are consulted independently: an IP known only to
    /// the ASN database still yields its organization (with an empty
    /// location), and vice versa. Returns `None` only when the IP does not
    /// parse or misses in both.
    pub fn lookup(&self, ip: &str) -> Option<GeoLookup> {
        let ip_addr: std::net::IpAddr = ip.parse().ok()?;
        merge_lookup(self.city_location(ip_addr), self.asn_org(ip_addr))
    }

    fn city_location(&self, ip_addr: std::net::IpAddr) -> Option<String> {
        // maxminddb 0.27 API: lookup() returns a LookupResult; check
        // has_data() before decoding into the geoip2 structs
        let city_lookup = self.city.lookup(ip_addr).ok()?;
        if !city_lookup.has_data() {
            return None;
        }
        let city: maxminddb::geoip2::City = match city_lookup.decode() {
            Ok(Some(city)) => city,
            _ => return None,
        };

        let country = city.country.iso_code.unwrap_or_default();
        Some(match city.subdivisions.first().and_then(|s| s.iso_code) {
            Some(subdivision) => format!("{subdivision}/{country}"),
            None => country.to_string(),
        })
    }

    fn asn_org(&self, ip_addr: std::net::IpAddr) -> Option<String> {
        let asn_lookup = self.asn.lookup(ip_addr).ok()?;
        if !asn_lookup.has_data() {
            return None;
        }
        match asn_lookup.decode::<maxminddb::geoip2::Asn>() {
            Ok(Some(asn)) => asn.autonomous_system_organization.map(|s| s.to_string()),
            _ => None,
        }
    }
}

/// Combines the independent City and ASN results into one lookup outcome.
fn merge_lookup(location: Option<String>, asn_org: Option<String>) -> Option<GeoLookup> {
    if location.is_none() && asn_org.is_none() {
        return None;
    }
    Some(GeoLookup {
        location: location.unwrap_or_default(),
        asn_org,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asn_hit_survives_city_miss() {
        let merged = merge_lookup(None, Some("Acme Hosting".into())).unwrap();
        assert_eq!(merged.location, "");
        assert_eq!(merged.asn_org.as_deref(), Some("Acme Hosting"));
    }

    #[test]
    fn test_city_hit_survives_asn_miss() {
        let merged = merge_lookup(Some("UT/US".into()), None).unwrap();
        assert_eq!(merged.location, "UT/US");
        assert_eq!(merged.asn_org, None);
    }

    #[test]
    fn test_both_hits_combined() {
        let merged = merge_lookup(Some("UT/US".into()), Some("Acme Hosting".into())).unwrap();
        assert_eq!(merged.location, "UT/US");
        assert_eq!(merged.asn_org.as_deref(), Some("Acme Hosting"));
    }

    #[test]
    fn test_double_miss_is_none() {
        assert!(merge_lookup(None, None).is_none());
    }
}
