//! Coordinate reference systems the engine can read and write.
//!
//! The table below covers what SICAR data is delivered in (SIRGAS 2000,
//! WGS 84 and SAD69, geographic and UTM, plus Web Mercator). It names CRSs
//! from `.prj` files without an authority, writes output `.prj` files, and
//! backs up the EPSG definitions bundled with `proj4rs`. A `.prj` that
//! matches nothing here is converted to a PROJ definition directly.

use cadastro_core::types::Crs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Datum {
    Sirgas2000,
    Wgs84,
    Sad69,
}

impl Datum {
    fn proj_params(self) -> &'static str {
        match self {
            Datum::Sirgas2000 => "+ellps=GRS80 +towgs84=0,0,0,0,0,0,0",
            Datum::Wgs84 => "+datum=WGS84",
            Datum::Sad69 => "+ellps=aust_SA +towgs84=-66.87,4.37,-38.52,0,0,0,0",
        }
    }

    fn esri_geogcs(self) -> &'static str {
        match self {
            Datum::Sirgas2000 => r#"GEOGCS["GCS_SIRGAS_2000",DATUM["D_SIRGAS_2000",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#,
            Datum::Wgs84 => r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#,
            Datum::Sad69 => r#"GEOGCS["GCS_South_American_1969",DATUM["D_South_American_1969",SPHEROID["GRS_1967_Truncated",6378160.0,298.25]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#,
        }
    }

    fn esri_prefix(self) -> &'static str {
        match self {
            Datum::Sirgas2000 => "SIRGAS_2000",
            Datum::Wgs84 => "WGS_1984",
            Datum::Sad69 => "SAD_1969",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CrsDef {
    Geographic(Datum),
    Utm { datum: Datum, zone: u8, south: bool },
    WebMercator,
}

impl CrsDef {
    fn from_epsg(code: u32) -> Option<Self> {
        let utm = |datum, base: u32, south| {
            u8::try_from(code - base).ok().map(|zone| CrsDef::Utm { datum, zone, south })
        };
        match code {
            4674 => Some(CrsDef::Geographic(Datum::Sirgas2000)),
            4326 => Some(CrsDef::Geographic(Datum::Wgs84)),
            4618 | 4291 => Some(CrsDef::Geographic(Datum::Sad69)),
            3857 => Some(CrsDef::WebMercator),
            31965..=31976 => utm(Datum::Sirgas2000, 31954, false),
            31977..=31985 => utm(Datum::Sirgas2000, 31960, true),
            29187..=29195 => utm(Datum::Sad69, 29170, true),
            32601..=32660 => utm(Datum::Wgs84, 32600, false),
            32701..=32760 => utm(Datum::Wgs84, 32700, true),
            _ => None,
        }
    }

    fn epsg(self) -> Option<u32> {
        let code = match self {
            CrsDef::Geographic(Datum::Sirgas2000) => 4674,
            CrsDef::Geographic(Datum::Wgs84) => 4326,
            CrsDef::Geographic(Datum::Sad69) => 4618,
            CrsDef::WebMercator => 3857,
            CrsDef::Utm { datum, zone, south } => {
                let zone = u32::from(zone);
                match (datum, south) {
                    (Datum::Sirgas2000, true) => 31960 + zone,
                    (Datum::Sirgas2000, false) => 31954 + zone,
                    (Datum::Sad69, true) => 29170 + zone,
                    (Datum::Sad69, false) => return None,
                    (Datum::Wgs84, true) => 32700 + zone,
                    (Datum::Wgs84, false) => 32600 + zone,
                }
            }
        };
        // Round-trip guards zone numbers outside the supported ranges.
        CrsDef::from_epsg(code).filter(|def| *def == self).map(|_| code)
    }

    fn is_geographic(self) -> bool {
        matches!(self, CrsDef::Geographic(_))
    }

    fn proj_string(self) -> String {
        match self {
            CrsDef::Geographic(datum) => format!("+proj=longlat {} +no_defs", datum.proj_params()),
            CrsDef::WebMercator => {
                "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs".to_string()
            }
            CrsDef::Utm { datum, zone, south } => format!(
                "+proj=utm +zone={zone}{} {} +units=m +no_defs",
                if south { " +south" } else { "" },
                datum.proj_params()
            ),
        }
    }

    fn esri_wkt(self) -> String {
        match self {
            CrsDef::Geographic(datum) => datum.esri_geogcs().to_string(),
            CrsDef::WebMercator => format!(
                r#"PROJCS["WGS_1984_Web_Mercator_Auxiliary_Sphere",{},PROJECTION["Mercator_Auxiliary_Sphere"],PARAMETER["False_Easting",0.0],PARAMETER["False_Northing",0.0],PARAMETER["Central_Meridian",0.0],PARAMETER["Standard_Parallel_1",0.0],PARAMETER["Auxiliary_Sphere_Type",0.0],UNIT["Meter",1.0]]"#,
                Datum::Wgs84.esri_geogcs()
            ),
            CrsDef::Utm { datum, zone, south } => {
                let hemisphere = if south { 'S' } else { 'N' };
                let false_northing = if south { 10_000_000.0 } else { 0.0 };
                let central_meridian = -183 + 6 * i32::from(zone);
                format!(
                    r#"PROJCS["{}_UTM_Zone_{zone}{hemisphere}",{},PROJECTION["Transverse_Mercator"],PARAMETER["False_Easting",500000.0],PARAMETER["False_Northing",{false_northing:.1}],PARAMETER["Central_Meridian",{central_meridian}.0],PARAMETER["Scale_Factor",0.9996],PARAMETER["Latitude_Of_Origin",0.0],UNIT["Meter",1.0]]"#,
                    datum.esri_prefix(),
                    datum.esri_geogcs()
                )
            }
        }
    }
}

/// Whether `epsg` is in the built-in table.
pub fn is_tabulated(epsg: u32) -> bool {
    CrsDef::from_epsg(epsg).is_some()
}

/// True for longitude/latitude systems (coordinates in degrees).
pub fn is_geographic(epsg: u32) -> bool {
    CrsDef::from_epsg(epsg).is_some_and(CrsDef::is_geographic)
}

/// PROJ.4 definition from the built-in table.
pub fn proj_definition(epsg: u32) -> Option<String> {
    CrsDef::from_epsg(epsg).map(CrsDef::proj_string)
}

/// ESRI-flavoured WKT, the dialect expected inside a `.prj` sibling.
pub fn esri_wkt(epsg: u32) -> Option<String> {
    CrsDef::from_epsg(epsg).map(CrsDef::esri_wkt)
}

/// Maps `.prj` contents to an EPSG code.
///
/// An explicit authority wins (the last one, which in WKT1 belongs to the
/// outermost CRS). Otherwise the leading CRS name is matched against the
/// datums and projections above.
pub fn detect_epsg(wkt: &str) -> Option<u32> {
    let leading = leading_name(wkt);
    let projected = leading.as_ref().is_some_and(|(p, _)| *p);
    // A projected CRS whose only authority sits on its base GEOGCS must not
    // be mistaken for that geographic CRS.
    if let Some(code) = last_authority_code(wkt).filter(|c| !(projected && is_geographic(*c))) {
        return Some(code);
    }
    let (projected, name) = leading?;
    def_from_name(&name, projected).and_then(CrsDef::epsg)
}

/// CRS of a `.prj`: an EPSG code when [`detect_epsg`] finds one, else the
/// PROJ definition converted from the WKT itself, else the bare name.
pub fn crs_from_prj(wkt: &str) -> Crs {
    if let Some(code) = detect_epsg(wkt) {
        return Crs::Epsg(code);
    }
    let name = leading_name(wkt).map_or_else(|| wkt.trim().chars().take(64).collect(), |(_, n)| n);
    match proj4wkt::wkt_to_projstring(wkt) {
        Ok(proj) if !proj.trim().is_empty() => Crs::Definition { name, proj: proj.trim().to_string() },
        _ => Crs::Unrecognized(name),
    }
}

fn last_authority_code(wkt: &str) -> Option<u32> {
    let upper = wkt.to_ascii_uppercase();
    let mut found = None;
    for marker in ["AUTHORITY[\"EPSG\",", "ID[\"EPSG\","] {
        let mut rest = upper.as_str();
        while let Some(idx) = rest.find(marker) {
            let offset = upper.len() - rest.len() + idx;
            rest = &rest[idx + marker.len()..];
            let digits: String = rest.trim_start_matches([' ', '"']).chars().take_while(char::is_ascii_digit).collect();
            if let Ok(code) = digits.parse::<u32>() {
                if found.map_or(true, |(at, _)| offset > at) {
                    found = Some((offset, code));
                }
            }
        }
    }
    found.map(|(_, code)| code)
}

fn leading_name(wkt: &str) -> Option<(bool, String)> {
    let trimmed = wkt.trim_start();
    let keyword_end = trimmed.find('[')?;
    let projected = match trimmed[..keyword_end].trim().to_ascii_uppercase().as_str() {
        "PROJCS" | "PROJCRS" | "PROJECTEDCRS" => true,
        "GEOGCS" | "GEOGCRS" | "GEOGRAPHICCRS" | "GEODCRS" => false,
        _ => return None,
    };
    let after = &trimmed[keyword_end + 1..];
    let start = after.find('"')? + 1;
    let len = after[start..].find('"')?;
    Some((projected, after[start..start + len].to_string()))
}

fn def_from_name(name: &str, projected: bool) -> Option<CrsDef> {
    let norm = name.to_ascii_uppercase().replace(['_', '/', '-'], " ");
    let norm = norm.split_whitespace().collect::<Vec<_>>().join(" ");

    if norm.contains("WEB MERCATOR") || norm.contains("PSEUDO MERCATOR") {
        return Some(CrsDef::WebMercator);
    }
    let datum = if norm.contains("SIRGAS") {
        Datum::Sirgas2000
    } else if norm.contains("SAD69") || norm.contains("SAD 69") || norm.contains("SAD 1969") || norm.contains("SOUTH AMERICAN 1969") {
        Datum::Sad69
    } else if norm.contains("WGS 84") || norm.contains("WGS84") || norm.contains("WGS 1984") {
        Datum::Wgs84
    } else {
        return None;
    };
    if !projected {
        return Some(CrsDef::Geographic(datum));
    }
    let zone_text = &norm[norm.find("UTM ZONE ")? + "UTM ZONE ".len()..];
    let digits: String = zone_text.chars().take_while(char::is_ascii_digit).collect();
    let zone: u8 = digits.parse().ok()?;
    let south = match zone_text[digits.len()..].chars().next() {
        Some('S') => true,
        Some('N') => false,
        _ => norm.contains("SOUTH"),
    };
    Some(CrsDef::Utm { datum, zone, south })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIRGAS_OGC: &str = r#"GEOGCS["SIRGAS 2000",DATUM["Sistema_de_Referencia_Geocentrico_para_las_AmericaS_2000",SPHEROID["GRS 1980",6378137,298.257222101,AUTHORITY["EPSG","7019"]],AUTHORITY["EPSG","6674"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AUTHORITY["EPSG","4674"]]"#;

    #[test]
    fn outermost_authority_wins() {
        assert_eq!(detect_epsg(SIRGAS_OGC), Some(4674));
    }

    #[test]
    fn esri_names_without_authority_are_recognized() {
        assert_eq!(detect_epsg(&Datum::Sirgas2000.esri_geogcs().to_string()), Some(4674));
        assert_eq!(detect_epsg(r#"PROJCS["SIRGAS 2000 / UTM zone 23S",GEOGCS["SIRGAS 2000"]]"#), Some(31983));
        assert_eq!(detect_epsg(r#"PROJCS["SAD_1969_UTM_Zone_22S",GEOGCS["GCS_South_American_1969"]]"#), Some(29192));
        assert_eq!(detect_epsg(r#"PROJCS["WGS_1984_UTM_Zone_21S",GEOGCS["GCS_WGS_1984"]]"#), Some(32721));
    }

    #[test]
    fn written_prj_files_read_back_to_the_same_code() {
        for code in [4674, 4326, 4618, 3857, 31970, 31983, 29193, 32722] {
            let wkt = esri_wkt(code).expect("supported");
            assert_eq!(detect_epsg(&wkt), Some(code), "{wkt}");
        }
    }

    #[test]
    fn unparseable_prj_keeps_its_text() {
        assert_eq!(crs_from_prj("not a crs"), Crs::Unrecognized("not a crs".into()));
        assert!(!is_tabulated(5880));
    }

    #[test]
    fn prj_without_authority_outside_the_table_becomes_a_definition() {
        let wkt = r#"PROJCS["SIRGAS_2000_Brazil_Mercator",GEOGCS["GCS_SIRGAS_2000",DATUM["D_SIRGAS_2000",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Mercator"],PARAMETER["False_Easting",5000000.0],PARAMETER["False_Northing",10000000.0],PARAMETER["Central_Meridian",-43.0],PARAMETER["Standard_Parallel_1",-2.0],UNIT["Meter",1.0]]"#;
        assert_eq!(detect_epsg(wkt), None);
        let Crs::Definition { name, proj } = crs_from_prj(wkt) else { panic!("definition expected") };
        assert_eq!(name, "SIRGAS_2000_Brazil_Mercator");
        assert!(proj.contains("merc"), "{proj}");
    }

    #[test]
    fn utm_definitions_carry_zone_and_hemisphere() {
        let def = proj_definition(31983).expect("def");
        assert!(def.starts_with("+proj=utm +zone=23 +south"));
        assert!(is_geographic(4674));
        assert!(!is_geographic(31983));
    }
}
