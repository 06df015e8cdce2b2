//! Data models for the P1Doks catalog
//!
//! Wire DTOs for the listing endpoints plus the cleaned-up types the rest
//! of the application works with. The API is loosely typed (numeric fields
//! arrive as numbers or strings depending on the record), so the raw types
//! absorb that here and nowhere else.

use std::fmt;

use serde::Deserialize;

/// A racing series that has datapacks for the selected week
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Series {
    /// Series display name
    pub name: String,
    /// Track used by every datapack in this series/week
    pub track: String,
}

/// Car class groupings used for selection menus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CarClass {
    Gtp,
    Gt3,
    Gt4,
    Lmp2,
    Lmp3,
    PorscheCup,
    Other,
}

impl CarClass {
    /// Display order for selection menus, most popular classes first
    pub const DISPLAY_ORDER: [CarClass; 7] = [
        CarClass::Gtp,
        CarClass::Gt3,
        CarClass::Gt4,
        CarClass::Lmp2,
        CarClass::Lmp3,
        CarClass::PorscheCup,
        CarClass::Other,
    ];
}

impl fmt::Display for CarClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CarClass::Gtp => "GTP",
            CarClass::Gt3 => "GT3",
            CarClass::Gt4 => "GT4",
            CarClass::Lmp2 => "LMP2",
            CarClass::Lmp3 => "LMP3",
            CarClass::PorscheCup => "Porsche Cup",
            CarClass::Other => "Other",
        };
        f.write_str(name)
    }
}

/// One downloadable setup datapack
#[derive(Debug, Clone)]
pub struct DataPack {
    /// Opaque datapack identifier used by the files endpoints
    pub id: String,
    /// Vendor car name as it appears in the catalog
    pub car: String,
    /// Formatted lap time for display
    pub lap_time: Option<String>,
    /// Track name
    pub track: Option<String>,
    /// Datapack author
    pub author: Option<String>,
    /// Whether the active subscription includes this pack
    pub included: bool,
    /// Derived car class for grouping
    pub car_class: CarClass,
    /// Lap count the lap time was achieved over
    pub lap_count: Option<u32>,
}

/// Dry or wet setup variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupKind {
    Dry,
    Wet,
}

impl SetupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SetupKind::Dry => "dry",
            SetupKind::Wet => "wet",
        }
    }
}

/// One setup file within a datapack
#[derive(Debug, Clone)]
pub struct SetupFile {
    /// Download filename (what lands in the setups folder)
    pub filename: String,
    /// Storage filename the signed-URL exchange needs
    pub disk_filename: String,
    /// Human-readable title
    pub title: Option<String>,
    /// Dry or wet variant
    pub kind: SetupKind,
}

/// Week/season/track context a download run files setups under
#[derive(Debug, Clone)]
pub struct DownloadContext {
    pub track: String,
    pub series: String,
    pub season: u32,
    pub week: u32,
    pub year: i32,
}

/// Loosely typed field that arrives as a string or a number
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(i64),
}

impl StringOrNumber {
    fn into_string(self) -> String {
        match self {
            StringOrNumber::String(s) => s,
            StringOrNumber::Number(n) => n.to_string(),
        }
    }
}

/// `/ql/data-packs` response body
#[derive(Debug, Deserialize)]
pub(crate) struct DataPackListResponse {
    // Singular key in the upstream schema
    #[serde(default)]
    pub data_pack: Vec<RawDataPack>,
}

/// Raw datapack record as the API returns it
#[derive(Debug, Deserialize)]
pub(crate) struct RawDataPack {
    id: StringOrNumber,
    #[serde(rename = "Car", default)]
    car: Option<String>,
    #[serde(rename = "car", default)]
    car_lower: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    lap_time_formatted: Option<String>,
    #[serde(default)]
    lap_time: Option<String>,
    #[serde(rename = "Track", default)]
    track: Option<String>,
    #[serde(rename = "Series", default)]
    series: Option<String>,
    #[serde(default)]
    creator: Option<String>,
    #[serde(default)]
    price: Option<f64>,
    #[serde(default)]
    stripe_product_id: Option<String>,
    #[serde(rename = "Lap_Count_Achieved", default)]
    lap_count: Option<u32>,
}

impl RawDataPack {
    /// Series and track for the series listing; records missing either
    /// are skipped
    pub(crate) fn series_track(&self) -> Option<(&str, &str)> {
        Some((self.series.as_deref()?, self.track.as_deref()?))
    }

    /// Convert the raw record into the application model
    pub(crate) fn into_data_pack(self, series: &str) -> DataPack {
        let car = self
            .car
            .or(self.car_lower)
            .or(self.title)
            .unwrap_or_else(|| "Unknown".to_string());

        // Free packs and packs backed by a Stripe product are part of the
        // subscription; everything else needs a separate purchase.
        let included = self.price == Some(0.0)
            || self
                .stripe_product_id
                .as_deref()
                .is_some_and(|id| id.contains("prod_"));

        DataPack {
            id: self.id.into_string(),
            car_class: determine_car_class(&car, series),
            car,
            lap_time: self.lap_time_formatted.or(self.lap_time),
            track: self.track,
            author: self.creator,
            included,
            lap_count: self.lap_count,
        }
    }
}

/// Consolidated files response body
#[derive(Debug, Deserialize)]
pub(crate) struct FilesResponse {
    #[serde(default)]
    pub files: Vec<RawSetupFile>,
}

/// Raw setup file record
#[derive(Debug, Deserialize)]
pub(crate) struct RawSetupFile {
    #[serde(default)]
    filename_download: Option<String>,
    #[serde(default)]
    filename_disk: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

impl RawSetupFile {
    /// Convert to the application model; records of unknown type are
    /// dropped
    pub(crate) fn into_setup_file(self) -> Option<SetupFile> {
        let kind = match self.kind.as_deref() {
            Some("dry_files") => SetupKind::Dry,
            Some("wet_files") => SetupKind::Wet,
            _ => return None,
        };
        Some(SetupFile {
            filename: self.filename_download?,
            disk_filename: self.filename_disk?,
            title: self.title,
            kind,
        })
    }
}

/// Derive a car class from the vendor car name and series
///
/// Series-specific rules first, then generic markers in the car name.
pub fn determine_car_class(car_name: &str, series: &str) -> CarClass {
    let car_upper = car_name.to_uppercase();

    if series == "IMSA" {
        const GTP_CARS: &[&str] = &[
            "GTP",
            "PORSCHE 963",
            "BMW M HYBRID",
            "CADILLAC V-SERIES",
            "FERRARI 499P",
            "ACURA ARX-06",
        ];
        const GT3_CARS: &[&str] = &[
            "GT3",
            "LAMBORGHINI",
            "FERRARI 296",
            "CORVETTE",
            "PORSCHE 911",
            "BMW M4",
            "MERCEDES",
        ];
        const LMP2_CARS: &[&str] = &["LMP2", "DALLARA P217", "DALLARA LMP2"];

        if GTP_CARS.iter().any(|c| car_upper.contains(c)) {
            return CarClass::Gtp;
        }
        if GT3_CARS.iter().any(|c| car_upper.contains(c)) {
            return CarClass::Gt3;
        }
        if LMP2_CARS.iter().any(|c| car_upper.contains(c)) {
            return CarClass::Lmp2;
        }
    }

    if series.contains("GT") || series.contains("VRS") {
        if car_upper.contains("GT3") {
            return CarClass::Gt3;
        }
        if car_upper.contains("GT4") {
            return CarClass::Gt4;
        }
    }

    if series.contains("Porsche") && (car_upper.contains("CUP") || car_upper.contains("992")) {
        return CarClass::PorscheCup;
    }

    if series.contains("Prototype") {
        if car_upper.contains("LMP2") {
            return CarClass::Lmp2;
        }
        if car_upper.contains("LMP3") {
            return CarClass::Lmp3;
        }
    }

    // Fall back to markers in the car name itself
    if car_upper.contains("GT3") {
        return CarClass::Gt3;
    }
    if car_upper.contains("GT4") {
        return CarClass::Gt4;
    }
    if car_upper.contains("GTP") {
        return CarClass::Gtp;
    }
    if car_upper.contains("LMP2") {
        return CarClass::Lmp2;
    }
    if car_upper.contains("LMP3") {
        return CarClass::Lmp3;
    }

    CarClass::Other
}

/// Group datapacks by car class in display order, dropping empty classes
pub fn group_by_class(packs: &[DataPack]) -> Vec<(CarClass, Vec<&DataPack>)> {
    CarClass::DISPLAY_ORDER
        .iter()
        .filter_map(|class| {
            let members: Vec<&DataPack> =
                packs.iter().filter(|p| p.car_class == *class).collect();
            if members.is_empty() {
                None
            } else {
                Some((*class, members))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_data_pack_listing() {
        let body = r#"{
            "data_pack": [
                {
                    "id": 42,
                    "Car": "Ferrari 296 GT3",
                    "lap_time_formatted": "1:42.117",
                    "Track": "Monza",
                    "creator": "fastdriver",
                    "price": 0,
                    "Week": "11",
                    "Season": "3",
                    "Lap_Count_Achieved": 18
                },
                {
                    "id": "abc-123",
                    "title": "Porsche 963 GTP",
                    "price": 15.0,
                    "stripe_product_id": "prod_Xyz123"
                }
            ]
        }"#;

        let parsed: DataPackListResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.data_pack.len(), 2);

        let mut raws = parsed.data_pack.into_iter();
        let ferrari = raws.next().unwrap().into_data_pack("VRS GT Sprint Series");
        assert_eq!(ferrari.id, "42");
        assert_eq!(ferrari.car, "Ferrari 296 GT3");
        assert_eq!(ferrari.lap_time.as_deref(), Some("1:42.117"));
        assert!(ferrari.included);
        assert_eq!(ferrari.car_class, CarClass::Gt3);

        let porsche = raws.next().unwrap().into_data_pack("IMSA");
        assert_eq!(porsche.id, "abc-123");
        assert_eq!(porsche.car, "Porsche 963 GTP");
        assert!(porsche.included);
        assert_eq!(porsche.car_class, CarClass::Gtp);
    }

    #[test]
    fn test_paid_pack_without_stripe_product_is_excluded() {
        let raw: RawDataPack = serde_json::from_str(
            r#"{"id": 7, "Car": "BMW M4 GT3", "price": 12.5, "stripe_product_id": "price_only"}"#,
        )
        .unwrap();
        let pack = raw.into_data_pack("GT Challenge");
        assert!(!pack.included);
    }

    #[test]
    fn test_parse_consolidated_files_splits_kinds() {
        let body = r#"{
            "files": [
                {"type": "dry_files", "filename_download": "monza_q.sto", "filename_disk": "a1.sto", "title": "Quali"},
                {"type": "wet_files", "filename_download": "monza_wet.sto", "filename_disk": "b2.sto"},
                {"type": "telemetry", "filename_download": "lap.ibt", "filename_disk": "c3.ibt"}
            ]
        }"#;

        let parsed: FilesResponse = serde_json::from_str(body).unwrap();
        let files: Vec<SetupFile> = parsed
            .files
            .into_iter()
            .filter_map(RawSetupFile::into_setup_file)
            .collect();

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].kind, SetupKind::Dry);
        assert_eq!(files[0].filename, "monza_q.sto");
        assert_eq!(files[1].kind, SetupKind::Wet);
    }

    #[test]
    fn test_car_class_series_rules() {
        assert_eq!(determine_car_class("Cadillac V-Series.R", "IMSA"), CarClass::Gtp);
        assert_eq!(determine_car_class("Corvette Z06 GT3.R", "IMSA"), CarClass::Gt3);
        assert_eq!(determine_car_class("Dallara P217 LMP2", "IMSA"), CarClass::Lmp2);
        assert_eq!(
            determine_car_class("Porsche 992 Cup", "Porsche Cup Series"),
            CarClass::PorscheCup
        );
        assert_eq!(
            determine_car_class("Ligier JS P320 LMP3", "Prototype Challenge"),
            CarClass::Lmp3
        );
        assert_eq!(
            determine_car_class("McLaren 720S GT3", "Unrelated Series"),
            CarClass::Gt3
        );
        assert_eq!(
            determine_car_class("Toyota GR86", "Production Challenge"),
            CarClass::Other
        );
    }

    #[test]
    fn test_group_by_class_uses_display_order() {
        let packs = vec![
            pack("Toyota GR86", CarClass::Other),
            pack("Ferrari 296 GT3", CarClass::Gt3),
            pack("Porsche 963 GTP", CarClass::Gtp),
            pack("BMW M4 GT3", CarClass::Gt3),
        ];

        let grouped = group_by_class(&packs);
        let classes: Vec<CarClass> = grouped.iter().map(|(c, _)| *c).collect();
        assert_eq!(classes, vec![CarClass::Gtp, CarClass::Gt3, CarClass::Other]);
        assert_eq!(grouped[1].1.len(), 2);
    }

    fn pack(car: &str, car_class: CarClass) -> DataPack {
        DataPack {
            id: "1".to_string(),
            car: car.to_string(),
            lap_time: None,
            track: None,
            author: None,
            included: true,
            car_class,
            lap_count: None,
        }
    }
}
