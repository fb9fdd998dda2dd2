use chrono::NaiveDateTime;
use serde::Serialize;

/// How the visitor is enrolled with the clinic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UserType {
    Subscriber,
    Patient,
}

impl UserType {
    pub(crate) fn from_raw(raw: &str) -> Option<Self> {
        match raw {
            "Subscriber" => Some(UserType::Subscriber),
            "Patient" => Some(UserType::Patient),
            _ => None,
        }
    }
}

/// Gender code carried by the source data (ISO/IEC 5218 numbering).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Gender {
    NotKnown,
    Male,
    Female,
}

impl Gender {
    pub(crate) fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Gender::NotKnown),
            1 => Some(Gender::Male),
            2 => Some(Gender::Female),
            _ => None,
        }
    }
}

/// One decoded clinic visit.
///
/// Every field is optional: the upstream data is loosely typed, and any
/// field that is missing or fails to parse is simply absent. A parse
/// failure never degrades to a default value like zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Session {
    pub duration_minutes: Option<i64>,
    pub start_time: Option<NaiveDateTime>,
    pub stop_time: Option<NaiveDateTime>,
    pub clinic_id: Option<i64>,
    pub clinic_name: Option<String>,
    /// Kept as the source's decimal string; parsed only when deriving clinics.
    pub clinic_latitude: Option<String>,
    pub clinic_longitude: Option<String>,
    pub provider_id: Option<i64>,
    pub user_type: Option<UserType>,
    pub birth_year: Option<i64>,
    pub gender: Option<Gender>,
    pub distance: Option<f64>,
}

/// A geographic point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// A clinic derived from session records, unique by name and position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Clinic {
    pub name: String,
    pub position: LatLng,
}

/// Bounding box over clinic positions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

/// Frequency distributions over the whole dataset, computed in one pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionHistograms {
    /// Sessions that started during each hour of the day.
    pub start_hours: [u32; 24],
    /// Sessions that stopped during each hour of the day.
    pub stop_hours: [u32; 24],
    /// Index `d` counts sessions lasting exactly `d` minutes; the length is
    /// one past the longest recorded duration.
    pub durations: Vec<u32>,
}
