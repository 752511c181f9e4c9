//! Serde mirror of the job board's vacancy schema.
//!
//! The remote API sends `null` for many fields that are usually present, so
//! object fields are `Option` and every other field decodes `null` as its
//! default.
//! Only what the pipeline reads (`id`, `name`, `url`, `description`) is
//! required.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One page of `GET /vacancies`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchPage {
    #[serde(deserialize_with = "nullable")]
    pub items: Vec<VacancySummary>,
    #[serde(deserialize_with = "nullable")]
    pub found: u32,
    #[serde(deserialize_with = "nullable")]
    pub page: u32,
    #[serde(deserialize_with = "nullable")]
    pub pages: u32,
    #[serde(deserialize_with = "nullable")]
    pub per_page: u32,
}

/// Search result item. `url` points at the full [`Vacancy`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VacancySummary {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub alternate_url: Option<String>,
    #[serde(default)]
    pub area: Option<Area>,
    #[serde(default)]
    pub employer: Option<Employer>,
    #[serde(default)]
    pub salary: Option<Salary>,
    #[serde(default)]
    pub snippet: Option<Snippet>,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub experience: Option<NamedEntity>,
    #[serde(default)]
    pub employment_form: Option<NamedEntity>,
    #[serde(default, deserialize_with = "nullable")]
    pub professional_roles: Vec<NamedEntity>,
    #[serde(default, deserialize_with = "nullable")]
    pub work_format: Vec<NamedEntity>,
    #[serde(default)]
    pub counters: Option<Counter>,
    #[serde(default, deserialize_with = "nullable")]
    pub archived: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub premium: bool,
    #[serde(default, with = "board_time::option")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, with = "board_time::option")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Full vacancy as returned by the detail endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Vacancy {
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub description: String,

    #[serde(default, deserialize_with = "nullable")]
    pub accept_handicapped: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub accept_incomplete_resumes: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub accept_kids: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub accept_temporary: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub allow_messages: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub approved: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub archived: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub has_test: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub internship: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub night_shifts: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub premium: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub response_letter_required: bool,

    #[serde(default, deserialize_with = "nullable")]
    pub alternate_url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub apply_alternate_url: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub negotiations_url: Option<String>,
    #[serde(default)]
    pub response_url: Option<String>,
    #[serde(default)]
    pub suitable_resumes_url: Option<String>,

    #[serde(default)]
    pub area: Option<Area>,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub billing_type: Option<NamedEntity>,
    #[serde(default)]
    pub contacts: Option<Contacts>,
    #[serde(default)]
    pub department: Option<NamedEntity>,
    #[serde(default)]
    pub employer: Option<Employer>,
    #[serde(default)]
    pub employment_form: Option<NamedEntity>,
    #[serde(default)]
    pub experience: Option<NamedEntity>,
    #[serde(default)]
    pub insider_interview: Option<InsiderInterview>,
    #[serde(default)]
    pub salary: Option<Salary>,
    #[serde(default)]
    pub test: Option<VacancyTest>,
    #[serde(default, rename = "type")]
    pub kind: Option<NamedEntity>,
    #[serde(default)]
    pub video_vacancy: Option<VideoVacancy>,

    #[serde(default, deserialize_with = "nullable")]
    pub driver_license_types: Vec<DriverLicenseType>,
    #[serde(default, deserialize_with = "nullable")]
    pub fly_in_fly_out_duration: Vec<NamedEntity>,
    #[serde(default, deserialize_with = "nullable")]
    pub key_skills: Vec<KeySkill>,
    #[serde(default, deserialize_with = "nullable")]
    pub languages: Vec<Language>,
    #[serde(default, deserialize_with = "nullable")]
    pub professional_roles: Vec<NamedEntity>,
    #[serde(default, deserialize_with = "nullable")]
    pub relations: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub work_format: Vec<NamedEntity>,
    #[serde(default, deserialize_with = "nullable")]
    pub work_schedule_by_days: Vec<NamedEntity>,
    #[serde(default, deserialize_with = "nullable")]
    pub working_hours: Vec<NamedEntity>,

    #[serde(default, with = "board_time::option")]
    pub initial_created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "board_time::option")]
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamedEntity {
    #[serde(deserialize_with = "nullable")]
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Area {
    #[serde(deserialize_with = "nullable")]
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub building: Option<String>,
    pub city: Option<String>,
    pub description: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    #[serde(deserialize_with = "nullable")]
    pub metro_stations: Vec<MetroStation>,
    pub street: Option<String>,
    pub raw: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetroStation {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub line_id: Option<String>,
    pub line_name: Option<String>,
    pub station_id: Option<String>,
    pub station_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Contacts {
    #[serde(deserialize_with = "nullable")]
    pub call_tracking_enabled: bool,
    pub email: Option<String>,
    pub name: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub phones: Vec<Phone>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Phone {
    pub city: Option<String>,
    pub comment: Option<String>,
    pub country: Option<String>,
    pub formatted: Option<String>,
    pub number: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Employer {
    pub id: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    pub url: Option<String>,
    pub alternate_url: Option<String>,
    pub vacancies_url: Option<String>,
    pub logo_urls: Option<LogoUrls>,
    pub employer_rating: Option<EmployerRating>,
    #[serde(deserialize_with = "nullable")]
    pub accredited_it_employer: bool,
    #[serde(deserialize_with = "nullable")]
    pub trusted: bool,
    #[serde(deserialize_with = "nullable")]
    pub blacklisted: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogoUrls {
    #[serde(rename = "90")]
    pub size_90: Option<String>,
    #[serde(rename = "240")]
    pub size_240: Option<String>,
    pub original: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmployerRating {
    pub reviews_count: Option<serde_json::Value>,
    pub total_rating: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Salary {
    pub from: Option<i64>,
    pub to: Option<i64>,
    pub currency: Option<String>,
    pub gross: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Snippet {
    pub requirement: Option<String>,
    pub responsibility: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Counter {
    #[serde(deserialize_with = "nullable")]
    pub responses: u32,
    #[serde(deserialize_with = "nullable")]
    pub total_responses: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverLicenseType {
    #[serde(deserialize_with = "nullable")]
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InsiderInterview {
    #[serde(deserialize_with = "nullable")]
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeySkill {
    #[serde(deserialize_with = "nullable")]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Language {
    #[serde(deserialize_with = "nullable")]
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    pub level: Option<NamedEntity>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VacancyTest {
    pub id: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub required: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoVacancy {
    pub cover_picture: Option<CoverPicture>,
    pub snippet_picture_url: Option<String>,
    pub snippet_video_url: Option<String>,
    pub video_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverPicture {
    #[serde(deserialize_with = "nullable")]
    pub resized_height: u32,
    #[serde(deserialize_with = "nullable")]
    pub resized_path: String,
    #[serde(deserialize_with = "nullable")]
    pub resized_width: u32,
}

/// Decode `null` as the type's default.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Timestamps on the wire look like `2025-02-14T10:31:05+0300` (no colon in
/// the offset), which RFC 3339 parsers reject. Written back out as RFC 3339.
mod board_time {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

    pub fn parse(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        DateTime::parse_from_str(raw, FORMAT).map(|dt| dt.with_timezone(&Utc))
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(dt) => serializer.serialize_some(&dt.to_rfc3339()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| parse(&raw).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
