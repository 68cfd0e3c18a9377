//! Search filters and their JSON-backed store.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{error, info, warn};

use crate::StoreError;
use crate::persist::write_json_atomic;

/// Smallest polling interval a user may configure.
pub const MIN_INTERVAL_MINUTES: u32 = 5;

/// Polling interval of a fresh filter set.
pub const DEFAULT_INTERVAL_MINUTES: u32 = 15;

/// Shortest accepted search keyword.
pub const MIN_POSITION_CHARS: usize = 3;

const DEFAULT_POSITION: &str = "Python разработчик";
const DEFAULT_AREA_ID: u32 = 1;
const DEFAULT_SALARY: u64 = 100_000;

/// Supported hh.ru regions.
pub const AREAS: &[(u32, &str)] = &[
    (1, "Москва"),
    (2, "Санкт-Петербург"),
    (113, "Россия"),
    (1001, "Другие регионы России"),
];

/// Human-readable name of a supported region.
pub fn area_name(area_id: u32) -> Option<&'static str> {
    AREAS
        .iter()
        .find(|(id, _)| *id == area_id)
        .map(|(_, name)| *name)
}

/// Experience buckets understood by the search API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Experience {
    #[serde(rename = "noExperience")]
    NoExperience,
    #[serde(rename = "between1And3")]
    Between1And3,
    #[serde(rename = "between3And6")]
    Between3And6,
    #[serde(rename = "moreThan6")]
    MoreThan6,
}

impl Experience {
    pub const ALL: [Experience; 4] = [
        Experience::NoExperience,
        Experience::Between1And3,
        Experience::Between3And6,
        Experience::MoreThan6,
    ];

    /// Query parameter value.
    pub fn code(self) -> &'static str {
        match self {
            Experience::NoExperience => "noExperience",
            Experience::Between1And3 => "between1And3",
            Experience::Between3And6 => "between3And6",
            Experience::MoreThan6 => "moreThan6",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Experience::NoExperience => "Нет опыта",
            Experience::Between1And3 => "От 1 до 3 лет",
            Experience::Between3And6 => "От 3 до 6 лет",
            Experience::MoreThan6 => "Более 6 лет",
        }
    }
}

impl FromStr for Experience {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Experience::ALL
            .into_iter()
            .find(|e| e.code().eq_ignore_ascii_case(s))
            .ok_or_else(|| StoreError::UnknownExperience(s.to_string()))
    }
}

/// The full set of user filters, persisted as one JSON document.
///
/// Field names match the on-disk format. Missing fields take their default
/// values, so older files keep loading as fields are added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSet {
    /// Free-text search keyword. Must be non-empty before polling starts.
    pub position: String,
    /// Region id from [`AREAS`].
    pub area_id: u32,
    /// Experience bucket, `None` for any.
    pub experience: Option<Experience>,
    /// Salary floor, 0 disables the salary filter.
    pub salary: u64,
    /// Minutes between polling cycles.
    pub interval_minutes: u32,
    /// Chat that receives new vacancies.
    pub chat_id: Option<i64>,
    /// Whether the polling loop should be running.
    pub enabled: bool,
}

impl Default for FilterSet {
    fn default() -> Self {
        Self {
            position: DEFAULT_POSITION.to_string(),
            area_id: DEFAULT_AREA_ID,
            experience: Some(Experience::NoExperience),
            salary: DEFAULT_SALARY,
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            chat_id: None,
            enabled: false,
        }
    }
}

impl FilterSet {
    pub fn has_position(&self) -> bool {
        !self.position.trim().is_empty()
    }

    /// Multi-line description of every filter, for display in chat.
    pub fn summary(&self) -> String {
        let position = if self.has_position() {
            self.position.as_str()
        } else {
            "Не задана"
        };
        let area = area_name(self.area_id).unwrap_or("Неизвестно");
        let experience = self.experience.map(Experience::label).unwrap_or("Не указан");
        let salary = if self.salary > 0 {
            self.salary.to_string()
        } else {
            "Не задана".to_string()
        };
        let status = if self.enabled { "Работает" } else { "Остановлен" };

        format!(
            "Должность: {position}\n\
             Регион: {area}\n\
             Опыт: {experience}\n\
             Зарплата от: {salary}\n\
             Интервал: {} мин\n\
             Статус: {status}",
            self.interval_minutes
        )
    }
}

/// Check a polling interval against [`MIN_INTERVAL_MINUTES`].
pub fn validate_interval(minutes: u32) -> Result<(), StoreError> {
    if minutes < MIN_INTERVAL_MINUTES {
        return Err(StoreError::InvalidInterval {
            minutes,
            min: MIN_INTERVAL_MINUTES,
        });
    }
    Ok(())
}

/// Check a search keyword, counting characters rather than bytes.
pub fn validate_position(position: &str) -> Result<(), StoreError> {
    if position.trim().chars().count() < MIN_POSITION_CHARS {
        return Err(StoreError::PositionTooShort {
            min: MIN_POSITION_CHARS,
        });
    }
    Ok(())
}

pub fn validate_area(area_id: u32) -> Result<(), StoreError> {
    match area_name(area_id) {
        Some(_) => Ok(()),
        None => Err(StoreError::UnknownArea(area_id)),
    }
}

/// User-settable filter fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Position,
    Salary,
    Interval,
    Area,
    Experience,
}

impl FilterField {
    pub fn name(self) -> &'static str {
        match self {
            FilterField::Position => "position",
            FilterField::Salary => "salary",
            FilterField::Interval => "interval",
            FilterField::Area => "area",
            FilterField::Experience => "experience",
        }
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single-field change to the filter set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterUpdate {
    Position(String),
    Area(u32),
    Experience(Option<Experience>),
    Salary(u64),
    IntervalMinutes(u32),
    Enabled(bool),
    Destination(Option<i64>),
}

impl FilterUpdate {
    /// Build an update from raw user input for `field`.
    ///
    /// The result is already validated. For experience, `any` clears the
    /// filter.
    pub fn parse(field: FilterField, raw: &str) -> Result<Self, StoreError> {
        let raw = raw.trim();
        let update = match field {
            FilterField::Position => FilterUpdate::Position(raw.to_string()),
            FilterField::Salary => FilterUpdate::Salary(parse_number(raw)?),
            FilterField::Interval => FilterUpdate::IntervalMinutes(parse_number(raw)?),
            FilterField::Area => FilterUpdate::Area(parse_number(raw)?),
            FilterField::Experience => {
                if raw.eq_ignore_ascii_case("any") {
                    FilterUpdate::Experience(None)
                } else {
                    FilterUpdate::Experience(Some(raw.parse()?))
                }
            }
        };
        update.validate()?;
        Ok(update)
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        match self {
            FilterUpdate::Position(position) => validate_position(position),
            FilterUpdate::Area(area_id) => validate_area(*area_id),
            FilterUpdate::IntervalMinutes(minutes) => validate_interval(*minutes),
            FilterUpdate::Experience(_)
            | FilterUpdate::Salary(_)
            | FilterUpdate::Enabled(_)
            | FilterUpdate::Destination(_) => Ok(()),
        }
    }

    fn apply(self, filters: &mut FilterSet) {
        match self {
            FilterUpdate::Position(position) => filters.position = position.trim().to_string(),
            FilterUpdate::Area(area_id) => filters.area_id = area_id,
            FilterUpdate::Experience(experience) => filters.experience = experience,
            FilterUpdate::Salary(salary) => filters.salary = salary,
            FilterUpdate::IntervalMinutes(minutes) => filters.interval_minutes = minutes,
            FilterUpdate::Enabled(enabled) => filters.enabled = enabled,
            FilterUpdate::Destination(chat_id) => filters.chat_id = chat_id,
        }
    }
}

fn parse_number<T: FromStr>(raw: &str) -> Result<T, StoreError> {
    raw.replace([' ', '_'], "")
        .parse()
        .map_err(|_| StoreError::InvalidNumber(raw.to_string()))
}

/// Filter settings backed by a JSON file.
///
/// Every successful mutation rewrites the whole file. The store itself is not
/// synchronized; share it behind a single lock so read-modify-persist
/// sequences cannot interleave.
#[derive(Debug)]
pub struct FilterStore {
    path: PathBuf,
    filters: FilterSet,
}

impl FilterStore {
    /// Load filters from `path`, falling back to (and persisting) defaults
    /// when the file is missing or unreadable.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let loaded = match fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<FilterSet>(&content) {
                Ok(filters) => {
                    info!(path = %path.display(), "loaded filters");
                    Some(filters)
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "failed to parse filters file");
                    None
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "filters file not found, creating defaults");
                None
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to read filters file");
                None
            }
        };

        match loaded {
            Some(mut filters) => {
                if filters.interval_minutes < MIN_INTERVAL_MINUTES {
                    warn!(
                        interval = filters.interval_minutes,
                        min = MIN_INTERVAL_MINUTES,
                        "persisted interval below minimum, clamping"
                    );
                    filters.interval_minutes = MIN_INTERVAL_MINUTES;
                }
                Self { path, filters }
            }
            None => {
                let store = Self {
                    path,
                    filters: FilterSet::default(),
                };
                store.persist().await;
                info!("created default filters");
                store
            }
        }
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply a validated update and persist.
    ///
    /// Only validation errors are returned. A failed write is logged and the
    /// in-memory value is kept.
    pub async fn set(&mut self, update: FilterUpdate) -> Result<(), StoreError> {
        update.validate()?;
        update.apply(&mut self.filters);
        self.persist().await;
        Ok(())
    }

    /// Discard the current filters and persist defaults.
    pub async fn reset(&mut self) {
        self.filters = FilterSet::default();
        self.persist().await;
        info!("filters reset to defaults");
    }

    pub fn summary(&self) -> String {
        self.filters.summary()
    }

    /// Write the current filters to disk.
    pub async fn save(&self) -> Result<(), StoreError> {
        write_json_atomic(&self.path, &self.filters).await
    }

    async fn persist(&self) {
        match self.save().await {
            Ok(()) => info!("filters saved"),
            Err(e) => error!(path = %self.path.display(), error = %e, "failed to save filters"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_file_creates_defaults_on_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("filters.json");

        let store = FilterStore::load(&path).await;

        assert_eq!(store.filters(), &FilterSet::default());
        let on_disk: FilterSet =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, FilterSet::default());
    }

    #[tokio::test]
    async fn set_survives_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("filters.json");

        let mut store = FilterStore::load(&path).await;
        store
            .set(FilterUpdate::Position("Rust developer".to_string()))
            .await
            .unwrap();
        store.set(FilterUpdate::IntervalMinutes(30)).await.unwrap();
        store.set(FilterUpdate::Destination(Some(42))).await.unwrap();
        store.set(FilterUpdate::Experience(None)).await.unwrap();

        let reloaded = FilterStore::load(&path).await;
        assert_eq!(reloaded.filters().position, "Rust developer");
        assert_eq!(reloaded.filters().interval_minutes, 30);
        assert_eq!(reloaded.filters().chat_id, Some(42));
        assert_eq!(reloaded.filters().experience, None);
    }

    #[tokio::test]
    async fn interval_below_minimum_is_rejected_and_not_persisted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("filters.json");

        let mut store = FilterStore::load(&path).await;
        let err = store
            .set(FilterUpdate::IntervalMinutes(4))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StoreError::InvalidInterval { minutes: 4, min: 5 }
        ));
        assert_eq!(store.filters().interval_minutes, DEFAULT_INTERVAL_MINUTES);
        let reloaded = FilterStore::load(&path).await;
        assert_eq!(reloaded.filters().interval_minutes, DEFAULT_INTERVAL_MINUTES);
    }

    #[tokio::test]
    async fn corrupt_file_is_treated_as_absent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("filters.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = FilterStore::load(&path).await;

        assert_eq!(store.filters(), &FilterSet::default());
        let rewritten = std::fs::read_to_string(&path).unwrap();
        assert!(serde_json::from_str::<FilterSet>(&rewritten).is_ok());
    }

    #[tokio::test]
    async fn partial_file_fills_missing_fields_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("filters.json");
        std::fs::write(&path, r#"{"position": "Go developer", "enabled": true}"#).unwrap();

        let store = FilterStore::load(&path).await;

        assert_eq!(store.filters().position, "Go developer");
        assert!(store.filters().enabled);
        assert_eq!(store.filters().area_id, 1);
        assert_eq!(store.filters().experience, Some(Experience::NoExperience));
        assert_eq!(store.filters().salary, 100_000);
    }

    #[tokio::test]
    async fn persisted_interval_below_minimum_is_clamped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("filters.json");
        std::fs::write(&path, r#"{"interval_minutes": 1}"#).unwrap();

        let store = FilterStore::load(&path).await;

        assert_eq!(store.filters().interval_minutes, MIN_INTERVAL_MINUTES);
    }

    #[tokio::test]
    async fn reset_restores_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("filters.json");

        let mut store = FilterStore::load(&path).await;
        store.set(FilterUpdate::Salary(250_000)).await.unwrap();
        store.set(FilterUpdate::Enabled(true)).await.unwrap();
        store.reset().await;

        assert_eq!(store.filters(), &FilterSet::default());
        let reloaded = FilterStore::load(&path).await;
        assert_eq!(reloaded.filters(), &FilterSet::default());
    }

    #[test]
    fn original_file_format_is_readable() {
        let json = r#"{
            "position": "Python разработчик",
            "area_id": 113,
            "experience": "between1And3",
            "salary": 150000,
            "interval_minutes": 20,
            "chat_id": 123456789,
            "enabled": true
        }"#;

        let filters: FilterSet = serde_json::from_str(json).unwrap();

        assert_eq!(filters.area_id, 113);
        assert_eq!(filters.experience, Some(Experience::Between1And3));
        assert_eq!(filters.chat_id, Some(123456789));
    }

    #[test]
    fn summary_lists_every_field() {
        let filters = FilterSet {
            enabled: true,
            ..FilterSet::default()
        };

        assert_eq!(
            filters.summary(),
            "Должность: Python разработчик\n\
             Регион: Москва\n\
             Опыт: Нет опыта\n\
             Зарплата от: 100000\n\
             Интервал: 15 мин\n\
             Статус: Работает"
        );
    }

    #[test]
    fn summary_uses_placeholders_for_unset_values() {
        let filters = FilterSet {
            position: String::new(),
            area_id: 999,
            experience: None,
            salary: 0,
            ..FilterSet::default()
        };

        let summary = filters.summary();

        assert!(summary.contains("Должность: Не задана"));
        assert!(summary.contains("Регион: Неизвестно"));
        assert!(summary.contains("Опыт: Не указан"));
        assert!(summary.contains("Зарплата от: Не задана"));
        assert!(summary.contains("Статус: Остановлен"));
    }

    #[test]
    fn parse_updates_from_user_input() {
        assert_eq!(
            FilterUpdate::parse(FilterField::Salary, "150 000").unwrap(),
            FilterUpdate::Salary(150_000)
        );
        assert_eq!(
            FilterUpdate::parse(FilterField::Area, "113").unwrap(),
            FilterUpdate::Area(113)
        );
        assert_eq!(
            FilterUpdate::parse(FilterField::Experience, "moreThan6").unwrap(),
            FilterUpdate::Experience(Some(Experience::MoreThan6))
        );
        assert_eq!(
            FilterUpdate::parse(FilterField::Experience, "any").unwrap(),
            FilterUpdate::Experience(None)
        );
        assert_eq!(
            FilterUpdate::parse(FilterField::Position, "  Data analyst ").unwrap(),
            FilterUpdate::Position("Data analyst".to_string())
        );
    }

    #[test]
    fn parse_rejects_invalid_input() {
        assert!(matches!(
            FilterUpdate::parse(FilterField::Interval, "abc"),
            Err(StoreError::InvalidNumber(_))
        ));
        assert!(matches!(
            FilterUpdate::parse(FilterField::Interval, "3"),
            Err(StoreError::InvalidInterval { .. })
        ));
        assert!(matches!(
            FilterUpdate::parse(FilterField::Salary, "-5"),
            Err(StoreError::InvalidNumber(_))
        ));
        assert!(matches!(
            FilterUpdate::parse(FilterField::Area, "7"),
            Err(StoreError::UnknownArea(7))
        ));
        assert!(matches!(
            FilterUpdate::parse(FilterField::Position, "ab"),
            Err(StoreError::PositionTooShort { .. })
        ));
        assert!(matches!(
            FilterUpdate::parse(FilterField::Experience, "senior"),
            Err(StoreError::UnknownExperience(_))
        ));
    }

    #[test]
    fn position_length_counts_characters() {
        // Three Cyrillic letters are six bytes but only three characters.
        assert!(validate_position("Юри").is_ok());
        assert!(validate_position("  Ю ").is_err());
    }
}
