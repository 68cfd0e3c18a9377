//! Vacancy types: the hh.ru wire format and the normalized posting.

use serde::{Deserialize, Deserializer};

/// Currency assumed when the API omits one.
const DEFAULT_CURRENCY: &str = "RUB";

/// A vacancy as the rest of vacwatch sees it.
///
/// Produced fresh on every fetch and never persisted; only `id` outlives the
/// cycle, through the seen registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPosting {
    /// Vacancy id as a string. Empty when the API did not send one.
    pub id: String,
    pub title: Option<String>,
    pub employer: Option<String>,
    pub location: Option<String>,
    pub salary: Option<SalaryRange>,
    pub experience: Option<String>,
    pub employment: Option<String>,
    /// Public page of the vacancy.
    pub url: String,
}

impl JobPosting {
    /// A posting with only an id and a title set.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: Some(title.into()),
            employer: None,
            location: None,
            salary: None,
            experience: None,
            employment: None,
            url: String::new(),
        }
    }
}

/// Salary bounds. At least one bound is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalaryRange {
    pub from: Option<u64>,
    pub to: Option<u64>,
    pub currency: String,
}

/// Response of `GET /vacancies`.
#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub items: Vec<VacancyItem>,
    #[serde(default)]
    pub found: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VacancyItem {
    #[serde(default, deserialize_with = "id_as_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub employer: Option<Named>,
    #[serde(default)]
    pub area: Option<Named>,
    #[serde(default)]
    pub salary: Option<WireSalary>,
    #[serde(default)]
    pub experience: Option<Named>,
    #[serde(default)]
    pub employment: Option<Named>,
    #[serde(default)]
    pub alternate_url: Option<String>,
}

/// Nested `{ "name": ... }` objects (employer, area, experience, employment).
#[derive(Debug, Deserialize)]
pub(crate) struct Named {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireSalary {
    #[serde(default)]
    pub from: Option<u64>,
    #[serde(default)]
    pub to: Option<u64>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Vacancy ids are strings in the current API but numbers in older payloads.
fn id_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(Option::<RawId>::deserialize(deserializer)?.map(|raw| match raw {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    }))
}

fn name_of(named: Option<Named>) -> Option<String> {
    named
        .and_then(|n| n.name)
        .filter(|name| !name.trim().is_empty())
}

impl WireSalary {
    fn into_range(self) -> Option<SalaryRange> {
        // A zero bound means "not given" in practice.
        let from = self.from.filter(|v| *v > 0);
        let to = self.to.filter(|v| *v > 0);
        if from.is_none() && to.is_none() {
            return None;
        }
        Some(SalaryRange {
            from,
            to,
            currency: self
                .currency
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        })
    }
}

impl From<VacancyItem> for JobPosting {
    fn from(item: VacancyItem) -> Self {
        Self {
            id: item.id.map(|id| id.trim().to_string()).unwrap_or_default(),
            title: item.name.filter(|name| !name.trim().is_empty()),
            employer: name_of(item.employer),
            location: name_of(item.area),
            salary: item.salary.and_then(WireSalary::into_range),
            experience: name_of(item.experience),
            employment: name_of(item.employment),
            url: item.alternate_url.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(value: serde_json::Value) -> JobPosting {
        serde_json::from_value::<VacancyItem>(value).unwrap().into()
    }

    #[test]
    fn full_item_normalizes() {
        let posting = item(json!({
            "id": "93284711",
            "name": "Python разработчик",
            "employer": { "id": "1", "name": "Яндекс" },
            "area": { "id": "1", "name": "Москва" },
            "salary": { "from": 150000, "to": 250000, "currency": "RUR", "gross": false },
            "experience": { "id": "between1And3", "name": "От 1 года до 3 лет" },
            "employment": { "id": "full", "name": "Полная занятость" },
            "alternate_url": "https://hh.ru/vacancy/93284711"
        }));

        assert_eq!(posting.id, "93284711");
        assert_eq!(posting.title.as_deref(), Some("Python разработчик"));
        assert_eq!(posting.employer.as_deref(), Some("Яндекс"));
        assert_eq!(posting.location.as_deref(), Some("Москва"));
        assert_eq!(
            posting.salary,
            Some(SalaryRange {
                from: Some(150000),
                to: Some(250000),
                currency: "RUR".to_string(),
            })
        );
        assert_eq!(posting.employment.as_deref(), Some("Полная занятость"));
        assert_eq!(posting.url, "https://hh.ru/vacancy/93284711");
    }

    #[test]
    fn numeric_id_is_coerced_to_string() {
        let posting = item(json!({ "id": 12345, "name": "QA" }));
        assert_eq!(posting.id, "12345");
    }

    #[test]
    fn missing_id_becomes_empty() {
        assert_eq!(item(json!({ "name": "QA" })).id, "");
        assert_eq!(item(json!({ "id": null, "name": "QA" })).id, "");
    }

    #[test]
    fn salary_without_bounds_is_absent() {
        let posting = item(json!({
            "id": "1",
            "salary": { "from": null, "to": 0, "currency": "RUR" }
        }));
        assert_eq!(posting.salary, None);
    }

    #[test]
    fn salary_currency_defaults_to_rub() {
        let posting = item(json!({ "id": "1", "salary": { "from": 90000 } }));
        assert_eq!(
            posting.salary,
            Some(SalaryRange {
                from: Some(90000),
                to: None,
                currency: "RUB".to_string(),
            })
        );
    }

    #[test]
    fn null_nested_objects_are_absent() {
        let posting = item(json!({
            "id": "1",
            "employer": null,
            "area": { "name": "" },
            "experience": {}
        }));
        assert_eq!(posting.employer, None);
        assert_eq!(posting.location, None);
        assert_eq!(posting.experience, None);
    }
}
