//! Rendering a vacancy as a Telegram HTML message.

use crate::{JobPosting, SalaryRange};

const NO_TITLE: &str = "Без названия";
const UNKNOWN_EMPLOYER: &str = "Неизвестно";
const UNKNOWN_LOCATION: &str = "Не указан";
const UNKNOWN_EXPERIENCE: &str = "Не указан";
const UNKNOWN_EMPLOYMENT: &str = "Не указана";
const NO_SALARY: &str = "Не указана";

/// Render one posting. Pure; all interpolated text is HTML-escaped.
pub fn format_posting(posting: &JobPosting) -> String {
    let title = escape_html(posting.title.as_deref().unwrap_or(NO_TITLE));
    let employer = escape_html(posting.employer.as_deref().unwrap_or(UNKNOWN_EMPLOYER));
    let location = escape_html(posting.location.as_deref().unwrap_or(UNKNOWN_LOCATION));
    let salary = escape_html(&format_salary(posting.salary.as_ref()));
    let experience = escape_html(posting.experience.as_deref().unwrap_or(UNKNOWN_EXPERIENCE));
    let employment = escape_html(posting.employment.as_deref().unwrap_or(UNKNOWN_EMPLOYMENT));
    let url = escape_html(&posting.url);

    format!(
        "<b>Новая вакансия!</b>\n\
         \n\
         <b>{title}</b>\n\
         Компания: {employer}\n\
         Город: {location}\n\
         Зарплата: {salary}\n\
         Опыт: {experience}\n\
         Занятость: {employment}\n\
         \n\
         🔗 <a href=\"{url}\">Открыть вакансию</a>"
    )
}

/// Render the salary line.
///
/// - no data: `Не указана`
/// - both bounds: `100,000 - 150,000 RUB`
/// - lower only: `От 100,000 RUB`
/// - upper only: `До 150,000 RUB`
pub fn format_salary(salary: Option<&SalaryRange>) -> String {
    let Some(salary) = salary else {
        return NO_SALARY.to_string();
    };
    let currency = &salary.currency;

    match (salary.from, salary.to) {
        (Some(from), Some(to)) => format!(
            "{} - {} {currency}",
            group_thousands(from),
            group_thousands(to)
        ),
        (Some(from), None) => format!("От {} {currency}", group_thousands(from)),
        (None, Some(to)) => format!("До {} {currency}", group_thousands(to)),
        (None, None) => NO_SALARY.to_string(),
    }
}

/// Insert a `,` between every group of three digits.
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Escape text for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}
