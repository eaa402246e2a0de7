//! Canonical values for dates, amounts and identifiers.

use chrono::NaiveDate;
use regex::Regex;

use crate::model::{EntityKind, NormalizedValue, PartialDate};

/// Two-digit years below this pivot belong to the 2000s.
const CENTURY_PIVOT: i32 = 70;

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Converts entity surface text into [`NormalizedValue`]s.
#[derive(Debug, Clone)]
pub struct Normalizer {
    day_first: bool,
    iso: Regex,
    year_first: Regex,
    numeric: Regex,
    month_year_numeric: Regex,
    month_name: Regex,
    bare_year: Regex,
    currency: Regex,
    plain_amount: Regex,
    european_amount: Regex,
}

impl Normalizer {
    /// Create a normalizer; `day_first` decides `03/04/2023` style dates.
    pub fn new(day_first: bool) -> Self {
        Self {
            day_first,
            iso: Regex::new(r"^(\d{4})-(\d{1,2})(?:-(\d{1,2}))?$").unwrap(),
            year_first: Regex::new(r"^(\d{4})[/.](\d{1,2})[/.](\d{1,2})$").unwrap(),
            numeric: Regex::new(r"^(\d{1,2})[-/.](\d{1,2})[-/.](\d{4}|\d{2})$").unwrap(),
            month_year_numeric: Regex::new(r"^(\d{1,2})[-/.](\d{4})$").unwrap(),
            month_name: Regex::new(
                r"(?i)^(?:(?:mon|tue|wed|thu|fri|sat|sun)[a-z]*\.?,?\s+)?(?:(\d{1,2})(?:st|nd|rd|th)?(?:\s+of)?\s+)?([a-z]{3,9})\.?(?:\s+(\d{1,2})(?:st|nd|rd|th)?)?,?[\s-]+'?(\d{4}|\d{2})$",
            )
            .unwrap(),
            bare_year: Regex::new(r"^(\d{4})$").unwrap(),
            currency: Regex::new(r"(?i)(?:\b(?:usd|eur|gbp|inr)\b|\brs\.?|[$€£₹])").unwrap(),
            // Western (1,234,567) and Indian (12,34,567) digit grouping.
            plain_amount: Regex::new(r"^(\d{1,3}(?:,\d{3})+|\d{1,2}(?:,\d{2})+,\d{3}|\d+)(?:\.(\d+))?$")
                .unwrap(),
            european_amount: Regex::new(r"^(\d{1,3}(?:\.\d{3})+),(\d{1,2})$").unwrap(),
        }
    }

    /// Whether numeric dates are read day first.
    pub fn day_first(&self) -> bool {
        self.day_first
    }

    /// Normalize the surface text of an entity of `kind`.
    ///
    /// Returns `Ok(None)` for kinds without a canonical form and `Err` with a
    /// reason when the text cannot be interpreted.
    pub fn normalize(&self, kind: EntityKind, text: &str) -> Result<Option<NormalizedValue>, String> {
        match kind {
            EntityKind::Date => self.date(text).map(|d| Some(NormalizedValue::Date(d))),
            EntityKind::MonetaryAmount => self
                .amount(text)
                .map(|(value, currency)| Some(NormalizedValue::Amount { value, currency })),
            EntityKind::AccountNumber => {
                identifier(text).map(|value| Some(NormalizedValue::Identifier { value }))
            }
            EntityKind::Person | EntityKind::Organization | EntityKind::Location => Ok(None),
        }
    }

    /// Parse a full or partial date.
    pub fn date(&self, text: &str) -> Result<PartialDate, String> {
        let text = collapse_whitespace(text.trim().trim_end_matches(['.', ',', ';']));

        if let Some(caps) = self.iso.captures(&text) {
            let year = parse_num(&caps[1])?;
            let month = parse_num(&caps[2])? as u32;
            return match caps.get(3) {
                Some(day) => full_date(year, month, parse_num(day.as_str())? as u32),
                None => year_month(year, month),
            };
        }

        if let Some(caps) = self.year_first.captures(&text) {
            return full_date(
                parse_num(&caps[1])?,
                parse_num(&caps[2])? as u32,
                parse_num(&caps[3])? as u32,
            );
        }

        if let Some(caps) = self.numeric.captures(&text) {
            let first = parse_num(&caps[1])? as u32;
            let second = parse_num(&caps[2])? as u32;
            let year = expand_year(&caps[3])?;
            let (day, month) = if self.day_first {
                (first, second)
            } else {
                (second, first)
            };
            // An impossible month in the preferred order means the other order was meant.
            return full_date(year, month, day).or_else(|err| {
                if month > 12 && day <= 12 {
                    full_date(year, day, month)
                } else {
                    Err(err)
                }
            });
        }

        if let Some(caps) = self.month_year_numeric.captures(&text) {
            return year_month(parse_num(&caps[2])?, parse_num(&caps[1])? as u32);
        }

        if let Some(caps) = self.month_name.captures(&text) {
            let month = month_from_name(&caps[2])
                .ok_or_else(|| format!("unknown month name '{}'", &caps[2]))?;
            let year = expand_year(&caps[4])?;
            let day = caps.get(1).or_else(|| caps.get(3));
            return match day {
                Some(day) => full_date(year, month, parse_num(day.as_str())? as u32),
                None => year_month(year, month),
            };
        }

        if let Some(caps) = self.bare_year.captures(&text) {
            return Ok(PartialDate::year(parse_num(&caps[1])?));
        }

        Err(format!("unrecognized date format '{}'", text))
    }

    /// Parse a monetary amount into value and ISO currency code.
    pub fn amount(&self, text: &str) -> Result<(f64, Option<String>), String> {
        let currency = self
            .currency
            .find(text)
            .map(|m| currency_code(m.as_str()).to_string());
        let stripped = self.currency.replace_all(text, "");
        let mut number = stripped.trim().replace(char::is_whitespace, "");

        let mut negative = false;
        if number.starts_with('(') && number.ends_with(')') && number.len() > 2 {
            negative = true;
            number = number[1..number.len() - 1].to_string();
        }
        if let Some(rest) = number.strip_prefix('-') {
            negative = !negative;
            number = rest.to_string();
        } else if let Some(rest) = number.strip_prefix('+') {
            number = rest.to_string();
        }

        let canonical = if let Some(caps) = self.european_amount.captures(&number) {
            format!("{}.{}", caps[1].replace('.', ""), &caps[2])
        } else if let Some(caps) = self.plain_amount.captures(&number) {
            match caps.get(2) {
                Some(decimals) => format!("{}.{}", caps[1].replace(',', ""), decimals.as_str()),
                None => caps[1].replace(',', ""),
            }
        } else {
            return Err(format!("unrecognized amount '{}'", text.trim()));
        };

        let value: f64 = canonical
            .parse()
            .map_err(|_| format!("unrecognized amount '{}'", text.trim()))?;
        Ok((if negative { -value } else { value }, currency))
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Remove spaces, dashes and dots from an identifier.
pub fn identifier(text: &str) -> Result<String, String> {
    let value: String = text
        .chars()
        .filter(|&c| !c.is_whitespace() && !matches!(c, '-' | '.' | '\u{2010}'..='\u{2015}'))
        .collect();
    if value.is_empty() || !value.chars().any(|c| c.is_alphanumeric()) {
        return Err(format!("identifier '{}' has no alphanumeric content", text.trim()));
    }
    Ok(value)
}

fn currency_code(token: &str) -> &'static str {
    match token.to_ascii_lowercase().trim_end_matches('.') {
        "$" | "usd" => "USD",
        "€" | "eur" => "EUR",
        "£" | "gbp" => "GBP",
        _ => "INR",
    }
}

fn month_from_name(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    if lower.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|m| m.starts_with(&lower))
        .map(|i| i as u32 + 1)
}

fn expand_year(text: &str) -> Result<i32, String> {
    let year = parse_num(text)?;
    if text.len() == 2 {
        Ok(if year < CENTURY_PIVOT { 2000 + year } else { 1900 + year })
    } else {
        Ok(year)
    }
}

fn full_date(year: i32, month: u32, day: u32) -> Result<PartialDate, String> {
    NaiveDate::from_ymd_opt(year, month, day)
        .map(|_| PartialDate::ymd(year, month, day))
        .ok_or_else(|| format!("invalid calendar date {:04}-{:02}-{:02}", year, month, day))
}

fn year_month(year: i32, month: u32) -> Result<PartialDate, String> {
    if (1..=12).contains(&month) {
        Ok(PartialDate::year_month(year, month))
    } else {
        Err(format!("invalid month {} in {}", month, year))
    }
}

fn parse_num(text: &str) -> Result<i32, String> {
    text.parse()
        .map_err(|_| format!("'{}' is not a number", text))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_name_dates() {
        let n = Normalizer::default();
        assert_eq!(n.date("March 2023"), Ok(PartialDate::year_month(2023, 3)));
        assert_eq!(n.date("Mar 5, 2023"), Ok(PartialDate::ymd(2023, 3, 5)));
        assert_eq!(n.date("5 March 2023"), Ok(PartialDate::ymd(2023, 3, 5)));
        assert_eq!(n.date("5th of March, 2023"), Ok(PartialDate::ymd(2023, 3, 5)));
        assert_eq!(n.date("Sept. 30th 2021"), Ok(PartialDate::ymd(2021, 9, 30)));
        assert_eq!(n.date("Monday, March 6, 2023"), Ok(PartialDate::ymd(2023, 3, 6)));
        assert_eq!(n.date("Date:\nMarch 2023").ok(), None);
    }

    #[test]
    fn test_numeric_dates() {
        let n = Normalizer::new(true);
        assert_eq!(n.date("2023-03-05"), Ok(PartialDate::ymd(2023, 3, 5)));
        assert_eq!(n.date("2023-03"), Ok(PartialDate::year_month(2023, 3)));
        assert_eq!(n.date("05/03/2023"), Ok(PartialDate::ymd(2023, 3, 5)));
        assert_eq!(n.date("05.03.23"), Ok(PartialDate::ymd(2023, 3, 5)));
        assert_eq!(n.date("05-03-85"), Ok(PartialDate::ymd(1985, 3, 5)));
        assert_eq!(n.date("03/2023"), Ok(PartialDate::year_month(2023, 3)));
        assert_eq!(n.date("2023/03/05"), Ok(PartialDate::ymd(2023, 3, 5)));
        assert_eq!(n.date("2023"), Ok(PartialDate::year(2023)));

        let us = Normalizer::new(false);
        assert_eq!(us.date("05/03/2023"), Ok(PartialDate::ymd(2023, 5, 3)));
        // Only one reading is a valid calendar date.
        assert_eq!(us.date("25/03/2023"), Ok(PartialDate::ymd(2023, 3, 25)));
    }

    #[test]
    fn test_invalid_dates() {
        let n = Normalizer::default();
        assert!(n.date("31/02/2023").is_err());
        assert!(n.date("2023-13").is_err());
        assert!(n.date("Smarch 2023").is_err());
        assert!(n.date("next Tuesday").is_err());
    }

    #[test]
    fn test_amounts() {
        let n = Normalizer::default();
        assert_eq!(n.amount("$1,234.50"), Ok((1234.5, Some("USD".to_string()))));
        assert_eq!(n.amount("€ 99"), Ok((99.0, Some("EUR".to_string()))));
        assert_eq!(n.amount("Rs. 2,50,000"), Ok((250000.0, Some("INR".to_string()))));
        assert_eq!(n.amount("Rs. 250000.00"), Ok((250000.0, Some("INR".to_string()))));
        assert_eq!(n.amount("1.234,56 EUR"), Ok((1234.56, Some("EUR".to_string()))));
        assert_eq!(n.amount("-45.20"), Ok((-45.2, None)));
        assert_eq!(n.amount("(45.20)"), Ok((-45.2, None)));
        assert_eq!(n.amount("₹500"), Ok((500.0, Some("INR".to_string()))));
        assert!(n.amount("twelve dollars").is_err());
    }

    #[test]
    fn test_identifiers() {
        assert_eq!(identifier("1234 5678-90.12"), Ok("123456789012".to_string()));
        assert_eq!(identifier("AB-12"), Ok("AB12".to_string()));
        assert!(identifier(" - . ").is_err());
    }

    #[test]
    fn test_normalize_dispatch() {
        let n = Normalizer::default();
        assert_eq!(
            n.normalize(EntityKind::Date, "March 2023"),
            Ok(Some(NormalizedValue::Date(PartialDate::year_month(2023, 3))))
        );
        assert_eq!(n.normalize(EntityKind::Person, "Jane Doe"), Ok(None));
        assert!(n.normalize(EntityKind::MonetaryAmount, "lots").is_err());
    }
}
