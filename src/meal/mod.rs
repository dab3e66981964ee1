//! School meal lookup against the NEIS open API.
//!
//! One request per call, nothing cached: the menu is recomputed on every view load.

use chrono::{Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::config::MealSettings;
use crate::models::MealResult;

/// Parenthesized annotations such as allergen codes: `(1.2.5.6)`.
static ANNOTATION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^)]*\)").unwrap());
/// Line breaks separating dishes in `DDISH_NM`.
static LINE_BREAK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());

/// Strip annotations and split a raw dish field into clean, non-empty items.
pub fn clean_menu(raw: &str) -> Vec<String> {
    let stripped = ANNOTATION_RE.replace_all(raw, "");
    LINE_BREAK_RE
        .split(&stripped)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// `YYYYMMDD` key for a calendar date.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

pub struct MealClient {
    http: reqwest::Client,
    url: String,
}

impl MealClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// Today's meal by the server's local calendar date.
    pub async fn fetch_today_meal(&self, settings: &MealSettings) -> MealResult {
        self.fetch_meal(settings, Local::now().date_naive()).await
    }

    pub async fn fetch_meal(&self, settings: &MealSettings, date: NaiveDate) -> MealResult {
        let (Some(office_code), Some(school_code)) = (&settings.office_code, &settings.school_code)
        else {
            tracing::debug!("Meal lookup skipped: school codes not configured");
            return MealResult::NotConfigured;
        };

        let ymd = date_key(date);
        let mut params = vec![
            ("Type", "json"),
            ("ATPT_OFCDC_SC_CODE", office_code.as_str()),
            ("SD_SCHUL_CODE", school_code.as_str()),
            ("MLSV_YMD", ymd.as_str()),
        ];
        if let Some(key) = &settings.api_key {
            params.push(("KEY", key.as_str()));
        }

        let response = match self.http.get(&self.url).query(&params).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Meal API request failed: {}", e.without_url());
                return MealResult::Failed;
            }
        };

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "Meal API returned an error status");
            return MealResult::Failed;
        }

        match response.json::<Value>().await {
            Ok(body) => parse_meal(&body),
            Err(e) => {
                tracing::warn!("Meal API response is not JSON: {}", e.without_url());
                MealResult::Failed
            }
        }
    }
}

/// Interpret a NEIS response body.
///
/// `mealServiceDietInfo[1].row[0].DDISH_NM` holds the dishes. A JSON object
/// without `mealServiceDietInfo` is the provider's "no data" answer, and so is a
/// dish list that cleans to nothing.
pub fn parse_meal(body: &Value) -> MealResult {
    let Some(body) = body.as_object() else {
        return MealResult::Failed;
    };
    let Some(info) = body.get("mealServiceDietInfo") else {
        return MealResult::NoMeal;
    };

    let dishes = info
        .get(1)
        .and_then(|part| part.get("row"))
        .and_then(|rows| rows.get(0))
        .and_then(|row| row.get("DDISH_NM"))
        .and_then(Value::as_str);

    match dishes.map(clean_menu) {
        // Only annotations and separators: nothing is served
        Some(menu) if menu.is_empty() => MealResult::NoMeal,
        Some(menu) => MealResult::Menu(menu),
        None => {
            tracing::warn!("Meal API response has an unexpected shape");
            MealResult::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clean_menu_strips_annotations_and_splits() {
        let raw = "쌀밥<br/>된장국(5.6.13)<br/>  불고기 (1.2.5)<br/><br/>김치(9)";
        assert_eq!(clean_menu(raw), ["쌀밥", "된장국", "불고기", "김치"]);
    }

    #[test]
    fn test_clean_menu_is_idempotent() {
        let once = clean_menu("Rice(1)<br/>Soup (5.6)<br />Salad");
        let twice: Vec<String> = once.iter().flat_map(|item| clean_menu(item)).collect();
        assert_eq!(once, twice);
        assert_eq!(clean_menu("Rice"), ["Rice"]);
    }

    #[test]
    fn test_date_key_format() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        assert_eq!(date_key(date), "20260309");
    }

    #[test]
    fn test_parse_meal_menu() {
        let body = json!({
            "mealServiceDietInfo": [
                { "head": [{ "list_total_count": 1 }] },
                { "row": [{ "DDISH_NM": "Rice(1)<br/>Soup(2.3)" }] }
            ]
        });
        assert_eq!(
            parse_meal(&body),
            MealResult::Menu(vec!["Rice".to_string(), "Soup".to_string()])
        );
    }

    #[test]
    fn test_parse_meal_with_nothing_left_after_cleaning() {
        for raw in ["(1.2)<br/> ", "", "<br/><br />"] {
            let body = json!({
                "mealServiceDietInfo": [
                    { "head": [{ "list_total_count": 1 }] },
                    { "row": [{ "DDISH_NM": raw }] }
                ]
            });
            assert_eq!(parse_meal(&body), MealResult::NoMeal, "{raw:?}");
        }
    }

    #[test]
    fn test_parse_meal_no_data() {
        let body = json!({
            "RESULT": { "CODE": "INFO-200", "MESSAGE": "해당하는 데이터가 없습니다." }
        });
        assert_eq!(parse_meal(&body), MealResult::NoMeal);
    }

    #[test]
    fn test_parse_meal_malformed() {
        assert_eq!(parse_meal(&json!([1, 2])), MealResult::Failed);
        assert_eq!(
            parse_meal(&json!({ "mealServiceDietInfo": [{ "head": [] }] })),
            MealResult::Failed
        );
    }

    #[tokio::test]
    async fn test_missing_codes_skip_request() {
        // Nothing listens on this port; a request would come back as Failed
        let client = MealClient::new("http://127.0.0.1:9/hub/mealServiceDietInfo");
        let settings = MealSettings {
            office_code: Some("J10".to_string()),
            school_code: None,
            api_key: Some("key".to_string()),
        };
        assert_eq!(client.fetch_today_meal(&settings).await, MealResult::NotConfigured);
    }
}
