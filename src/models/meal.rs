//! Meal-of-day result. Derived on every request, never stored.

use serde::{Serialize, Serializer};

pub const NOT_CONFIGURED_TEXT: &str = "Please enter the school codes in the settings!";
pub const NO_MEAL_TEXT: &str = "No school lunch today. Enjoy the time with your family!";
pub const FETCH_FAILED_TEXT: &str = "Couldn't load today's lunch menu.";

/// Outcome of a meal lookup. The three non-menu states stay distinct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MealResult {
    /// Cleaned dish names, in provider order
    Menu(Vec<String>),
    /// The provider answered well-formed with no meal for the day
    NoMeal,
    /// Office or school code is not set; no request was made
    NotConfigured,
    /// Transport error or unexpected response shape
    Failed,
}

impl MealResult {
    pub fn status(&self) -> &'static str {
        match self {
            MealResult::Menu(_) => "menu",
            MealResult::NoMeal => "noMeal",
            MealResult::NotConfigured => "configMissing",
            MealResult::Failed => "fetchFailed",
        }
    }

    /// Lines to display.
    pub fn lines(&self) -> Vec<String> {
        match self {
            MealResult::Menu(items) => items.clone(),
            MealResult::NoMeal => vec![NO_MEAL_TEXT.to_string()],
            MealResult::NotConfigured => vec![NOT_CONFIGURED_TEXT.to_string()],
            MealResult::Failed => vec![FETCH_FAILED_TEXT.to_string()],
        }
    }

    /// True only for the "no meal today" sentinel.
    pub fn is_empty(&self) -> bool {
        matches!(self, MealResult::NoMeal)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MealView<'a> {
    status: &'a str,
    menu: Vec<String>,
    is_empty: bool,
}

impl Serialize for MealResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        MealView {
            status: self.status(),
            menu: self.lines(),
            is_empty: self.is_empty(),
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels_are_distinguishable() {
        let states = [MealResult::NoMeal, MealResult::NotConfigured, MealResult::Failed];
        let statuses: Vec<_> = states.iter().map(MealResult::status).collect();
        assert_eq!(statuses, ["noMeal", "configMissing", "fetchFailed"]);

        assert!(MealResult::NoMeal.is_empty());
        assert!(!MealResult::NotConfigured.is_empty());
        assert!(!MealResult::Failed.is_empty());
        assert_ne!(MealResult::NoMeal.lines(), MealResult::Failed.lines());
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(MealResult::Menu(vec!["Rice".to_string()])).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "status": "menu", "menu": ["Rice"], "isEmpty": false })
        );

        let json = serde_json::to_value(MealResult::NoMeal).unwrap();
        assert_eq!(json["isEmpty"], true);
        assert_eq!(json["menu"][0], NO_MEAL_TEXT);
    }
}
