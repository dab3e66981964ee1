use axum::extract::State;

use super::{success, ApiResult};
use crate::models::MealResult;
use crate::AppState;

/// GET /api/meal - Today's school lunch.
///
/// Lookup failures are part of the result, so this always answers with `success`.
pub async fn get_meal(State(state): State<AppState>) -> ApiResult<MealResult> {
    success(state.meal.fetch_today_meal(&state.config.meal).await)
}
