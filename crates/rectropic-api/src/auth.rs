use std::sync::Arc;
use std::time::Duration;

use axum::{Extension, Json, extract::State, response::IntoResponse};
use axum_extra::extract::WithRejection;
use rand::Rng;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use rectropic_db::Database;
use rectropic_db::models::UserRow;
use rectropic_db::queries;
use rectropic_types::api::{AuthResponse, LoginRequest};
use rectropic_types::models::Provider;

use crate::error::ApiError;
use crate::middleware::Actor;
use crate::store;
use crate::token::{SessionKind, TokenIssuer};
use crate::validate;
use crate::views::{self, now_millis};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub tokens: TokenIssuer,
    /// Upper bound on any single store call.
    pub store_timeout: Duration,
}

const ANONYMOUS_NAME: &str = "Guest";

/// Provider login: trusts the identity claim as given and upserts the user
/// keyed by provider id.
pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let provider_id = req.provider_id.trim().to_string();
    if provider_id.is_empty() {
        return Err(ApiError::invalid("providerId must not be empty"));
    }
    let email = validate::email(&req.email)?;
    let name = validate::display_name(&req.name)?;
    let avatar = validate::blank_to_none(req.avatar)
        .map(|a| validate::web_url("avatar", &a))
        .transpose()?;
    let provider = req.provider;

    let user = store::run(&state, move |db| {
        db.with_tx(|tx| {
            if let Some(other) = queries::get_user_by_email(tx, &email)? {
                if other.provider_id != provider_id {
                    return Err(ApiError::Conflict("email-taken"));
                }
            }

            let now = now_millis();
            match queries::get_user_by_provider_id(tx, &provider_id)? {
                Some(existing) => {
                    queries::refresh_user_identity(tx, &existing.id, &email, &name, avatar.as_deref(), now)?;
                    queries::get_user_by_id(tx, &existing.id)?
                        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("user vanished during login")))
                }
                None => {
                    let row = UserRow {
                        id: Uuid::new_v4().to_string(),
                        email,
                        name,
                        avatar,
                        provider: provider.as_str().to_string(),
                        provider_id,
                        is_premium: false,
                        created_at: now,
                        updated_at: now,
                    };
                    queries::insert_user(tx, &row)?;
                    info!("New {} user {}", provider, row.id);
                    Ok(row)
                }
            }
        })
    })
    .await?;

    issue(&state, &user, SessionKind::for_provider(provider))
}

/// Always creates a fresh user; anonymous identities are never reused.
pub async fn anonymous(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let user = store::run(&state, |db| {
        let now = now_millis();
        let provider_id = anonymous_id(now);
        let row = UserRow {
            id: Uuid::new_v4().to_string(),
            email: format!("{}@anonymous.local", provider_id),
            name: ANONYMOUS_NAME.to_string(),
            avatar: None,
            provider: Provider::Anonymous.as_str().to_string(),
            provider_id,
            is_premium: false,
            created_at: now,
            updated_at: now,
        };
        db.with_conn(|conn| queries::insert_user(conn, &row))?;
        Ok(row)
    })
    .await?;

    info!("Anonymous user {} created", user.id);
    issue(&state, &user, SessionKind::Anonymous)
}

pub async fn verify(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, ApiError> {
    let user = store::run(&state, move |db| db.with_conn(|conn| store::actor_user(conn, actor.user_id))).await?;
    Ok(Json(json!({ "user": views::user(&user)? })))
}

/// Credentials aren't revocable server-side, so this only acknowledges the
/// client discarding its token.
pub async fn logout() -> impl IntoResponse {
    Json(json!({ "success": true }))
}

fn issue(state: &AppState, user: &UserRow, kind: SessionKind) -> Result<Json<AuthResponse>, ApiError> {
    let response = views::user(user)?;
    let token = state.tokens.issue(response.id, &user.email, kind)?;
    Ok(Json(AuthResponse { user: response, token }))
}

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// `anonymous_<millis>_<9 base36 chars>`
fn anonymous_id(now: i64) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..9)
        .map(|_| char::from(BASE36[rng.random_range(0..BASE36.len())]))
        .collect();
    format!("anonymous_{}_{}", now, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_ids_are_unique_and_well_formed() {
        let a = anonymous_id(1700000000000);
        let b = anonymous_id(1700000000000);
        assert_ne!(a, b);
        assert!(a.starts_with("anonymous_1700000000000_"));
        let suffix = a.rsplit('_').next().unwrap();
        assert_eq!(suffix.len(), 9);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn anonymous_suffix_draws_digits_as_often_as_letters() {
        let chars: String = (0..2000)
            .map(|_| anonymous_id(0).rsplit('_').next().unwrap().to_string())
            .collect();
        assert_eq!(chars.len(), 18_000);

        // 10 of 36 symbols are digits; a letter-biased draw lands near 0.16
        let digits = chars.chars().filter(char::is_ascii_digit).count() as f64;
        let share = digits / chars.len() as f64;
        assert!((0.24..0.32).contains(&share), "digit share {share}");
    }
}
