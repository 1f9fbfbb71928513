use axum::{
    body::Bytes,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequest, FromRequestParts, Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use zeroize::Zeroizing;

use crate::{
    error::{ErrorKind, GeneratorError, VaultError},
    generator::{self, GeneratorSpec, PassphraseOptions, RandomOptions, Separator},
    store::{NewPolicy, PolicyKind, SecretStatus},
    AppState,
};

// ── Errors ───────────────────────────────────────────────────────────────────

/// Structured error body: `{"error": <kind>, "message": <text>}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: ErrorKind,
    message: String,
}

impl ApiError {
    fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            kind: ErrorKind::Internal,
            message: "internal server error".into(),
        }
    }

    fn bad_request(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind,
            message: message.into(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(ErrorKind::InvalidInput, rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(ErrorKind::InvalidPattern, rejection.body_text())
    }
}

/// `Json` whose rejections use the structured error body.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `Query` whose rejections use the structured error body.
#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

impl From<VaultError> for ApiError {
    fn from(e: VaultError) -> Self {
        let kind = e.kind();
        let (status, message) = match &e {
            VaultError::InvalidInput(_) => (StatusCode::BAD_REQUEST, e.to_string()),
            VaultError::NotFound => (StatusCode::NOT_FOUND, e.to_string()),
            VaultError::Unauthorized => (StatusCode::UNAUTHORIZED, e.to_string()),
            VaultError::CorruptRecord => {
                error!(error = %e, "integrity failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
            VaultError::Storage(_) => {
                error!(error = %e, "storage failure");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "storage unavailable".to_owned(),
                )
            }
        };
        Self {
            status,
            kind,
            message,
        }
    }
}

impl From<GeneratorError> for ApiError {
    fn from(e: GeneratorError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({"error": self.kind, "message": self.message})),
        )
            .into_response()
    }
}

/// Run a store call on the blocking pool. Argon2 is slow and redb is synchronous.
/// Once spawned the call runs to completion even if the request is dropped.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, VaultError> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(e) => {
            error!(error = %e, "blocking task failed");
            Err(ApiError::internal())
        }
    }
}

// ── Health ────────────────────────────────────────────────────────────────────

pub async fn health(State(state): State<AppState>) -> Response {
    let store = state.store.clone();
    match blocking(move || store.count()).await {
        Ok(n) => Json(json!({"status": "ok", "secrets": n})).into_response(),
        Err(e) => e.into_response(),
    }
}

// ── Create ────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateRequest {
    pub secret: String,
    pub passphrase: Option<String>,
    pub expiration_method: PolicyKind,
    pub ttl_seconds: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateResponse {
    pub id: String,
    pub expires_in: Option<u64>,
    pub expiration_method: PolicyKind,
}

pub async fn create_secret(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateRequest>,
) -> Result<(StatusCode, Json<CreateResponse>), ApiError> {
    let policy = match (body.expiration_method, body.ttl_seconds) {
        (PolicyKind::OneTime, _) => NewPolicy::OneTimeView,
        (PolicyKind::Time, Some(ttl_seconds)) => NewPolicy::TimeToLive { ttl_seconds },
        (PolicyKind::Time, None) => {
            return Err(VaultError::InvalidInput(
                "ttl_seconds is required for time-based expiration".into(),
            )
            .into())
        }
    };

    let secret = Zeroizing::new(body.secret);
    let passphrase = body.passphrase.map(Zeroizing::new);
    let store = state.store.clone();
    let created = blocking(move || {
        store.create(
            secret.as_bytes(),
            passphrase.as_deref().map(String::as_str),
            policy,
        )
    })
    .await?;

    info!(expiration_method = ?body.expiration_method, "secret created");
    Ok((
        StatusCode::CREATED,
        Json(CreateResponse {
            id: created.id,
            expires_in: created.expires_in,
            expiration_method: body.expiration_method,
        }),
    ))
}

// ── Check ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct SecretMetadata {
    pub exists: bool,
    pub requires_passphrase: bool,
    pub expiration_method: PolicyKind,
}

pub async fn check_secret(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SecretMetadata>, ApiError> {
    let store = state.store.clone();
    match blocking(move || store.exists(&id)).await? {
        SecretStatus::Active { policy } => Ok(Json(SecretMetadata {
            exists: true,
            requires_passphrase: true,
            expiration_method: policy,
        })),
        SecretStatus::NotFound => Err(VaultError::NotFound.into()),
    }
}

// ── Unlock ────────────────────────────────────────────────────────────────────

/// The body is optional: an empty request unlocks with the default passphrase.
#[derive(Default, Deserialize)]
pub struct UnlockRequest {
    #[serde(default)]
    pub passphrase: Option<String>,
}

#[derive(Serialize)]
struct UnlockResponse<'a> {
    secret: &'a str,
    burned: bool,
}

pub async fn unlock_secret(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let body = parse_unlock_body(&body)?;
    let passphrase = body.passphrase.map(Zeroizing::new);
    let store = state.store.clone();
    let unlocked = blocking(move || {
        store.unlock(&id, passphrase.as_deref().map(String::as_str))
    })
    .await?;

    // Payloads enter through the JSON API as strings, so they leave as strings.
    let secret = String::from_utf8_lossy(&unlocked.plaintext);
    Ok(Json(UnlockResponse {
        secret: &secret,
        burned: unlocked.consumed,
    })
    .into_response())
}

fn parse_unlock_body(body: &[u8]) -> Result<UnlockRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(UnlockRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        ApiError::bad_request(ErrorKind::InvalidInput, format!("invalid unlock body: {e}"))
    })
}

// ── Generator ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PatternQuery {
    pub pattern: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum GenerateRequest {
    Pattern {
        pattern: String,
    },
    Random {
        length: Option<usize>,
        uppercase: Option<bool>,
        digits: Option<bool>,
        symbols: Option<bool>,
    },
    Passphrase {
        #[serde(alias = "wordCount")]
        word_count: Option<usize>,
        capitalize: Option<bool>,
        separator: Option<String>,
    },
}

impl TryFrom<GenerateRequest> for GeneratorSpec {
    type Error = GeneratorError;

    fn try_from(req: GenerateRequest) -> Result<Self, Self::Error> {
        Ok(match req {
            GenerateRequest::Pattern { pattern } => GeneratorSpec::Pattern(pattern),
            GenerateRequest::Random {
                length,
                uppercase,
                digits,
                symbols,
            } => {
                let d = RandomOptions::default();
                GeneratorSpec::Random(RandomOptions {
                    length: length.unwrap_or(d.length),
                    uppercase: uppercase.unwrap_or(d.uppercase),
                    digits: digits.unwrap_or(d.digits),
                    symbols: symbols.unwrap_or(d.symbols),
                })
            }
            GenerateRequest::Passphrase {
                word_count,
                capitalize,
                separator,
            } => {
                let d = PassphraseOptions::default();
                GeneratorSpec::Passphrase(PassphraseOptions {
                    word_count: word_count.unwrap_or(d.word_count),
                    capitalize: capitalize.unwrap_or(d.capitalize),
                    separator: separator
                        .as_deref()
                        .map(str::parse::<Separator>)
                        .transpose()?
                        .unwrap_or(d.separator),
                })
            }
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub password: String,
}

pub async fn generate_from_pattern(
    ApiQuery(q): ApiQuery<PatternQuery>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let password = generator::generate_from_pattern(&q.pattern, &mut OsRng)?;
    Ok(Json(GenerateResponse { password }))
}

pub async fn generate_password(
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let Json(body) = body.map_err(|rejection| {
        ApiError::bad_request(ErrorKind::InvalidOptions, rejection.body_text())
    })?;
    let spec = GeneratorSpec::try_from(body)?;
    let password = generator::generate(&spec, &mut OsRng)?;
    Ok(Json(GenerateResponse { password }))
}
