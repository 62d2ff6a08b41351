use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info, warn};

use karma_core::{Granularity, KarmaTarget, RankDirection, DEFAULT_RANK_SIZE};
use karma_ledger::KarmaLedger;
use karma_rank::{RankedSeries, SeriesRequest};

use crate::chat::ChatClient;
use crate::dispatcher::Dispatcher;
use crate::event::Envelope;
use crate::signature;

const DEFAULT_SERIES_BUCKETS: usize = 12;

// ── Config ──

pub struct ServeConfig {
    pub listen: String,
    /// When set, every `/slack/events` delivery must carry a valid signature.
    pub signing_secret: Option<String>,
}

// ── App State ──

struct AppState<L, C> {
    dispatcher: Arc<Dispatcher<L, C>>,
    signing_secret: Option<String>,
}

impl<L, C> AppState<L, C>
where
    L: KarmaLedger + Send + 'static,
    C: ChatClient + Send + Sync + 'static,
{
    /// Run a ledger read on the blocking pool.
    async fn read_ledger<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&L) -> anyhow::Result<T> + Send + 'static,
    {
        let dispatcher = self.dispatcher.clone();
        tokio::task::spawn_blocking(move || dispatcher.with_ledger(f)).await?
    }
}

// ── Error Handling ──

enum AppError {
    BadRequest(String),
    Unauthorized(String),
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Internal(err) => {
                error!(error = %err, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        Self::Internal(err.into())
    }
}

// ── Entrypoint ──

pub async fn serve<L, C>(dispatcher: Dispatcher<L, C>, config: ServeConfig) -> anyhow::Result<()>
where
    L: KarmaLedger + Send + 'static,
    C: ChatClient + Send + Sync + 'static,
{
    let verifying = config.signing_secret.is_some();
    let app = router(dispatcher, config.signing_secret);
    let listener = tokio::net::TcpListener::bind(&config.listen).await?;
    info!(addr = %listener.local_addr()?, verifying, "karma listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the router (for testing without binding to a port).
pub fn router<L, C>(dispatcher: Dispatcher<L, C>, signing_secret: Option<String>) -> Router
where
    L: KarmaLedger + Send + 'static,
    C: ChatClient + Send + Sync + 'static,
{
    let state = Arc::new(AppState {
        dispatcher: Arc::new(dispatcher),
        signing_secret,
    });
    Router::new()
        .route("/api/health", get(health))
        .route("/api/top", get(get_top::<L, C>))
        .route("/api/series", get(get_series::<L, C>))
        .route("/slack/events", post(post_slack_event::<L, C>))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Health ──

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

// ── POST /slack/events ──

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn post_slack_event<L, C>(
    State(state): State<Arc<AppState<L, C>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError>
where
    L: KarmaLedger + Send + 'static,
    C: ChatClient + Send + Sync + 'static,
{
    if let Some(secret) = &state.signing_secret {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        signature::verify(
            secret,
            header(&headers, "x-slack-request-timestamp"),
            header(&headers, "x-slack-signature"),
            &body,
            now,
        )
        .map_err(|e| {
            warn!(error = %e, "rejected slack delivery");
            AppError::Unauthorized(e.to_string())
        })?;
    }

    let envelope: Envelope = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("invalid event payload: {e}")))?;

    match envelope {
        Envelope::UrlVerification { challenge } => {
            Ok(Json(serde_json::json!({ "challenge": challenge })).into_response())
        }
        Envelope::EventCallback { event } => {
            // Replies were already sent for the first delivery.
            if let Some(retry) = header(&headers, "x-slack-retry-num") {
                debug!(retry, "ignoring slack retry");
                return Ok(StatusCode::OK.into_response());
            }
            let dispatcher = state.dispatcher.clone();
            tokio::task::spawn_blocking(move || match dispatcher.handle_message(&event) {
                Ok(replied) => debug!(replied, channel = ?event.channel, "message handled"),
                Err(e) => error!(error = %e, channel = ?event.channel, "message handling failed"),
            });
            Ok(StatusCode::OK.into_response())
        }
        Envelope::Other => Ok(StatusCode::OK.into_response()),
    }
}

// ── GET /api/top ──

#[derive(Deserialize)]
struct TopQuery {
    n: Option<usize>,
    direction: Option<String>,
}

fn parse_direction(raw: Option<&str>) -> Result<RankDirection, AppError> {
    match raw {
        None => Ok(RankDirection::Top),
        Some(s) => RankDirection::parse(s)
            .ok_or_else(|| AppError::BadRequest(format!("unknown direction: {s}"))),
    }
}

async fn get_top<L, C>(
    State(state): State<Arc<AppState<L, C>>>,
    Query(params): Query<TopQuery>,
) -> Result<Json<Vec<KarmaTarget>>, AppError>
where
    L: KarmaLedger + Send + 'static,
    C: ChatClient + Send + Sync + 'static,
{
    let direction = parse_direction(params.direction.as_deref())?;
    let n = params.n.unwrap_or(DEFAULT_RANK_SIZE);
    let ranked = state
        .read_ledger(move |ledger| Ok(karma_rank::rank_targets(ledger, n, direction)?))
        .await?;
    Ok(Json(ranked))
}

// ── GET /api/series ──

#[derive(Deserialize)]
struct SeriesQuery {
    n: Option<usize>,
    buckets: Option<usize>,
    direction: Option<String>,
    granularity: Option<String>,
}

async fn get_series<L, C>(
    State(state): State<Arc<AppState<L, C>>>,
    Query(params): Query<SeriesQuery>,
) -> Result<Json<RankedSeries>, AppError>
where
    L: KarmaLedger + Send + 'static,
    C: ChatClient + Send + Sync + 'static,
{
    let direction = parse_direction(params.direction.as_deref())?;
    let granularity = match params.granularity.as_deref() {
        None => Granularity::default(),
        Some(s) => Granularity::parse(s)
            .ok_or_else(|| AppError::BadRequest(format!("unknown granularity: {s}")))?,
    };
    let request = SeriesRequest {
        n: params.n.unwrap_or(DEFAULT_RANK_SIZE),
        max_buckets: params.buckets.unwrap_or(DEFAULT_SERIES_BUCKETS),
        direction,
        granularity,
    };
    let series = state
        .read_ledger(move |ledger| Ok(karma_rank::ranked_time_series(ledger, request)?))
        .await?;
    Ok(Json(series))
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use karma_ledger::MemoryStore;
    use tower::ServiceExt;

    use super::*;
    use crate::chat::testing::RecordingChat;
    use crate::dispatcher::BotIdentity;

    fn seeded_dispatcher(chat: &RecordingChat) -> Dispatcher<MemoryStore, RecordingChat> {
        let store = MemoryStore::new();
        for (target, delta) in [("E1", 2), ("E2", -1), ("E3", 1), ("E4", 4), ("E5", 3)] {
            store
                .append(&karma_core::LedgerEntry::now(target, delta, "U1"))
                .unwrap();
        }
        let identity = BotIdentity {
            name: "karmabot".to_string(),
            user_id: "UBOT".to_string(),
        };
        Dispatcher::new(store, chat.clone(), identity).with_rolls(|| 0.99)
    }

    fn app(signing_secret: Option<&str>) -> (Router, RecordingChat) {
        let chat = RecordingChat::default();
        let app = router(seeded_dispatcher(&chat), signing_secret.map(str::to_string));
        (app, chat)
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn slack_post(body: &serde_json::Value, signed: Option<(&str, i64)>) -> Request<Body> {
        let body = body.to_string();
        let mut req = Request::builder()
            .method("POST")
            .uri("/slack/events")
            .header("content-type", "application/json");
        if let Some((secret, ts)) = signed {
            let ts = ts.to_string();
            let sig = signature::sign(secret, &ts, body.as_bytes()).unwrap();
            req = req
                .header("x-slack-request-timestamp", &ts)
                .header("x-slack-signature", sig);
        }
        req.body(Body::from(body)).unwrap()
    }

    fn message_callback(text: &str) -> serde_json::Value {
        serde_json::json!({
            "type": "event_callback",
            "event": {"type": "message", "user": "U7", "channel": "C9", "text": text}
        })
    }

    async fn wait_for_posts(chat: &RecordingChat, count: usize) {
        for _ in 0..200 {
            if chat.sent().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {count} posts, saw {:?}", chat.sent());
    }

    fn unix_now() -> i64 {
        time::OffsetDateTime::now_utc().unix_timestamp()
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let (app, _) = app(None);
        let resp = app.oneshot(get_req("/api/health")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["ok"], true);
    }

    #[tokio::test]
    async fn top_returns_ranked_targets() {
        let (app, _) = app(None);
        let resp = app.oneshot(get_req("/api/top?n=2")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            body_json(resp).await,
            serde_json::json!([{"name": "E4", "total": 4}, {"name": "E5", "total": 3}])
        );
    }

    #[tokio::test]
    async fn bottom_direction_and_bad_direction() {
        let (app, _) = app(None);
        let resp = app
            .clone()
            .oneshot(get_req("/api/top?n=1&direction=bottom"))
            .await
            .unwrap();
        assert_eq!(body_json(resp).await[0]["name"], "E2");

        let resp = app
            .oneshot(get_req("/api/top?direction=sideways"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn series_returns_chart_data() {
        let (app, _) = app(None);
        let resp = app
            .oneshot(get_req("/api/series?n=3&buckets=4&granularity=day"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["granularity"], "day");
        assert_eq!(json["targets"], serde_json::json!(["E4", "E5", "E1"]));
        let buckets = json["buckets"].as_array().unwrap();
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0]["values"]["E4"], 4);
    }

    #[tokio::test]
    async fn series_rejects_unknown_granularity() {
        let (app, _) = app(None);
        let resp = app
            .oneshot(get_req("/api/series?granularity=fortnight"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn url_verification_echoes_challenge() {
        let (app, _) = app(None);
        let body = serde_json::json!({"type": "url_verification", "challenge": "xyz"});
        let resp = app.oneshot(slack_post(&body, None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["challenge"], "xyz");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn message_event_is_dispatched() {
        let (app, chat) = app(None);
        let resp = app
            .oneshot(slack_post(&message_callback("E3++"), None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        wait_for_posts(&chat, 1).await;
        assert_eq!(
            chat.sent(),
            vec![("C9".to_string(), "E3 got 1 point, and now has 2".to_string())]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn signed_delivery_is_accepted() {
        let (app, chat) = app(Some("s3cret"));
        let signed = Some(("s3cret", unix_now()));
        let resp = app
            .oneshot(slack_post(&message_callback("<@UBOT> top 1"), signed))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        wait_for_posts(&chat, 1).await;
        assert_eq!(chat.texts(), vec!["E4: 4 points"]);
    }

    #[tokio::test]
    async fn unsigned_stale_or_forged_delivery_is_rejected() {
        let (app, chat) = app(Some("s3cret"));
        let body = message_callback("E3++");

        let resp = app.clone().oneshot(slack_post(&body, None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let stale = Some(("s3cret", unix_now() - 10 * 60));
        let resp = app.clone().oneshot(slack_post(&body, stale)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let forged = Some(("guess", unix_now()));
        let resp = app.oneshot(slack_post(&body, forged)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        assert!(chat.sent().is_empty());
    }

    #[tokio::test]
    async fn malformed_payload_is_bad_request() {
        let (app, _) = app(None);
        let req = Request::builder()
            .method("POST")
            .uri("/slack/events")
            .body(Body::from("not json"))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn retries_are_acknowledged_without_replaying() {
        let (app, chat) = app(None);
        let mut req = slack_post(&message_callback("E3++"), None);
        req.headers_mut()
            .insert("x-slack-retry-num", "1".parse().unwrap());
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(chat.sent().is_empty());
    }
}
