use std::convert::Infallible;
use std::sync::Arc;

use serde::Deserialize;
use warp::http::StatusCode;
use warp::Filter;

use super::websocket;
use crate::ai::{self, TextGenClient};
use crate::exec::ExecClient;
use crate::hub::SessionGateway;

/// Request bodies over 200 KiB are rejected outright.
const MAX_BODY_BYTES: u64 = 200 * 1024;
/// Source payloads past this many bytes get a 413.
const MAX_CODE_BYTES: usize = 20_000;

#[derive(Debug, Deserialize)]
struct ExecuteRequest {
    language: String,
    code: String,
}

#[derive(Debug, Deserialize)]
struct HintRequest {
    code: String,
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    role: String,
    topic: String,
    experience: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeedbackRequest {
    question: String,
    answer: String,
}

/// Everything the service serves: the hub WebSocket plus the
/// surrounding request/response endpoints, with CORS opened to the
/// browser frontend.
pub fn hub_routes(
    gateway: Arc<SessionGateway>,
    exec: Arc<ExecClient>,
    ai: Option<Arc<TextGenClient>>,
    frontend_origin: &str,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let cors = warp::cors()
        .allow_origin(frontend_origin)
        .allow_methods(vec!["GET", "POST"])
        .allow_header("content-type");

    hub_websocket_route(gateway.clone())
        .or(hub_health_check())
        .or(hub_stats(gateway))
        .or(execute_route(exec))
        .or(ai_hint_route(ai.clone()))
        .or(ai_generate_route(ai.clone()))
        .or(ai_feedback_route(ai))
        .with(cors)
}

pub fn hub_websocket_route(
    gateway: Arc<SessionGateway>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path("hub")
        .and(warp::path::end())
        .and(warp::ws())
        .and(with_gateway(gateway))
        .map(|ws: warp::ws::Ws, gateway: Arc<SessionGateway>| {
            ws.on_upgrade(move |websocket| websocket::handle_hub_websocket(websocket, gateway))
        })
}

pub fn hub_health_check() -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone
{
    warp::path!("hub" / "health").and(warp::get()).map(|| {
        warp::reply::json(&serde_json::json!({
            "status": "healthy",
            "service": "Runbox Session Hub",
            "version": env!("CARGO_PKG_VERSION")
        }))
    })
}

pub fn hub_stats(
    gateway: Arc<SessionGateway>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("hub" / "stats")
        .and(warp::get())
        .and(with_gateway(gateway))
        .and_then(|gateway: Arc<SessionGateway>| async move {
            let (connections, rooms) = gateway.stats().await;
            Ok::<_, Infallible>(warp::reply::json(&serde_json::json!({
                "connections": connections,
                "rooms": rooms
            })))
        })
}

pub fn execute_route(
    exec: Arc<ExecClient>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "execute")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(warp::any().map(move || exec.clone()))
        .and_then(handle_execute)
}

async fn handle_execute(
    request: ExecuteRequest,
    exec: Arc<ExecClient>,
) -> Result<impl warp::Reply, Infallible> {
    if request.language.is_empty() || request.code.is_empty() {
        return Ok(error_reply(
            StatusCode::BAD_REQUEST,
            "Missing required fields: code, language",
        ));
    }
    if request.code.len() > MAX_CODE_BYTES {
        return Ok(error_reply(
            StatusCode::PAYLOAD_TOO_LARGE,
            "Code payload too large",
        ));
    }

    match exec.run(&request.language, &request.code).await {
        Ok(outcome) => Ok(reply_with(StatusCode::OK, serde_json::json!(outcome))),
        Err(e) => {
            tracing::error!(error = %e, language = %request.language, "Code execution failed");
            Ok(error_reply(StatusCode::BAD_GATEWAY, &e.to_string()))
        }
    }
}

pub fn ai_hint_route(
    ai: Option<Arc<TextGenClient>>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "ai" / "hint")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_ai(ai))
        .and_then(handle_hint)
}

async fn handle_hint(
    request: HintRequest,
    ai: Option<Arc<TextGenClient>>,
) -> Result<impl warp::Reply, Infallible> {
    let Some(ai) = ai else {
        return Ok(error_reply(StatusCode::SERVICE_UNAVAILABLE, "AI not configured"));
    };
    if request.code.is_empty() {
        return Ok(error_reply(StatusCode::BAD_REQUEST, "Missing code"));
    }
    if request.code.len() > MAX_CODE_BYTES {
        return Ok(error_reply(StatusCode::PAYLOAD_TOO_LARGE, "Code too large"));
    }

    match ai.generate(&ai::hint_prompt(&request.code)).await {
        Ok(text) => {
            let hint = if text.is_empty() {
                "No hint generated".to_string()
            } else {
                text
            };
            Ok(reply_with(StatusCode::OK, serde_json::json!({ "hint": hint })))
        }
        Err(e) => {
            tracing::error!(error = %e, "Hint generation failed");
            Ok(error_reply(StatusCode::BAD_GATEWAY, &e.to_string()))
        }
    }
}

pub fn ai_generate_route(
    ai: Option<Arc<TextGenClient>>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "ai" / "generate")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_ai(ai))
        .and_then(handle_generate)
}

async fn handle_generate(
    request: GenerateRequest,
    ai: Option<Arc<TextGenClient>>,
) -> Result<impl warp::Reply, Infallible> {
    let Some(ai) = ai else {
        return Ok(error_reply(StatusCode::SERVICE_UNAVAILABLE, "AI not configured"));
    };
    if request.role.is_empty() || request.topic.is_empty() {
        return Ok(error_reply(StatusCode::BAD_REQUEST, "Missing role or topic"));
    }

    let prompt = ai::question_prompt(
        &request.role,
        &request.topic,
        request.experience.as_deref(),
        request.description.as_deref(),
    );

    match ai.generate(&prompt).await {
        Ok(text) => {
            let question = if text.is_empty() {
                "No question generated".to_string()
            } else {
                text
            };
            Ok(reply_with(
                StatusCode::OK,
                serde_json::json!({ "question": question }),
            ))
        }
        Err(e) => {
            tracing::error!(error = %e, "Question generation failed");
            Ok(error_reply(StatusCode::BAD_GATEWAY, &e.to_string()))
        }
    }
}

pub fn ai_feedback_route(
    ai: Option<Arc<TextGenClient>>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "ai" / "feedback")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_ai(ai))
        .and_then(handle_feedback)
}

async fn handle_feedback(
    request: FeedbackRequest,
    ai: Option<Arc<TextGenClient>>,
) -> Result<impl warp::Reply, Infallible> {
    let Some(ai) = ai else {
        return Ok(error_reply(StatusCode::SERVICE_UNAVAILABLE, "AI not configured"));
    };
    if request.question.is_empty() || request.answer.is_empty() {
        return Ok(error_reply(
            StatusCode::BAD_REQUEST,
            "Missing question or answer",
        ));
    }

    match ai
        .generate(&ai::feedback_prompt(&request.question, &request.answer))
        .await
    {
        Ok(text) => {
            let feedback = if text.is_empty() {
                "No feedback generated".to_string()
            } else {
                text
            };
            Ok(reply_with(
                StatusCode::OK,
                serde_json::json!({ "feedback": feedback }),
            ))
        }
        Err(e) => {
            tracing::error!(error = %e, "Feedback generation failed");
            Ok(error_reply(StatusCode::BAD_GATEWAY, &e.to_string()))
        }
    }
}

fn reply_with(status: StatusCode, body: serde_json::Value) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(warp::reply::json(&body), status)
}

fn error_reply(status: StatusCode, message: &str) -> warp::reply::WithStatus<warp::reply::Json> {
    reply_with(status, serde_json::json!({ "error": message }))
}

fn with_gateway(
    gateway: Arc<SessionGateway>,
) -> impl Filter<Extract = (Arc<SessionGateway>,), Error = Infallible> + Clone {
    warp::any().map(move || gateway.clone())
}

fn with_ai(
    ai: Option<Arc<TextGenClient>>,
) -> impl Filter<Extract = (Option<Arc<TextGenClient>>,), Error = Infallible> + Clone {
    warp::any().map(move || ai.clone())
}
