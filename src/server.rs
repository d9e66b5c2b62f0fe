use std::{io, sync::Arc};

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Form, Json, Router,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    config::Config,
    dot::{self, GraphText},
    form::{self, FormError, FormLimits, Submission},
    render::{Converter, RenderError, RenderedText},
    Map,
};

const INDEX_PAGE: &str = include_str!("../static/index.html");
const DFA_PAGE: &str = include_str!("../static/dfa.html");
const FAVICON: &[u8] = include_bytes!("../static/favicon.ico");

/// The state that is shared by all requests. It is constructed once at startup and never
/// modified afterwards.
#[derive(Debug, Clone, Default)]
pub struct Service {
    converter: Converter,
    limits: FormLimits,
}

impl Service {
    /// Creates a service that renders through `converter` and accepts forms within `limits`.
    pub fn new(converter: Converter, limits: FormLimits) -> Self {
        Self { converter, limits }
    }

    /// Creates the service described by `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.converter.clone(), config.limits)
    }

    /// The converter that is used for rendering.
    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    /// Decodes the submitted form fields, see [`form::decode`].
    pub fn decode(&self, fields: &Map<String, String>) -> Result<Submission, FormError> {
        form::decode(fields, self.limits)
    }

    /// Runs the converter on `dot` and turns the outcome into a response. This blocks until the
    /// converter has exited.
    pub fn render(&self, dot: GraphText) -> DfaResponse {
        let rendered = self.converter.render(&dot);
        DfaResponse::new(rendered, dot)
    }
}

/// The JSON payload that answers a submitted form.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DfaResponse {
    /// The converter succeeded.
    Rendered {
        /// output of the converter
        tikz: RenderedText,
    },
    /// The converter failed, the DOT document is included for debugging.
    Failed {
        /// message describing what went wrong
        error: String,
        /// the document that was passed to the converter
        dot: GraphText,
    },
}

impl DfaResponse {
    /// Creates the response for the outcome of rendering `dot`.
    pub fn new(rendered: Result<RenderedText, RenderError>, dot: GraphText) -> Self {
        match rendered {
            Ok(tikz) => {
                info!("rendered DFA into {} bytes", tikz.as_str().len());
                DfaResponse::Rendered { tikz }
            }
            Err(e) => {
                warn!("could not render DFA: {e}");
                DfaResponse::Failed {
                    error: format!("Error: {e}"),
                    dot,
                }
            }
        }
    }
}

enum AppError {
    BadRequest(String),
}

impl From<FormError> for AppError {
    fn from(value: FormError) -> Self {
        AppError::BadRequest(value.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Builds the router that serves the pages and accepts submitted forms.
pub fn router(service: Arc<Service>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/dfa.html", get(dfa_form).post(submit_dfa))
        .route("/favicon.ico", get(favicon))
        .with_state(service)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_PAGE)
}

async fn dfa_form() -> Html<&'static str> {
    Html(DFA_PAGE)
}

async fn favicon() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/x-icon")], FAVICON)
}

async fn submit_dfa(
    State(service): State<Arc<Service>>,
    Form(fields): Form<Map<String, String>>,
) -> Result<Json<DfaResponse>, AppError> {
    let submission = service.decode(&fields)?;
    let dot = dot::build(&submission.spec, &submission.transitions);

    // the converter blocks, so it must not run on the async workers
    let worker = Arc::clone(&service);
    let input = dot.clone();
    let response = tokio::task::spawn_blocking(move || worker.render(input))
        .await
        .unwrap_or_else(|e| DfaResponse::new(Err(io::Error::other(e).into()), dot));

    Ok(Json(response))
}

#[cfg(all(test, unix))]
mod tests {
    use axum::{body::Body, http::Request};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;

    const BINARY_DFA: &str = "alphabet=0+1&states=2&initial=0&dead=&final=1\
        &transition_0_0=0&transition_0_1=1&transition_1_0=1&transition_1_1=1";

    fn app(converter: Converter) -> Router {
        router(Arc::new(Service::new(converter, FormLimits::default())))
    }

    async fn post_form(app: Router, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/dfa.html")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn submitted_dfa_is_converted() {
        let (status, json) = post_form(app(Converter::new("cat")), BINARY_DFA).await;
        assert_eq!(status, StatusCode::OK);

        let tikz = json["tikz"].as_str().unwrap();
        assert!(tikz.starts_with("digraph DFA {"));
        assert!(tikz.contains("    1 [label=\"1\", shape=doublecircle];"));
        assert_eq!(tikz.lines().filter(|l| l.contains("->")).count(), 4);
        assert!(json.get("error").is_none());
    }

    #[tokio::test]
    async fn missing_converter_returns_error_and_dot() {
        let (status, json) = post_form(
            app(Converter::new("surely-not-an-installed-converter")),
            BINARY_DFA,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json["error"],
            "Error: surely-not-an-installed-converter is not installed or not found in PATH."
        );
        assert!(json["dot"].as_str().unwrap().contains("0 -> 1 [label=\"1\"];"));
        assert!(json.get("tikz").is_none());
    }

    #[tokio::test]
    async fn failing_converter_reports_stderr() {
        let converter =
            Converter::new("sh").with_args(["-c", "cat >/dev/null; echo broken >&2; exit 1"]);
        let (_, json) = post_form(app(converter), BINARY_DFA).await;
        let error = json["error"].as_str().unwrap();
        assert!(error.starts_with("Error: sh command failed"));
        assert!(error.ends_with("broken"));
    }

    #[tokio::test]
    async fn malformed_form_is_a_bad_request() {
        let (status, json) =
            post_form(app(Converter::new("cat")), "alphabet=a&states=x&initial=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            json["error"],
            "form field `states` must be a non-negative integer, got `x`"
        );
    }

    #[tokio::test]
    async fn pages_are_served() {
        for (uri, content_type) in [
            ("/", "text/html; charset=utf-8"),
            ("/dfa.html", "text/html; charset=utf-8"),
            ("/favicon.ico", "image/x-icon"),
        ] {
            let response = app(Converter::default())
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{uri}");
            assert_eq!(response.headers()[header::CONTENT_TYPE], content_type);
        }
    }

    #[test]
    fn response_payloads() {
        let dot = dot::build(
            &crate::AutomatonSpec::new(["a"], 1, 0),
            &crate::TransitionTable::new(),
        );
        let failed = DfaResponse::new(
            Err(RenderError::ToolNotFound {
                program: "dot2tex".into(),
            }),
            dot.clone(),
        );
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            serde_json::json!({
                "error": "Error: dot2tex is not installed or not found in PATH.",
                "dot": dot.as_str(),
            })
        );

        let rendered =
            Service::new(Converter::new("cat"), FormLimits::default()).render(dot.clone());
        assert_eq!(
            serde_json::to_value(&rendered).unwrap(),
            serde_json::json!({ "tikz": dot.as_str() })
        );
    }
}
