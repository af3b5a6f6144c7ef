//! Static landing page served at `/`.
//!
//! It only links to the public endpoints; front-ends talk to the gateway
//! through the same `/v1` API as any other client.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::{Html, IntoResponse, Response};

use crate::server::openai_api::AppState;

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{{PROJECT_NAME}}</title>
</head>
<body>
<h1>{{PROJECT_NAME}} <small>v{{PROJECT_VERSION}}</small></h1>
<p>OpenAI-compatible gateway. Authenticate with <code>Authorization: Bearer &lt;key&gt;</code>.</p>
<ul>
<li>Chat completions: <code>POST {{ORIGIN}}/v1/chat/completions</code></li>
<li>Models: <code>GET {{ORIGIN}}/v1/models</code></li>
<li>Default model: <code>{{DEFAULT_MODEL}}</code></li>
</ul>
<pre>curl {{ORIGIN}}/v1/chat/completions \
  -H "Authorization: Bearer $API_KEY" \
  -H "Content-Type: application/json" \
  -d '{"model": "{{DEFAULT_MODEL}}", "messages": [{"role": "user", "content": "Hello"}], "stream": true}'</pre>
</body>
</html>
"#;

/// Minimal escaping for values interpolated into the page.
fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn render(config: &crate::config::Config, origin: &str) -> String {
    TEMPLATE
        .replace("{{PROJECT_NAME}}", &escape(&config.project.name))
        .replace("{{PROJECT_VERSION}}", &escape(&config.project.version))
        .replace("{{DEFAULT_MODEL}}", &escape(&config.models.default_model))
        .replace("{{ORIGIN}}", &escape(origin))
}

pub async fn landing_page(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let origin = format!("http://{host}");

    let mut response = Html(render(&state.config, &origin)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_render_fills_placeholders() {
        let page = render(&Config::default(), "http://gw.local");
        assert!(page.contains("http://gw.local/v1/models"));
        assert!(page.contains("askai-default-model"));
        assert!(!page.contains("{{"));
    }

    #[test]
    fn test_render_never_includes_secret() {
        let config = Config::default();
        let page = render(&config, "http://gw.local");
        assert!(!page.contains(&config.auth.api_key));
    }
}
