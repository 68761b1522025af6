use axum::{http::StatusCode, response::{Html, IntoResponse, Response}};
use pulldown_cmark::{Event, Options, Parser};
use tower_sessions::Session;

use crate::{session, AppResult};

#[macro_export]
macro_rules! include_res {
    (bytes, $p:expr) => {
        include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/res", $p))
    };
    (str, $p:expr) => {
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/res", $p))
    };
}

pub fn sorry(what: &str) -> AppResult<Response> {
    Ok((
        StatusCode::NOT_FOUND,
        page(
            "Not found",
            &include_res!(str, "/pages/sorry.html").replace("{what}", &escape(what)),
        ),
    )
        .into_response())
}

/// Wraps a page body in the shared layout.
pub fn page(title: &str, body: &str) -> Html<String> {
    Html(
        include_res!(str, "/pages/layout.html")
            .replace("{title}", &escape(title))
            .replace("{body}", body),
    )
}

/// Takes the pending flash message, rendered, or an empty string.
pub async fn flash(session: &Session) -> AppResult<String> {
    Ok(session::take_flash(session)
        .await?
        .map(|f| format!("<p class='flash'>{}</p>", escape(&f)))
        .unwrap_or_default())
}

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders user-written markdown. Raw html in the source is shown as text.
pub fn markdown(source: &str) -> String {
    let parser = Parser::new_ext(source, Options::ENABLE_STRIKETHROUGH)
        .map(|event| match event {
            Event::Html(html) | Event::InlineHtml(html) => Event::Text(html),
            _ => event,
        });

    let mut html_output = String::new();
    pulldown_cmark::html::push_html(&mut html_output, parser);
    html_output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape("<b>\"Tom\" & 'Jerry'</b>"), "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;");
    }

    #[test]
    fn markdown_does_not_pass_raw_html() {
        let html = markdown("**exam** on monday <script>alert(1)</script>");
        assert!(html.contains("<strong>exam</strong>"));
        assert!(!html.contains("<script>"));
    }
}
