/* src/server/core/rust/src/handler/tests.rs */

use std::sync::Arc;

use ::http::header::{ALLOW, CONTENT_TYPE, LOCATION, SET_COOKIE};
use ::http::{HeaderValue, Method, StatusCode};
use bytes::Bytes;
use serde_json::{Value, json};

use super::dispatch;
use super::document::DocumentContext;
use crate::errors::HttpError;
use crate::event::RequestEvent;
use crate::manifest::{AppRoute, HttpRoute, ServerManifest};
use crate::middleware::Next;
use crate::module::{ComponentModule, Handler, HttpModule, ready};
use crate::outcome::{HandlerOutput, HandlerResult, Interrupt};
use crate::response::{Request, Response, X_VESSEL_DATA, X_VESSEL_ERROR, X_VESSEL_EXPECTED, X_VESSEL_REDIRECT};
use crate::server::VesselServer;

fn request(method: Method, uri: &str) -> Request {
  ::http::Request::builder().method(method).uri(uri).body(Bytes::new()).unwrap()
}

fn get(uri: &str) -> Request {
  request(Method::GET, uri)
}

fn form(uri: &str, content_type: &str, body: &'static [u8]) -> Request {
  ::http::Request::builder()
    .method(Method::POST)
    .uri(uri)
    .header(CONTENT_TYPE, content_type)
    .body(Bytes::from_static(body))
    .unwrap()
}

fn body_json(res: &Response) -> Value {
  serde_json::from_slice(res.body()).unwrap()
}

fn body_text(res: &Response) -> &str {
  std::str::from_utf8(res.body()).unwrap()
}

fn header<'a>(res: &'a Response, name: impl ::http::header::AsHeaderName) -> Option<&'a str> {
  res.headers().get(name).and_then(|v| v.to_str().ok())
}

fn text(body: &'static str) -> Handler {
  Handler::new(move |_event| async move { Ok::<_, Interrupt>(body) })
}

fn params_loader() -> Handler {
  Handler::new(|event: RequestEvent| async move { Ok::<_, Interrupt>(event.params().to_json()) })
}

fn users_module() -> HttpModule {
  HttpModule::new()
    .get(Handler::new(|event: RequestEvent| async move {
      let id = event.param("id").unwrap_or_default().to_string();
      Ok::<_, Interrupt>(format!("user {id}"))
    }))
    .post(text("created"))
    .delete(text("deleted"))
    .put(text("replaced"))
}

fn title_renderer(ctx: &DocumentContext<'_>) -> HandlerResult<HandlerOutput> {
  Ok(HandlerOutput::Text(format!("<h1>{}</h1>", ctx.route.id)))
}

fn app(trailing_slash: bool) -> Arc<ServerManifest> {
  VesselServer::new()
    .trailing_slash(trailing_slash)
    .http(HttpRoute::new("users", "/api/users/:id", ready(users_module())))
    .http(
      HttpRoute::new("readonly", "/api/readonly", ready(HttpModule::new().get(text("ro"))))
        .methods([Method::GET]),
    )
    .http(HttpRoute::new(
      "boom",
      "/api/boom",
      ready(HttpModule::new().get(Handler::new(|_event| async {
        Err::<&'static str, Interrupt>(anyhow::anyhow!("secret connection string").into())
      }))),
    ))
    .http(HttpRoute::new(
      "forbidden",
      "/api/forbidden",
      ready(HttpModule::new().get(Handler::new(|_event| async {
        Err::<&'static str, Interrupt>(
          HttpError::forbidden("forbidden").data(json!({"need": "admin"})).into(),
        )
      }))),
    ))
    .app(AppRoute::new("root", "/").layout(ready(ComponentModule::with_loader(Handler::new(
      |_event| async { Ok::<_, Interrupt>(json!({"user": "ada"})) },
    )))))
    .app(
      AppRoute::new("blog", "/blog/:slug")
        .page(ready(ComponentModule::with_loader(params_loader())))
        .layouts(["root"]),
    )
    .app(AppRoute::new("about", "/about").page(ready(ComponentModule::new())).layouts(["root"]))
    .app(
      AppRoute::new("account", "/account").page(ready(ComponentModule::with_loader(Handler::new(
        |_event| async { Err::<Value, _>(Interrupt::redirect("/login", StatusCode::SEE_OTHER)) },
      )))),
    )
    .into_manifest()
}

// -- Trailing slash --

#[tokio::test]
async fn index_html_is_stripped() {
  let res = dispatch(&app(false), get("/docs/index.html")).await;
  assert_eq!(res.status(), StatusCode::PERMANENT_REDIRECT);
  assert_eq!(header(&res, LOCATION), Some("/docs"));

  let res = dispatch(&app(true), get("/docs/index.html")).await;
  assert_eq!(header(&res, LOCATION), Some("/docs/"));

  let res = dispatch(&app(false), get("/index.html")).await;
  assert_eq!(header(&res, LOCATION), Some("/"));
}

#[tokio::test]
async fn trailing_slash_policy() {
  let res = dispatch(&app(false), get("/blog/hello/")).await;
  assert_eq!(res.status(), StatusCode::PERMANENT_REDIRECT);
  assert_eq!(header(&res, LOCATION), Some("/blog/hello"));

  let res = dispatch(&app(true), get("/blog/hello")).await;
  assert_eq!(res.status(), StatusCode::PERMANENT_REDIRECT);
  assert_eq!(header(&res, LOCATION), Some("/blog/hello/"));

  let res = dispatch(&app(true), get("/blog/hello/")).await;
  assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn root_is_never_redirected() {
  for policy in [false, true] {
    let res = dispatch(&app(policy), get("/")).await;
    assert_ne!(res.status(), StatusCode::PERMANENT_REDIRECT);
  }
}

#[tokio::test]
async fn redirect_keeps_query() {
  let res = dispatch(&app(false), get("/docs/?page=2&q=a%20b")).await;
  assert_eq!(header(&res, LOCATION), Some("/docs?page=2&q=a%20b"));
}

// -- HTTP routes --

#[tokio::test]
async fn http_route_with_params() {
  let res = dispatch(&app(false), get("/api/users/42")).await;
  assert_eq!(res.status(), StatusCode::OK);
  assert_eq!(body_text(&res), "user 42");
}

#[tokio::test]
async fn head_matches_get_without_body() {
  let manifest = app(false);
  let full = dispatch(&manifest, get("/api/users/7")).await;
  let head = dispatch(&manifest, request(Method::HEAD, "/api/users/7")).await;
  assert_eq!(head.status(), full.status());
  assert_eq!(head.headers(), full.headers());
  assert!(head.body().is_empty());
  assert!(!full.body().is_empty());
}

#[tokio::test]
async fn head_on_pages_strips_body() {
  let res = dispatch(&app(false), request(Method::HEAD, "/blog/hi")).await;
  assert_eq!(res.status(), StatusCode::OK);
  assert!(header(&res, CONTENT_TYPE).unwrap().starts_with("text/html"));
  assert!(res.body().is_empty());
}

#[tokio::test]
async fn method_outside_allow_list_is_not_found() {
  let res = dispatch(&app(false), request(Method::PUT, "/api/readonly")).await;
  assert_eq!(res.status(), StatusCode::NOT_FOUND);
  assert!(header(&res, ALLOW).is_none());

  let res = dispatch(&app(false), request(Method::HEAD, "/api/readonly")).await;
  assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_handler_is_405_with_allow() {
  let res = dispatch(&app(false), request(Method::PATCH, "/api/users/1")).await;
  assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
  assert_eq!(header(&res, ALLOW), Some("GET, POST, DELETE, PUT"));
  assert_eq!(header(&res, X_VESSEL_ERROR), Some("yes"));
}

#[tokio::test]
async fn any_handler_catches_the_rest() {
  let manifest = VesselServer::new()
    .http(HttpRoute::new("any", "/any", ready(HttpModule::new().get(text("get")).any(text("any")))))
    .into_manifest();
  let res = dispatch(&manifest, request(Method::PATCH, "/any")).await;
  assert_eq!(body_text(&res), "any");
  let res = dispatch(&manifest, get("/any")).await;
  assert_eq!(body_text(&res), "get");
}

#[tokio::test]
async fn urlencoded_method_override() {
  let req = form("/api/users/1", "application/x-www-form-urlencoded", b"name=x&_method=delete");
  let res = dispatch(&app(false), req).await;
  assert_eq!(body_text(&res), "deleted");
}

#[tokio::test]
async fn multipart_method_override() {
  let body = b"--XYZ\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nhello\r\n\
--XYZ\r\nContent-Disposition: form-data; name=\"_method\"\r\n\r\nPUT\r\n--XYZ--\r\n";
  let req = form("/api/users/1", "multipart/form-data; boundary=XYZ", body);
  let res = dispatch(&app(false), req).await;
  assert_eq!(body_text(&res), "replaced");
}

#[tokio::test]
async fn malformed_form_keeps_post() {
  let req = form("/api/users/1", "multipart/form-data", b"garbage");
  let res = dispatch(&app(false), req).await;
  assert_eq!(body_text(&res), "created");
}

#[tokio::test]
async fn override_outside_allow_list_is_not_found() {
  let req = form("/api/readonly", "application/x-www-form-urlencoded", b"_method=DELETE");
  let res = dispatch(&app(false), req).await;
  assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn expected_error_shape() {
  let res = dispatch(&app(false), get("/api/forbidden")).await;
  assert_eq!(res.status(), StatusCode::FORBIDDEN);
  assert_eq!(body_json(&res), json!({"error": {"message": "forbidden", "data": {"need": "admin"}}}));
  assert_eq!(header(&res, X_VESSEL_EXPECTED), Some("yes"));
  assert_eq!(header(&res, X_VESSEL_ERROR), Some("yes"));
}

#[tokio::test]
async fn production_never_leaks() {
  let res = dispatch(&app(false), get("/api/boom")).await;
  assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
  assert_eq!(body_text(&res), r#"{"error":{"message":"internal server error"}}"#);
  assert_eq!(header(&res, X_VESSEL_ERROR), Some("yes"));
}

#[tokio::test]
async fn redirects_pass_through_with_cookies() {
  let login = Handler::new(|event: RequestEvent| async move {
    event.set_cookie(cookie::Cookie::new("session", "abc"));
    Err::<&'static str, _>(Interrupt::redirect("/dashboard", StatusCode::SEE_OTHER))
  });
  let manifest = VesselServer::new()
    .http(HttpRoute::new("login", "/login", ready(HttpModule::new().post(login))))
    .into_manifest();
  let res = dispatch(&manifest, request(Method::POST, "/login")).await;
  assert_eq!(res.status(), StatusCode::SEE_OTHER);
  assert_eq!(header(&res, LOCATION), Some("/dashboard"));
  assert!(header(&res, SET_COOKIE).unwrap().starts_with("session=abc"));
  assert!(header(&res, X_VESSEL_ERROR).is_none());
}

#[tokio::test]
async fn handler_headers_and_cookies_are_attached() {
  let handler = Handler::new(|event: RequestEvent| async move {
    event.set_header(::http::header::CACHE_CONTROL, HeaderValue::from_static("max-age=60"));
    event.set_cookie(cookie::Cookie::new("seen", "1"));
    Ok::<_, Interrupt>(json!({"ok": true}))
  });
  let manifest = VesselServer::new()
    .http(HttpRoute::new("h", "/h", ready(HttpModule::new().get(handler))))
    .into_manifest();
  let res = dispatch(&manifest, get("/h")).await;
  assert_eq!(header(&res, ::http::header::CACHE_CONTROL), Some("max-age=60"));
  assert_eq!(header(&res, SET_COOKIE), Some("seen=1"));
  assert_eq!(body_json(&res), json!({"ok": true}));
}

#[tokio::test]
async fn handler_middleware_wraps_response() {
  let handler = text("inner").middleware(|event: RequestEvent, next: Next| async move {
    let mut res = next(event).await?;
    res.headers_mut().insert("x-wrapped", HeaderValue::from_static("1"));
    Ok::<_, Interrupt>(res)
  });
  let manifest = VesselServer::new()
    .http(HttpRoute::new("m", "/m", ready(HttpModule::new().get(handler))))
    .into_manifest();
  let res = dispatch(&manifest, get("/m")).await;
  assert_eq!(body_text(&res), "inner");
  assert_eq!(header(&res, "x-wrapped"), Some("1"));
}

#[tokio::test]
async fn module_load_failure_is_unexpected() {
  let loader = crate::module::lazy(|| async { Err::<HttpModule, _>(anyhow::anyhow!("chunk missing")) });
  let manifest = VesselServer::new().http(HttpRoute::new("l", "/l", loader)).into_manifest();
  let res = dispatch(&manifest, get("/l")).await;
  assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn fetcher_reenters_http_routes() {
  let inner = Handler::new(|event: RequestEvent| async move {
    let seen = event.cookie("outer").unwrap_or_default();
    Ok::<_, Interrupt>(json!({"n": 1, "seen": seen}))
  });
  let outer = Handler::new(|event: RequestEvent| async move {
    event.set_cookie(cookie::Cookie::new("outer", "set"));
    let fetcher = event.fetcher().ok_or_else(|| HttpError::internal("no fetcher"))?;
    let inner = fetcher.fetch(get("/api/inner")).await?;
    let missing = fetcher.fetch(get("/api/nope")).await?;
    let body: Value = serde_json::from_slice(inner.body()).map_err(anyhow::Error::from)?;
    Ok::<_, Interrupt>(json!({"inner": body, "missing": missing.status().as_u16()}))
  });
  let manifest = VesselServer::new()
    .http(HttpRoute::new("inner", "/api/inner", ready(HttpModule::new().get(inner))))
    .http(HttpRoute::new("outer", "/api/outer", ready(HttpModule::new().get(outer))))
    .into_manifest();
  let res = dispatch(&manifest, get("/api/outer")).await;
  assert_eq!(res.status(), StatusCode::OK);
  // The nested event starts from its own request, not the outer event's state.
  assert_eq!(body_json(&res), json!({"inner": {"n": 1, "seen": ""}, "missing": 404}));
}

// -- Data requests --

#[tokio::test]
async fn data_request_without_loader() {
  let res = dispatch(&app(false), get("/about?_data&route_id=about&route_type=page")).await;
  assert_eq!(res.status(), StatusCode::OK);
  assert_eq!(header(&res, X_VESSEL_DATA), Some("no"));
  assert!(res.body().is_empty());
}

#[tokio::test]
async fn data_request_runs_loader() {
  let res = dispatch(&app(false), get("/blog/hello?_data&route_id=blog&route_type=page")).await;
  assert_eq!(res.status(), StatusCode::OK);
  assert_eq!(header(&res, X_VESSEL_DATA), Some("yes"));
  assert_eq!(body_json(&res), json!({"slug": "hello"}));
}

#[tokio::test]
async fn data_request_for_layout_of_current_page() {
  let res = dispatch(&app(false), get("/blog/hello?_data&route_id=root&route_type=layout")).await;
  assert_eq!(header(&res, X_VESSEL_DATA), Some("yes"));
  assert_eq!(body_json(&res), json!({"user": "ada"}));
}

#[tokio::test]
async fn data_request_unknown_route_or_type() {
  let manifest = app(false);
  for uri in [
    "/blog/hello?_data&route_id=nope&route_type=page",
    "/blog/hello?_data&route_id=blog&route_type=layout",
    "/blog/hello?_data&route_id=blog&route_type=widget",
    "/about?_data&route_id=blog&route_type=page",
  ] {
    let res = dispatch(&manifest, get(uri)).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND, "{uri}");
    assert_eq!(header(&res, X_VESSEL_ERROR), Some("yes"));
  }
}

#[tokio::test]
async fn data_redirect_is_client_navigable() {
  let res = dispatch(&app(false), get("/account?_data&route_id=account&route_type=page")).await;
  assert_eq!(res.status(), StatusCode::OK);
  assert_eq!(header(&res, X_VESSEL_REDIRECT), Some("/login"));
  assert_eq!(body_json(&res), json!({"redirect": {"path": "/login", "status": 303}}));
}

// -- Documents --

#[tokio::test]
async fn document_runs_layout_then_page_loaders() {
  let res = dispatch(&app(false), get("/blog/hello")).await;
  assert_eq!(res.status(), StatusCode::OK);
  assert!(header(&res, CONTENT_TYPE).unwrap().starts_with("text/html"));
  let html = body_text(&res);
  assert!(html.contains(r#"<script id="__VESSEL_DATA__" type="application/json">"#));
  assert!(html.contains(r#""_layouts":{"root":{"user":"ada"}}"#));
  assert!(html.contains(r#""page":{"slug":"hello"}"#));
}

#[tokio::test]
async fn document_redirect_is_raw() {
  let res = dispatch(&app(false), get("/account")).await;
  assert_eq!(res.status(), StatusCode::SEE_OTHER);
  assert_eq!(header(&res, LOCATION), Some("/login"));
}

#[tokio::test]
async fn document_not_found() {
  let res = dispatch(&app(false), get("/nowhere")).await;
  assert_eq!(res.status(), StatusCode::NOT_FOUND);
  assert_eq!(header(&res, X_VESSEL_EXPECTED), Some("yes"));
}

#[tokio::test]
async fn custom_renderer() {
  let handler = VesselServer::new()
    .app(AppRoute::new("about", "/about").page(ready(ComponentModule::new())))
    .renderer(title_renderer)
    .into_handler();
  let res = handler(get("/about")).await;
  assert_eq!(body_text(&res), "<h1>about</h1>");
}

#[tokio::test]
async fn http_routes_win_over_pages() {
  let manifest = VesselServer::new()
    .http(HttpRoute::new("feed", "/blog/feed", ready(HttpModule::new().get(text("rss")))))
    .app(AppRoute::new("blog", "/blog/:slug").page(ready(ComponentModule::new())))
    .into_manifest();
  let res = dispatch(&manifest, get("/blog/feed")).await;
  assert_eq!(body_text(&res), "rss");
}
