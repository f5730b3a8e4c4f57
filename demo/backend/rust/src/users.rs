/* demo/backend/rust/src/users.rs */

use serde::{Deserialize, Serialize};
use vessel_server::{Handler, HttpError, HttpModule, HttpRoute, Interrupt, RequestEvent, ready};

#[derive(Serialize)]
struct User {
  id: u32,
  name: &'static str,
  email: &'static str,
  #[serde(skip_serializing_if = "Option::is_none")]
  avatar: Option<&'static str>,
}

const USERS: &[User] = &[
  User { id: 1, name: "Alice", email: "alice@example.com", avatar: Some("https://example.com/alice.png") },
  User { id: 2, name: "Bob", email: "bob@example.com", avatar: None },
  User { id: 3, name: "Charlie", email: "charlie@example.com", avatar: None },
];

#[derive(Deserialize)]
struct Greeting {
  name: String,
}

/// `GET /api/users`, `GET /api/users/:id`.
pub fn route() -> HttpRoute {
  let get = Handler::new(|event: RequestEvent| async move {
    let Some(id) = event.param("id") else {
      return Ok::<_, Interrupt>(serde_json::to_value(USERS).map_err(anyhow::Error::from)?);
    };
    let id: u32 = id.parse().map_err(|_| HttpError::bad_request(format!("invalid user id '{id}'")))?;
    let user = USERS
      .iter()
      .find(|u| u.id == id)
      .ok_or_else(|| HttpError::not_found(format!("User {id} not found")))?;
    Ok(serde_json::to_value(user).map_err(anyhow::Error::from)?)
  });
  HttpRoute::new("users", "/api/users/:id?", ready(HttpModule::new().get(get)))
}

/// `POST /api/greet` with `{"name": "..."}`.
pub fn greet_route() -> HttpRoute {
  let post = Handler::new(|event: RequestEvent| async move {
    let input: Greeting = serde_json::from_slice(event.request().body())
      .map_err(|e| HttpError::bad_request(e.to_string()))?;
    Ok::<_, Interrupt>(serde_json::json!({ "message": format!("Hello, {}!", input.name) }))
  });
  HttpRoute::new("greet", "/api/greet", ready(HttpModule::new().post(post)))
}
