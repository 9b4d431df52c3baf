//! Test fixtures and HTTP helpers.
//!
//! Provides a routing `HttpClient`, registry payloads shaped like the real
//! service, and small builders for common test scenarios.

use parking_lot::Mutex;
use scoutsync_core::{DirectoryGroup, HttpClient, HttpError, HttpRequest, HttpResponse, Method};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Registry endpoint used by the payload fixtures.
pub const REGISTRY_ENDPOINT: &str = "https://registry.test/api";

/// Domain used by the fixtures.
pub const TEST_DOMAIN: &str = "example.com";

enum Reply {
    Response(HttpResponse),
    Transport(String),
}

struct Route {
    method: Method,
    url: String,
    reply: Reply,
}

/// An `HttpClient` that answers from fixed routes.
///
/// Routes match on method and the exact URL (query parameters are ignored).
/// Unrouted requests get a 404. Every request is recorded.
#[derive(Default)]
pub struct CannedHttpClient {
    routes: Vec<Route>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl CannedHttpClient {
    /// Creates a client with no routes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers `method url` with `response`.
    pub fn route(
        mut self,
        method: Method,
        url: impl Into<String>,
        response: HttpResponse,
    ) -> Self {
        self.routes.push(Route {
            method,
            url: url.into(),
            reply: Reply::Response(response),
        });
        self
    }

    /// Answers `GET url` with a 200 JSON body.
    pub fn route_json(self, url: impl Into<String>, body: Value) -> Self {
        self.route(Method::Get, url, HttpResponse::json_ok(&body))
    }

    /// Fails `method url` without a response.
    pub fn route_transport_error(
        mut self,
        method: Method,
        url: impl Into<String>,
        message: &str,
    ) -> Self {
        self.routes.push(Route {
            method,
            url: url.into(),
            reply: Reply::Transport(message.to_string()),
        });
        self
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests received for `url`.
    pub fn hits(&self, url: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.url == url).count()
    }
}

impl HttpClient for CannedHttpClient {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
        self.requests.lock().push(request.clone());
        let route = self
            .routes
            .iter()
            .find(|route| route.method == request.method && route.url == request.url);
        match route.map(|route| &route.reply) {
            Some(Reply::Response(response)) => Ok(response.clone()),
            Some(Reply::Transport(message)) => Err(HttpError::transport(message.clone())),
            None => Ok(HttpResponse::new(404, format!("no route for {}", request.url))),
        }
    }
}

/// URL of the custom-lists index.
pub fn customlists_url() -> String {
    format!("{REGISTRY_ENDPOINT}/group/customlists")
}

/// URL of the member list.
pub fn memberlist_url() -> String {
    format!("{REGISTRY_ENDPOINT}/group/memberlist")
}

/// URL of one custom list's members.
pub fn list_url(id: u32) -> String {
    format!("{REGISTRY_ENDPOINT}/group/customlists?list_id={id}")
}

/// A custom-lists index with three lists: `ledare` (duplicated alias),
/// `utmanare` (one foreign alias) and one list without aliases or key.
pub fn customlists_payload() -> Value {
    json!({
        "11": {
            "link": list_url(11),
            "title": "Ledare",
            "description": "Alla ledare\n= aktiva",
            "list_email_key": "ledare",
            "aliases": {"1": "ledare@example.com", "2": "ledare@example.com"}
        },
        "12": {
            "link": list_url(12),
            "title": "Utmanare",
            "list_email_key": "utmanare",
            "aliases": {"1": "utmanare@example.com", "2": "utmanare@other.org"}
        },
        "13": {
            "link": list_url(13),
            "title": "Utan alias",
            "aliases": {}
        }
    })
}

/// Members of the `ledare` list, covering extra addresses given as an
/// array and as a JSON string, and a member without an address.
pub fn ledare_members_payload() -> Value {
    json!({
        "data": {
            "3001": {
                "email": {"value": "Anna.Berg@Example.com"},
                "first_name": {"value": "Anna"},
                "last_name": {"value": "Berg"},
                "extra_emails": {"value": ["anna@googlemail.com"]}
            },
            "3002": {
                "email": {"value": "bo@example.com"},
                "first_name": {"value": "Bo"},
                "last_name": {"value": "Ek"},
                "extra_emails": {"value": "[\"Bo+scouts@gmail.com\"]"}
            },
            "3003": {
                "first_name": {"value": "Cia"},
                "last_name": {"value": "Lind"}
            }
        }
    })
}

/// Members of the `utmanare` list.
pub fn utmanare_members_payload() -> Value {
    json!({
        "data": {
            "4001": {
                "email": {"value": "dan@example.com"},
                "first_name": {"value": "Dan"},
                "last_name": {"value": "Ros"}
            }
        }
    })
}

/// An empty list.
pub fn empty_members_payload() -> Value {
    json!({ "data": {} })
}

/// A member list with two adults, a youth in a youth unit, a youth in
/// another unit and an adult in the "other members" unit.
pub fn memberlist_payload() -> Value {
    json!({
        "data": {
            "3001": {
                "member_no": {"value": 3001},
                "first_name": {"value": "Anna"},
                "last_name": {"value": "Berg"},
                "email": {"value": "anna.berg@example.com"},
                "unit": {"value": "Spårarna"},
                "date_of_birth": {"value": "1980-04-01"},
                "group_role": {"value": "Avdelningsledare"},
                "contact_mobile_phone": {"value": "070-1234567"}
            },
            "3002": {
                "member_no": {"value": "3002"},
                "first_name": {"value": "Bo"},
                "last_name": {"value": "Ek"},
                "email": {"value": "bo@example.com"},
                "unit": {"value": "Upptäckarna"},
                "date_of_birth": {"value": "1990-12-31"}
            },
            "3003": {
                "member_no": {"value": 3003},
                "first_name": {"value": "Cia"},
                "last_name": {"value": "Lind"},
                "unit": {"value": "Utmanarna"},
                "date_of_birth": {"value": "2010-06-15"}
            },
            "3004": {
                "member_no": {"value": 3004},
                "first_name": {"value": "Dan"},
                "last_name": {"value": "Ros"},
                "unit": {"value": "Spårarna"},
                "date_of_birth": {"value": "2015-01-01"}
            },
            "3005": {
                "member_no": {"value": 3005},
                "first_name": {"value": "Eva"},
                "last_name": {"value": "Sund"},
                "unit": {"value": "Övriga kårmedlemmar"},
                "date_of_birth": {"value": "1970-03-03"}
            }
        }
    })
}

/// A client serving every registry fixture.
pub fn registry_client() -> CannedHttpClient {
    CannedHttpClient::new()
        .route_json(customlists_url(), customlists_payload())
        .route_json(list_url(11), ledare_members_payload())
        .route_json(list_url(12), utmanare_members_payload())
        .route_json(list_url(13), empty_members_payload())
        .route_json(memberlist_url(), memberlist_payload())
}

/// A group whose title carries the default managed tag and whose only
/// alias is its own address.
pub fn managed_group(address: &str) -> DirectoryGroup {
    let name = address.split('@').next().unwrap_or(address);
    DirectoryGroup::new(address)
        .with_title(format!("{name} (Scoutnet)"))
        .with_alias(address)
}

/// A managed group with `members`.
pub fn managed_group_with_members(address: &str, members: &[&str]) -> DirectoryGroup {
    managed_group(address).with_members(members.iter().copied())
}

/// A file in a temporary directory, removed on drop.
pub struct TempFile {
    path: PathBuf,
    _dir: TempDir,
}

impl TempFile {
    /// Writes `contents` to `name` inside a fresh temporary directory.
    pub fn with_contents(name: &str, contents: &str) -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = dir.path().join(name);
        std::fs::write(&path, contents).expect("Failed to write temp file");
        Self { path, _dir: dir }
    }

    /// A path in a fresh temporary directory where nothing exists yet.
    pub fn missing(name: &str) -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        Self {
            path: dir.path().join(name),
            _dir: dir,
        }
    }

    /// The file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
