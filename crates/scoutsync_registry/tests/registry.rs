//! Registry reader tests against canned registry payloads.

use scoutsync_core::{Auth, HttpResponse, Method};
use scoutsync_registry::{RegistryClient, RegistryConfig, RegistryError};
use scoutsync_testkit::{
    customlists_url, empty_members_payload, list_url, memberlist_url, registry_client,
    CannedHttpClient, REGISTRY_ENDPOINT,
};
use serde_json::json;

fn config() -> RegistryConfig {
    RegistryConfig::new("1234")
        .with_endpoint(REGISTRY_ENDPOINT)
        .with_lists_key("lists-key")
        .with_users_key("users-key")
}

#[test]
fn fetch_lists_reads_members_and_aliases() {
    let registry = RegistryClient::new(registry_client(), config());

    let lists = registry.fetch_lists(None).unwrap();

    // The third list has no aliases and is left out.
    assert_eq!(lists.len(), 2);

    let ledare = &lists[0];
    assert_eq!(ledare.id, "ledare");
    assert_eq!(ledare.title.as_deref(), Some("Ledare"));
    assert_eq!(ledare.aliases, vec!["ledare@example.com"]);
    let members: Vec<&str> = ledare.members.iter().map(String::as_str).collect();
    assert_eq!(
        members,
        vec![
            "anna.berg@example.com",
            "anna@googlemail.com",
            "bo+scouts@gmail.com",
            "bo@example.com",
        ]
    );

    let utmanare = &lists[1];
    assert_eq!(utmanare.id, "utmanare");
    assert_eq!(
        utmanare.aliases,
        vec!["utmanare@example.com", "utmanare@other.org"]
    );
}

#[test]
fn fetch_lists_uses_list_key() {
    let client = registry_client();
    let registry = RegistryClient::new(&client, config());
    registry.fetch_lists(None).unwrap();

    let requests = client.requests();
    assert_eq!(requests[0].url, customlists_url());
    for request in &requests {
        assert_eq!(request.method, Method::Get);
        assert_eq!(
            request.auth,
            Some(Auth::Basic {
                username: "1234".into(),
                password: "lists-key".into(),
            })
        );
    }
}

#[test]
fn limit_counts_fetched_lists() {
    let client = registry_client();
    let registry = RegistryClient::new(&client, config());

    let lists = registry.fetch_lists(Some(1)).unwrap();

    assert_eq!(lists.len(), 1);
    assert_eq!(client.hits(&list_url(11)), 1);
    assert_eq!(client.hits(&list_url(12)), 0);
}

#[test]
fn limit_follows_registry_order() {
    let client = CannedHttpClient::new()
        .route_json(
            customlists_url(),
            json!({
                "2": {
                    "link": list_url(2),
                    "list_email_key": "two",
                    "aliases": {"1": "two@example.com"}
                },
                "10": {
                    "link": list_url(10),
                    "list_email_key": "ten",
                    "aliases": {"1": "ten@example.com"}
                }
            }),
        )
        .route_json(list_url(2), empty_members_payload())
        .route_json(list_url(10), empty_members_payload());
    let registry = RegistryClient::new(&client, config());

    let lists = registry.fetch_lists(Some(1)).unwrap();

    let ids: Vec<&str> = lists.iter().map(|list| list.id.as_str()).collect();
    assert_eq!(ids, vec!["two"]);
    assert_eq!(client.hits(&list_url(10)), 0);
}

#[test]
fn fetch_users_reads_every_record() {
    let client = registry_client();
    let registry = RegistryClient::new(&client, config());

    let mut users = registry.fetch_users().unwrap();
    users.sort_by(|a, b| a.member_no.cmp(&b.member_no));

    assert_eq!(users.len(), 5);
    assert_eq!(users[0].member_no, "3001");
    assert_eq!(users[0].unit.as_deref(), Some("Spårarna"));
    assert_eq!(users[0].mobile.as_deref(), Some("070-1234567"));
    assert_eq!(users[1].member_no, "3002");
    assert_eq!(users[2].email_primary, None);

    let request = &client.requests()[0];
    assert_eq!(request.url, memberlist_url());
    assert!(matches!(
        &request.auth,
        Some(Auth::Basic { password, .. }) if password == "users-key"
    ));
}

#[test]
fn failed_list_read_is_an_error() {
    let client = CannedHttpClient::new().route(
        Method::Get,
        customlists_url(),
        HttpResponse::new(401, "bad key"),
    );
    let registry = RegistryClient::new(client, config());

    let err = registry.fetch_lists(None).unwrap_err();
    assert_eq!(err.status(), Some(401));
}

#[test]
fn unreachable_registry_is_a_request_error() {
    let client = CannedHttpClient::new().route_transport_error(
        Method::Get,
        memberlist_url(),
        "connection refused",
    );
    let registry = RegistryClient::new(client, config());

    let err = registry.fetch_users().unwrap_err();
    assert!(matches!(err, RegistryError::Request { .. }));
    assert_eq!(err.status(), None);
    assert!(err.to_string().contains("connection refused"));
}

#[test]
fn unexpected_member_payload_is_malformed() {
    let client = CannedHttpClient::new().route_json(memberlist_url(), json!({"rows": []}));
    let registry = RegistryClient::new(client, config());

    assert!(matches!(
        registry.fetch_users(),
        Err(RegistryError::Malformed { .. })
    ));
}
