use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use http::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use http::{Request, Response, StatusCode};
use pluglet_core::{PlugletFactory, PluginConfig, PluginDomain};
use pluglet_framework::strategy_pipeline;
use pluglet_security::{
    Account, Application, ManualClock, SecurityService, SecuritySettings, StaticDirectory,
    TENANT_HEADER, router,
};
use serde_json::Value;
use tower::ServiceExt;
use url::Url;

const AUTHORIZE: &str = "/sso/oauth2/authorize?client_id=crm\
    &redirect_uri=https%3A%2F%2Fcrm.example.com%2Fcrm%2Fcallback&scope=basic+contact&state=xyz";

struct Harness {
    app: Router,
    service: Arc<SecurityService>,
    clock: Arc<ManualClock>,
}

fn strategy(id: &str, type_code: &str, params: &str) -> PluginConfig {
    PluginConfig {
        id: id.into(),
        tenant_code: "master".into(),
        domain: PluginDomain::Strategy,
        type_code: type_code.into(),
        name: type_code.into(),
        params: params.into(),
        priority: 0,
        enabled: true,
    }
}

async fn harness(strategies: Vec<PluginConfig>) -> Harness {
    let directory = StaticDirectory::new()
        .with_application(
            "master",
            Application {
                code: "crm".into(),
                name: "CRM".into(),
                secret: "crm-secret".into(),
                url: "https://crm.example.com".into(),
                context_path: "/crm".into(),
                enabled: true,
            },
        )
        .with_application(
            "master",
            Application {
                code: "legacy".into(),
                name: "Legacy portal".into(),
                secret: "legacy-secret".into(),
                url: "https://legacy.example.com".into(),
                context_path: "/legacy".into(),
                enabled: false,
            },
        )
        .with_account(
            "master",
            Account {
                id: "u1".into(),
                username: "syssa".into(),
                name: "System Administrator".into(),
                avatar: None,
                email: Some("syssa@example.com".into()),
                mobile: Some("13800000000".into()),
            },
            "x.123456",
        );

    let pipeline = Arc::new(strategy_pipeline(Arc::new(PlugletFactory::new())));
    pipeline.load_tenant("master", strategies).await.unwrap();

    let settings = SecuritySettings {
        external_url: "https://sso.example.com".into(),
        ..SecuritySettings::default()
    };
    let clock = Arc::new(ManualClock::default());
    let service = Arc::new(SecurityService::new(
        settings,
        pipeline,
        Arc::new(directory),
        clock.clone(),
    ));
    Harness {
        app: router(Arc::clone(&service)),
        service,
        clock,
    }
}

impl Harness {
    fn session(&self) -> String {
        let session = self
            .service
            .sessions()
            .issue("master", "u1", "test", Duration::from_secs(600));
        format!("Authorization={}", session.token)
    }

    async fn get(&self, uri: &str, cookies: &[&str]) -> Response<Body> {
        let request = Request::get(uri)
            .header(COOKIE, cookies.join("; "))
            .body(Body::empty())
            .unwrap();
        self.app.clone().oneshot(request).await.unwrap()
    }

    async fn post(&self, uri: &str, cookies: &[&str], form: &str) -> Response<Body> {
        let request = Request::post(uri)
            .header(COOKIE, cookies.join("; "))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form.to_owned()))
            .unwrap();
        self.app.clone().oneshot(request).await.unwrap()
    }

    /// Opens a transaction, records the decision and returns its cookie.
    async fn decide(&self, session: &str, granted: bool) -> String {
        let response = self.get(AUTHORIZE, &[session]).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        let transaction = set_cookie(&response, "oauth_transaction").unwrap();
        let transaction = format!("oauth_transaction={transaction}");

        let form = format!("granted={granted}&scopes=contact");
        let response = self.post("/sso/oauth2/scopes", &[session, &transaction], &form).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), format!("https://sso.example.com{AUTHORIZE}"));
        transaction
    }

    /// Runs the whole consent flow and returns the issued code.
    async fn code(&self, session: &str) -> String {
        let transaction = self.decide(session, true).await;
        let response = self.get(AUTHORIZE, &[session, &transaction]).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        query_param(&location(&response), "code").unwrap()
    }

    async fn redeem(&self, code: &str) -> Response<Body> {
        let form = format!("code={code}&client_id=crm&client_secret=crm-secret");
        self.post("/sso/oauth2/access_token", &[], &form).await
    }
}

fn set_cookie(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.to_owned())
}

fn transaction_cookie(response: &Response<Body>) -> String {
    format!("oauth_transaction={}", set_cookie(response, "oauth_transaction").unwrap())
}

fn location(response: &Response<Body>) -> String {
    response.headers()[LOCATION].to_str().unwrap().to_owned()
}

fn query_param(url: &str, name: &str) -> Option<String> {
    Url::parse(url)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

async fn json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn full_consent_flow_issues_a_scoped_token() {
    let harness = harness(vec![]).await;
    let session = harness.session();

    let response = harness.get(AUTHORIZE, &[&session]).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let login = location(&response);
    assert!(login.starts_with("https://sso.example.com/sso/login?redirect_uri="), "{login}");
    assert_eq!(
        query_param(&login, "redirect_uri").unwrap(),
        format!("https://sso.example.com{AUTHORIZE}")
    );
    let transaction = transaction_cookie(&response);

    let response = harness.get("/sso/oauth2/scopes", &[&session, &transaction]).await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = json(response).await;
    assert_eq!(page["application"]["code"], "crm");
    assert_eq!(page["account"]["username"], "syssa");
    assert_eq!(page["scopes"][0]["name"], "basic");
    assert_eq!(page["scopes"][0]["required"], true);
    assert_eq!(page["scopes"][1]["name"], "contact");

    let response = harness
        .post("/sso/oauth2/scopes", &[&session, &transaction], "granted=true&scopes=contact")
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let response = harness.get(AUTHORIZE, &[&session, &transaction]).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(set_cookie(&response, "oauth_transaction").as_deref(), Some(""));
    let callback = location(&response);
    assert!(callback.starts_with("https://crm.example.com/crm/callback?"), "{callback}");
    assert_eq!(query_param(&callback, "state").as_deref(), Some("xyz"));
    let code = query_param(&callback, "code").unwrap();
    assert!(code.starts_with("OC-"), "{code}");

    let response = harness.redeem(&code).await;
    assert_eq!(response.status(), StatusCode::OK);
    let token = json(response).await;
    assert_eq!(token["token_type"], "Bearer");
    assert_eq!(token["scope"], "basic contact");
    assert!(token["expires_in"].as_i64().unwrap() > 0);
    let access_token = token["access_token"].as_str().unwrap().to_owned();

    let request = Request::get("/sso/oauth2/user")
        .header(AUTHORIZATION, format!("Bearer {access_token}"))
        .body(Body::empty())
        .unwrap();
    let response = harness.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let user = json(response).await;
    assert_eq!(user["id"], "u1");
    assert_eq!(user["email"], "syssa@example.com");
}

#[tokio::test]
async fn basic_only_grant_hides_contact_fields() {
    let harness = harness(vec![]).await;
    let session = harness.session();

    let response = harness.get(AUTHORIZE, &[&session]).await;
    let transaction = transaction_cookie(&response);
    harness
        .post("/sso/oauth2/scopes", &[&session, &transaction], "granted=true")
        .await;
    let response = harness.get(AUTHORIZE, &[&session, &transaction]).await;
    let code = query_param(&location(&response), "code").unwrap();

    let token = json(harness.redeem(&code).await).await;
    assert_eq!(token["scope"], "basic");

    let request = Request::get("/sso/oauth2/user")
        .header(AUTHORIZATION, format!("Bearer {}", token["access_token"].as_str().unwrap()))
        .body(Body::empty())
        .unwrap();
    let user = json(harness.app.clone().oneshot(request).await.unwrap()).await;
    assert_eq!(user["username"], "syssa");
    assert!(user.get("email").is_none());
}

#[tokio::test]
async fn codes_redeem_once() {
    let harness = harness(vec![]).await;
    let session = harness.session();
    let code = harness.code(&session).await;

    assert_eq!(harness.redeem(&code).await.status(), StatusCode::OK);
    let response = harness.redeem(&code).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["error"], "invalid_grant");
}

#[tokio::test]
async fn concurrent_redemptions_have_one_winner() {
    let harness = Arc::new(harness(vec![]).await);
    let session = harness.session();
    let code = harness.code(&session).await;

    let attempts: Vec<_> = (0..8)
        .map(|_| {
            let harness = Arc::clone(&harness);
            let code = code.clone();
            tokio::spawn(async move { harness.redeem(&code).await.status() })
        })
        .collect();

    let mut successes = 0;
    for attempt in attempts {
        if attempt.await.unwrap() == StatusCode::OK {
            successes += 1;
        }
    }
    assert_eq!(successes, 1);
}

#[tokio::test]
async fn expired_code_is_rejected() {
    let harness = harness(vec![]).await;
    let session = harness.session();
    let code = harness.code(&session).await;

    harness.clock.advance(Duration::from_secs(181));
    let response = harness.redeem(&code).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["error"], "invalid_grant");
}

#[tokio::test]
async fn wrong_secret_is_an_invalid_client() {
    let harness = harness(vec![]).await;
    let session = harness.session();
    let code = harness.code(&session).await;

    let form = format!("code={code}&client_id=crm&client_secret=guess");
    let response = harness.post("/sso/oauth2/access_token", &[], &form).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["error"], "invalid_client");

    assert_eq!(harness.redeem(&code).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn denial_redirects_without_code() {
    let harness = harness(vec![]).await;
    let session = harness.session();
    let transaction = harness.decide(&session, false).await;

    let response = harness.get(AUTHORIZE, &[&session, &transaction]).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let callback = location(&response);
    assert_eq!(query_param(&callback, "error").as_deref(), Some("access_denied"));
    assert_eq!(query_param(&callback, "state").as_deref(), Some("xyz"));
    assert_eq!(query_param(&callback, "code"), None);
}

#[tokio::test]
async fn altered_request_is_tampering() {
    let harness = harness(vec![]).await;
    let session = harness.session();
    let transaction = harness.decide(&session, true).await;

    let altered = AUTHORIZE.replace("state=xyz", "state=abc");
    let response = harness.get(&altered, &[&session, &transaction]).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(set_cookie(&response, "oauth_transaction").as_deref(), Some(""));
    assert_eq!(json(response).await["error"], "tamper_detected");

    let response = harness.get(AUTHORIZE, &[&session, &transaction]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["error"], "invalid_transaction");
}

#[tokio::test]
async fn unknown_transaction_is_rejected() {
    let harness = harness(vec![]).await;
    let session = harness.session();
    let response = harness.get(AUTHORIZE, &[&session, "oauth_transaction=missing"]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["error"], "invalid_transaction");
}

#[tokio::test]
async fn expired_transaction_is_treated_as_absent() {
    let harness = harness(vec![]).await;
    let session = harness.session();
    let transaction = harness.decide(&session, true).await;

    harness.clock.advance(Duration::from_secs(6 * 60));

    let response = harness.get(AUTHORIZE, &[&session, &transaction]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["error"], "invalid_transaction");
}

#[tokio::test]
async fn client_and_redirect_are_checked() {
    let harness = harness(vec![]).await;

    let response = harness.get(&AUTHORIZE.replace("client_id=crm", "client_id=erp"), &[]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["error"], "invalid_client");

    let disabled = "/sso/oauth2/authorize?client_id=legacy\
        &redirect_uri=https%3A%2F%2Flegacy.example.com%2Flegacy%2Fcallback";
    let response = harness.get(disabled, &[]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["error"], "invalid_client");

    let response = harness
        .get(&AUTHORIZE.replace("crm.example.com", "evil.example.com"), &[])
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["error"], "invalid_redirect_uri");

    let request = Request::get(AUTHORIZE)
        .header(TENANT_HEADER, "other")
        .body(Body::empty())
        .unwrap();
    let response = harness.app.clone().oneshot(request).await.unwrap();
    assert_eq!(json(response).await["error"], "invalid_client");
}

#[tokio::test]
async fn redirect_prefix_ignores_case() {
    let harness = harness(vec![]).await;
    let response = harness
        .get(&AUTHORIZE.replace("crm.example.com%2Fcrm", "CRM.example.com%2FCrm"), &[])
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn disabled_strategy_refuses_authorization() {
    let harness = harness(vec![strategy("1", "oauth", r#"{"enabled": false}"#)]).await;
    let response = harness.get(AUTHORIZE, &[]).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json(response).await["error"], "oauth_disabled");
}

#[tokio::test]
async fn auto_granting_skips_consent() {
    let harness = harness(vec![strategy("1", "oauth", r#"{"auto_granting": true}"#)]).await;

    let response = harness.get(AUTHORIZE, &[]).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(location(&response).starts_with("https://sso.example.com/sso/login?"));
    assert_eq!(set_cookie(&response, "oauth_transaction"), None);

    let session = harness.session();
    let response = harness.get(AUTHORIZE, &[&session]).await;
    let callback = location(&response);
    assert!(query_param(&callback, "code").is_some(), "{callback}");

    let code = query_param(&callback, "code").unwrap();
    assert_eq!(json(harness.redeem(&code).await).await["scope"], "basic contact");
}

#[tokio::test]
async fn consent_requires_a_session() {
    let harness = harness(vec![]).await;
    let response = harness.get(AUTHORIZE, &[]).await;
    let transaction = transaction_cookie(&response);

    let response = harness.get("/sso/oauth2/scopes", &[&transaction]).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let response = harness
        .post("/sso/oauth2/scopes", &[&transaction], "granted=true")
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn user_requires_a_live_token() {
    let harness = harness(vec![]).await;
    let response = harness.get("/sso/oauth2/user", &[]).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::get("/sso/oauth2/user")
        .header(AUTHORIZATION, "Bearer AT-unknown")
        .body(Body::empty())
        .unwrap();
    let response = harness.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_uses_the_session_strategy() {
    let session = strategy("1", "session", r#"{"timeout": 5, "issuer": "central"}"#);
    let harness = harness(vec![session]).await;

    let response = harness
        .post("/sso/login", &[], "username=syssa&password=wrong")
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = harness
        .post("/sso/login", &[], "username=syssa&password=x.123456")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let token = set_cookie(&response, "Authorization").unwrap();
    assert!(response.headers()[SET_COOKIE].to_str().unwrap().contains("Max-Age=300"));
    assert_eq!(json(response).await["issuer"], "central");

    let session = harness.service.sessions().verify("master", &token).unwrap();
    assert_eq!(session.account_id, "u1");

    let form = format!(
        "username=syssa&password=x.123456&redirect_uri={}",
        url::form_urlencoded::byte_serialize(
            format!("https://sso.example.com{AUTHORIZE}").as_bytes()
        )
        .collect::<String>()
    );
    let response = harness.post("/sso/login", &[], &form).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), format!("https://sso.example.com{AUTHORIZE}"));
}

#[tokio::test]
async fn password_change_follows_the_policy() {
    let password = strategy("1", "password", r#"{"uppercase": 1, "numbers": 2}"#);
    let harness = harness(vec![password]).await;
    let session = harness.session();

    let response = harness
        .post("/sso/password", &[&session], "password=x.123456&new_password=weakpass")
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["error"], "invalid_password");

    let response = harness
        .post("/sso/password", &[&session], "password=x.123456&new_password=Secret12")
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = harness
        .post("/sso/login", &[], "username=syssa&password=Secret12")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn sweep_drops_expired_records() {
    let harness = harness(vec![]).await;
    let session = harness.session();
    harness.get(AUTHORIZE, &[&session]).await;

    harness.clock.advance(Duration::from_secs(3600));
    assert_eq!(harness.service.sweep(), 2);
}
