//! Orchestrator Flow Tests
//!
//! Runs whole provisioning plans against an in-memory session that answers
//! like the admin API would, and checks that every step runs and reports.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use iam_provisioner::{
    AdminError, AdminSession, ApiError, Diagnostic, ErrorBody, Orchestrator, ProgressEvent,
    ProgressSink, ProvisionOutcome, ProvisioningPlan, RemoteResponse, Step, StepResult,
};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

/// Session that keeps created resources in memory
///
/// Collections answer 201 (204 for roles) on first creation and 409 after.
/// Anything under a realm that does not exist answers 404.
struct FakeSession {
    token: String,
    realms: Mutex<HashSet<String>>,
    created: Mutex<HashSet<String>>,
    overrides: HashMap<String, RemoteResponse>,
    requests: Mutex<Vec<String>>,
}

impl FakeSession {
    fn new() -> Self {
        let header = URL_SAFE_NO_PAD.encode(json!({"alg": "RS256", "typ": "JWT"}).to_string());
        let payload = URL_SAFE_NO_PAD.encode(
            json!({"sub": "abc", "preferred_username": "alice", "given_name": "Alice"})
                .to_string(),
        );
        Self {
            token: format!("{}.{}.c2ln", header, payload),
            realms: Mutex::new(HashSet::new()),
            created: Mutex::new(HashSet::new()),
            overrides: HashMap::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer requests to `path` with a fixed response
    fn answering(mut self, path: &str, response: RemoteResponse) -> Self {
        self.overrides.insert(path.to_string(), response);
        self
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn respond(&self, path: &str, body: Option<&Value>) -> RemoteResponse {
        if let Some(response) = self.overrides.get(path) {
            return response.clone();
        }

        let segments: Vec<&str> = path.split('/').collect();
        match segments.as_slice() {
            ["realms"] => {
                let name = body
                    .and_then(|b| b.get("realm"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                if self.realms.lock().unwrap().insert(name) {
                    RemoteResponse::new(201, "")
                } else {
                    RemoteResponse::new(409, r#"{"errorMessage":"Conflict detected."}"#)
                }
            }
            ["realms", realm, rest @ ..] => {
                if !self.realms.lock().unwrap().contains(*realm) {
                    return RemoteResponse::new(404, r#"{"error":"Realm not found."}"#);
                }
                if rest == ["logout-all"] {
                    return RemoteResponse::new(204, "");
                }
                let key = format!("{}:{}", path, body.map(Value::to_string).unwrap_or_default());
                if !self.created.lock().unwrap().insert(key) {
                    return RemoteResponse::new(409, r#"{"errorMessage":"Conflict detected."}"#);
                }
                if rest == ["roles"] {
                    RemoteResponse::new(204, "")
                } else {
                    RemoteResponse::new(201, "")
                }
            }
            _ => RemoteResponse::new(404, ""),
        }
    }
}

impl AdminSession for FakeSession {
    fn access_token(&self) -> Pin<Box<dyn Future<Output = Result<String, AdminError>> + Send + '_>> {
        Box::pin(async move { Ok(self.token.clone()) })
    }

    fn post<'a>(
        &'a self,
        segments: &'a [&'a str],
        body: Option<&'a Value>,
    ) -> Pin<Box<dyn Future<Output = Result<RemoteResponse, ApiError>> + Send + 'a>> {
        Box::pin(async move {
            let path = segments.join("/");
            self.requests.lock().unwrap().push(path.clone());
            Ok(self.respond(&path, body))
        })
    }
}

/// Sink keeping every rendered line
#[derive(Default)]
struct RecordingSink {
    lines: Mutex<Vec<(String, bool)>>,
}

impl RecordingSink {
    fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .map(|(line, _)| line.clone())
            .collect()
    }

    fn failures(&self) -> usize {
        self.lines.lock().unwrap().iter().filter(|(_, f)| *f).count()
    }
}

impl ProgressSink for RecordingSink {
    fn record(&self, event: &ProgressEvent<'_>) {
        self.lines
            .lock()
            .unwrap()
            .push((event.to_string(), event.is_failure()));
    }
}

// ============================================================================
// Full Run Tests
// ============================================================================

#[tokio::test]
async fn test_run_walks_every_step_in_order() {
    let session = FakeSession::new();
    let plan = ProvisioningPlan::default();
    let sink = RecordingSink::default();

    let report = Orchestrator::new(&session, &plan)
        .with_sink(&sink)
        .run()
        .await;

    let steps: Vec<Step> = report.steps.iter().map(|(step, _)| *step).collect();
    assert_eq!(
        steps,
        vec![
            Step::PrintToken,
            Step::ProvisionRealm,
            Step::ProvisionUser,
            Step::ProvisionRole,
            Step::ProvisionClient,
            Step::RevokeAllSessions,
        ]
    );
    assert!(!report.has_failures());
    assert_eq!(report.provision_calls(), 4);

    assert_eq!(
        session.requests(),
        vec![
            "realms",
            "realms/realm1/users",
            "realms/realm1/roles",
            "realms/realm1/clients",
            "realms/realm1/logout-all",
        ]
    );

    assert_eq!(
        sink.lines(),
        vec![
            "Access token: subject: abc, preferredUsername: alice, givenName: Alice",
            "realm1 was created.",
            "user1 was created.",
            "role1 was created.",
            "client1 was created.",
            "All sessions in realm realm1 were logged out.",
        ]
    );
}

#[tokio::test]
async fn test_second_run_reports_already_exists() {
    let session = FakeSession::new();
    let plan = ProvisioningPlan::default();

    let first_sink = RecordingSink::default();
    let first = Orchestrator::new(&session, &plan)
        .with_sink(&first_sink)
        .run()
        .await;
    assert_eq!(
        first.outcome(Step::ProvisionRealm),
        Some(&ProvisionOutcome::Created)
    );

    let second_sink = RecordingSink::default();
    let second = Orchestrator::new(&session, &plan)
        .with_sink(&second_sink)
        .run()
        .await;

    for step in [
        Step::ProvisionRealm,
        Step::ProvisionUser,
        Step::ProvisionRole,
        Step::ProvisionClient,
    ] {
        assert_eq!(second.outcome(step), Some(&ProvisionOutcome::AlreadyExists));
    }
    assert!(!second.has_failures());

    let lines = second_sink.lines();
    assert!(lines.contains(&"realm1 has already been created.".to_string()));
    assert!(first_sink
        .lines()
        .contains(&"realm1 was created.".to_string()));
}

#[tokio::test]
async fn test_failed_step_does_not_abort_run() {
    let session = FakeSession::new().answering(
        "realms/realm1/users",
        RemoteResponse::new(
            400,
            r#"{"error":"invalid_request","error_description":"Password policy not met"}"#,
        ),
    );
    let plan = ProvisioningPlan::default();
    let sink = RecordingSink::default();

    let report = Orchestrator::new(&session, &plan)
        .with_sink(&sink)
        .run()
        .await;

    assert_eq!(report.provision_calls(), 4);
    assert!(report.has_failures());
    assert!(matches!(
        report.outcome(Step::ProvisionUser),
        Some(ProvisionOutcome::Failed(Diagnostic::Remote(_)))
    ));
    assert_eq!(
        report.outcome(Step::ProvisionRole),
        Some(&ProvisionOutcome::Created)
    );
    assert_eq!(
        report.outcome(Step::ProvisionClient),
        Some(&ProvisionOutcome::Created)
    );
    assert_eq!(sink.failures(), 1);
    assert!(sink.lines().contains(
        &"Failed to create user user1: status: 400, reason: Bad Request, error: invalid_request, error_description: Password policy not met"
            .to_string()
    ));
}

#[tokio::test]
async fn test_user_under_missing_realm_reports_not_found() {
    // Realm creation is refused, so the realm never exists
    let session = FakeSession::new().answering(
        "realms",
        RemoteResponse::new(403, r#"{"error":"unknown_error"}"#),
    );
    let plan = ProvisioningPlan::default();
    let sink = RecordingSink::default();

    let report = Orchestrator::new(&session, &plan)
        .with_sink(&sink)
        .run()
        .await;

    match report.outcome(Step::ProvisionUser) {
        Some(ProvisionOutcome::Failed(Diagnostic::Remote(failure))) => {
            assert_eq!(failure.status, 404);
            match &failure.body {
                ErrorBody::Structured(details) => {
                    assert_eq!(details.error.as_deref(), Some("Realm not found."))
                }
                other => panic!("Expected structured body, got {:?}", other),
            }
        }
        other => panic!("Expected remote failure, got {:?}", other),
    }

    // Role and client steps still ran, and session revocation was attempted
    assert_eq!(report.provision_calls(), 4);
    assert_eq!(session.requests().len(), 5);
    assert!(matches!(
        report.steps.last(),
        Some((Step::RevokeAllSessions, StepResult::RevokeFailed(_)))
    ));
    assert_eq!(sink.failures(), 5);
}

#[tokio::test]
async fn test_unreadable_token_is_reported_and_run_continues() {
    struct OpaqueTokenSession(FakeSession);

    impl AdminSession for OpaqueTokenSession {
        fn access_token(
            &self,
        ) -> Pin<Box<dyn Future<Output = Result<String, AdminError>> + Send + '_>> {
            Box::pin(async { Ok("opaque".to_string()) })
        }

        fn post<'a>(
            &'a self,
            segments: &'a [&'a str],
            body: Option<&'a Value>,
        ) -> Pin<Box<dyn Future<Output = Result<RemoteResponse, ApiError>> + Send + 'a>> {
            self.0.post(segments, body)
        }
    }

    let session = OpaqueTokenSession(FakeSession::new());
    let plan = ProvisioningPlan::default();
    let sink = RecordingSink::default();

    let report = Orchestrator::new(&session, &plan)
        .with_sink(&sink)
        .run()
        .await;

    assert!(matches!(
        report.steps.first(),
        Some((Step::PrintToken, StepResult::InspectionFailed(AdminError::Decode(_))))
    ));
    assert_eq!(report.provision_calls(), 4);
    assert_eq!(
        report.outcome(Step::ProvisionClient),
        Some(&ProvisionOutcome::Created)
    );
}

#[tokio::test]
async fn test_custom_plan_scopes_resources_to_its_realm() {
    let session = FakeSession::new();
    let plan: ProvisioningPlan = toml::from_str(
        r#"
        realm = "staff"
        username = "bob"
        role = "auditor"
        client = "portal"
        "#,
    )
    .unwrap();

    let report = Orchestrator::new(&session, &plan).run().await;

    assert!(!report.has_failures());
    assert_eq!(
        session.requests(),
        vec![
            "realms",
            "realms/staff/users",
            "realms/staff/roles",
            "realms/staff/clients",
            "realms/staff/logout-all",
        ]
    );
}
