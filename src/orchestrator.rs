//! Sequencing of a provisioning run.
//!
//! A run walks a fixed, linear sequence of steps:
//!
//! ```text
//! PrintToken → ProvisionRealm → ProvisionUser → ProvisionRole → ProvisionClient → RevokeAllSessions
//! ```
//!
//! Every step runs whatever happened in the ones before it. Each step catches
//! and classifies its own failure, reports it to the [`ProgressSink`], and the
//! run moves on. Provisioning is declarative, so a resource that failed does
//! not block the independent ones after it.

use crate::admin_api::client::AdminSession;
use crate::admin_api::jwt::{self, AccessTokenClaims};
use crate::admin_api::provision::{logout_all, provision, Diagnostic, ProvisionOutcome};
use crate::admin_api::resources::ResourceKind;
use crate::admin_api::types::AdminError;
use crate::config::ProvisioningPlan;
use std::fmt;

/// One state of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    PrintToken,
    ProvisionRealm,
    ProvisionUser,
    ProvisionRole,
    ProvisionClient,
    RevokeAllSessions,
}

impl Step {
    /// The step that provisions a resource of `kind`
    pub fn for_kind(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Realm => Step::ProvisionRealm,
            ResourceKind::User => Step::ProvisionUser,
            ResourceKind::Role => Step::ProvisionRole,
            ResourceKind::Client => Step::ProvisionClient,
        }
    }

    pub fn is_provisioning(&self) -> bool {
        matches!(
            self,
            Step::ProvisionRealm | Step::ProvisionUser | Step::ProvisionRole | Step::ProvisionClient
        )
    }
}

/// Progress of a run, rendered as one human-readable line each
#[derive(Debug)]
pub enum ProgressEvent<'a> {
    TokenInspected(&'a AccessTokenClaims),
    TokenUnavailable(&'a AdminError),
    Provisioned {
        kind: ResourceKind,
        name: &'a str,
        outcome: &'a ProvisionOutcome,
    },
    SessionsRevoked {
        realm: &'a str,
    },
    RevokeFailed {
        realm: &'a str,
        diagnostic: &'a Diagnostic,
    },
}

impl ProgressEvent<'_> {
    /// Whether the event reports a failure
    pub fn is_failure(&self) -> bool {
        match self {
            ProgressEvent::TokenUnavailable(_) | ProgressEvent::RevokeFailed { .. } => true,
            ProgressEvent::Provisioned { outcome, .. } => outcome.is_failed(),
            _ => false,
        }
    }
}

impl fmt::Display for ProgressEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressEvent::TokenInspected(claims) => write!(f, "Access token: {}", claims),
            ProgressEvent::TokenUnavailable(err) => {
                write!(f, "Could not inspect access token: {}", err)
            }
            ProgressEvent::Provisioned {
                kind,
                name,
                outcome,
            } => match outcome {
                ProvisionOutcome::Created => write!(f, "{} was created.", name),
                ProvisionOutcome::AlreadyExists => write!(f, "{} has already been created.", name),
                ProvisionOutcome::Failed(diagnostic) => {
                    write!(f, "Failed to create {} {}: {}", kind, name, diagnostic)
                }
            },
            ProgressEvent::SessionsRevoked { realm } => {
                write!(f, "All sessions in realm {} were logged out.", realm)
            }
            ProgressEvent::RevokeFailed { realm, diagnostic } => {
                write!(f, "Failed to log out sessions in realm {}: {}", realm, diagnostic)
            }
        }
    }
}

/// Destination for progress events
pub trait ProgressSink: Send + Sync {
    fn record(&self, event: &ProgressEvent<'_>);
}

/// Sink that emits each event as a `tracing` event
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn record(&self, event: &ProgressEvent<'_>) {
        match event {
            ProgressEvent::TokenUnavailable(_) => tracing::warn!("{}", event),
            ProgressEvent::Provisioned {
                kind,
                outcome: ProvisionOutcome::Failed(_),
                ..
            } => tracing::error!(resource = %kind, "{}", event),
            ProgressEvent::Provisioned { kind, .. } => {
                tracing::info!(resource = %kind, "{}", event)
            }
            ProgressEvent::RevokeFailed { .. } => tracing::error!("{}", event),
            _ => tracing::info!("{}", event),
        }
    }
}

static TRACING_SINK: TracingSink = TracingSink;

/// Result of one step
#[derive(Debug)]
pub enum StepResult {
    Inspected(AccessTokenClaims),
    InspectionFailed(AdminError),
    Provisioned(ProvisionOutcome),
    Revoked,
    RevokeFailed(Diagnostic),
}

impl StepResult {
    pub fn is_failure(&self) -> bool {
        match self {
            StepResult::InspectionFailed(_) | StepResult::RevokeFailed(_) => true,
            StepResult::Provisioned(outcome) => outcome.is_failed(),
            StepResult::Inspected(_) | StepResult::Revoked => false,
        }
    }
}

/// Everything a run did, in order
#[derive(Debug, Default)]
pub struct RunReport {
    pub steps: Vec<(Step, StepResult)>,
}

impl RunReport {
    fn push(&mut self, step: Step, result: StepResult) {
        self.steps.push((step, result));
    }

    pub fn has_failures(&self) -> bool {
        self.steps.iter().any(|(_, result)| result.is_failure())
    }

    /// Number of provisioning steps that ran
    pub fn provision_calls(&self) -> usize {
        self.steps
            .iter()
            .filter(|(step, _)| step.is_provisioning())
            .count()
    }

    /// Outcome of the provisioning step `step`, if it ran
    pub fn outcome(&self, step: Step) -> Option<&ProvisionOutcome> {
        self.steps.iter().find_map(|(s, result)| match result {
            StepResult::Provisioned(outcome) if *s == step => Some(outcome),
            _ => None,
        })
    }
}

/// Runs a [`ProvisioningPlan`] against one admin session
pub struct Orchestrator<'a, S: AdminSession + ?Sized> {
    session: &'a S,
    plan: &'a ProvisioningPlan,
    sink: &'a dyn ProgressSink,
}

impl<'a, S: AdminSession + ?Sized> Orchestrator<'a, S> {
    /// Orchestrator reporting progress through `tracing`
    pub fn new(session: &'a S, plan: &'a ProvisioningPlan) -> Self {
        Self {
            session,
            plan,
            sink: &TRACING_SINK,
        }
    }

    /// Report progress to `sink` instead
    pub fn with_sink(mut self, sink: &'a dyn ProgressSink) -> Self {
        self.sink = sink;
        self
    }

    /// Run every step once, in order
    ///
    /// Never fails: each step's error is recorded in the report and the run
    /// continues with the next step.
    pub async fn run(&self) -> RunReport {
        let mut report = RunReport::default();
        let realm = self.plan.realm.as_str();

        tracing::info!("Starting provisioning run for realm '{}'", realm);

        let inspected = match jwt::inspect(self.session).await {
            Ok(claims) => {
                self.sink.record(&ProgressEvent::TokenInspected(&claims));
                StepResult::Inspected(claims)
            }
            Err(e) => {
                self.sink.record(&ProgressEvent::TokenUnavailable(&e));
                StepResult::InspectionFailed(e)
            }
        };
        report.push(Step::PrintToken, inspected);

        for spec in self.plan.resource_specs() {
            let outcome = provision(self.session, realm, &spec).await;
            self.sink.record(&ProgressEvent::Provisioned {
                kind: spec.kind(),
                name: spec.name(),
                outcome: &outcome,
            });
            report.push(Step::for_kind(spec.kind()), StepResult::Provisioned(outcome));
        }

        let revoked = match logout_all(self.session, realm).await {
            Ok(()) => {
                self.sink.record(&ProgressEvent::SessionsRevoked { realm });
                StepResult::Revoked
            }
            Err(diagnostic) => {
                self.sink.record(&ProgressEvent::RevokeFailed {
                    realm,
                    diagnostic: &diagnostic,
                });
                StepResult::RevokeFailed(diagnostic)
            }
        };
        report.push(Step::RevokeAllSessions, revoked);

        tracing::info!(
            "Provisioning run for realm '{}' finished ({} steps, failures: {})",
            realm,
            report.steps.len(),
            report.has_failures()
        );

        report
    }
}
