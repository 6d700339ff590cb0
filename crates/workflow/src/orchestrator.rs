//! The registration orchestrator.
//!
//! Runs the five stages strictly in order against one registration,
//! persisting each step as it moves so pollers see progress live. The
//! first failing stage ends the run; nothing is rolled back, and every
//! SID created before the failure stays on the record.

use std::sync::Arc;

use serde::Serialize;

use a2p_core::{
    ProviderSids, Registration, RegistrationForm, RegistrationPatch, RegistrationStatus, Stage,
    StepState, StepStatus,
};
use a2p_provider::TrustHub;
use a2p_storage::RegistrationStore;

use crate::activity::ActivityLog;
use crate::error::WorkflowError;
use crate::stages::{self, StageInput, StageResult};

/// Where a run stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Running(Stage),
    Completed,
    /// Absorbing: no further stage runs.
    Failed(Stage),
}

impl RunState {
    /// The state after `stage` reported `success`.
    pub fn after(stage: Stage, success: bool) -> RunState {
        match (success, stage.next()) {
            (false, _) => RunState::Failed(stage),
            (true, Some(next)) => RunState::Running(next),
            (true, None) => RunState::Completed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed(_))
    }
}

/// What `POST /a2p` answers with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOutcome {
    pub success: bool,
    pub message: String,
    pub registration_id: String,
    /// The failing stage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    /// All five SIDs, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ProviderSids>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RegistrationOutcome {
    fn completed(registration_id: &str, sids: ProviderSids) -> Self {
        Self {
            success: true,
            message: "A2P registration submitted successfully".to_string(),
            registration_id: registration_id.to_string(),
            stage: None,
            data: Some(sids),
            error: None,
        }
    }

    fn failed(registration_id: &str, result: StageResult) -> Self {
        Self {
            success: false,
            message: result.message,
            registration_id: registration_id.to_string(),
            stage: Some(result.stage),
            data: None,
            error: result.error,
        }
    }
}

/// Drives registrations through the five stages.
pub struct Registrar {
    store: Arc<dyn RegistrationStore>,
    hub: Arc<dyn TrustHub>,
    base_url: String,
    activity: Arc<ActivityLog>,
}

impl Registrar {
    pub fn new(
        store: Arc<dyn RegistrationStore>,
        hub: Arc<dyn TrustHub>,
        base_url: impl Into<String>,
        activity: Arc<ActivityLog>,
    ) -> Self {
        Self {
            store,
            hub,
            base_url: base_url.into(),
            activity,
        }
    }

    pub fn store(&self) -> &Arc<dyn RegistrationStore> {
        &self.store
    }

    pub fn activity(&self) -> &Arc<ActivityLog> {
        &self.activity
    }

    /// Validate the form, create the registration, and run every stage.
    pub async fn register(
        &self,
        user_id: &str,
        form: RegistrationForm,
    ) -> Result<RegistrationOutcome, WorkflowError> {
        form.validate()?;
        let registration = self.store.create(user_id, form).await?;
        tracing::info!(registration_id = %registration.id, user_id, "registration created");
        self.activity
            .info(Some(&registration.id), "Registration created");
        self.run(&registration).await
    }

    /// Run every stage of a registration that has not started yet.
    ///
    /// Stage failures come back as an outcome with `success: false`; only
    /// store failures are errors.
    pub async fn run(
        &self,
        registration: &Registration,
    ) -> Result<RegistrationOutcome, WorkflowError> {
        let id = registration.id.as_str();
        if registration
            .steps
            .values()
            .any(|step| step.status != StepState::Pending)
        {
            return Err(WorkflowError::AlreadyStarted { id: id.to_string() });
        }

        let mut sids = ProviderSids::default();
        let mut state = RunState::Running(Stage::CustomerProfile);

        while let RunState::Running(stage) = state {
            self.persist(
                id,
                stage,
                RegistrationPatch::step(stage, StepStatus::in_progress(stage)),
            )
            .await?;
            tracing::info!(registration_id = id, %stage, "stage started");

            let input = StageInput {
                form: &registration.form_data,
                base_url: &self.base_url,
                sids: &sids,
            };
            let result = stages::execute(stage, self.hub.as_ref(), &input).await;

            match result.sid.clone().filter(|_| result.success) {
                Some(sid) => {
                    self.persist(
                        id,
                        stage,
                        RegistrationPatch::stage_completed(stage, &sid, &*result.message),
                    )
                    .await?;
                    sids.set(stage, sid.clone());
                    tracing::info!(registration_id = id, %stage, sid = %sid, "stage completed");
                    self.activity.info(Some(id), &*result.message);
                    state = RunState::after(stage, true);
                }
                None => {
                    let error = result.error.clone().unwrap_or_default();
                    let mut patch = RegistrationPatch::step(stage, StepStatus::failed(&*error));
                    patch.status = Some(RegistrationStatus::Rejected);
                    self.persist(id, stage, patch).await?;
                    tracing::warn!(registration_id = id, %stage, %error, "stage failed");
                    self.activity
                        .warn(Some(id), format!("{}: {}", result.message, error));
                    return Ok(RegistrationOutcome::failed(id, result));
                }
            }
        }

        tracing::info!(registration_id = id, "all stages completed");
        self.activity
            .info(Some(id), "All registration stages completed");
        Ok(RegistrationOutcome::completed(id, sids))
    }

    async fn persist(
        &self,
        id: &str,
        stage: Stage,
        patch: RegistrationPatch,
    ) -> Result<Registration, WorkflowError> {
        match self.store.update(id, patch).await {
            Ok(registration) => Ok(registration),
            Err(e) => {
                tracing::error!(registration_id = id, %stage, error = %e, "store write failed");
                self.activity
                    .error(Some(id), format!("Store write failed during {stage}: {e}"));
                Err(e.into())
            }
        }
    }
}
