//! Evaluation and manual alert paths

use crate::{ConfigError, PipelineConfig, PipelineError};
use alerting::{
    AlertSubject, CancellationToken, ChannelDispatcher, DispatchConfig, DispatchError, DispatchSummary,
    EmailConfig, EmailSender, MessageComposer, SmsConfig, SmsSender, StaticCatalog, WhatsappSender,
};
use distress_detector::{CrisisResources, DistressDecisionService, DistressVerdict, ShardedHistoryStore};
use distress_fusion::{FusionEngine, FusionResult, RawSignals};
use std::sync::Arc;
use std::time::Duration;
use storage::{
    ContactResolver, ContactStore, EmergencyPreferences, PreferenceResolver, PreferenceStore, UserId, UserRecord,
    UserStore,
};
use tracing::{error, info, warn};

/// Store handles used by the pipeline
#[derive(Clone)]
pub struct PipelineStores {
    pub users: Arc<dyn UserStore>,
    pub contacts: Arc<dyn ContactStore>,
    pub preferences: Arc<dyn PreferenceStore>,
}

impl PipelineStores {
    /// Use one store for users, contacts and preferences
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: UserStore + ContactStore + PreferenceStore + 'static,
    {
        Self {
            users: store.clone(),
            contacts: store.clone(),
            preferences: store,
        }
    }
}

/// What happened to the alert of one evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum AlertOutcome {
    /// The verdict did not call for an alert
    NotRequired,
    /// The user turned detection off
    DetectionDisabled,
    Dispatched(DispatchSummary),
    /// Every dispatch pass failed
    Failed { error: DispatchError },
}

/// Result of [`CrisisPipeline::evaluate`]
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub verdict: DistressVerdict,
    pub alert: AlertOutcome,
    /// Helplines and self-help offered with alert-worthy verdicts
    pub resources: Option<CrisisResources>,
}

/// Distress evaluation and emergency alerting for many users
pub struct CrisisPipeline {
    decision: DistressDecisionService,
    users: Arc<dyn UserStore>,
    preferences: PreferenceResolver,
    contacts: ContactResolver,
    composer: MessageComposer,
    dispatcher: ChannelDispatcher,
    shutdown: CancellationToken,
}

impl CrisisPipeline {
    pub fn new(config: &PipelineConfig, stores: PipelineStores, dispatcher: ChannelDispatcher) -> Self {
        let history = Arc::new(
            ShardedHistoryStore::new(config.decision.history_capacity)
                .with_idle_ttl(Duration::from_secs(config.decision.history_idle_secs)),
        );
        let decision = DistressDecisionService::new(
            config.decision.clone(),
            FusionEngine::new(config.fusion.clone()),
            history,
        );
        info!(
            max_passes = dispatcher.config().max_passes,
            alert_threshold = config.decision.alert_threshold,
            "Crisis pipeline ready"
        );
        Self {
            decision,
            users: stores.users,
            preferences: PreferenceResolver::new(stores.preferences),
            contacts: ContactResolver::new(stores.contacts),
            composer: MessageComposer::new(config.composer.clone(), Arc::new(StaticCatalog::builtin())),
            dispatcher,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn decision(&self) -> &DistressDecisionService {
        &self.decision
    }

    pub fn preferences(&self) -> &PreferenceResolver {
        &self.preferences
    }

    /// Interrupt pending retry waits; later dispatches stop after one pass
    pub fn shutdown(&self) {
        info!("Crisis pipeline shutting down");
        self.shutdown.cancel();
    }

    /// Score raw signals for a user and alert their contacts when warranted
    ///
    /// Only a failed user lookup is an error; dispatch failures are reported
    /// in [`Evaluation::alert`] next to the verdict.
    pub async fn evaluate(&self, user_id: UserId, raw: &RawSignals) -> Result<Evaluation, PipelineError> {
        let verdict = self.decision.analyze(user_id, raw);
        if !verdict.should_alert {
            return Ok(Evaluation {
                verdict,
                alert: AlertOutcome::NotRequired,
                resources: None,
            });
        }

        let user = self.lookup_user(user_id).await?;
        let resources = Some(CrisisResources::for_address(user.address.as_deref()));

        let prefs = self.preferences.get_preferences(user_id).await;
        if !prefs.enable_detection {
            info!(user_id, "Detection disabled, alert not dispatched");
            return Ok(Evaluation {
                verdict,
                alert: AlertOutcome::DetectionDisabled,
                resources,
            });
        }

        let alert = match self.dispatch(&user, &prefs, &verdict.fusion_result).await {
            Ok(summary) => AlertOutcome::Dispatched(summary),
            Err(e) => {
                error!(user_id, error = %e, "Emergency alert could not be delivered");
                AlertOutcome::Failed { error: e }
            }
        };

        Ok(Evaluation {
            verdict,
            alert,
            resources,
        })
    }

    /// Alert a user's contacts without scoring, on user or operator request
    pub async fn trigger_manual(&self, user_id: UserId, reason: &str) -> Result<DispatchSummary, PipelineError> {
        let user = self.lookup_user(user_id).await?;
        let prefs = self.preferences.get_preferences(user_id).await;
        if !prefs.allow_manual_override {
            warn!(user_id, reason, "Manual alert refused");
            return Err(PipelineError::ManualOverrideDisabled(user_id));
        }

        info!(user_id, reason, "Manual alert triggered");
        Ok(self.dispatch(&user, &prefs, &FusionResult::manual()).await?)
    }

    async fn lookup_user(&self, user_id: UserId) -> Result<UserRecord, PipelineError> {
        match self.users.get_user(user_id).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(PipelineError::UserNotFound(user_id)),
            Err(source) => {
                error!(user_id, error = %source, "User lookup failed");
                Err(PipelineError::UserLookup { user_id, source })
            }
        }
    }

    async fn dispatch(
        &self,
        user: &UserRecord,
        prefs: &EmergencyPreferences,
        result: &FusionResult,
    ) -> Result<DispatchSummary, DispatchError> {
        let contacts = self.contacts.resolve(user.id).await;
        let language = self.preferences.language(user.id).await;
        let message = self
            .composer
            .compose(&AlertSubject::from_result(user.name.as_deref(), result), language.as_deref());

        info!(
            user_id = user.id,
            contacts = contacts.len(),
            channels = ?prefs.channels(),
            severity = %result.severity,
            "Dispatching emergency alert"
        );
        self.dispatcher
            .dispatch(&message, &contacts, &prefs.channels(), &self.shutdown)
            .await
    }
}

/// Dispatcher with SMS, email and WhatsApp senders configured from the
/// environment
pub fn dispatcher_from_env(config: &DispatchConfig) -> Result<ChannelDispatcher, ConfigError> {
    let sms = Arc::new(SmsSender::new(SmsConfig::from_env()).map_err(|e| ConfigError::Sender(e.to_string()))?);
    let email = Arc::new(EmailSender::new(EmailConfig::from_env()));
    info!(sms = sms.is_enabled(), email = email.is_enabled(), "Channel senders configured");

    Ok(ChannelDispatcher::new(config.clone())
        .with_sender(Arc::new(WhatsappSender::new(sms.clone())))
        .with_sender(sms)
        .with_sender(email))
}
