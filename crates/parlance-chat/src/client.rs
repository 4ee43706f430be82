//! The chat core as one handle.
//!
//! [`ChatClient`] wires every service to a single store, translation
//! gateway and push notifier.  It is cheap to clone; clones share the same
//! store and services.

use std::sync::Arc;

use parlance_store::DocumentStore;

use crate::accounts::AccountService;
use crate::config::ChatConfig;
use crate::engagement::Engagement;
use crate::groups::GroupService;
use crate::matching::Matchmaker;
use crate::push::{notifier_from_config, PushNotifier};
use crate::records::Records;
use crate::reports::ReportService;
use crate::room_list::RoomListProjection;
use crate::rooms::RoomService;
use crate::stream::MessageStream;
use crate::translation::TranslationGateway;
use crate::trust::TrustStore;

#[derive(Clone)]
pub struct ChatClient {
    /// Room requests and their answers.
    pub rooms: RoomService,

    /// Sending and following messages.
    pub messages: MessageStream,

    /// Blocking.
    pub trust: TrustStore,

    /// The chats screen.
    pub room_list: RoomListProjection,

    /// Open topic group chats.
    pub groups: GroupService,

    pub accounts: AccountService,
    pub reports: ReportService,
    pub engagement: Engagement,
    pub matching: Matchmaker,

    records: Records,
}

impl ChatClient {
    /// Build a client that talks to the HTTP translation providers and push
    /// endpoint named in `config`.
    pub fn new(store: Arc<dyn DocumentStore>, config: &ChatConfig) -> Self {
        Self::with_services(
            store,
            config,
            TranslationGateway::from_config(config),
            notifier_from_config(config),
        )
    }

    /// Build a client with explicit translation and push collaborators.
    pub fn with_services(
        store: Arc<dyn DocumentStore>,
        config: &ChatConfig,
        gateway: TranslationGateway,
        notifier: Arc<dyn PushNotifier>,
    ) -> Self {
        let records = Records::new(store);
        let trust = TrustStore::new(records.clone());
        let engagement = Engagement::new(records.clone());

        Self {
            rooms: RoomService::new(records.clone(), trust.clone(), engagement.clone()),
            messages: MessageStream::new(
                records.clone(),
                trust.clone(),
                gateway.clone(),
                notifier,
                engagement.clone(),
            ),
            groups: GroupService::new(records.clone(), gateway),
            room_list: RoomListProjection::new(records.clone(), trust.clone()),
            accounts: AccountService::new(records.clone(), trust.clone(), config),
            reports: ReportService::new(records.clone()),
            matching: Matchmaker::new(records.clone(), trust.clone()),
            engagement,
            trust,
            records,
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        self.records.store()
    }

    pub fn records(&self) -> &Records {
        &self.records
    }
}
