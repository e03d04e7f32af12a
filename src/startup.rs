//! Application Startup
//!
//! Core assembly and lifecycle. One [`SocialCore`] instance wires the
//! store, the event bus, the access gate, and the three services; every
//! collaborator is reachable from it and nothing lives in ambient
//! singletons.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;

use crate::application::access::{AccessGate, IdentityResolver};
use crate::application::services::{ContentServiceImpl, MessagingServiceImpl, SocialServiceImpl};
use crate::bus::EventBus;
use crate::config::Settings;
use crate::infrastructure::store::MemoryStore;
use crate::shared::snowflake::SnowflakeGenerator;

/// Fully wired core
pub struct SocialCore {
    pub store: Arc<MemoryStore>,
    pub bus: Arc<EventBus<MemoryStore>>,
    pub gate: AccessGate<MemoryStore>,
    pub social: SocialServiceImpl<MemoryStore>,
    pub content: ContentServiceImpl<MemoryStore>,
    pub messaging: MessagingServiceImpl<MemoryStore>,
    pub snowflake: Arc<SnowflakeGenerator>,
    pub settings: Arc<Settings>,
}

impl SocialCore {
    /// Build the core from settings and an identity resolver
    pub fn build(settings: Settings, resolver: Arc<dyn IdentityResolver>) -> Result<Self> {
        anyhow::ensure!(
            settings.snowflake.machine_id < 1024,
            "snowflake.machine_id must be below 1024, got {}",
            settings.snowflake.machine_id
        );
        anyhow::ensure!(
            settings.bus.delivery_buffer >= 1,
            "bus.delivery_buffer must be at least 1"
        );
        // A future epoch would underflow the id generator's timestamp math
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default();
        anyhow::ensure!(
            settings.snowflake.epoch <= now,
            "snowflake.epoch {} lies in the future (now {})",
            settings.snowflake.epoch,
            now
        );

        let store = Arc::new(MemoryStore::new());
        let bus = Arc::new(EventBus::new(store.clone(), settings.bus.delivery_buffer));
        let snowflake = Arc::new(SnowflakeGenerator::new(
            settings.snowflake.machine_id as u64,
            settings.snowflake.epoch,
        ));

        let gate = AccessGate::new(resolver, store.clone());
        let social = SocialServiceImpl::new(store.clone(), bus.clone(), snowflake.clone());
        let content = ContentServiceImpl::new(store.clone(), bus.clone(), snowflake.clone());
        let messaging = MessagingServiceImpl::new(store.clone(), bus.clone(), snowflake.clone());

        tracing::info!(environment = %settings.environment, "Social core assembled");

        Ok(Self {
            store,
            bus,
            gate,
            social,
            content,
            messaging,
            snowflake,
            settings: Arc::new(settings),
        })
    }

    /// Tear down: close the bus, disconnecting every subscriber
    pub fn shutdown(&self) {
        self.bus.close();
        tracing::info!("Social core shut down");
    }
}
