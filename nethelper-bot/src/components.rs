//! Component factory: opens storage, builds the Telegram adapter and the probes, and assembles
//! the ordered handler chain. Isolates assembly logic from the runner.

use std::sync::Arc;

use anyhow::{Context, Result};
use net_tools::{
    CascadeIpDiscovery, DnsProbe, HickoryDns, IpDiscovery, PingProbe, SystemPing, TlsInspector,
    TlsProbe, WhoisClient, WhoisProbe,
};
use nethelper_core::{Bot, UserStore};
use nethelper_dispatcher::Dispatcher;
use nethelper_handlers::{
    DnsHandler, EventLogger, MenuHandler, MyIpHandler, PingHandler, TlsHandler, UserProvisioner,
    WhoisHandler,
};
use nethelper_storage::UserRepository;
use nethelper_telegram::{build_bot, TelegramBotAdapter};
use tracing::{info, instrument};

use crate::config::BotConfig;

/// The external probes handed to the probe handlers.
#[derive(Clone)]
pub struct Probes {
    pub ping: Arc<dyn PingProbe>,
    pub dns: Arc<dyn DnsProbe>,
    pub whois: Arc<dyn WhoisProbe>,
    pub tls: Arc<dyn TlsProbe>,
    pub myip: Arc<dyn IpDiscovery>,
}

impl Probes {
    /// System ping, the system resolver, live WHOIS/RDAP, rustls and the IP discovery cascade.
    pub fn system() -> Result<Self> {
        let tls = TlsInspector::new().context("Failed to build TLS inspector")?;
        Ok(Self {
            ping: Arc::new(SystemPing::new()),
            dns: Arc::new(HickoryDns::from_system()),
            whois: Arc::new(WhoisClient::new()),
            tls: Arc::new(tls),
            myip: Arc::new(CascadeIpDiscovery::default()),
        })
    }
}

/// Core dependencies for run_bot; produced by the component factory.
pub struct BotComponents {
    pub repo: Arc<UserRepository>,
    pub telegram: Arc<TelegramBotAdapter>,
    pub dispatcher: Dispatcher,
}

#[instrument(skip(config))]
pub async fn open_repository(config: &BotConfig) -> Result<Arc<UserRepository>> {
    let repo = UserRepository::new(&config.database_url)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_url))?;
    Ok(Arc::new(repo))
}

/// Chain order: event logger, user provisioner, menu, then the probe conversations.
pub fn build_dispatcher(
    config: &BotConfig,
    store: Arc<dyn UserStore>,
    bot: Arc<dyn Bot>,
    probes: Probes,
) -> Dispatcher {
    let dispatcher = Dispatcher::new(store.clone())
        .add_handler(Arc::new(EventLogger::new(store.clone())))
        .add_handler(Arc::new(UserProvisioner::new(store.clone())))
        .add_handler(Arc::new(MenuHandler::new(bot.clone(), store.clone())))
        .add_handler(Arc::new(PingHandler::new(
            bot.clone(),
            store.clone(),
            probes.ping,
            config.ping_options(),
        )))
        .add_handler(Arc::new(DnsHandler::new(
            bot.clone(),
            store.clone(),
            probes.dns,
            config.dns_timeout(),
        )))
        .add_handler(Arc::new(WhoisHandler::new(
            bot.clone(),
            store.clone(),
            probes.whois,
            config.whois_timeout(),
        )))
        .add_handler(Arc::new(TlsHandler::new(
            bot.clone(),
            store.clone(),
            probes.tls,
            config.tls_timeout(),
        )))
        .add_handler(Arc::new(MyIpHandler::new(
            bot,
            store,
            probes.myip,
            config.myip_timeout(),
        )));

    info!(handlers = ?dispatcher.handler_names(), "step: handler chain built");
    dispatcher
}

/// Opens storage, builds the teloxide client and the handler chain.
#[instrument(skip(config, probes))]
pub async fn build_bot_components(config: &BotConfig, probes: Probes) -> Result<BotComponents> {
    let repo = open_repository(config).await?;
    let teloxide_bot = build_bot(&config.telegram_config()).context("Failed to build Telegram client")?;
    let telegram = Arc::new(TelegramBotAdapter::new(teloxide_bot));

    let dispatcher = build_dispatcher(config, repo.clone(), telegram.clone(), probes);
    Ok(BotComponents {
        repo,
        telegram,
        dispatcher,
    })
}
