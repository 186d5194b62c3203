//! # nethelper-handlers
//!
//! The handler chain of the network helper bot, in dispatch order:
//!
//! 1. [`EventLogger`] appends every event to the raw event log.
//! 2. [`UserProvisioner`] creates the user row on first contact.
//! 3. [`MenuHandler`] resets to idle on `/start`, `/menu` or the menu button.
//! 4. Probe conversations: [`PingHandler`], [`DnsHandler`], [`WhoisHandler`], [`TlsHandler`],
//!    [`MyIpHandler`]. Each owns a `*_WAIT_TARGET` / `*_RUNNING` state pair and its own data keys.
//!
//! Input grammar lives in [`target`], result rendering in [`format`].

mod dns;
mod event_logger;
pub mod format;
mod menu;
mod myip;
mod ping;
mod reply;
pub mod target;
mod tls;
mod user_provisioner;
mod whois;

#[cfg(test)]
mod test;

pub use dns::{DnsHandler, DNS_RUNNING, DNS_WAIT_TARGET, KEY_DNS_LAST_TARGET, KEY_DNS_TYPE};
pub use event_logger::EventLogger;
pub use menu::{main_menu, MenuHandler};
pub use myip::{MyIpHandler, MYIP_RUNNING};
pub use ping::{PingHandler, KEY_PING_LAST_TARGET, PING_RUNNING, PING_WAIT_TARGET};
pub use reply::{escape_html, CB_MENU};
pub use target::{ValidationError, DEFAULT_TLS_PORT};
pub use tls::{TlsHandler, KEY_TLS_LAST_HOST, KEY_TLS_LAST_PORT, TLS_RUNNING, TLS_WAIT_TARGET};
pub use user_provisioner::UserProvisioner;
pub use whois::{WhoisHandler, KEY_WHOIS_LAST_TARGET, WHOIS_RUNNING, WHOIS_WAIT_TARGET};
