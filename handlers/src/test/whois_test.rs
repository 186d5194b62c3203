//! WHOIS conversation tests.

use nethelper_dispatcher::DispatchOutcome;

use super::mocks::Harness;
use crate::{KEY_WHOIS_LAST_TARGET, WHOIS_RUNNING, WHOIS_WAIT_TARGET};

async fn waiting_for_target() -> Harness {
    let h = Harness::new().await;
    h.press("whois:start").await;
    assert_eq!(h.state().await, WHOIS_WAIT_TARGET);
    h.bot.clear();
    h
}

/// **Test: Domain lookup end to end.**
///
/// **Setup:** User pressed `whois:start`.
/// **Action:** Send `example.com.`.
/// **Expected:** Probe gets `example.com` while `WHOIS_RUNNING`; summary rendered; idle; target saved.
#[tokio::test]
async fn test_whois_domain() {
    let h = Harness::new().await;
    h.press("whois:start").await;
    assert_eq!(h.state().await, WHOIS_WAIT_TARGET);

    h.text("example.com.").await;

    assert_eq!(h.whois.log.targets(), vec!["example.com"]);
    assert_eq!(h.whois.log.states(), vec![WHOIS_RUNNING]);
    let reply = h.bot.last_reply().unwrap();
    assert!(reply.text.contains("Registrar: Example Registrar, Inc."));
    assert!(reply.text.contains("<pre>Domain Name: EXAMPLE.COM</pre>"));
    assert_eq!(
        reply.keyboard.unwrap().callback_payloads(),
        vec!["whois:repeat", "menu"]
    );
    assert_eq!(h.state().await, "");
    assert_eq!(
        h.data().await.get(KEY_WHOIS_LAST_TARGET).and_then(|v| v.as_str()),
        Some("example.com")
    );
}

/// **Test: Non-public and malformed targets are rejected.**
///
/// **Setup:** User in `WHOIS_WAIT_TARGET`.
/// **Action:** Send `127.0.0.1`, then `not a domain`.
/// **Expected:** Loopback reason, then the generic host reason; no probe; still waiting.
#[tokio::test]
async fn test_whois_rejects_bad_targets() {
    let h = Harness::new().await;
    h.press("whois:start").await;

    h.text("127.0.0.1").await;
    assert!(h.bot.last_reply().unwrap().text.contains("loopback address"));
    h.text("not a domain").await;
    assert!(h
        .bot
        .last_reply()
        .unwrap()
        .text
        .contains("expected a public IPv4 address or a domain name"));

    assert!(h.whois.log.targets().is_empty());
    assert_eq!(h.state().await, WHOIS_WAIT_TARGET);
}

/// **Test: A timed-out lookup is reported and the user returns to idle.**
///
/// **Setup:** User in `WHOIS_WAIT_TARGET`; the WHOIS server does not answer.
/// **Action:** Send `example.com`.
/// **Expected:** Reply shows "❌ Timeout" with the repeat button; state idle.
#[tokio::test]
async fn test_whois_timeout_reported() {
    let h = waiting_for_target().await;
    h.whois.log.fail();

    let outcome = h.text("example.com").await;

    assert_eq!(outcome, DispatchOutcome::Stopped("WhoisHandler"));
    assert_eq!(h.whois.log.states(), vec![WHOIS_RUNNING]);
    let reply = h.bot.last_reply().unwrap();
    assert!(reply.text.contains("❌ Timeout"));
    assert!(!reply.text.contains("<pre>"));
    assert_eq!(
        reply.keyboard.unwrap().callback_payloads(),
        vec!["whois:repeat", "menu"]
    );
    assert_eq!(h.state().await, "");
}

/// **Test: Text and button presses while a lookup runs get the busy notice.**
///
/// **Setup:** User in `WHOIS_RUNNING`.
/// **Action:** Send `example.com`, then press `whois:repeat`.
/// **Expected:** One ack, two busy replies; no lookup; state still `WHOIS_RUNNING`.
#[tokio::test]
async fn test_whois_busy_guard() {
    let h = waiting_for_target().await;
    h.set_state(WHOIS_RUNNING).await;

    h.text("example.com").await;
    h.press("whois:repeat").await;

    assert_eq!(h.bot.acks(), 1);
    let texts = h.bot.texts();
    assert_eq!(texts.len(), 2);
    assert!(texts.iter().all(|t| t.contains("still running")));
    assert!(h.whois.log.targets().is_empty());
    assert_eq!(h.state().await, WHOIS_RUNNING);
}

/// **Test: whois:repeat re-enters WAIT_TARGET and shows the last target.**
///
/// **Setup:** One completed lookup of `example.com`.
/// **Action:** Press `whois:repeat`.
/// **Expected:** State `WHOIS_WAIT_TARGET`; a new prompt mentions the last target.
#[tokio::test]
async fn test_whois_repeat_reenters_wait() {
    let h = waiting_for_target().await;
    h.text("example.com").await;
    h.bot.clear();

    h.press("whois:repeat").await;

    assert_eq!(h.state().await, WHOIS_WAIT_TARGET);
    let reply = h.bot.last_reply().unwrap();
    assert!(reply.text.contains("Enter a domain name"));
    assert!(reply.text.contains("Last target: <code>example.com</code>"));
}

/// **Test: Transport failure mid-lookup leaves the user idle.**
///
/// **Setup:** User in `WHOIS_WAIT_TARGET`; every send fails.
/// **Action:** Send `example.com`.
/// **Expected:** Dispatch faulted; no lookup; state idle.
#[tokio::test]
async fn test_whois_send_failure_resets_to_idle() {
    let h = waiting_for_target().await;
    h.bot.fail_sends();

    let outcome = h.text("example.com").await;

    assert_eq!(outcome, DispatchOutcome::Faulted("WhoisHandler"));
    assert!(h.whois.log.targets().is_empty());
    assert_eq!(h.state().await, "");
}
