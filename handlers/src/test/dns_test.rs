//! DNS conversation tests.

use net_tools::DnsRecordType;
use nethelper_dispatcher::DispatchOutcome;

use super::mocks::Harness;
use crate::{DNS_RUNNING, DNS_WAIT_TARGET, KEY_DNS_LAST_TARGET, KEY_DNS_TYPE, KEY_PING_LAST_TARGET};

/// **Test: Choosing a record type from idle.**
///
/// **Setup:** Idle user.
/// **Action:** Press `dns:type:A`.
/// **Expected:** `dns_type = "A"`, state `DNS_WAIT_TARGET`, domain prompt with change-type/menu buttons.
#[tokio::test]
async fn test_type_choice_prompts_for_domain() {
    let h = Harness::new().await;

    let outcome = h.press("dns:type:A").await;

    assert_eq!(outcome, DispatchOutcome::Stopped("DnsHandler"));
    assert_eq!(h.state().await, DNS_WAIT_TARGET);
    assert_eq!(
        h.data().await.get(KEY_DNS_TYPE).and_then(|v| v.as_str()),
        Some("A")
    );
    let reply = h.bot.last_reply().unwrap();
    assert!(reply.text.contains("enter a domain name"));
    assert_eq!(
        reply.keyboard.unwrap().callback_payloads(),
        vec!["dns:choose_type", "menu"]
    );
}

/// **Test: Unknown record type falls back to A.**
///
/// **Setup:** Idle user.
/// **Action:** Press `dns:type:SRV`.
/// **Expected:** `dns_type = "A"`.
#[tokio::test]
async fn test_unknown_type_falls_back_to_a() {
    let h = Harness::new().await;

    h.press("dns:type:SRV").await;

    assert_eq!(
        h.data().await.get(KEY_DNS_TYPE).and_then(|v| v.as_str()),
        Some("A")
    );
}

/// **Test: dns:start drops the stored type and shows the type keyboard.**
///
/// **Setup:** User waiting for an MX target, with a ping target remembered.
/// **Action:** Press `dns:start`.
/// **Expected:** Idle, `dns_type` gone, other handlers' keys untouched, type keyboard shown.
#[tokio::test]
async fn test_start_shows_type_keyboard() {
    let h = Harness::new().await;
    h.press("ping:start").await;
    h.text("example.com").await;
    h.press("dns:type:MX").await;

    h.press("dns:start").await;

    assert_eq!(h.state().await, "");
    let data = h.data().await;
    assert!(data.get(KEY_DNS_TYPE).is_none());
    assert!(data.get(KEY_PING_LAST_TARGET).is_some());
    let payloads = h.bot.last_reply().unwrap().keyboard.unwrap();
    assert!(payloads.callback_payloads().contains(&"dns:type:PTR"));
}

/// **Test: MX lookup end to end.**
///
/// **Setup:** User chose MX.
/// **Action:** Send `Example.COM`.
/// **Expected:** Probe gets `example.com`/MX while `DNS_RUNNING`; result edited in; idle; target saved.
#[tokio::test]
async fn test_lookup_runs_with_stored_type() {
    let h = Harness::new().await;
    h.press("dns:type:MX").await;

    h.text("Example.COM").await;

    assert_eq!(h.dns.log.targets(), vec!["example.com"]);
    assert_eq!(*h.dns.types.lock().unwrap(), vec![DnsRecordType::Mx]);
    assert_eq!(h.dns.log.states(), vec![DNS_RUNNING]);
    let reply = h.bot.last_reply().unwrap();
    assert!(reply.text.contains("DNS MX</b> for <code>example.com</code>"));
    assert!(reply.text.contains("(TTL 3600)"));
    assert_eq!(
        reply.keyboard.unwrap().callback_payloads(),
        vec!["dns:repeat", "dns:choose_type", "menu"]
    );
    assert_eq!(h.state().await, "");
    assert_eq!(
        h.data().await.get(KEY_DNS_LAST_TARGET).and_then(|v| v.as_str()),
        Some("example.com")
    );
}

/// **Test: PTR requires a public IPv4 address.**
///
/// **Setup:** User chose PTR.
/// **Action:** Send `example.com`, then `192.168.1.1`, then `8.8.8.8`.
/// **Expected:** First two rejected (staying in WAIT_TARGET); third runs a PTR lookup.
#[tokio::test]
async fn test_ptr_validation() {
    let h = Harness::new().await;
    h.press("dns:type:PTR").await;
    assert!(h.bot.last_reply().unwrap().text.contains("public IPv4"));

    h.text("example.com").await;
    assert!(h.bot.last_reply().unwrap().text.contains("Incorrect input"));
    h.text("192.168.1.1").await;
    assert!(h.bot.last_reply().unwrap().text.contains("private address"));
    assert_eq!(h.state().await, DNS_WAIT_TARGET);
    assert!(h.dns.log.targets().is_empty());

    h.text("8.8.8.8").await;
    assert_eq!(h.dns.log.targets(), vec!["8.8.8.8"]);
    assert_eq!(*h.dns.types.lock().unwrap(), vec![DnsRecordType::Ptr]);
}

/// **Test: dns:repeat re-prompts for the current type.**
///
/// **Setup:** One completed TXT lookup.
/// **Action:** Press `dns:repeat`.
/// **Expected:** State `DNS_WAIT_TARGET`; prompt names TXT.
#[tokio::test]
async fn test_repeat_keeps_type() {
    let h = Harness::new().await;
    h.press("dns:type:TXT").await;
    h.text("example.com").await;

    h.press("dns:repeat").await;

    assert_eq!(h.state().await, DNS_WAIT_TARGET);
    assert!(h.bot.last_reply().unwrap().text.contains("<b>TXT</b>"));
}

/// **Test: DNS busy guard.**
///
/// **Setup:** User in `DNS_RUNNING`.
/// **Action:** Send free text.
/// **Expected:** Busy reply, no lookup, state unchanged.
#[tokio::test]
async fn test_busy_guard() {
    let h = Harness::new().await;
    h.press("dns:type:A").await;
    h.set_state(DNS_RUNNING).await;

    h.text("example.com").await;

    assert!(h.bot.last_reply().unwrap().text.contains("still running"));
    assert!(h.dns.log.targets().is_empty());
    assert_eq!(h.state().await, DNS_RUNNING);
}

/// **Test: NXDOMAIN is shown as a failure and the user returns to idle.**
///
/// **Setup:** User chose type A; the resolver answers NXDOMAIN.
/// **Action:** Send `nope.example`.
/// **Expected:** Lookup ran while `DNS_RUNNING`; reply shows "❌ NXDOMAIN" with the result
/// keyboard; state idle; type and target remembered.
#[tokio::test]
async fn test_nxdomain_reported() {
    let h = Harness::new().await;
    h.press("dns:type:A").await;
    h.dns.log.fail();

    let outcome = h.text("nope.example").await;

    assert_eq!(outcome, DispatchOutcome::Stopped("DnsHandler"));
    assert_eq!(h.dns.log.states(), vec![DNS_RUNNING]);
    let reply = h.bot.last_reply().unwrap();
    assert!(reply.text.contains("❌ NXDOMAIN (name does not exist)"));
    assert_eq!(
        reply.keyboard.unwrap().callback_payloads(),
        vec!["dns:repeat", "dns:choose_type", "menu"]
    );
    assert_eq!(h.state().await, "");
    let data = h.data().await;
    assert_eq!(data.get(KEY_DNS_TYPE).and_then(|v| v.as_str()), Some("A"));
    assert_eq!(
        data.get(KEY_DNS_LAST_TARGET).and_then(|v| v.as_str()),
        Some("nope.example")
    );
}

/// **Test: Transport failure during a lookup leaves the user idle.**
///
/// **Setup:** User chose type MX; every send fails.
/// **Action:** Send `example.com`.
/// **Expected:** Dispatch faulted; no lookup; state idle.
#[tokio::test]
async fn test_send_failure_resets_to_idle() {
    let h = Harness::new().await;
    h.press("dns:type:MX").await;
    h.bot.fail_sends();

    let outcome = h.text("example.com").await;

    assert_eq!(outcome, DispatchOutcome::Faulted("DnsHandler"));
    assert!(h.dns.log.targets().is_empty());
    assert_eq!(h.state().await, "");
}
