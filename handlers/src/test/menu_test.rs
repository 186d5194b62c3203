//! Menu / reset handler tests.

use nethelper_core::EditOutcome;
use nethelper_dispatcher::DispatchOutcome;

use super::mocks::{BotCall, Harness};
use crate::{PING_RUNNING, TLS_WAIT_TARGET};

/// **Test: /menu abandons a pending conversation.**
///
/// **Setup:** User in `TLS_WAIT_TARGET` with TLS data.
/// **Action:** Dispatch text `/menu`.
/// **Expected:** State idle; data cleared; menu sent; TLS handler not invoked.
#[tokio::test]
async fn test_menu_command_resets_pending_conversation() {
    let h = Harness::new().await;
    h.press("tls:start").await;
    h.text("example.org:8443").await;
    h.press("tls:repeat").await;
    assert_eq!(h.state().await, TLS_WAIT_TARGET);
    assert!(!h.data().await.is_empty());
    let probes_before = h.tls.log.targets().len();

    let outcome = h.text("/menu").await;

    assert_eq!(outcome, DispatchOutcome::Stopped("MenuHandler"));
    assert_eq!(h.state().await, "");
    assert!(h.data().await.is_empty());
    assert_eq!(h.tls.log.targets().len(), probes_before);
    assert_eq!(h.bot.last_reply().unwrap().text, "Choose an action:");
}

/// **Test: Menu button edits the message it belongs to.**
///
/// **Setup:** Idle user.
/// **Action:** Press `menu`.
/// **Expected:** Callback acknowledged; message 77 edited into the menu; nothing sent.
#[tokio::test]
async fn test_menu_button_edits_in_place() {
    let h = Harness::new().await;

    h.press("menu").await;

    let calls = h.bot.calls();
    assert_eq!(h.bot.acks(), 1);
    assert!(matches!(
        calls.last(),
        Some(BotCall::Edit { message, reply }) if message.message_id == 77 && reply.text == "Choose an action:"
    ));
    assert!(!calls.iter().any(|c| matches!(c, BotCall::Send { .. })));
}

/// **Test: Menu falls back to a new message when the old one is gone.**
///
/// **Setup:** Bot reports `MessageGone` for edits.
/// **Action:** Press `menu`.
/// **Expected:** Edit attempted, then the menu is sent as a new message.
#[tokio::test]
async fn test_menu_button_falls_back_to_send() {
    let h = Harness::new().await;
    h.bot.set_edit_outcome(EditOutcome::MessageGone);

    h.press("menu").await;

    let calls = h.bot.calls();
    assert!(matches!(calls[calls.len() - 2], BotCall::Edit { .. }));
    assert!(matches!(
        &calls[calls.len() - 1],
        BotCall::Send { reply, .. } if reply.text == "Choose an action:"
    ));
}

/// **Test: /start during a running probe gets the busy notice.**
///
/// **Setup:** User in `PING_RUNNING`.
/// **Action:** Dispatch text `/start`.
/// **Expected:** Ping handler answers busy; state stays `PING_RUNNING`.
#[tokio::test]
async fn test_start_while_running_is_busy() {
    let h = Harness::new().await;
    h.text("hi").await;
    h.set_state(PING_RUNNING).await;

    let outcome = h.text("/start").await;

    assert_eq!(outcome, DispatchOutcome::Stopped("PingHandler"));
    assert_eq!(h.state().await, PING_RUNNING);
    assert!(h.bot.last_reply().unwrap().text.contains("still running"));
}
