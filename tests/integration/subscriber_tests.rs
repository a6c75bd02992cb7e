use super::*;
use std::time::Duration;
use ticket_watcher::models::MonitorStatus;

#[tokio::test]
async fn test_subscribe_messages() -> anyhow::Result<()> {
    let harness = TestHarness::new(vec![Step::Listings(vec![])]).await?;
    let service = &harness.service;

    assert_eq!(
        service.subscribe("Foo@Bar.COM ", "").await,
        (true, "Successfully subscribed!".to_string())
    );
    assert_eq!(
        service.subscribe("foo@bar.com", "Again").await,
        (false, "Email already subscribed".to_string())
    );
    assert_eq!(
        service.subscribe("not-an-email", "").await,
        (false, "Invalid email format".to_string())
    );
    assert_eq!(service.get_subscriber_count().await, 1);

    service.drain_background().await;
    assert_eq!(harness.mailer.sent().len(), 1, "only the accepted address is welcomed");
    Ok(())
}

#[tokio::test]
async fn test_welcome_lists_current_tickets() -> anyhow::Result<()> {
    let harness = TestHarness::new(vec![page(&["Block 101 Row A", "Block 230 Row F"])]).await?;

    harness.service.add_subscriber("fan@example.com", "Noel").await?;
    harness.service.drain_background().await;

    let sent = harness.mailer.sent_to("fan@example.com");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Welcome! 2 Oasis listings available now");
    assert!(sent[0].body.starts_with("Hi Noel!"));
    assert!(sent[0].body.contains("Block 230 Row F"));
    Ok(())
}

#[tokio::test]
async fn test_welcome_after_failed_check_claims_nothing_about_listings() -> anyhow::Result<()> {
    let harness = TestHarness::new(vec![Step::Fail]).await?;

    harness.service.add_subscriber("fan@example.com", "").await?;
    harness.service.drain_background().await;

    let sent = harness.mailer.sent_to("fan@example.com");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "You're subscribed to Oasis ticket alerts");
    assert!(sent[0].body.starts_with("Hi there!"));
    assert!(
        !sent[0].body.contains("Nothing is listed"),
        "an unreadable page must not be reported as empty"
    );
    Ok(())
}

#[tokio::test]
async fn test_welcome_on_confirmed_empty_page_says_nothing_listed() -> anyhow::Result<()> {
    let harness = TestHarness::new(vec![Step::Listings(vec![])]).await?;

    harness.service.add_subscriber("fan@example.com", "").await?;
    harness.service.drain_background().await;

    let sent = harness.mailer.sent_to("fan@example.com");
    assert_eq!(sent.len(), 1);
    assert!(sent[0].body.contains("Nothing is listed right now"));
    Ok(())
}

#[tokio::test]
async fn test_undeliverable_welcome_keeps_subscription() -> anyhow::Result<()> {
    let harness = TestHarness::new(vec![Step::Listings(vec![])]).await?;
    harness.mailer.fail_for("fan@example.com");

    harness.service.add_subscriber("fan@example.com", "").await?;
    harness.service.drain_background().await;

    assert_eq!(harness.service.get_subscriber_count().await, 1);
    assert!(harness.mailer.sent().is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_welcome_check_does_not_touch_known_listings() -> anyhow::Result<()> {
    let harness = TestHarness::build(
        vec![page(&["Block A"]), page(&["Block A", "Block B"])],
        &[],
        |_| {},
    )
    .await?;

    // The welcome check sees the page first; the loop must still baseline on its own
    harness.service.add_subscriber("fan@example.com", "").await?;
    harness.service.drain_background().await;

    let report = harness.service.check_now().await?;
    assert!(!report.baselined);

    assert!(harness.service.start_monitoring().await);
    let fetcher = harness.fetcher.clone();
    assert!(wait_for_condition(|| fetcher.calls() >= 4, Duration::from_secs(600)).await);
    harness.service.shutdown().await;

    // welcome + nothing else: the loop's first look was a baseline
    let sent = harness.mailer.sent_to("fan@example.com");
    assert_eq!(sent.len(), 1);
    assert!(sent[0].subject.starts_with("Welcome!"));
    Ok(())
}

#[tokio::test]
async fn test_remove_is_idempotent() -> anyhow::Result<()> {
    let harness = TestHarness::build(vec![Step::Listings(vec![])], &["a@example.com"], |_| {}).await?;
    let service = &harness.service;

    assert!(service.remove_subscriber(" A@Example.com").await);
    assert!(!service.remove_subscriber("a@example.com").await);
    assert_eq!(service.get_subscriber_count().await, 0);

    let stored: Vec<serde_json::Value> =
        serde_json::from_slice(&std::fs::read(&harness.config.storage.subscribers_path)?)?;
    assert!(stored.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_status_reports_live_subscriber_count() -> anyhow::Result<()> {
    let harness = TestHarness::build(vec![Step::Listings(vec![])], &["a@example.com", "b@example.com"], |_| {}).await?;

    let status = harness.service.get_status().await;
    assert_eq!(
        status,
        MonitorStatus {
            subscriber_count: 2,
            ..Default::default()
        }
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_reset_baseline_rebaselines_without_alerts() -> anyhow::Result<()> {
    let harness = TestHarness::build(vec![page(&["Block A", "Block B"])], &["fan@example.com"], |c| {
        c.monitor.check_interval_secs = 60;
    })
    .await?;

    assert!(harness.service.start_monitoring().await);
    let fetcher = harness.fetcher.clone();
    assert!(wait_for_condition(|| fetcher.calls() >= 1, Duration::from_secs(600)).await);
    tokio::time::sleep(Duration::from_secs(1)).await;

    let before = harness.service.check_now().await?;
    assert!(before.baselined);
    assert!(before.unseen.is_empty());

    let report = harness.service.reset_baseline().await?;
    assert!(!report.baselined);
    assert_eq!(report.current.len(), 2);
    assert_eq!(report.unseen.len(), 2);

    let calls = harness.fetcher.calls();
    let fetcher = harness.fetcher.clone();
    assert!(wait_for_condition(|| fetcher.calls() >= calls + 2, Duration::from_secs(600)).await);
    harness.service.shutdown().await;

    assert!(harness.mailer.sent().is_empty());
    assert!(harness.service.check_now().await?.baselined);
    Ok(())
}
