use super::*;
use marketplace_monitor::AppError;
use std::time::Duration;
use tokio::sync::watch;

fn notifier_named(mut notifier: MockMailer) -> MockMailer {
    notifier.expect_name().return_const("mock-mailer".to_string());
    notifier
}

#[tokio::test]
async fn test_reference_scenario_reports_once() -> anyhow::Result<()> {
    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_fetch_listings()
        .times(2)
        .returning(|partition| Ok(vec![sealed_box(partition)]));

    let mut notifier = MockMailer::new();
    notifier
        .expect_send_summary()
        .withf(|deals: &[Deal]| {
            deals.len() == 1
                && deals[0].profit == dec!(62)
                && (deals[0].profit_pct - 68.9).abs() < 0.05
                && deals[0].listing.location == "Brooklyn"
        })
        .times(1)
        .returning(|_| Ok(()));

    let mut poll = build_loop(fetcher, notifier, &["newyork"]);

    let first = poll.run_cycle().await;
    assert_eq!(first.deals_reported, 1);

    // same listing next cycle: deduped, no email
    let second = poll.run_cycle().await;
    assert_eq!(second.deals_qualified, 1);
    assert_eq!(second.deals_reported, 0);
    Ok(())
}

#[tokio::test]
async fn test_price_over_ceiling_sends_nothing() -> anyhow::Result<()> {
    let mut fetcher = MockFetcher::new();
    fetcher.expect_fetch_listings().returning(|partition| {
        Ok(vec![listing(
            "Dexcom G6 Sensors - Sealed Box",
            dec!(40),
            partition,
            "https://newyork.craigslist.org/brk/hab/d/dexcom-g6/7700000009.html",
        )])
    });

    let mut notifier = MockMailer::new();
    notifier.expect_send_summary().never();

    let mut poll = build_loop(fetcher, notifier, &["newyork"]);
    let report = poll.run_cycle().await;

    assert_eq!(report.listings_fetched, 1);
    assert_eq!(report.deals_qualified, 0);
    Ok(())
}

#[tokio::test]
async fn test_partial_fetch_failure_still_reports() -> anyhow::Result<()> {
    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_fetch_listings()
        .withf(|partition: &str| partition == "newjersey")
        .returning(|partition| Err(AppError::fetch(partition, "connection refused")));
    fetcher
        .expect_fetch_listings()
        .withf(|partition: &str| partition == "newyork")
        .returning(|partition| Ok(vec![sealed_box(partition)]));

    let mut notifier = MockMailer::new();
    notifier
        .expect_send_summary()
        .withf(|deals: &[Deal]| deals.len() == 1 && deals[0].listing.source_partition == "newyork")
        .times(1)
        .returning(|_| Ok(()));

    // failing partition first so it cannot short-circuit the rest
    let mut poll = build_loop(fetcher, notifier, &["newjersey", "newyork"]);
    let report = poll.run_cycle().await;

    assert_eq!(report.partitions_failed, 1);
    assert_eq!(report.partitions_ok, 1);
    assert_eq!(report.deals_reported, 1);
    Ok(())
}

#[tokio::test]
async fn test_misconfigured_partition_does_not_stop_the_cycle() -> anyhow::Result<()> {
    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_fetch_listings()
        .withf(|partition: &str| partition == "newjersey")
        .returning(|_| Err(AppError::Config("invalid search URL".to_string())));
    fetcher
        .expect_fetch_listings()
        .withf(|partition: &str| partition == "newyork")
        .returning(|partition| Ok(vec![sealed_box(partition)]));

    let mut notifier = MockMailer::new();
    notifier.expect_send_summary().times(1).returning(|_| Ok(()));

    let mut poll = build_loop(fetcher, notifier, &["newjersey", "newyork"]);
    let report = poll.run_cycle().await;

    assert_eq!(report.partitions_failed, 1);
    assert_eq!(report.deals_reported, 1);
    Ok(())
}

#[tokio::test]
async fn test_distinct_listings_both_reported() -> anyhow::Result<()> {
    let mut fetcher = MockFetcher::new();
    fetcher.expect_fetch_listings().returning(|partition| {
        Ok(vec![
            listing("Dexcom G6 3-pack", dec!(30), partition, "https://x.craigslist.org/a.html"),
            listing("dexcom g6 sensors", dec!(20), partition, "https://x.craigslist.org/b.html"),
        ])
    });

    let mut notifier = MockMailer::new();
    notifier
        .expect_send_summary()
        .withf(|deals: &[Deal]| deals.len() == 2)
        .times(1)
        .returning(|_| Ok(()));

    let mut poll = build_loop(fetcher, notifier, &["newyork"]);
    assert_eq!(poll.run_cycle().await.deals_reported, 2);
    Ok(())
}

#[tokio::test]
async fn test_same_listing_in_two_partitions_reported_once() -> anyhow::Result<()> {
    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_fetch_listings()
        .times(2)
        .returning(|partition| Ok(vec![sealed_box(partition)]));

    let mut notifier = MockMailer::new();
    notifier
        .expect_send_summary()
        .withf(|deals: &[Deal]| deals.len() == 1)
        .times(1)
        .returning(|_| Ok(()));

    let mut poll = build_loop(fetcher, notifier, &["newyork", "longisland"]);
    let report = poll.run_cycle().await;

    assert_eq!(report.deals_qualified, 2);
    assert_eq!(report.deals_new, 1);
    Ok(())
}

#[tokio::test]
async fn test_notify_failure_is_absorbed_and_retried_next_cycle() -> anyhow::Result<()> {
    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_fetch_listings()
        .returning(|partition| Ok(vec![sealed_box(partition)]));

    let mut seq = mockall::Sequence::new();
    let mut notifier = notifier_named(MockMailer::new());
    notifier
        .expect_send_summary()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Err(AppError::Notify("535 authentication failed".to_string())));
    notifier
        .expect_send_summary()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));

    let mut poll = build_loop(fetcher, notifier, &["newyork"]);

    let failed = poll.run_cycle().await;
    assert!(failed.notification_failed);
    assert_eq!(poll.seen_count(), 0);

    let retried = poll.run_cycle().await;
    assert!(!retried.notification_failed);
    assert_eq!(retried.deals_reported, 1);
    assert_eq!(poll.seen_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_unpriced_listings_do_not_break_the_batch() -> anyhow::Result<()> {
    let mut fetcher = MockFetcher::new();
    fetcher.expect_fetch_listings().returning(|partition| {
        Ok(vec![
            Listing::new("Dexcom G6 - make offer", None, partition),
            Listing::new("Dexcom G6 - free", Some(dec!(0)), partition),
            sealed_box(partition),
        ])
    });

    let mut notifier = MockMailer::new();
    notifier
        .expect_send_summary()
        .withf(|deals: &[Deal]| deals.len() == 1 && deals[0].price == dec!(28))
        .times(1)
        .returning(|_| Ok(()));

    let mut poll = build_loop(fetcher, notifier, &["newyork"]);
    let report = poll.run_cycle().await;
    assert_eq!(report.listings_fetched, 3);
    assert_eq!(report.deals_reported, 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_loop_runs_until_shutdown() -> anyhow::Result<()> {
    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_fetch_listings()
        .times(2)
        .returning(|partition| Ok(vec![sealed_box(partition)]));

    let mut notifier = MockMailer::new();
    notifier.expect_send_summary().times(1).returning(|_| Ok(()));

    let poll = build_loop(fetcher, notifier, &["newyork"]);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(poll.run(shutdown_rx));

    // cycles at t=0 and t=300, shutdown during the second sleep
    tokio::time::sleep(Duration::from_secs(450)).await;
    shutdown_tx.send(true)?;
    handle.await?;
    Ok(())
}
