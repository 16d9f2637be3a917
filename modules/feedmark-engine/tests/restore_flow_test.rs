//! Save/restore against a simulated, lazily loaded feed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;

use feedmark_common::{
    Anchor, AnchorContext, Config, FeedVariant, FeedView, ScrollBehavior,
};
use feedmark_engine::{
    Bookmarker, CancelToken, Neighbor, ProgressFn, RestoreOutcome, SaveOutcome, SearchProgress,
};
use feedmark_store::{AnchorStore, MemoryAnchorStore};
use simfeed::{LogEntry, SimFeedConfig, SimPost, SimulatedFeed};

fn session(feed: &Arc<SimulatedFeed>, store: &Arc<MemoryAnchorStore>) -> Bookmarker {
    Bookmarker::new(feed.clone(), store.clone(), Config::default())
}

/// Load through `id` and scroll so it sits `offset` px below the viewport top.
fn park(feed: &SimulatedFeed, id: &str, offset: f64) -> f64 {
    assert!(feed.load_through(id), "{id} not in feed");
    let top = feed.doc_top_of(id).unwrap();
    feed.scroll_to(top - offset, ScrollBehavior::Instant);
    top
}

fn post_id(n: u64) -> String {
    SimPost::numbered(n).id
}

fn anchor_for(id: &str, scroll_y: f64) -> Anchor {
    Anchor {
        item_id: Some(id.to_string()),
        item_url: None,
        text: None,
        author_handle: None,
        author_name: None,
        item_timestamp: None,
        captured_at: Utc::now(),
        scroll_y: Some(scroll_y),
        offset_top: Some(0.0),
        page_url: Some("https://x.com/home".to_string()),
        feed_variant: FeedVariant::Following,
        has_social_context: false,
        is_promoted: false,
        context: AnchorContext::default(),
    }
}

async fn save(session: &Bookmarker) -> Anchor {
    match session.save().await.unwrap() {
        SaveOutcome::Saved(anchor) => anchor,
        other => panic!("expected save, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn restores_deep_position_after_reload() {
    let store = Arc::new(MemoryAnchorStore::new());
    let target = post_id(150);

    let before_reload = Arc::new(SimulatedFeed::numbered(SimFeedConfig::default(), 400));
    park(&before_reload, &target, 40.0);
    let anchor = save(&session(&before_reload, &store)).await;
    assert_eq!(anchor.item_id.as_deref(), Some(target.as_str()));
    assert_eq!(anchor.offset_top, Some(40.0));

    // Fresh page: only the first page is loaded again.
    let feed = Arc::new(SimulatedFeed::numbered(SimFeedConfig::default(), 400));
    let start = Instant::now();
    let outcome = session(&feed, &store)
        .restore(&CancelToken::new(), None)
        .await
        .unwrap();

    match outcome {
        RestoreOutcome::Restored { item, .. } => {
            assert_eq!(item.id.as_deref(), Some(target.as_str()))
        }
        other => panic!("expected restore, got {other:?}"),
    }
    assert!(start.elapsed() < Duration::from_secs(90));
    assert_eq!(feed.scroll_y(), feed.doc_top_of(&target).unwrap() - 40.0);
    assert!(feed.log().fetches() >= 6);
}

#[tokio::test(start_paused = true)]
async fn restores_after_new_posts_push_content_down() {
    let store = Arc::new(MemoryAnchorStore::new());
    let feed = Arc::new(SimulatedFeed::numbered(SimFeedConfig::default(), 200));
    let target = post_id(5);
    let saved_top = park(&feed, &target, 0.0);
    let session = session(&feed, &store);
    save(&session).await;

    feed.prepend(
        (0..8)
            .map(|n| SimPost::new(format!("9{n}"), "@fresh", "just in").with_height(300.0))
            .collect(),
    );
    assert_eq!(feed.doc_top_of(&target), Some(saved_top + 2400.0));

    let outcome = session.restore(&CancelToken::new(), None).await.unwrap();

    assert_eq!(outcome.as_str(), "restored");
    assert_eq!(feed.scroll_y(), saved_top + 2400.0);
}

#[tokio::test(start_paused = true)]
async fn deleted_target_falls_back_to_neighbor() {
    let config = SimFeedConfig {
        end_marker: false,
        ..Default::default()
    };
    let store = Arc::new(MemoryAnchorStore::new());
    let target = post_id(10);

    let original = Arc::new(SimulatedFeed::numbered(config.clone(), 30));
    park(&original, &target, 0.0);
    let anchor = save(&session(&original, &store)).await;
    assert_eq!(
        anchor.context.after.as_ref().and_then(|c| c.id.as_deref()),
        Some(post_id(11).as_str())
    );

    let feed = Arc::new(SimulatedFeed::numbered(config, 30));
    assert_eq!(feed.remove(&target), 1);

    let outcome = session(&feed, &store)
        .restore(&CancelToken::new(), None)
        .await
        .unwrap();

    match outcome {
        RestoreOutcome::NearContext {
            neighbor,
            target_scroll_y,
        } => {
            assert_eq!(neighbor, Neighbor::After);
            assert_eq!(feed.scroll_y(), target_scroll_y);
        }
        other => panic!("expected neighbor fallback, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn visible_end_of_feed_stops_without_fallback() {
    let store = Arc::new(MemoryAnchorStore::new());
    store.save_anchor(&anchor_for("404", 0.0)).await.unwrap();
    let feed = Arc::new(SimulatedFeed::numbered(SimFeedConfig::default(), 30));

    let outcome = session(&feed, &store)
        .restore(&CancelToken::new(), None)
        .await
        .unwrap();

    assert_eq!(outcome, RestoreOutcome::NoMoreContent);
}

/// Layout: ... 12, 13, repost of 12, 14 ...
fn repost_top(feed: &SimulatedFeed) -> f64 {
    feed.doc_top_of(&post_id(13)).unwrap() + SimPost::numbered(13).height
}

#[tokio::test(start_paused = true)]
async fn repost_copy_is_chosen_by_saved_social_context() {
    let build = || {
        let feed = SimulatedFeed::numbered(SimFeedConfig::default(), 60);
        assert!(feed.repost(&post_id(12), "Dana", 14));
        Arc::new(feed)
    };
    let target = post_id(12);

    // Saved on the plain copy.
    let store = Arc::new(MemoryAnchorStore::new());
    let original = build();
    park(&original, &target, 0.0);
    assert!(!save(&session(&original, &store)).await.has_social_context);

    let feed = build();
    match session(&feed, &store).restore(&CancelToken::new(), None).await.unwrap() {
        RestoreOutcome::Restored { item, .. } => assert!(!item.has_social_context),
        other => panic!("expected restore, got {other:?}"),
    }
    assert_eq!(feed.scroll_y(), feed.doc_top_of(&target).unwrap());

    // Saved on the repost.
    let store = Arc::new(MemoryAnchorStore::new());
    let original = build();
    original.scroll_to(repost_top(&original), ScrollBehavior::Instant);
    let anchor = save(&session(&original, &store)).await;
    assert_eq!(anchor.item_id.as_deref(), Some(target.as_str()));
    assert!(anchor.has_social_context);

    let feed = build();
    match session(&feed, &store).restore(&CancelToken::new(), None).await.unwrap() {
        RestoreOutcome::Restored { item, .. } => assert!(item.has_social_context),
        other => panic!("expected restore, got {other:?}"),
    }
    assert_eq!(feed.scroll_y(), repost_top(&feed));
}

#[tokio::test(start_paused = true)]
async fn switches_back_to_following_before_searching() {
    let build = || {
        SimulatedFeed::numbered(SimFeedConfig::default(), 100).with_variant(
            FeedVariant::ForYou,
            (500..600).map(SimPost::numbered).collect(),
        )
    };
    let store = Arc::new(MemoryAnchorStore::new());
    let target = post_id(8);

    let original = Arc::new(build());
    park(&original, &target, 0.0);
    save(&session(&original, &store)).await;

    let feed = Arc::new(build().starting_on(FeedVariant::ForYou));
    let outcome = session(&feed, &store)
        .restore(&CancelToken::new(), None)
        .await
        .unwrap();

    assert_eq!(outcome.as_str(), "restored");
    assert_eq!(feed.feed_variant(), FeedVariant::Following);
    assert!(feed.log().entries.iter().any(|e| matches!(
        e,
        LogEntry::VariantSelected {
            variant: FeedVariant::Following,
            ..
        }
    )));
}

#[tokio::test(start_paused = true)]
async fn endless_feed_times_out() {
    let store = Arc::new(MemoryAnchorStore::new());
    store.save_anchor(&anchor_for("42", 0.0)).await.unwrap();
    let feed = Arc::new(SimulatedFeed::endless(SimFeedConfig::default()));

    let start = Instant::now();
    let outcome = session(&feed, &store)
        .restore(&CancelToken::new(), None)
        .await
        .unwrap();

    assert_eq!(outcome, RestoreOutcome::TimedOut);
    assert!(start.elapsed() >= Duration::from_secs(90));
    assert!(start.elapsed() < Duration::from_secs(92));
    assert!(feed.loaded_count() > 100);
}

#[tokio::test(start_paused = true)]
async fn cancel_stops_a_running_restore() {
    let store = Arc::new(MemoryAnchorStore::new());
    store.save_anchor(&anchor_for("42", 0.0)).await.unwrap();
    let feed = Arc::new(SimulatedFeed::endless(SimFeedConfig::default()));
    let bookmarker = Arc::new(session(&feed, &store));

    let events = Arc::new(AtomicUsize::new(0));
    let on_progress: ProgressFn = {
        let events = events.clone();
        Arc::new(move |p: &SearchProgress| {
            assert!(p.message().starts_with("Searching: "));
            events.fetch_add(1, Ordering::Relaxed);
        })
    };

    let cancel = CancelToken::new();
    let start = Instant::now();
    let task = {
        let bookmarker = bookmarker.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { bookmarker.restore(&cancel, Some(on_progress)).await })
    };
    tokio::time::sleep(Duration::from_secs(20)).await;
    cancel.cancel();

    let outcome = task.await.unwrap().unwrap();
    assert_eq!(outcome, RestoreOutcome::Cancelled);
    assert!(start.elapsed() < Duration::from_secs(21));
    let events = events.load(Ordering::Relaxed);
    assert!((4..=7).contains(&events), "{events} progress events");
    assert!(!bookmarker.is_searching());
}

#[tokio::test(start_paused = true)]
async fn expired_anchor_is_discarded() {
    let mut anchor = anchor_for(&post_id(3), 0.0);
    anchor.captured_at = Utc::now() - chrono::Duration::days(31);
    let store = Arc::new(MemoryAnchorStore::new().with_anchor(anchor));
    let feed = Arc::new(SimulatedFeed::numbered(SimFeedConfig::default(), 50));

    let outcome = session(&feed, &store)
        .restore(&CancelToken::new(), None)
        .await
        .unwrap();

    assert_eq!(outcome, RestoreOutcome::NoAnchor);
    assert!(!store.has_anchor().await.unwrap());
    assert!(feed.log().scroll_calls().next().is_none());
}
