//! Integration tests: batch trigger timing on a paused Tokio clock

use inkpause::config::Config;
use inkpause::trigger::{BatchTrigger, BatchTriggerConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn counting_trigger(config: BatchTriggerConfig) -> (BatchTrigger, Arc<AtomicUsize>) {
    let fires = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fires);
    let trigger = BatchTrigger::new(config, move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    (trigger, fires)
}

#[tokio::test(start_paused = true)]
async fn test_fires_once_after_interval() {
    let (trigger, fires) = counting_trigger(BatchTriggerConfig::default());
    trigger.start().unwrap();
    trigger.record_stroke_added();

    sleep(Duration::from_millis(2800)).await;
    assert_eq!(fires.load(Ordering::SeqCst), 0);

    sleep(Duration::from_millis(400)).await;
    assert_eq!(fires.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_no_fire_without_strokes() {
    let (trigger, fires) = counting_trigger(BatchTriggerConfig::default());
    trigger.start().unwrap();

    sleep(Duration::from_secs(20)).await;
    assert_eq!(fires.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_batch_sent_suppresses_refire() {
    let (trigger, fires) = counting_trigger(BatchTriggerConfig::default());
    trigger.start().unwrap();
    trigger.record_stroke_added();

    sleep(Duration::from_millis(3200)).await;
    assert_eq!(fires.load(Ordering::SeqCst), 1);
    trigger.record_batch_sent();
    assert_eq!(trigger.pending_strokes(), 0);

    sleep(Duration::from_secs(10)).await;
    assert_eq!(fires.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unacknowledged_batch_refires_each_interval() {
    let (trigger, fires) = counting_trigger(BatchTriggerConfig::default());
    trigger.start().unwrap();
    trigger.record_stroke_added();

    // Fires at 3s, then not again until 6s
    sleep(Duration::from_millis(5800)).await;
    assert_eq!(fires.load(Ordering::SeqCst), 1);

    sleep(Duration::from_millis(400)).await;
    assert_eq!(fires.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_strokes_after_batch_wait_for_new_interval() {
    let (trigger, fires) = counting_trigger(BatchTriggerConfig::default());
    trigger.start().unwrap();

    sleep(Duration::from_secs(1)).await;
    trigger.record_batch_sent();
    trigger.record_stroke_added();

    // Interval is measured from the batch at 1s
    sleep(Duration::from_millis(2800)).await;
    assert_eq!(fires.load(Ordering::SeqCst), 0);

    sleep(Duration::from_millis(400)).await;
    assert_eq!(fires.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_and_restart() {
    let (trigger, fires) = counting_trigger(BatchTriggerConfig::default());
    trigger.start().unwrap();
    trigger.record_stroke_added();
    trigger.stop();
    assert!(!trigger.is_active());

    sleep(Duration::from_secs(5)).await;
    assert_eq!(fires.load(Ordering::SeqCst), 0);
    assert_eq!(trigger.pending_strokes(), 1);

    trigger.start().unwrap();
    sleep(Duration::from_millis(600)).await;
    assert_eq!(fires.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_timing_from_config_file_values() {
    let mut config = Config::default();
    config.trigger.interval = "1s".to_string();
    config.trigger.check_interval = "100ms".to_string();

    let (trigger, fires) = counting_trigger(config.trigger.to_batch_config().unwrap());
    trigger.start().unwrap();
    trigger.record_stroke_added();

    sleep(Duration::from_millis(1050)).await;
    assert_eq!(fires.load(Ordering::SeqCst), 1);
}
