//! Integration tests for the notifications manager.
//!
//! These start a real reactor thread, drive it through the sync facade and
//! wait on the response sinks the way an HTTP handler would.

use std::time::{Duration, Instant};

use chrono::DateTime;
use onvif_devices::{DigitalInput, DigitalInputs};
use onvif_events::{
    EventError, EventGenerator, ManagerOptions, NotificationsManager, PendingResponse,
    PropertyOperation, PullMessagesResponse,
};

const MSG_ID: &str = "urn:uuid:5b8e1f3c-0000-4000-8000-000000000001";

fn options(timeout: Duration, synchronize_on_subscribe: bool) -> ManagerOptions {
    ManagerOptions {
        pull_point_timeout: timeout,
        synchronize_on_subscribe,
        ..ManagerOptions::default()
    }
}

fn running(options: ManagerOptions, generators: Vec<EventGenerator>) -> NotificationsManager {
    let mut manager = NotificationsManager::new(options);
    for generator in generators {
        manager.add_generator(generator).unwrap();
    }
    manager.run().unwrap();
    manager
}

fn pull(
    manager: &NotificationsManager,
    reference: &str,
) -> PendingResponse<onvif_events::PullMessagesResult> {
    let (sink, pending) = PendingResponse::channel();
    manager
        .pull_messages(sink, reference, MSG_ID, Duration::from_secs(10), 10)
        .unwrap();
    pending
}

fn pull_ok(manager: &NotificationsManager, reference: &str) -> PullMessagesResponse {
    pull(manager, reference).wait().unwrap().unwrap()
}

#[test]
fn test_create_pull_point_references() {
    let manager = running(ManagerOptions::default(), Vec::new());

    let first = manager.create_pull_point().unwrap().wait().unwrap();
    let second = manager.create_pull_point().unwrap().wait().unwrap();

    assert_eq!(first.subscription_reference, "onvif/event_service/s0");
    assert_eq!(second.subscription_reference, "onvif/event_service/s1");

    let renewed = DateTime::parse_from_rfc3339(&first.last_renew).unwrap();
    let terminates = DateTime::parse_from_rfc3339(&first.termination_time).unwrap();
    assert_eq!((terminates - renewed).num_seconds(), 60);
}

#[test]
fn test_custom_subscription_path() {
    let manager = running(
        ManagerOptions {
            subscription_path: "events".to_string(),
            ..ManagerOptions::default()
        },
        Vec::new(),
    );

    let handle = manager.create_pull_point().unwrap().wait().unwrap();
    assert_eq!(handle.subscription_reference, "events/s0");
}

#[test]
fn test_pull_unknown_reference_faults() {
    let manager = running(ManagerOptions::default(), Vec::new());
    manager.create_pull_point().unwrap().wait().unwrap();

    let result = pull(&manager, "onvif/event_service/s7").wait().unwrap();
    assert!(matches!(
        result,
        Err(EventError::UnknownSubscription { ref reference }) if reference == "onvif/event_service/s7"
    ));
}

#[test]
fn test_motion_alarm_alternates() {
    let generator = EventGenerator::motion_alarm(
        "VS_0",
        Duration::from_millis(50),
        "tns1:VideoSource/MotionAlarm",
    );
    let manager = running(options(Duration::from_secs(5), false), vec![generator]);
    let handle = manager.create_pull_point().unwrap().wait().unwrap();

    let mut values = Vec::new();
    while values.len() < 2 {
        let response = pull_ok(&manager, &handle.subscription_reference);
        assert_eq!(response.relates_to, MSG_ID);
        for message in &response.messages {
            assert_eq!(message.property_operation(), PropertyOperation::Changed);
            assert_eq!(message.source_value(), "VS_0");
            values.push(message.data_value().to_string());
        }
    }

    assert_eq!(values[0], "true");
    assert_eq!(values[1], "false");
}

#[test]
fn test_empty_poll_times_out() {
    let timeout = Duration::from_millis(150);
    let manager = running(options(timeout, false), Vec::new());
    let handle = manager.create_pull_point().unwrap().wait().unwrap();

    let start = Instant::now();
    let response = pull_ok(&manager, &handle.subscription_reference);

    assert!(response.messages.is_empty());
    assert!(start.elapsed() >= timeout);
    assert_eq!(response.subscription_reference, handle.subscription_reference);
}

#[test]
fn test_synchronization_on_subscribe() {
    let inputs: DigitalInputs = vec![
        DigitalInput::new("DI_0"),
        DigitalInput::new("DI_1").with_state(true),
    ]
    .into_iter()
    .collect();
    let generator = EventGenerator::digital_input(
        Duration::from_secs(3600),
        "tns1:Device/Trigger/DigitalInput",
        Some(inputs),
    );
    let manager = running(ManagerOptions::default(), vec![generator]);
    let handle = manager.create_pull_point().unwrap().wait().unwrap();

    let response = pull_ok(&manager, &handle.subscription_reference);
    assert_eq!(response.messages.len(), 2);
    for (message, expected) in response.messages.iter().zip(["false", "true"]) {
        assert_eq!(message.property_operation(), PropertyOperation::Initialized);
        assert_eq!(message.data_name(), "LogicalState");
        assert_eq!(message.data_value(), expected);
    }
}

#[test]
fn test_set_synchronization_point() {
    let generator = EventGenerator::motion_alarm(
        "VS_0",
        Duration::from_secs(3600),
        "tns1:VideoSource/MotionAlarm",
    );
    let manager = running(options(Duration::from_secs(5), false), vec![generator]);
    let handle = manager.create_pull_point().unwrap().wait().unwrap();

    let (sink, pending) = PendingResponse::channel();
    manager
        .set_synchronization_point(sink, &handle.subscription_reference)
        .unwrap();
    pending.wait().unwrap().unwrap();

    let response = pull_ok(&manager, &handle.subscription_reference);
    assert_eq!(response.messages.len(), 1);
    assert_eq!(
        response.messages[0].property_operation(),
        PropertyOperation::Initialized
    );
    assert_eq!(response.messages[0].data_value(), "false");
}

#[test]
fn test_unsubscribe_then_pull_faults() {
    let manager = running(ManagerOptions::default(), Vec::new());
    let handle = manager.create_pull_point().unwrap().wait().unwrap();

    let (sink, pending) = PendingResponse::channel();
    manager
        .unsubscribe(sink, &handle.subscription_reference)
        .unwrap();
    assert!(pending.wait().unwrap().is_ok());

    let result = pull(&manager, &handle.subscription_reference).wait().unwrap();
    assert!(matches!(result, Err(EventError::UnknownSubscription { .. })));

    let (sink, pending) = PendingResponse::channel();
    manager
        .unsubscribe(sink, &handle.subscription_reference)
        .unwrap();
    assert!(matches!(
        pending.wait().unwrap(),
        Err(EventError::UnknownSubscription { .. })
    ));
}

#[test]
fn test_unsubscribe_terminates_outstanding_poll() {
    let manager = running(options(Duration::from_secs(60), false), Vec::new());
    let handle = manager.create_pull_point().unwrap().wait().unwrap();

    let outstanding = pull(&manager, &handle.subscription_reference);

    let (sink, pending) = PendingResponse::channel();
    manager
        .unsubscribe(sink, &handle.subscription_reference)
        .unwrap();
    pending.wait().unwrap().unwrap();

    assert!(matches!(
        outstanding.wait().unwrap(),
        Err(EventError::SubscriptionTerminated { .. })
    ));
}

#[test]
fn test_newer_poll_abandons_older() {
    let manager = running(options(Duration::from_millis(200), false), Vec::new());
    let handle = manager.create_pull_point().unwrap().wait().unwrap();

    let first = pull(&manager, &handle.subscription_reference);
    let second = pull(&manager, &handle.subscription_reference);

    assert!(matches!(first.wait(), Err(EventError::ResponseAbandoned)));
    assert!(second.wait().unwrap().unwrap().messages.is_empty());
}

#[test]
fn test_renew_moves_termination_time() {
    let manager = running(ManagerOptions::default(), Vec::new());
    let handle = manager.create_pull_point().unwrap().wait().unwrap();

    let (sink, pending) = PendingResponse::channel();
    manager
        .renew(sink, &handle.subscription_reference, MSG_ID)
        .unwrap();
    let response = pending.wait().unwrap().unwrap();

    assert_eq!(response.subscription_reference, handle.subscription_reference);
    assert_eq!(response.relates_to, MSG_ID);

    let now = DateTime::parse_from_rfc3339(&response.current_time).unwrap();
    let terminates = DateTime::parse_from_rfc3339(&response.termination_time).unwrap();
    assert_eq!((terminates - now).num_seconds(), 60);
}

#[test]
fn test_renew_unknown_reference_faults() {
    let manager = running(ManagerOptions::default(), Vec::new());

    let (sink, pending) = PendingResponse::channel();
    manager
        .renew(sink, "onvif/event_service/s0", MSG_ID)
        .unwrap();
    assert!(matches!(
        pending.wait().unwrap(),
        Err(EventError::UnknownSubscription { .. })
    ));
}

#[test]
fn test_absolute_reference_matches() {
    let manager = running(options(Duration::from_millis(100), false), Vec::new());
    manager.create_pull_point().unwrap().wait().unwrap();

    let response = pull_ok(&manager, "http://192.168.1.1:8080/onvif/event_service/s0");
    assert_eq!(response.subscription_reference, "onvif/event_service/s0");
}

#[test]
fn test_shutdown_terminates_outstanding_poll() {
    let manager = running(options(Duration::from_secs(60), false), Vec::new());
    let handle = manager.create_pull_point().unwrap().wait().unwrap();

    let outstanding = pull(&manager, &handle.subscription_reference);
    manager.shutdown();

    assert!(matches!(
        outstanding.wait().unwrap(),
        Err(EventError::SubscriptionTerminated { .. })
    ));
}

#[test]
fn test_closure_sink_runs_on_reactor_and_hands_off() {
    let manager = running(ManagerOptions::default(), Vec::new());
    let handle = manager.create_pull_point().unwrap().wait().unwrap();

    let (tx, rx) = std::sync::mpsc::channel();
    manager
        .set_synchronization_point(
            onvif_events::sink_fn(move |result: onvif_events::AckResult| {
                let thread = std::thread::current().name().map(str::to_string);
                let _ = tx.send((thread, result.is_ok()));
            }),
            &handle.subscription_reference,
        )
        .unwrap();

    let (thread, ok) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(thread.as_deref(), Some("onvif-events-reactor"));
    assert!(ok);
}
