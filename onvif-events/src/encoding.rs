//! Stateless helpers for the SOAP layer.
//!
//! Subscription reference matching plus builders for the XML bodies of every
//! event service response. Builders return `xmltree` trees with the usual
//! ONVIF prefixes; [`soap_envelope`] declares the namespaces once on the root
//! and [`to_xml_string`] renders a tree without an XML declaration.

use xmltree::{Element, EmitterConfig, Namespace, XMLNode};

use crate::error::{EventError, Result};
use crate::message::{NotificationMessage, SimpleItem};
use crate::response::{PullMessagesResponse, PullPointHandle, RenewResponse};

pub const SOAP_ENVELOPE_NS: &str = "http://www.w3.org/2003/05/soap-envelope";
pub const WSNT_NS: &str = "http://docs.oasis-open.org/wsn/b-2";
pub const WSA_NS: &str = "http://www.w3.org/2005/08/addressing";
pub const WSRF_RW_NS: &str = "http://docs.oasis-open.org/wsrf/rw-2";
pub const TT_NS: &str = "http://www.onvif.org/ver10/schema";
pub const TNS1_NS: &str = "http://www.onvif.org/ver10/topics";
pub const TEV_NS: &str = "http://www.onvif.org/ver10/events/wsdl";
pub const TER_NS: &str = "http://www.onvif.org/ver10/error";

/// Topic dialect of every emitted topic expression.
pub const TOPIC_DIALECT: &str = "http://www.onvif.org/ver10/tev/topicExpression/ConcreteSet";

/// Fault subcode for references that do not resolve to a pull point.
pub const RESOURCE_UNKNOWN_FAULT: &str = "wsrf-rw:ResourceUnknownFault";

/// Fault subcode for every other failure.
pub const ACTION_FAULT: &str = "ter:Action";

const PREFIXES: [(&str, &str); 8] = [
    ("s", SOAP_ENVELOPE_NS),
    ("wsnt", WSNT_NS),
    ("wsa", WSA_NS),
    ("wsrf-rw", WSRF_RW_NS),
    ("tt", TT_NS),
    ("tns1", TNS1_NS),
    ("tev", TEV_NS),
    ("ter", TER_NS),
];

fn namespace_uri(prefix: &str) -> Option<&'static str> {
    PREFIXES
        .iter()
        .find(|(known, _)| *known == prefix)
        .map(|(_, uri)| *uri)
}

fn element(prefix: &str, name: &str) -> Element {
    let mut element = Element::new(name);
    element.prefix = Some(prefix.to_string());
    element.namespace = namespace_uri(prefix).map(str::to_string);
    element
}

fn text_element(prefix: &str, name: &str, text: impl Into<String>) -> Element {
    let mut element = element(prefix, name);
    element.children.push(XMLNode::Text(text.into()));
    element
}

fn with_children(mut parent: Element, children: impl IntoIterator<Item = Element>) -> Element {
    parent
        .children
        .extend(children.into_iter().map(XMLNode::Element));
    parent
}

fn declare(element: &mut Element, prefixes: &[&str]) {
    let mut namespaces = element.namespaces.take().unwrap_or_else(Namespace::empty);
    for prefix in prefixes {
        if let Some(uri) = namespace_uri(prefix) {
            namespaces.put(*prefix, uri);
        }
    }
    element.namespaces = Some(namespaces);
}

/// Compare a subscription reference from a request against a stored
/// reference path.
///
/// The request side may be an absolute address; scheme, host and any
/// leading path segments are ignored as long as the remaining path ends
/// with `reference_path` on a segment boundary.
///
/// ```rust
/// use onvif_events::encoding::compare_subscription_references;
///
/// assert!(compare_subscription_references(
///     "http://192.168.1.1/onvif/event_service/s0",
///     "onvif/event_service/s0",
/// ));
/// assert!(!compare_subscription_references(
///     "http://192.168.1.1/onvif/event_service/s0",
///     "onvif/event_service/s1",
/// ));
/// ```
pub fn compare_subscription_references(full_reference: &str, reference_path: &str) -> bool {
    let reference_path = reference_path.trim_matches('/');
    if reference_path.is_empty() {
        return false;
    }

    let full_path = match url::Url::parse(full_reference.trim()) {
        Ok(url) if url.has_host() => url.path().to_string(),
        _ => full_reference.trim().to_string(),
    };
    let full_path = full_path.trim_matches('/');

    match full_path.strip_suffix(reference_path) {
        Some("") => true,
        Some(prefix) => prefix.ends_with('/'),
        None => false,
    }
}

/// One `wsnt:NotificationMessage` tree per message, in order.
pub fn serialize_notification_messages(messages: &[NotificationMessage]) -> Vec<Element> {
    messages.iter().map(notification_message).collect()
}

fn simple_items(name: &str, items: &[SimpleItem]) -> Element {
    with_children(
        element("tt", name),
        items.iter().map(|item| {
            let mut simple_item = element("tt", "SimpleItem");
            simple_item
                .attributes
                .insert("Name".to_string(), item.name.clone());
            simple_item
                .attributes
                .insert("Value".to_string(), item.value.clone());
            simple_item
        }),
    )
}

fn notification_message(message: &NotificationMessage) -> Element {
    let mut topic = text_element("wsnt", "Topic", message.topic());
    topic
        .attributes
        .insert("Dialect".to_string(), TOPIC_DIALECT.to_string());

    let mut tt_message = element("tt", "Message");
    tt_message
        .attributes
        .insert("UtcTime".to_string(), message.utc_time().to_string());
    tt_message.attributes.insert(
        "PropertyOperation".to_string(),
        message.property_operation().to_string(),
    );
    let tt_message = with_children(
        tt_message,
        [
            simple_items("Source", message.source()),
            simple_items("Data", message.data()),
        ],
    );

    let mut root = with_children(
        element("wsnt", "NotificationMessage"),
        [topic, with_children(element("wsnt", "Message"), [tt_message])],
    );
    declare(&mut root, &["wsnt", "tt", "tns1"]);
    root
}

/// `tev:PullMessagesResponse` body.
pub fn pull_messages_response(response: &PullMessagesResponse) -> Element {
    let header = [
        text_element("tev", "CurrentTime", &response.current_time),
        text_element("tev", "TerminationTime", &response.termination_time),
    ];
    with_children(
        element("tev", "PullMessagesResponse"),
        header
            .into_iter()
            .chain(serialize_notification_messages(&response.messages)),
    )
}

/// `tev:CreatePullPointSubscriptionResponse` body.
///
/// The subscription address is `base_address` joined with the reference.
pub fn create_pull_point_response(handle: &PullPointHandle, base_address: &str) -> Element {
    let address = format!(
        "{}/{}",
        base_address.trim_end_matches('/'),
        handle.subscription_reference.trim_start_matches('/')
    );
    let reference = with_children(
        element("tev", "SubscriptionReference"),
        [text_element("wsa", "Address", address)],
    );
    with_children(
        element("tev", "CreatePullPointSubscriptionResponse"),
        [
            reference,
            text_element("wsnt", "CurrentTime", &handle.last_renew),
            text_element("wsnt", "TerminationTime", &handle.termination_time),
        ],
    )
}

/// `wsnt:RenewResponse` body.
pub fn renew_response(response: &RenewResponse) -> Element {
    with_children(
        element("wsnt", "RenewResponse"),
        [
            text_element("wsnt", "TerminationTime", &response.termination_time),
            text_element("wsnt", "CurrentTime", &response.current_time),
        ],
    )
}

pub fn unsubscribe_response() -> Element {
    element("wsnt", "UnsubscribeResponse")
}

pub fn set_synchronization_point_response() -> Element {
    element("tev", "SetSynchronizationPointResponse")
}

/// Wire subcode reported for an error.
pub fn fault_subcode(error: &EventError) -> &'static str {
    match error {
        EventError::UnknownSubscription { .. } | EventError::SubscriptionTerminated { .. } => {
            RESOURCE_UNKNOWN_FAULT
        }
        _ => ACTION_FAULT,
    }
}

/// SOAP 1.2 `s:Fault` body for an error.
///
/// Client faults carry the `s:Sender` code, everything else `s:Receiver`.
pub fn fault_element(error: &EventError) -> Element {
    let code = if error.is_client_fault() {
        "s:Sender"
    } else {
        "s:Receiver"
    };

    let subcode = with_children(
        element("s", "Subcode"),
        [text_element("s", "Value", fault_subcode(error))],
    );
    let code = with_children(
        element("s", "Code"),
        [text_element("s", "Value", code), subcode],
    );
    let reason = with_children(
        element("s", "Reason"),
        [text_element("s", "Text", error.to_string())],
    );

    with_children(element("s", "Fault"), [code, reason])
}

/// Wrap a body in a SOAP 1.2 envelope declaring every event service prefix.
///
/// `relates_to` becomes a `wsa:RelatesTo` header.
pub fn soap_envelope(body: Element, relates_to: Option<&str>) -> Element {
    let mut envelope = element("s", "Envelope");
    let prefixes: Vec<&str> = PREFIXES.iter().map(|(prefix, _)| *prefix).collect();
    declare(&mut envelope, &prefixes);

    if let Some(relates_to) = relates_to.filter(|id| !id.is_empty()) {
        let header = with_children(
            element("s", "Header"),
            [text_element("wsa", "RelatesTo", relates_to)],
        );
        envelope.children.push(XMLNode::Element(header));
    }

    with_children(envelope, [with_children(element("s", "Body"), [body])])
}

/// Render a tree as a string without an XML declaration.
pub fn to_xml_string(element: &Element) -> Result<String> {
    let config = EmitterConfig::new()
        .write_document_declaration(false)
        .perform_indent(false);

    let mut buffer = Vec::new();
    element
        .write_with_config(&mut buffer, config)
        .map_err(|e| EventError::Encoding(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| EventError::Encoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::PropertyOperation;
    use rstest::rstest;

    fn motion(value: &str) -> NotificationMessage {
        NotificationMessage::with_time(
            "tns1:VideoSource/MotionAlarm",
            "2024-05-01T12:00:00Z",
            PropertyOperation::Changed,
            vec![SimpleItem::new("Source", "VS_0")],
            vec![SimpleItem::new("State", value)],
        )
    }

    fn text(element: &Element) -> String {
        element
            .get_text()
            .map(|text| text.into_owned())
            .unwrap_or_default()
    }

    #[rstest]
    #[case("http://192.168.1.1/onvif/event_service/s0", "onvif/event_service/s0", true)]
    #[case("http://host/onvif/event_service/s0", "onvif/event_service/s1", false)]
    #[case("onvif/event_service/s0", "onvif/event_service/s0", true)]
    #[case("/onvif/event_service/s0", "onvif/event_service/s0", true)]
    #[case("http://host:8080/prefix/onvif/event_service/s0", "onvif/event_service/s0", true)]
    #[case("http://host/onvif/event_service/s10", "onvif/event_service/s0", false)]
    #[case("http://host/xonvif/event_service/s0", "onvif/event_service/s0", false)]
    #[case("onvif/event_service/s0", "", false)]
    #[case("", "onvif/event_service/s0", false)]
    fn test_compare_subscription_references(
        #[case] full: &str,
        #[case] path: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(compare_subscription_references(full, path), expected);
    }

    #[test]
    fn test_serialize_notification_message_shape() {
        let trees = serialize_notification_messages(&[motion("true"), motion("false")]);
        assert_eq!(trees.len(), 2);

        let tree = &trees[0];
        assert_eq!(tree.name, "NotificationMessage");
        assert_eq!(tree.prefix.as_deref(), Some("wsnt"));

        let topic = tree.get_child("Topic").unwrap();
        assert_eq!(text(topic), "tns1:VideoSource/MotionAlarm");
        assert_eq!(topic.attributes["Dialect"], TOPIC_DIALECT);

        let message = tree
            .get_child("Message")
            .and_then(|m| m.get_child("Message"))
            .unwrap();
        assert_eq!(message.prefix.as_deref(), Some("tt"));
        assert_eq!(message.attributes["UtcTime"], "2024-05-01T12:00:00Z");
        assert_eq!(message.attributes["PropertyOperation"], "Changed");

        let source = message.get_child("Source").unwrap();
        let item = source.get_child("SimpleItem").unwrap();
        assert_eq!(item.attributes["Name"], "Source");
        assert_eq!(item.attributes["Value"], "VS_0");

        let data = message.get_child("Data").unwrap();
        let item = data.get_child("SimpleItem").unwrap();
        assert_eq!(item.attributes["Name"], "State");
        assert_eq!(item.attributes["Value"], "true");

        let second = trees[1]
            .get_child("Message")
            .and_then(|m| m.get_child("Message"))
            .and_then(|m| m.get_child("Data"))
            .and_then(|d| d.get_child("SimpleItem"))
            .unwrap();
        assert_eq!(second.attributes["Value"], "false");
    }

    #[test]
    fn test_pull_messages_response() {
        let response = PullMessagesResponse {
            subscription_reference: "onvif/event_service/s0".to_string(),
            relates_to: "urn:uuid:1".to_string(),
            current_time: "2024-05-01T12:00:00Z".to_string(),
            termination_time: "2024-05-01T12:01:00Z".to_string(),
            messages: vec![motion("true")],
        };

        let body = pull_messages_response(&response);
        assert_eq!(body.name, "PullMessagesResponse");
        assert_eq!(text(body.get_child("CurrentTime").unwrap()), "2024-05-01T12:00:00Z");
        assert_eq!(
            text(body.get_child("TerminationTime").unwrap()),
            "2024-05-01T12:01:00Z"
        );
        let messages = body
            .children
            .iter()
            .filter_map(XMLNode::as_element)
            .filter(|e| e.name == "NotificationMessage")
            .count();
        assert_eq!(messages, 1);
    }

    #[test]
    fn test_create_pull_point_response_address() {
        let handle = PullPointHandle {
            subscription_reference: "onvif/event_service/s0".to_string(),
            last_renew: "2024-05-01T12:00:00Z".to_string(),
            termination_time: "2024-05-01T12:01:00Z".to_string(),
        };

        let body = create_pull_point_response(&handle, "http://192.168.1.1:8080/");
        let address = body
            .get_child("SubscriptionReference")
            .and_then(|r| r.get_child("Address"))
            .unwrap();
        assert_eq!(text(address), "http://192.168.1.1:8080/onvif/event_service/s0");
    }

    #[rstest]
    #[case(EventError::unknown_subscription("s9"), RESOURCE_UNKNOWN_FAULT)]
    #[case(EventError::SubscriptionTerminated { reference: "s0".to_string() }, RESOURCE_UNKNOWN_FAULT)]
    #[case(EventError::ResponseAbandoned, ACTION_FAULT)]
    #[case(EventError::ReactorUnavailable, ACTION_FAULT)]
    fn test_fault_subcode(#[case] error: EventError, #[case] expected: &str) {
        assert_eq!(fault_subcode(&error), expected);

        let fault = fault_element(&error);
        let subcode = fault
            .get_child("Code")
            .and_then(|c| c.get_child("Subcode"))
            .and_then(|s| s.get_child("Value"))
            .unwrap();
        assert_eq!(text(subcode), expected);
    }

    #[test]
    fn test_envelope_renders() {
        let envelope = soap_envelope(unsubscribe_response(), Some("urn:uuid:7"));
        let xml = to_xml_string(&envelope).unwrap();

        assert!(xml.starts_with("<s:Envelope"));
        assert!(xml.contains(r#"xmlns:wsnt="http://docs.oasis-open.org/wsn/b-2""#));
        assert!(xml.contains("urn:uuid:7"));
        assert!(xml.contains("UnsubscribeResponse"));
        assert!(!xml.starts_with("<?xml"));
    }

    #[test]
    fn test_envelope_without_relates_to_has_no_header() {
        let envelope = soap_envelope(set_synchronization_point_response(), None);
        assert!(envelope.get_child("Header").is_none());
        assert!(envelope
            .get_child("Body")
            .and_then(|b| b.get_child("SetSynchronizationPointResponse"))
            .is_some());
    }
}
