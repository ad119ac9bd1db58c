//! Handshake and slot lifecycle through the hub

mod common;

use aoa_hid::{HidError, IgnoreReason, ProbeOutcome, REPORT_DESCRIPTOR};
use aoa_transport::protocol::{request, string_index};
use aoa_transport::{PeerId, TransportError};
use common::{hub, shared, RecordingPeer};

#[test]
fn phase1_sends_protocol_strings_and_start() {
    let hub = hub(4);
    let (phone, peer) = shared(RecordingPeer::phone(1));

    let outcome = hub.probe(&peer, 0).unwrap();
    assert_eq!(outcome, ProbeOutcome::AccessoryStarted);

    let transfers = phone.transfers();
    let codes: Vec<u8> = transfers.iter().map(|t| t.request.request).collect();
    assert_eq!(
        codes,
        vec![
            request::GET_PROTOCOL,
            request::SEND_STRING,
            request::SEND_STRING,
            request::SEND_STRING,
            request::SEND_STRING,
            request::START,
        ]
    );

    let indices: Vec<u16> = transfers[1..5].iter().map(|t| t.request.index).collect();
    assert_eq!(
        indices,
        vec![
            string_index::MANUFACTURER,
            string_index::MODEL,
            string_index::DESCRIPTION,
            string_index::VERSION,
        ]
    );
    assert_eq!(transfers[1].data, b"Not a Real Manufacturer\0");
    // Phase 1 never binds
    assert!(hub.bound_slots().is_empty());
}

#[test]
fn phase1_rejects_old_protocol() {
    let hub = hub(4);
    let (phone, peer) = shared(RecordingPeer::phone(1).with_protocol(1));

    let err = hub.probe(&peer, 0).unwrap_err();
    assert!(matches!(
        err,
        HidError::ProtocolMismatch {
            expected: 2,
            actual: 1
        }
    ));
    assert_eq!(phone.request_codes(), vec![request::GET_PROTOCOL]);
}

#[test]
fn phase1_stops_at_first_failure() {
    let hub = hub(4);
    let (phone, peer) = shared(RecordingPeer::phone(1));
    phone.fail_on(request::SEND_STRING);

    let err = hub.probe(&peer, 0).unwrap_err();
    assert!(matches!(err, HidError::Transport(TransportError::Timeout)));
    assert_eq!(
        phone.request_codes(),
        vec![request::GET_PROTOCOL, request::SEND_STRING]
    );
}

#[test]
fn phase1_short_string_is_an_error() {
    let hub = hub(4);
    let (phone, peer) = shared(RecordingPeer::phone(1));
    phone.short_on(request::SEND_STRING);

    let err = hub.probe(&peer, 0).unwrap_err();
    assert!(matches!(
        err,
        HidError::Transport(TransportError::ShortTransfer { .. })
    ));
}

#[test]
fn probe_ignores_other_interfaces_and_unknown_devices() {
    let hub = hub(4);
    let (phone, peer) = shared(RecordingPeer::phone(1));
    assert_eq!(
        hub.probe(&peer, 1).unwrap(),
        ProbeOutcome::Ignored(IgnoreReason::NotInterfaceZero)
    );
    assert!(phone.transfers().is_empty());

    let (stranger, peer) = shared(RecordingPeer::new(2, 0x1234, 0x5678));
    assert_eq!(
        hub.probe(&peer, 0).unwrap(),
        ProbeOutcome::Ignored(IgnoreReason::Unrecognized)
    );
    assert!(stranger.transfers().is_empty());
}

#[test]
fn phase2_registers_descriptor_and_binds() {
    let hub = hub(4);
    let (accessory, peer) = shared(RecordingPeer::accessory(7));

    let token = match hub.probe(&peer, 0).unwrap() {
        ProbeOutcome::Bound(token) => token,
        other => panic!("unexpected outcome {other:?}"),
    };
    assert_eq!(token.slot().index(), 3);

    let transfers = accessory.transfers();
    assert_eq!(transfers.len(), 2);
    assert_eq!(transfers[0].request.request, request::REGISTER_HID);
    assert_eq!(transfers[0].request.value, 1);
    assert_eq!(transfers[0].request.index, REPORT_DESCRIPTOR.len() as u16);
    assert_eq!(transfers[1].request.request, request::SET_HID_REPORT_DESC);
    assert_eq!(transfers[1].request.index, 0);
    assert_eq!(transfers[1].data, REPORT_DESCRIPTOR);

    let bound = hub.bound_slots();
    assert_eq!(bound.len(), 1);
    assert_eq!(bound[0].token, token);
    assert_eq!(bound[0].info.id, PeerId::new(7));
}

#[test]
fn reprobe_of_bound_peer_is_idempotent() {
    let hub = hub(4);
    let (accessory, peer) = shared(RecordingPeer::accessory(7));
    let ProbeOutcome::Bound(token) = hub.probe(&peer, 0).unwrap() else {
        panic!("expected binding");
    };
    accessory.clear();

    assert_eq!(
        hub.probe(&peer, 0).unwrap(),
        ProbeOutcome::AlreadyBound(token.slot())
    );
    assert!(accessory.transfers().is_empty());
    assert_eq!(hub.bound_slots().len(), 1);
}

#[test]
fn full_registry_then_reuse_after_disconnect() {
    let hub = hub(2);
    let (_, first) = shared(RecordingPeer::accessory(1));
    let (_, second) = shared(RecordingPeer::accessory(2));
    let (third_rec, third) = shared(RecordingPeer::accessory(3));

    hub.probe(&first, 0).unwrap();
    hub.probe(&second, 0).unwrap();
    assert!(matches!(
        hub.probe(&third, 0),
        Err(HidError::CapacityExceeded { capacity: 2 })
    ));
    // A full registry sends nothing to the newcomer
    assert!(third_rec.transfers().is_empty());

    let freed = hub.disconnect(PeerId::new(1)).unwrap();
    let ProbeOutcome::Bound(token) = hub.probe(&third, 0).unwrap() else {
        panic!("expected binding");
    };
    assert_eq!(token.slot(), freed);
}

#[test]
fn failed_registration_frees_the_slot() {
    let hub = hub(1);
    let (accessory, peer) = shared(RecordingPeer::accessory(1));
    accessory.fail_on(request::SET_HID_REPORT_DESC);

    assert!(hub.probe(&peer, 0).is_err());
    assert!(hub.bound_slots().is_empty());

    let (_, other) = shared(RecordingPeer::accessory(2));
    assert!(matches!(hub.probe(&other, 0), Ok(ProbeOutcome::Bound(_))));
}

#[test]
fn bad_hid_registration_frees_the_slot() {
    let hub = hub(1);
    let (accessory, peer) = shared(RecordingPeer::accessory(1));
    accessory.short_on(request::REGISTER_HID);

    let err = hub.probe(&peer, 0).unwrap_err();
    assert!(
        matches!(err, HidError::Transport(TransportError::ShortTransfer { expected: 0, .. })),
        "{err:?}"
    );
    // The descriptor is never sent after a failed registration
    assert_eq!(accessory.request_codes(), vec![request::REGISTER_HID]);
    assert!(hub.bound_slots().is_empty());

    let (_, other) = shared(RecordingPeer::accessory(2));
    assert!(matches!(hub.probe(&other, 0), Ok(ProbeOutcome::Bound(_))));
}

#[test]
fn disconnect_of_unknown_peer_is_harmless() {
    let hub = hub(2);
    assert_eq!(hub.disconnect(PeerId::new(42)), None);
}

#[test]
fn stale_token_after_rebind_is_rejected() {
    let hub = hub(1);
    let (_, first) = shared(RecordingPeer::accessory(1));
    let ProbeOutcome::Bound(old) = hub.probe(&first, 0).unwrap() else {
        panic!("expected binding");
    };
    hub.disconnect(PeerId::new(1));

    let (_, second) = shared(RecordingPeer::accessory(2));
    let ProbeOutcome::Bound(new) = hub.probe(&second, 0).unwrap() else {
        panic!("expected binding");
    };
    assert_eq!(old.slot(), new.slot());
    assert_ne!(old.generation(), new.generation());

    assert!(matches!(
        hub.registry().lease(old),
        Err(HidError::Unbound { slot: 0 })
    ));
    assert!(hub.registry().lease(new).is_ok());
}
