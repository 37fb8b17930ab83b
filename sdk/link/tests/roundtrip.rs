use hongbao_keypair::Keypair;
use hongbao_link::{Amount, KeyPayload, PacketLink};
use hongbao_threshold::{Identity, KeyperConfig, KeyperSet, encrypt};

fn threshold_payload() -> (KeyPayload, Identity) {
    let set = KeyperSet::generate(KeyperConfig::new(2, 3)).unwrap();
    let identity: Identity = "0x5eed5eed5eed".parse().unwrap();
    let key = Keypair::generate().private_key();
    let ct = encrypt(key.as_bytes(), &identity, &set.eon_key(), None).unwrap();
    (KeyPayload::Threshold(ct), identity)
}

#[test]
fn threshold_link_roundtrip() {
    let (payload, identity) = threshold_payload();
    let link = PacketLink::new(
        &payload,
        1_767_225_600,
        "0.01".parse().unwrap(),
        Some(identity),
    );

    let encoded = link.encode();
    assert!(encoded.starts_with("#redeem?key=0x03"));

    let decoded = PacketLink::decode(&encoded).unwrap();
    assert_eq!(decoded, link);
    assert_eq!(decoded.payload().unwrap(), payload);
}

#[test]
fn password_link_roundtrip() {
    let (payload, identity) = threshold_payload();
    let envelope = hongbao_envelope::encrypt(&payload.encode(), "abc123").unwrap();
    let link = PacketLink::new(
        &KeyPayload::Password(envelope),
        42,
        Amount::from_lamports(1),
        Some(identity),
    );
    assert!(link.protected);

    let url = link.to_url("https://hongbao.example/app#old");
    assert!(url.starts_with("https://hongbao.example/app#redeem?"));

    let decoded = PacketLink::decode(&url).unwrap();
    assert_eq!(decoded, link);
    assert!(matches!(decoded.payload().unwrap(), KeyPayload::Password(_)));
}

#[test]
fn first_generation_link_decodes() {
    let decoded = PacketLink::decode("#redeem?key=0x03ab&timestamp=1700000000&amount=0.5").unwrap();
    assert_eq!(decoded.key, "0x03ab");
    assert_eq!(decoded.timestamp, 1_700_000_000);
    assert_eq!(decoded.amount.lamports(), 500_000_000);
    assert!(!decoded.protected);
    assert_eq!(decoded.identity, None);
}

#[test]
fn missing_or_bad_required_fields() {
    assert!(PacketLink::decode("#redeem?timestamp=1&amount=1").is_none());
    assert!(PacketLink::decode("#redeem?key=0x03&amount=1").is_none());
    assert!(PacketLink::decode("#redeem?key=0x03&timestamp=1").is_none());
    assert!(PacketLink::decode("#redeem?key=0x03&timestamp=soon&amount=1").is_none());
    assert!(PacketLink::decode("#redeem?key=0x03&timestamp=1&amount=-1").is_none());
    assert!(PacketLink::decode("#redeem?key=&timestamp=1&amount=1").is_none());
    assert!(PacketLink::decode("#other?key=0x03&timestamp=1&amount=1").is_none());
}

#[test]
fn unknown_params_ignored() {
    let decoded =
        PacketLink::decode("redeem?key=0x03&timestamp=5&amount=2&utm_source=chat&protected=true")
            .unwrap();
    assert!(decoded.protected);
    assert_eq!(decoded.amount.lamports(), 2_000_000_000);
}

#[test]
fn invalid_identity_rejects_link() {
    assert!(PacketLink::decode("#redeem?key=0x03&timestamp=5&amount=2&identity=0xnothex").is_none());
}
