//! Key chain delegation rules

use super::helpers::*;
use crate::core_identity::*;

#[test]
fn test_eldest_device_is_recorded() {
    let (chain, first) = chain_with_eldest_device();

    assert_eq!(chain.eldest_kid(), Some(first.signing.kid()));
    assert_eq!(chain.eldest_seqno(), 1);
    assert_eq!(chain.seqno(), 2);
    assert!(chain.has_sibkey(first.signing.kid()));
    assert_eq!(chain.subkey_parent(first.encryption.kid()), Some(first.signing.kid()));

    let record = chain.device(&first.device.id()).unwrap();
    assert_eq!(&record.signing_kid, first.signing.kid());
    assert_eq!(record.encryption_kid.as_ref(), Some(first.encryption.kid()));
}

#[test]
fn test_second_device_delegated_by_existing_sibkey() {
    let (mut chain, first) = chain_with_eldest_device();
    let eldest = first.signing.kid().clone();
    let new_signing = SigningKey::generate().unwrap();
    let new_device = test_device("phone");

    chain
        .apply(&link(
            DelegationKind::Sibkey,
            3,
            &eldest,
            &first.signing,
            new_signing.kid(),
            Some(new_device.clone()),
            Some(&new_signing),
        ))
        .unwrap();

    assert!(chain.has_sibkey(new_signing.kid()));
    assert!(chain.has_active_device(&new_device.id()));
    assert_eq!(chain.eldest_seqno(), 1);
}

#[test]
fn test_unknown_signer_rejected_and_chain_untouched() {
    let (mut chain, first) = chain_with_eldest_device();
    let before = chain.clone();
    let stranger = SigningKey::generate().unwrap();
    let new_signing = SigningKey::generate().unwrap();

    let result = chain.apply(&link(
        DelegationKind::Sibkey,
        3,
        first.signing.kid(),
        &stranger,
        new_signing.kid(),
        Some(test_device("phone")),
        Some(&new_signing),
    ));

    assert!(matches!(result, Err(IdentityError::DelegationRejected(_))));
    assert_eq!(chain, before);
}

#[test]
fn test_stale_seqno_rejected() {
    let (mut chain, first) = chain_with_eldest_device();
    let new_signing = SigningKey::generate().unwrap();

    let result = chain.apply(&link(
        DelegationKind::Sibkey,
        2,
        first.signing.kid(),
        &first.signing,
        new_signing.kid(),
        Some(test_device("phone")),
        Some(&new_signing),
    ));
    assert!(result.is_err());
}

#[test]
fn test_second_eldest_rejected() {
    let (mut chain, _first) = chain_with_eldest_device();
    let other = SigningKey::generate().unwrap();

    let result = chain.apply(&link(
        DelegationKind::Eldest,
        3,
        other.kid(),
        &other,
        other.kid(),
        Some(test_device("reset box")),
        None,
    ));
    assert!(result.is_err());
}

#[test]
fn test_subkey_for_unknown_device_leaves_chain_untouched() {
    let (mut chain, first) = chain_with_eldest_device();
    let before = chain.clone();
    let enc = EncryptionKey::generate().unwrap();

    let result = chain.apply(&link(
        DelegationKind::Subkey,
        3,
        first.signing.kid(),
        &first.signing,
        enc.kid(),
        Some(test_device("ghost")),
        None,
    ));

    assert!(result.is_err());
    assert_eq!(chain, before);
}

#[test]
fn test_subkey_must_be_encryption_key() {
    let (mut chain, first) = chain_with_eldest_device();
    let not_enc = SigningKey::generate().unwrap();

    let result = chain.apply(&link(
        DelegationKind::Subkey,
        3,
        first.signing.kid(),
        &first.signing,
        not_enc.kid(),
        Some(first.device.clone()),
        None,
    ));
    assert!(result.is_err());
}
