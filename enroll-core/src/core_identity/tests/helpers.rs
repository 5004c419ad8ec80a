//! Test helpers and fixtures

use crate::core_identity::*;

pub struct ChainDevice {
    pub device: DeviceIdentity,
    pub signing: SigningKey,
    pub encryption: EncryptionKey,
}

pub fn test_device(name: &str) -> DeviceIdentity {
    DeviceIdentity::new(DeviceId::generate().unwrap(), name, DeviceType::Desktop).unwrap()
}

pub fn link(
    kind: DelegationKind,
    seqno: u64,
    eldest: &KeyId,
    signer: &SigningKey,
    delegated: &KeyId,
    device: Option<DeviceIdentity>,
    reverse: Option<&SigningKey>,
) -> SignedDelegation {
    let body = DelegationBody {
        kind,
        uid: UserId::from_username("alice"),
        username: "alice".to_string(),
        seqno,
        eldest_kid: eldest.clone(),
        signer_kid: signer.kid().clone(),
        delegated_kid: delegated.clone(),
        device,
        ctime: unix_now(),
    };
    SignedDelegation::sign(body, signer, reverse).unwrap()
}

/// A chain holding one fully provisioned eldest device
pub fn chain_with_eldest_device() -> (KeyChain, ChainDevice) {
    let signing = SigningKey::generate().unwrap();
    let encryption = EncryptionKey::generate().unwrap();
    let device = test_device("first laptop");

    let mut chain = KeyChain::new();
    chain
        .apply(&link(
            DelegationKind::Eldest,
            1,
            signing.kid(),
            &signing,
            signing.kid(),
            Some(device.clone()),
            None,
        ))
        .unwrap();
    chain
        .apply(&link(
            DelegationKind::Subkey,
            2,
            signing.kid(),
            &signing,
            encryption.kid(),
            Some(device.clone()),
            None,
        ))
        .unwrap();

    (chain, ChainDevice { device, signing, encryption })
}
