//! Provisioner builders shared by the provisioning suites

use crate::core_provision::*;
use crate::test_utils::{ScriptedDeps, TestUser, TestUserBuilder};

/// A brand new identity with no devices
pub fn fresh_user() -> TestUser {
    TestUserBuilder::new("alice").build()
}

/// A user with one device which this install runs as
pub fn registered_user() -> TestUser {
    TestUserBuilder::new("alice").with_devices(1).installed_on(0).build()
}

/// A user with devices elsewhere; this install has none
pub fn user_on_other_device() -> TestUser {
    TestUserBuilder::new("alice").with_devices(1).build()
}

pub fn eldest_provisioner(user: &TestUser) -> (DeviceProvisioner, ScriptedDeps) {
    let doubles = ScriptedDeps::new(&user.snapshot);
    let args = ProvisionArgs::builder(user.snapshot.clone(), "new laptop")
        .eldest()
        .build()
        .unwrap();
    (DeviceProvisioner::new(args, doubles.deps()), doubles)
}

/// Provisioner for a device joining an existing identity, signed by the eldest device
pub fn sibling_provisioner(user: &TestUser, self_provision: bool) -> (DeviceProvisioner, ScriptedDeps) {
    let doubles = ScriptedDeps::new(&user.snapshot);
    let mut builder = ProvisionArgs::builder(user.snapshot.clone(), "new phone")
        .signer(user.eldest_key().clone())
        .eldest_kid(user.eldest_key().kid().clone());
    if self_provision {
        builder = builder.self_provision();
    }
    (DeviceProvisioner::new(builder.build().unwrap(), doubles.deps()), doubles)
}
