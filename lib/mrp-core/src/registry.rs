// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::instance::{Instance, InstanceKey};

/// Bounds both the registry and the `GET_MRP` result array, matching the
/// reference implementation's `MAX_MRP_INSTANCES`.
pub const MAX_MRP_INSTANCES: usize = 20;

pub type InstanceHandle = Arc<Mutex<Instance>>;

/// The process-wide instance table. Mutated only by `add`/`del`; readers
/// (the event router) walk `iter()` while holding no per-instance lock,
/// taking an instance's own mutex only once they've found it.
///
/// Modeled as an explicit handle rather than module-level global state
/// (§9 design notes) so the daemon can own exactly one and pass it to
/// whichever component needs to add, remove, or look up instances.
#[derive(Default)]
pub struct Registry {
    // Insertion order is significant: `GET_MRP` must return instances in
    // the order they were added (testable property 6).
    order: Vec<InstanceKey>,
    instances: HashMap<InstanceKey, InstanceHandle>,
    by_ifindex: HashMap<u32, InstanceKey>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Registers a freshly constructed instance. Fails with
    /// `DuplicateInstance` if `(bridge, ring_nr)` is already present, or
    /// `RegistryFull` if the registry already holds `MAX_MRP_INSTANCES`.
    /// On success, every port's ifindex becomes resolvable via
    /// `find_by_ifindex`, which is how the event router locates the
    /// owning instance for a frame or link event without the `Port`
    /// struct itself needing an owning back-pointer.
    pub fn add(&mut self, instance: Instance) -> Result<InstanceHandle> {
        let key = instance.key;
        if self.instances.contains_key(&key) {
            return Err(Error::DuplicateInstance { bridge_ifindex: key.bridge_ifindex, ring_nr: key.ring_nr });
        }
        if self.order.len() >= MAX_MRP_INSTANCES {
            return Err(Error::RegistryFull);
        }

        for ifindex in [instance.p.ifindex, instance.s.ifindex]
            .into_iter()
            .chain(instance.i.as_ref().map(|p| p.ifindex))
        {
            self.by_ifindex.insert(ifindex, key);
        }

        let handle = Arc::new(Mutex::new(instance));
        self.instances.insert(key, handle.clone());
        self.order.push(key);
        Ok(handle)
    }

    /// Removes and returns the instance for `key`, dropping its ifindex
    /// mappings so any event that arrives after this point for one of its
    /// ports is dropped by the router as `Inconsistent` (no instance
    /// found), per the cancellation model in §5.
    pub fn del(&mut self, key: InstanceKey) -> Option<InstanceHandle> {
        let handle = self.instances.remove(&key)?;
        self.order.retain(|k| *k != key);
        self.by_ifindex.retain(|_, k| *k != key);
        Some(handle)
    }

    pub fn find(&self, key: InstanceKey) -> Option<InstanceHandle> {
        self.instances.get(&key).cloned()
    }

    pub fn find_by_ifindex(&self, ifindex: u32) -> Option<InstanceHandle> {
        let key = *self.by_ifindex.get(&ifindex)?;
        self.find(key)
    }

    /// Iterates instances in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (InstanceKey, &InstanceHandle)> {
        self.order.iter().map(move |k| (*k, self.instances.get(k).expect("order/instances in sync")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{CfmAssoc, InMode, InRole, RingRole};
    use crate::port::{Port, PortRole};
    use crate::timers::RecoveryClass;
    use mrp_proto::MacAddr;

    fn mac(n: u8) -> MacAddr {
        MacAddr::new([0x02, 0, 0, 0, 0, n])
    }

    fn make_instance(bridge_ifindex: u32, ring_nr: u32, pport: u32, sport: u32) -> Instance {
        Instance::new(
            InstanceKey { bridge_ifindex, ring_nr },
            mac(1),
            [0xff; 16],
            Port::new(pport, "eth0", mac(2), PortRole::Primary),
            Port::new(sport, "eth1", mac(3), PortRole::Secondary),
            None,
            RingRole::Mrm,
            Instance::DEFAULT_PRIO,
            false,
            InRole::Disabled,
            InMode::Rc,
            false,
            RecoveryClass::Ms500,
            None::<CfmAssoc>,
        )
    }

    #[test]
    fn add_find_del_round_trip() {
        let mut reg = Registry::new();
        let key = InstanceKey { bridge_ifindex: 1, ring_nr: 0 };
        reg.add(make_instance(1, 0, 10, 11)).unwrap();
        assert!(reg.find(key).is_some());
        assert!(reg.find_by_ifindex(10).is_some());
        assert!(reg.find_by_ifindex(11).is_some());
        assert!(reg.del(key).is_some());
        assert!(reg.find(key).is_none());
        assert!(reg.find_by_ifindex(10).is_none());
    }

    #[test]
    fn duplicate_instance_rejected() {
        let mut reg = Registry::new();
        reg.add(make_instance(1, 0, 10, 11)).unwrap();
        let err = reg.add(make_instance(1, 0, 20, 21)).unwrap_err();
        assert_eq!(err, Error::DuplicateInstance { bridge_ifindex: 1, ring_nr: 0 });
    }

    #[test]
    fn registry_full_rejected() {
        let mut reg = Registry::new();
        for n in 0..MAX_MRP_INSTANCES as u32 {
            reg.add(make_instance(1, n, 100 + n, 200 + n)).unwrap();
        }
        let err = reg.add(make_instance(1, 999, 1, 2)).unwrap_err();
        assert_eq!(err, Error::RegistryFull);
    }

    #[test]
    fn iteration_preserves_insertion_order() {
        let mut reg = Registry::new();
        reg.add(make_instance(1, 2, 10, 11)).unwrap();
        reg.add(make_instance(1, 0, 20, 21)).unwrap();
        reg.add(make_instance(1, 1, 30, 31)).unwrap();
        let order: Vec<u32> = reg.iter().map(|(k, _)| k.ring_nr).collect();
        assert_eq!(order, vec![2, 0, 1]);
    }
}
