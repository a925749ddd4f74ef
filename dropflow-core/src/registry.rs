use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::adapter::{Capability, VendorAdapter, VendorProfile};
use crate::error::FulfillError;

struct RegisteredVendor {
    profile: VendorProfile,
    adapter: Arc<dyn VendorAdapter>,
}

/// In-memory mapping from vendor id to adapter instance.
///
/// Read-mostly: registrations happen at startup/config-reload, lookups on
/// every request, so a read-write lock over the map is enough.
pub struct AdapterRegistry {
    vendors: RwLock<HashMap<String, RegisteredVendor>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            vendors: RwLock::new(HashMap::new()),
        }
    }

    /// Register (or re-register) a vendor. Last registration wins.
    pub fn register(&self, profile: VendorProfile, adapter: Arc<dyn VendorAdapter>) {
        let mut vendors = self.vendors.write().expect("registry lock poisoned");
        let vendor_id = profile.vendor_id.clone();

        if vendors.contains_key(&vendor_id) {
            tracing::warn!(vendor_id = %vendor_id, "overwriting existing vendor registration");
        }

        vendors.insert(vendor_id, RegisteredVendor { profile, adapter });
    }

    pub fn get(&self, vendor_id: &str) -> Result<Arc<dyn VendorAdapter>, FulfillError> {
        let vendors = self.vendors.read().expect("registry lock poisoned");
        vendors
            .get(vendor_id)
            .map(|v| Arc::clone(&v.adapter))
            .ok_or_else(|| FulfillError::NotFound(format!("vendor not registered: {vendor_id}")))
    }

    /// Look up an adapter, requiring the vendor to be enabled and to declare
    /// the given capability. Fails fast before any I/O.
    pub fn get_enabled(
        &self,
        vendor_id: &str,
        capability: Capability,
    ) -> Result<Arc<dyn VendorAdapter>, FulfillError> {
        let vendors = self.vendors.read().expect("registry lock poisoned");
        let vendor = vendors
            .get(vendor_id)
            .ok_or_else(|| FulfillError::NotFound(format!("vendor not registered: {vendor_id}")))?;

        if !vendor.profile.enabled {
            return Err(FulfillError::Configuration(format!(
                "vendor is disabled: {vendor_id}"
            )));
        }
        if !vendor.profile.supports(capability) {
            return Err(FulfillError::Configuration(format!(
                "vendor {vendor_id} does not support {capability:?}"
            )));
        }

        Ok(Arc::clone(&vendor.adapter))
    }

    pub fn profile(&self, vendor_id: &str) -> Option<VendorProfile> {
        let vendors = self.vendors.read().expect("registry lock poisoned");
        vendors.get(vendor_id).map(|v| v.profile.clone())
    }

    pub fn list_profiles(&self) -> Vec<VendorProfile> {
        let vendors = self.vendors.read().expect("registry lock poisoned");
        let mut profiles: Vec<VendorProfile> =
            vendors.values().map(|v| v.profile.clone()).collect();
        profiles.sort_by(|a, b| a.vendor_id.cmp(&b.vendor_id));
        profiles
    }

    /// Vendor ids that are enabled and declare the capability, in stable
    /// (lexicographic) order.
    pub fn list_enabled(&self, capability: Capability) -> Vec<String> {
        let vendors = self.vendors.read().expect("registry lock poisoned");
        let mut ids: Vec<String> = vendors
            .values()
            .filter(|v| v.profile.enabled && v.profile.supports(capability))
            .map(|v| v.profile.vendor_id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Soft enable/disable. Profiles referenced by existing orders are never
    /// removed from the registry.
    pub fn set_enabled(&self, vendor_id: &str, enabled: bool) -> Result<(), FulfillError> {
        let mut vendors = self.vendors.write().expect("registry lock poisoned");
        let vendor = vendors
            .get_mut(vendor_id)
            .ok_or_else(|| FulfillError::NotFound(format!("vendor not registered: {vendor_id}")))?;
        vendor.profile.enabled = enabled;
        Ok(())
    }

    /// Adapter-declared timeout for a vendor, if registered.
    pub fn timeout_for(&self, vendor_id: &str) -> Option<Duration> {
        self.profile(vendor_id)
            .map(|p| Duration::from_millis(p.timeout_ms))
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
