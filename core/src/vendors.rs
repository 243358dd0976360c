use std::sync::OnceLock;

use mac_oui::Oui;
use pnet::util::MacAddr;
use tracing::warn;

/// Resolves device manufacturers from MAC addresses.
pub trait VendorRepository: Send + Sync {
    /// `None` when the OUI is unknown.
    fn get_vendor(&self, mac_addr: MacAddr) -> Option<String>;
}

static OUI_DB: OnceLock<Option<Oui>> = OnceLock::new();

/// Loads the bundled OUI database once; a load failure disables lookups.
fn get_oui_db() -> Option<&'static Oui> {
    OUI_DB
        .get_or_init(|| match Oui::default() {
            Ok(db) => Some(db),
            Err(e) => {
                warn!("OUI database unavailable, vendor lookups disabled: {e}");
                None
            }
        })
        .as_ref()
}

/// [`VendorRepository`] backed by the `mac_oui` bundled database.
pub struct MacOuiRepo;

impl VendorRepository for MacOuiRepo {
    fn get_vendor(&self, mac_addr: MacAddr) -> Option<String> {
        let db = get_oui_db()?;
        match db.lookup_by_mac(&mac_addr.to_string()) {
            Ok(Some(entry)) => Some(entry.company_name.clone()),
            _ => None,
        }
    }
}

/// Never knows a vendor.
pub struct NoVendors;

impl VendorRepository for NoVendors {
    fn get_vendor(&self, _mac_addr: MacAddr) -> Option<String> {
        None
    }
}
