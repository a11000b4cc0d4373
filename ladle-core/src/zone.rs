use std::collections::HashSet;

/// Decides whether a shipping zip falls inside the served delivery radius.
/// Pure and synchronous; consulted during checkout before any charge.
pub trait DeliveryZoneChecker: Send + Sync {
    fn is_served(&self, zip: &str) -> bool;
}

/// Checker backed by the configured list of served zip codes.
pub struct ZipListChecker {
    served: HashSet<String>,
}

impl ZipListChecker {
    pub fn new<I, S>(zips: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            served: zips.into_iter().map(|z| normalize(&z.into())).collect(),
        }
    }
}

impl DeliveryZoneChecker for ZipListChecker {
    fn is_served(&self, zip: &str) -> bool {
        self.served.contains(&normalize(zip))
    }
}

/// ZIP+4 input is compared on its 5-digit prefix.
fn normalize(zip: &str) -> String {
    zip.trim().chars().take(5).collect()
}
