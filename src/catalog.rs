//! Resource Catalog
//!
//! The fixed, ordered registry of Open Referral logical resources. Each entry
//! maps a canonical resource name to the file name expected inside an
//! expanded archive workspace. Batch validation iterates this table instead
//! of hardcoding one code path per resource, so supporting a new resource
//! type is a catalog edit.

use serde::Serialize;

/// One known resource type: canonical name plus expected file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResourceDescriptor {
    /// Canonical catalog key (matches the embedded schema registry).
    pub name: &'static str,
    /// File name expected at the workspace root.
    pub file_name: &'static str,
}

const fn entry(name: &'static str, file_name: &'static str) -> ResourceDescriptor {
    ResourceDescriptor { name, file_name }
}

/// The full Open Referral resource set, in report order.
///
/// Fixed at build time; never mutated at runtime.
pub const CATALOG: [ResourceDescriptor; 22] = [
    entry(
        "accessibility_for_disabilities",
        "accessibility_for_disabilities.csv",
    ),
    entry("contact", "contact.csv"),
    entry("eligibility", "eligibility.csv"),
    entry("funding", "funding.csv"),
    entry("holiday_schedule", "holiday_schedule.csv"),
    entry("language", "language.csv"),
    entry("location", "location.csv"),
    entry("meta_table_description", "meta_table_description.csv"),
    entry("metadata", "metadata.csv"),
    entry("organization", "organization.csv"),
    entry("payment_accepted", "payment_accepted.csv"),
    entry("phone", "phone.csv"),
    entry("physical_address", "physical_address.csv"),
    entry("postal_address", "postal_address.csv"),
    entry("program", "program.csv"),
    entry("regular_schedule", "regular_schedule.csv"),
    entry("required_document", "required_document.csv"),
    entry("service", "service.csv"),
    entry("service_area", "service_area.csv"),
    entry("service_at_location", "service_at_location.csv"),
    entry("service_taxonomy", "service_taxonomy.csv"),
    entry("taxonomy", "taxonomy.csv"),
];

/// Iterate the catalog in its fixed order.
pub fn entries() -> impl Iterator<Item = &'static ResourceDescriptor> {
    CATALOG.iter()
}

/// Look up a catalog entry by canonical name.
pub fn lookup(name: &str) -> Option<&'static ResourceDescriptor> {
    CATALOG.iter().find(|d| d.name == name)
}

/// Whether `name` is a known catalog resource.
pub fn contains(name: &str) -> bool {
    lookup(name).is_some()
}
