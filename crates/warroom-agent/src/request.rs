use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// What the war room was convened for, plus the fixed inputs every
/// specialist needs to look it up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcurementRequest {
    /// GPU model, e.g. `H100`.
    pub chip: String,
    /// Units required.
    pub quantity: u32,
    /// Vendor SKU looked up in the catalog.
    pub vendor_sku: String,
    /// Country the spot-market stock ships from.
    pub origin: String,
    /// Country it ships to.
    pub destination: String,
    /// Supply agreement checked by the legal specialist.
    pub contract: String,
    /// Catalog table (vendor SKU to internal reference).
    pub catalog_table: String,
    /// Legacy inventory table.
    pub inventory_table: String,
    /// Date stamped on the purchase order.
    pub order_date: NaiveDate,
}

impl ProcurementRequest {
    /// Request for `quantity` units of `chip`, with the demo defaults for
    /// everything else.
    pub fn new(chip: impl Into<String>, quantity: u32) -> Self {
        let chip = chip.into().to_uppercase();
        Self {
            vendor_sku: format!("NV-{chip}-PCIE"),
            chip,
            quantity,
            origin: "TW".to_string(),
            destination: "US".to_string(),
            contract: "Master_Supply_Agreement_NVIDIA.pdf".to_string(),
            catalog_table: "REF_CATALOG_DUMP".to_string(),
            inventory_table: "LEGACY_INV_MAIN_V2".to_string(),
            order_date: chrono::Utc::now().date_naive(),
        }
    }

    /// Override the catalog and inventory tables.
    pub fn with_tables(mut self, catalog: impl Into<String>, inventory: impl Into<String>) -> Self {
        self.catalog_table = catalog.into();
        self.inventory_table = inventory.into();
        self
    }

    /// Fix the purchase-order date.
    pub fn with_order_date(mut self, date: NaiveDate) -> Self {
        self.order_date = date;
        self
    }
}

impl Default for ProcurementRequest {
    fn default() -> Self {
        Self::new("H100", 1000)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sku_derived_from_chip() {
        let request = ProcurementRequest::new("a100", 40);
        assert_eq!(request.chip, "A100");
        assert_eq!(request.vendor_sku, "NV-A100-PCIE");
        assert_eq!(request.destination, "US");
    }

    #[test]
    fn test_default_is_h100_crisis() {
        let request = ProcurementRequest::default();
        assert_eq!(request.vendor_sku, "NV-H100-PCIE");
        assert_eq!(request.quantity, 1000);
    }
}
