use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::reconcile::{AddressFamily, PrefixEntry};

/// Every Megaport v2 response wraps its payload in `data`
#[derive(Debug, Deserialize)]
pub(super) struct DataResponse<T> {
    pub(super) data: T,
}

#[derive(Debug, Deserialize)]
pub(super) struct TokenResponse {
    pub(super) access_token: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct PrefixListDetail {
    #[serde(default = "Vec::new")]
    pub(super) entries: Vec<PrefixListEntry>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub(super) struct PrefixListEntry {
    #[serde(default = "PrefixListEntry::permit")]
    pub(super) action: String,
    pub(super) prefix: PrefixEntry,
}

impl PrefixListEntry {
    fn permit() -> String {
        "permit".to_string()
    }

    pub(super) fn permit_prefix(prefix: &PrefixEntry) -> Self {
        Self {
            action: Self::permit(),
            prefix: prefix.clone(),
        }
    }
}

/// PUT body replacing a prefix list's entries
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PrefixListUpdate<'a> {
    pub(super) description: &'a str,
    pub(super) address_family: AddressFamily,
    pub(super) entries: Vec<PrefixListEntry>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub product_uid: String,
    pub product_name: String,
    #[serde(default)]
    pub product_type: String,
    #[serde(default)]
    pub provisioning_status: String,
    pub location_detail: Option<LocationDetail>,
    #[serde(default = "Vec::new")]
    pub associated_vxcs: Vec<Vxc>,
}

impl Product {
    pub fn is_mcr(&self) -> bool {
        self.product_type.eq_ignore_ascii_case("MCR2") || self.product_type.eq_ignore_ascii_case("MCR")
    }

    pub fn location(&self) -> &str {
        self.location_detail
            .as_ref()
            .and_then(|l| l.name.as_deref())
            .unwrap_or("unknown")
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct LocationDetail {
    pub name: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vxc {
    pub product_name: String,
    #[serde(default)]
    pub product_type: String,
    #[serde(default)]
    pub provisioning_status: String,
    pub a_end: Option<VxcEnd>,
    pub resources: Option<VxcResources>,
}

impl Vxc {
    /// The first BGP peer of the first cloud connection, with its session state
    pub fn first_bgp_peer(&self) -> Option<(&str, bool)> {
        let csp = self.resources.as_ref()?.csp_connection.first()?;
        let peer = csp.bgp_peers.first()?;
        let established = csp.bgp_status.get(peer).copied() == Some(1);
        Some((peer.as_str(), established))
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VxcEnd {
    pub product_name: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct VxcResources {
    #[serde(default = "Vec::new")]
    pub csp_connection: Vec<CspConnection>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CspConnection {
    #[serde(default = "Vec::new")]
    pub bgp_peers: Vec<String>,
    #[serde(default)]
    pub bgp_status: HashMap<String, i64>,
}

/// One direction of bandwidth telemetry for a product
#[derive(Clone, Debug, Deserialize)]
pub struct TelemetrySeries {
    pub subtype: String,
    /// `[epoch_ms, value]` pairs
    #[serde(default = "Vec::new")]
    pub samples: Vec<(f64, f64)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prefix_list_detail() {
        let body = r#"{
            "message": "Prefix list 12",
            "data": {
                "id": 12,
                "description": "aws",
                "addressFamily": "IPv4",
                "entries": [
                    {"action": "permit", "prefix": "10.0.0.0/24", "ge": 24, "le": 24},
                    {"prefix": "10.0.1.0/24"}
                ]
            }
        }"#;
        let resp: DataResponse<PrefixListDetail> = serde_json::from_str(body).unwrap();
        assert_eq!(resp.data.entries.len(), 2);
        assert_eq!(resp.data.entries[1].action, "permit");
        assert_eq!(resp.data.entries[0].prefix, PrefixEntry::from("10.0.0.0/24"));
    }

    #[test]
    fn test_serialize_update() {
        let update = PrefixListUpdate {
            description: "aws",
            address_family: AddressFamily::IPv4,
            entries: vec![PrefixListEntry::permit_prefix(&PrefixEntry::from("10.0.0.0/24"))],
        };
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "description": "aws",
                "addressFamily": "IPv4",
                "entries": [{"action": "permit", "prefix": "10.0.0.0/24"}]
            })
        );
    }

    #[test]
    fn test_parse_products() {
        let body = r#"{"data": [{
            "productUid": "mcr-1",
            "productName": "mcr-use1",
            "productType": "MCR2",
            "provisioningStatus": "LIVE",
            "locationDetail": {"name": "Equinix DC2"},
            "associatedVxcs": [{
                "productName": "vxc-aws",
                "productType": "VXC",
                "provisioningStatus": "LIVE",
                "up": true,
                "aEnd": {"productName": "mcr-use1"},
                "resources": {"csp_connection": [{
                    "bgp_peers": ["169.254.10.1"],
                    "bgp_status": {"169.254.10.1": 1}
                }]}
            }]
        }]}"#;
        let resp: DataResponse<Vec<Product>> = serde_json::from_str(body).unwrap();
        let mcr = &resp.data[0];
        assert!(mcr.is_mcr());
        assert_eq!(mcr.location(), "Equinix DC2");
        assert_eq!(
            mcr.associated_vxcs[0].first_bgp_peer(),
            Some(("169.254.10.1", true))
        );
    }

    #[test]
    fn test_parse_telemetry() {
        let body = r#"{"data": [
            {"type": "BITS", "subtype": "In", "samples": [[1700000000000, 12.5], [1700000300000, 14.0]]},
            {"type": "BITS", "subtype": "Out", "samples": []}
        ]}"#;
        let resp: DataResponse<Vec<TelemetrySeries>> = serde_json::from_str(body).unwrap();
        assert_eq!(resp.data[0].samples[1], (1700000300000.0, 14.0));
        assert_eq!(resp.data[1].subtype, "Out");
    }
}
