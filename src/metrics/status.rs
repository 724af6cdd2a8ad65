//! Megaport resource health as Datadog service checks

use log::info;

use super::{CheckStatus, StatsdClient};
use crate::error::Result;
use crate::megaport::{MegaportSession, Product};

pub const CHECK_NAME: &str = "networking.megaport.service_check.resource_status";
pub const CHECK_HOST: &str = "networking_megaport_poller";

const LIVE: &str = "LIVE";

/// One MCR, VXC or BGP peer and its health
#[derive(Clone, Debug, PartialEq)]
pub struct Resource {
    pub name: String,
    pub kind: String,
    pub parent: String,
    pub location: String,
    pub status: CheckStatus,
}

impl Resource {
    fn tags(&self) -> Vec<String> {
        vec![
            format!("megaport_resource_name:{}", self.name),
            format!("megaport_resource_type:{}", self.kind),
            format!("parent:{}", self.parent),
            format!("location:{}", self.location),
        ]
    }
}

/// Flatten products into MCRs, their VXCs and each VXC's first BGP peer
pub fn resources(products: &[Product]) -> Vec<Resource> {
    let mut resources = Vec::new();
    for mcr in products {
        let location = mcr.location().to_string();
        resources.push(Resource {
            name: mcr.product_name.clone(),
            kind: mcr.product_type.clone(),
            parent: "root".to_string(),
            location: location.clone(),
            status: CheckStatus::from_ok(mcr.provisioning_status == LIVE),
        });
        for vxc in &mcr.associated_vxcs {
            let parent = vxc
                .a_end
                .as_ref()
                .and_then(|end| end.product_name.clone())
                .unwrap_or_else(|| mcr.product_name.clone());
            resources.push(Resource {
                name: vxc.product_name.clone(),
                kind: vxc.product_type.clone(),
                parent,
                location: location.clone(),
                status: CheckStatus::from_ok(vxc.provisioning_status == LIVE),
            });
            if let Some((peer, established)) = vxc.first_bgp_peer() {
                resources.push(Resource {
                    name: peer.to_string(),
                    kind: "bgpPeer".to_string(),
                    parent: vxc.product_name.clone(),
                    location: location.clone(),
                    status: CheckStatus::from_ok(established),
                });
            }
        }
    }
    resources
}

/// Send one service check per live Megaport resource
pub async fn collect(session: &MegaportSession, statsd: &StatsdClient) -> Result<Vec<Resource>> {
    let products = session.products(true).await?;
    let resources = resources(&products);
    for resource in &resources {
        statsd
            .service_check(CHECK_NAME, resource.status, CHECK_HOST, &resource.name, &resource.tags())
            .await?;
        info!("Service check sent for {} {}", resource.kind, resource.name);
    }
    Ok(resources)
}
