use serde::Serialize;

use super::{PrefixSet, RemoteId};

/// Changes needed to bring one remote prefix list in line with desired state
#[derive(Clone, Debug, Serialize)]
pub struct ReconciliationPlan {
    pub name: String,
    pub remote_id: RemoteId,
    /// Desired but not on the remote list
    pub to_add: PrefixSet,
    /// On the remote list but no longer desired
    pub to_remove: PrefixSet,
    /// Replacement payload (the remote API overwrites, it does not patch)
    pub desired_full_set: PrefixSet,
    pub current: PrefixSet,
}

impl ReconciliationPlan {
    pub fn compute(
        name: &str,
        remote_id: RemoteId,
        desired: &PrefixSet,
        current: &PrefixSet,
    ) -> Self {
        Self {
            name: name.to_string(),
            remote_id,
            to_add: desired.difference(current).cloned().collect(),
            to_remove: current.difference(desired).cloned().collect(),
            desired_full_set: desired.clone(),
            current: current.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}
