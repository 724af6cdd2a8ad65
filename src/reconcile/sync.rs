use log::{debug, error, info};

use super::{resolve_remote_id, DesiredList, DesiredState, PrefixListStore, ReconciliationPlan, RemoteId};
use crate::error::Result;

/// What happened to a single prefix list during a run
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListOutcome {
    /// Remote list already matches desired state
    Unchanged,
    /// Changes found but not applied (dry run)
    Planned,
    Applied,
    ReadFailed(String),
    WriteFailed(String),
}

impl ListOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, ListOutcome::ReadFailed(_) | ListOutcome::WriteFailed(_))
    }
}

#[derive(Clone, Debug)]
pub struct ListReport {
    pub name: String,
    pub outcome: ListOutcome,
    /// Missing when the current entries could not be read
    pub plan: Option<ReconciliationPlan>,
}

#[derive(Clone, Debug, Default)]
pub struct RunReport {
    pub lists: Vec<ListReport>,
}

impl RunReport {
    pub fn failures(&self) -> usize {
        self.lists.iter().filter(|l| l.outcome.is_failure()).count()
    }

    pub fn plans(&self) -> impl Iterator<Item = &ReconciliationPlan> {
        self.lists.iter().filter_map(|l| l.plan.as_ref())
    }
}

pub struct Reconciler {
    desired: DesiredState,
    dry_run: bool,
}

impl Reconciler {
    pub fn new(desired: DesiredState, dry_run: bool) -> Self {
        Self { desired, dry_run }
    }

    /// Match every desired list to exactly one remote list
    ///
    /// The catalog is fetched once; a single unresolvable name fails the
    /// whole run before any entries are read.
    pub async fn resolve<S>(&self, store: &S) -> Result<Vec<(&DesiredList, RemoteId)>>
    where
        S: PrefixListStore + ?Sized,
    {
        let catalog = store.catalog().await?;
        debug!("Remote catalog has {} prefix lists", catalog.len());
        self.desired
            .lists
            .iter()
            .map(|list| resolve_remote_id(&catalog, &list.name).map(|id| (list, id)))
            .collect()
    }

    /// Diff desired state against the remote list's current entries
    pub async fn plan<S>(
        &self,
        store: &S,
        list: &DesiredList,
        remote_id: RemoteId,
    ) -> Result<ReconciliationPlan>
    where
        S: PrefixListStore + ?Sized,
    {
        let current = store.entries(&remote_id).await?;
        let plan = ReconciliationPlan::compute(&list.name, remote_id, &list.entries, &current);
        if plan.is_empty() {
            info!("No changes detected for {}", plan.name);
        } else {
            info!(
                "Changes detected for {} | add: {} | remove: {}",
                plan.name,
                plan.to_add.len(),
                plan.to_remove.len()
            );
            if let Ok(detail) = serde_json::to_string_pretty(&plan) {
                info!("{}", detail);
            }
        }
        Ok(plan)
    }

    /// Push the full desired set if the plan has changes and this is not a dry run
    pub async fn apply<S>(
        &self,
        store: &S,
        list: &DesiredList,
        plan: &ReconciliationPlan,
    ) -> Result<ListOutcome>
    where
        S: PrefixListStore + ?Sized,
    {
        if plan.is_empty() {
            return Ok(ListOutcome::Unchanged);
        }
        if self.dry_run {
            info!("Dry run: not updating {} ({})", plan.name, plan.remote_id);
            return Ok(ListOutcome::Planned);
        }
        store
            .replace(&plan.remote_id, &plan.name, list.family, &plan.desired_full_set)
            .await?;
        info!(
            "Updated {} ({}) with {} prefixes",
            plan.name,
            plan.remote_id,
            plan.desired_full_set.len()
        );
        Ok(ListOutcome::Applied)
    }

    /// Reconcile every configured list in turn
    ///
    /// Catalog and name resolution failures abort the run. Failures reading or
    /// writing a single list are logged and recorded, and the next list is
    /// still processed.
    pub async fn run<S>(&self, store: &S) -> Result<RunReport>
    where
        S: PrefixListStore + ?Sized,
    {
        let resolved = self.resolve(store).await?;
        let mut report = RunReport::default();
        for (list, remote_id) in resolved {
            let plan = match self.plan(store, list, remote_id.clone()).await {
                Ok(plan) => plan,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    error!("Error reading prefix list {} ({}): {}", list.name, remote_id, err);
                    report.lists.push(ListReport {
                        name: list.name.clone(),
                        outcome: ListOutcome::ReadFailed(err.to_string()),
                        plan: None,
                    });
                    continue;
                }
            };
            let outcome = match self.apply(store, list, &plan).await {
                Ok(outcome) => outcome,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    error!(
                        "Error updating prefix list {} ({}) with {} prefixes (+{} / -{}): {}",
                        plan.name,
                        plan.remote_id,
                        plan.desired_full_set.len(),
                        plan.to_add.len(),
                        plan.to_remove.len(),
                        err
                    );
                    ListOutcome::WriteFailed(err.to_string())
                }
            };
            report.lists.push(ListReport {
                name: list.name.clone(),
                outcome,
                plan: Some(plan),
            });
        }
        Ok(report)
    }
}
