use std::collections::HashSet;
use std::time::Duration;

use safepost_core::config::DiscoveryConfig;
use safepost_core::{
    AuditCategory, AuditContext, AuditOutcome, AuditSink, ContentId, ContentItem, PlatformClient,
    TimeWindow,
};
use tracing::{debug, info, warn};

/// Bounded search plan for one run. Queries and scopes are visited in the
/// configured order and only their first `max_*` entries are used.
#[derive(Clone, Debug, PartialEq)]
pub struct DiscoveryPlan {
    pub queries: Vec<String>,
    pub scopes: Vec<String>,
    pub max_queries: usize,
    pub max_scopes: usize,
    pub window: TimeWindow,
    pub results_per_search: usize,
    pub repliers_inspected: usize,
    pub max_candidates: usize,
    pub inter_query_delay: Duration,
}

impl DiscoveryPlan {
    pub fn from_config(config: &DiscoveryConfig) -> Self {
        Self {
            queries: config.queries.clone(),
            scopes: config.scopes.clone(),
            max_queries: config.max_queries_per_run,
            max_scopes: config.max_scopes_per_run,
            window: config.search_window,
            results_per_search: config.results_per_search,
            repliers_inspected: config.repliers_inspected,
            max_candidates: config.max_candidates,
            inter_query_delay: config.inter_query_delay(),
        }
    }
}

pub struct TargetDiscovery {
    plan: DiscoveryPlan,
}

impl TargetDiscovery {
    pub fn new(plan: DiscoveryPlan) -> Self {
        Self { plan }
    }

    pub fn plan(&self) -> &DiscoveryPlan {
        &self.plan
    }

    /// Returns at most `max_candidates` items in discovery order. Items for
    /// which `already_acted` holds are excluded, and so are items whose
    /// repliers could not be listed. A failed search is audited and skipped.
    pub async fn discover<F>(
        &self,
        platform: &dyn PlatformClient,
        audit: &dyn AuditSink,
        context: &AuditContext,
        already_acted: F,
    ) -> Vec<ContentItem>
    where
        F: Fn(&ContentItem) -> bool,
    {
        let plan = &self.plan;
        let mut candidates: Vec<ContentItem> = Vec::new();
        let mut seen: HashSet<ContentId> = HashSet::new();
        let mut searches = 0usize;

        'queries: for (round, query) in plan.queries.iter().take(plan.max_queries).enumerate() {
            if candidates.len() >= plan.max_candidates {
                break;
            }
            if round > 0 && !plan.inter_query_delay.is_zero() {
                tokio::time::sleep(plan.inter_query_delay).await;
            }

            for scope in plan.scopes.iter().take(plan.max_scopes) {
                if candidates.len() >= plan.max_candidates {
                    break 'queries;
                }
                searches += 1;
                let results = match platform
                    .search(scope, query, plan.window, plan.results_per_search)
                    .await
                {
                    Ok(results) => results,
                    Err(error) => {
                        warn!(
                            event_name = "safepost.discovery.search_failed",
                            scope = %scope,
                            query = %query,
                            error = %error,
                            "search failed, skipping scope"
                        );
                        audit
                            .record(
                                context
                                    .event(
                                        "discovery_search_error",
                                        AuditCategory::Discovery,
                                        AuditOutcome::Failed,
                                    )
                                    .with_detail("subreddit", scope.as_str())
                                    .with_detail("query", query.as_str())
                                    .with_detail("error", error.to_string()),
                            )
                            .await;
                        continue;
                    }
                };

                for mut item in results {
                    if candidates.len() >= plan.max_candidates {
                        break 'queries;
                    }
                    if !seen.insert(item.id.clone()) {
                        continue;
                    }

                    match platform.list_repliers(&item, plan.repliers_inspected).await {
                        Ok(repliers) => item.existing_repliers = repliers,
                        Err(error) => {
                            warn!(
                                event_name = "safepost.discovery.repliers_failed",
                                item_id = %item.id,
                                error = %error,
                                "could not verify existing replies, skipping item"
                            );
                            continue;
                        }
                    }

                    if already_acted(&item) {
                        debug!(
                            event_name = "safepost.discovery.already_replied",
                            item_id = %item.id,
                            scope = %item.scope,
                            "already replied to item, skipping"
                        );
                        continue;
                    }

                    candidates.push(item);
                }
            }
        }

        info!(
            event_name = "safepost.discovery.completed",
            searches,
            candidates = candidates.len(),
            "target discovery finished"
        );

        candidates
    }
}
