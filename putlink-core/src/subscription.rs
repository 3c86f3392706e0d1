//! RSS-style fetch subscriptions and their keyword filters.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::contract::{decode_records, lenient, params, Params, Session};
use crate::error::Result;
use crate::filter_list;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(deserialize_with = "lenient::u64_or_zero", default)]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub do_filters: String,
    #[serde(default)]
    pub dont_filters: String,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub parent_folder_id: Option<u64>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub paused: bool,
}

/// Keyword changes to apply to a subscription's filters. Additions are merged first,
/// removals applied to the merged result.
#[derive(Debug, Clone, Default)]
pub struct FilterEdit {
    pub add_do: Vec<String>,
    pub remove_do: Vec<String>,
    pub add_dont: Vec<String>,
    pub remove_dont: Vec<String>,
}

impl FilterEdit {
    /// The do/don't filter strings that result from applying this edit.
    pub fn apply(&self, subscription: &Subscription) -> (String, String) {
        let do_filters = filter_list::remove(
            &filter_list::merge(&subscription.do_filters, self.add_do.as_slice()),
            self.remove_do.as_slice(),
        );
        let dont_filters = filter_list::remove(
            &filter_list::merge(&subscription.dont_filters, self.add_dont.as_slice()),
            self.remove_dont.as_slice(),
        );
        (do_filters, dont_filters)
    }
}

pub struct Subscriptions<'a, S: Session + ?Sized> {
    session: &'a S,
}

impl<'a, S: Session + ?Sized> Subscriptions<'a, S> {
    pub fn new(session: &'a S) -> Self {
        Self { session }
    }

    pub async fn list(&self) -> Result<Vec<Subscription>> {
        let (resource, operation) = ("subscriptions", "list");
        info!(resource, operation, "Listing subscriptions");
        let records = self
            .session
            .invoke(resource, operation, Params::new())
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list subscriptions");
                e
            })?;
        decode_records(resource, operation, records)
    }

    pub async fn set_paused(&self, id: u64, paused: bool) -> Result<()> {
        let operation = if paused { "pause" } else { "resume" };
        info!(subscription_id = id, operation, "Toggling subscription");
        self.session
            .invoke("subscriptions", operation, params([("id", json!(id))]))
            .await
            .map_err(|e| {
                error!(error = %e, subscription_id = id, "Failed to toggle subscription");
                e
            })?;
        Ok(())
    }

    /// Apply `edit` to `subscription`'s filters and submit the result as a field update.
    /// Returns the subscription as it now stands.
    pub async fn edit_filters(
        &self,
        subscription: &Subscription,
        edit: &FilterEdit,
    ) -> Result<Subscription> {
        let (do_filters, dont_filters) = edit.apply(subscription);
        info!(
            subscription_id = subscription.id,
            do_filters = %do_filters,
            dont_filters = %dont_filters,
            "Editing subscription filters"
        );
        let call = params([
            ("id", json!(subscription.id)),
            ("name", json!(subscription.name)),
            ("url", json!(subscription.url)),
            ("do_filters", json!(do_filters)),
            ("dont_filters", json!(dont_filters)),
            ("parent_folder_id", json!(subscription.parent_folder_id)),
            ("paused", json!(subscription.paused)),
        ]);
        self.session
            .invoke("subscriptions", "edit", call)
            .await
            .map_err(|e| {
                error!(error = %e, subscription_id = subscription.id, "Failed to edit subscription");
                e
            })?;
        Ok(Subscription {
            do_filters,
            dont_filters,
            ..subscription.clone()
        })
    }
}
