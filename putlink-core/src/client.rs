//! `Putio`: one shared session, every putlink operation.

use std::sync::Arc;

use crate::bucket::Bucket;
use crate::contract::Session;
use crate::error::Result;
use crate::files::Files;
use crate::job::{self, Job};
use crate::messages::{self, Message};
use crate::subscription::Subscriptions;
use crate::user::{self, AccountInfo};

pub struct Putio<S: Session + ?Sized> {
    session: Arc<S>,
}

impl<S: Session + ?Sized> Clone for Putio<S> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
        }
    }
}

impl<S: Session + ?Sized> Putio<S> {
    pub fn new(session: Arc<S>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<S> {
        &self.session
    }

    /// A fresh, empty bucket bound to this session.
    pub fn bucket(&self) -> Bucket<S> {
        Bucket::new(Arc::clone(&self.session))
    }

    pub fn files(&self) -> Files<'_, S> {
        Files::new(&*self.session)
    }

    pub fn subscriptions(&self) -> Subscriptions<'_, S> {
        Subscriptions::new(&*self.session)
    }

    pub async fn jobs(&self) -> Result<Vec<Job>> {
        job::list_jobs(&*self.session).await
    }

    pub async fn messages(&self) -> Result<Vec<Message>> {
        messages::list(&*self.session).await
    }

    pub async fn delete_message(&self, id: u64) -> Result<()> {
        messages::delete(&*self.session, id).await
    }

    pub async fn account(&self) -> Result<AccountInfo> {
        user::info(&*self.session).await
    }
}
