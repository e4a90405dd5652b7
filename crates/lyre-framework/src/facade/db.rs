use std::future::Future;

use futures::future::BoxFuture;
use lyre_core::{
    BoxedDbConnection, CapabilityContext, DbParams, DbValue, Row, SchedulerHandle, TransportError,
};
use tokio::sync::mpsc;
use tracing::debug;

use super::deliver;
use crate::context::InstanceServices;

type DbJob = Box<dyn FnOnce(Result<BoxedDbConnection, String>) -> BoxFuture<'static, ()> + Send>;

/// SQL databases.
#[derive(Clone)]
pub struct Db {
    capabilities: CapabilityContext,
    scheduler: SchedulerHandle,
}

impl Db {
    pub(crate) fn new(services: &InstanceServices) -> Self {
        Self {
            capabilities: services.capabilities,
            scheduler: services.scheduler.clone(),
        }
    }

    /// Opens a connection and returns its handle at once.
    ///
    /// Returns `None` without invoking `callback` when `params` are invalid.
    /// `callback` receives `None` once connected, or the error text.
    /// Statements issued on the handle run in issue order after the
    /// connection is up; if it never comes up they fail with the same error.
    pub fn connect<F, Fut>(&self, params: DbParams, callback: F) -> Option<DbConn>
    where
        F: FnOnce(Option<String>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if let Err(e) = params.validate() {
            debug!(error = %e, "Rejected database parameters");
            return None;
        }

        let (tx, mut jobs) = mpsc::unbounded_channel::<DbJob>();
        let open = self.capabilities.db();
        let scheduler = self.scheduler.clone();

        tokio::spawn(async move {
            let driver = params.driver;
            let conn = match open {
                Some(open) => open(params).await,
                None => Err(TransportError::NotAvailable { capability: "db" }),
            }
            .map_err(|e| {
                debug!(?driver, error = %e, "Database connection failed");
                e.to_string()
            });
            deliver(&scheduler, conn.as_ref().err().cloned(), callback);

            while let Some(job) = jobs.recv().await {
                job(conn.clone()).await;
            }
        });

        Some(DbConn {
            jobs: tx,
            scheduler: self.scheduler.clone(),
        })
    }
}

/// A database connection opened by [`Db::connect`].
#[derive(Clone)]
pub struct DbConn {
    jobs: mpsc::UnboundedSender<DbJob>,
    scheduler: SchedulerHandle,
}

impl DbConn {
    fn submit(&self, job: DbJob) -> bool {
        self.jobs.send(job).is_ok()
    }

    /// Runs a statement that returns rows.
    pub fn query<F, Fut>(&self, sql: impl Into<String>, params: Vec<DbValue>, callback: F) -> bool
    where
        F: FnOnce(Result<Vec<Row>, String>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let sql = sql.into();
        let scheduler = self.scheduler.clone();
        self.submit(Box::new(move |conn| {
            Box::pin(async move {
                let result = match conn {
                    Ok(conn) => conn.query(&sql, &params).await.map_err(|e| e.to_string()),
                    Err(e) => Err(e),
                };
                deliver(&scheduler, result, callback);
            })
        }))
    }

    /// Runs a statement and reports the number of affected rows.
    pub fn exec<F, Fut>(&self, sql: impl Into<String>, params: Vec<DbValue>, callback: F) -> bool
    where
        F: FnOnce(Result<u64, String>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let sql = sql.into();
        let scheduler = self.scheduler.clone();
        self.submit(Box::new(move |conn| {
            Box::pin(async move {
                let result = match conn {
                    Ok(conn) => conn.exec(&sql, &params).await.map_err(|e| e.to_string()),
                    Err(e) => Err(e),
                };
                deliver(&scheduler, result, callback);
            })
        }))
    }

    /// Runs a statement without a callback; failures are logged.
    pub fn exec_silent(&self, sql: impl Into<String>, params: Vec<DbValue>) -> bool {
        let sql = sql.into();
        self.submit(Box::new(move |conn| {
            Box::pin(async move {
                let result = match conn {
                    Ok(conn) => conn.exec(&sql, &params).await.map_err(|e| e.to_string()),
                    Err(e) => Err(e),
                };
                if let Err(error) = result {
                    debug!(%sql, %error, "Statement failed");
                }
            })
        }))
    }
}
