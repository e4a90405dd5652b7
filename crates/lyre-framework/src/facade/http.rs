use std::future::Future;

use lyre_core::{
    CapabilityContext, HttpClientOptions, HttpRequest, HttpResponse, SchedulerHandle,
    TransportError,
};
use tracing::debug;

use super::deliver;
use crate::context::InstanceServices;

/// Outbound HTTP.
#[derive(Clone)]
pub struct Http {
    capabilities: CapabilityContext,
    options: HttpClientOptions,
    scheduler: SchedulerHandle,
}

impl Http {
    pub(crate) fn new(services: &InstanceServices) -> Self {
        Self {
            capabilities: services.capabilities,
            options: services.http_options.clone(),
            scheduler: services.scheduler.clone(),
        }
    }

    /// Sends `request` and returns at once.
    ///
    /// `callback` runs exactly once on the instance scheduler, with the
    /// response or the error text.
    pub fn simple_request<F, Fut>(&self, request: HttpRequest, callback: F)
    where
        F: FnOnce(Result<HttpResponse, String>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let send = self.capabilities.http();
        let options = self.options.clone();
        let scheduler = self.scheduler.clone();

        tokio::spawn(async move {
            let url = request.url.clone();
            let result = match send {
                Some(send) => send(request, options).await,
                None => Err(TransportError::NotAvailable { capability: "http" }),
            };
            if let Err(e) = &result {
                debug!(%url, error = %e, "HTTP request failed");
            }
            deliver(&scheduler, result.map_err(|e| e.to_string()), callback);
        });
    }
}
