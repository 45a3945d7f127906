//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! recurring cache sweep.

use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use pricegrid_cache::ProductCache;

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process — dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(cache: Arc<ProductCache>) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    register_sweep_job(&scheduler, cache).await?;
    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the cache expiry sweep, every five minutes.
///
/// The sweep only covers the durable tier; fast-tier entries expire
/// natively. Running it concurrently with ordinary reads and writes is
/// safe — expiry checks and deletes are single-key atomic statements.
async fn register_sweep_job(
    scheduler: &JobScheduler,
    cache: Arc<ProductCache>,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async("0 */5 * * * *", move |_uuid, _lock| {
        let cache = Arc::clone(&cache);
        Box::pin(async move {
            match cache.durable().sweep_expired().await {
                Ok(removed) => {
                    tracing::debug!(removed, "cache sweep complete");
                }
                Err(e) => {
                    tracing::error!(error = %e, "cache sweep failed");
                }
            }
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}
