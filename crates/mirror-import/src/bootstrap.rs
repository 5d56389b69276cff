//! One-time setup before the pipeline starts
//!
//! Every failure here is fatal. The order is:
//!
//! 1. build and validate all jobs ([`build_jobs`])
//! 2. authenticate to the destination (done by the caller, see
//!    [`crate::storage::S3Store::connect`])
//! 3. create every target container concurrently ([`prepare_targets`])
//! 4. give each job its own HTTP client ([`prepare_clients`])
//! 5. connect each source ([`connect_sources`])

use crate::config::{Config, PipelineConfig};
use crate::error::BootstrapError;
use crate::job::Job;
use crate::storage::ObjectStore;
use futures::future::try_join_all;
use reqwest::{Certificate, Client, Identity};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Build every job, failing with all validation errors at once
pub fn build_jobs(config: &Config) -> Result<Vec<Job>, BootstrapError> {
    let mut errors = config.validate();
    let mut jobs = Vec::with_capacity(config.jobs.len());

    for (index, job_config) in config.jobs.iter().enumerate() {
        match Job::from_config(index, job_config) {
            Ok(job) => jobs.push(job),
            Err(job_errors) => errors.extend(job_errors),
        }
    }

    if !errors.is_empty() {
        return Err(BootstrapError::InvalidConfig(errors));
    }
    Ok(jobs)
}

/// Create each distinct target container, all at once
pub async fn prepare_targets(store: &dyn ObjectStore, jobs: &[Job]) -> Result<(), BootstrapError> {
    let containers: BTreeSet<&str> = jobs.iter().map(|job| job.target.container.as_str()).collect();
    debug!(containers = containers.len(), "Ensuring target containers");

    try_join_all(containers.iter().map(|container| store.ensure_container(container))).await?;

    info!(containers = ?containers, "Target containers are ready");
    Ok(())
}

fn read_pem(job: &Job, path: &Path) -> Result<Vec<u8>, BootstrapError> {
    std::fs::read(path).map_err(|e| BootstrapError::TlsMaterial {
        job: job.name.clone(),
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// HTTP client for one job, carrying only that job's TLS material
pub fn build_client(job: &Job, pipeline: &PipelineConfig) -> Result<Client, BootstrapError> {
    let mut builder = Client::builder()
        .use_rustls_tls()
        .timeout(pipeline.request_timeout())
        .user_agent(concat!("mirror-import/", env!("CARGO_PKG_VERSION")));

    if let (Some(cert), Some(key)) = (&job.tls.cert, &job.tls.key) {
        let mut pem = read_pem(job, cert)?;
        pem.push(b'\n');
        pem.extend(read_pem(job, key)?);

        let identity = Identity::from_pem(&pem).map_err(|e| BootstrapError::TlsMaterial {
            job: job.name.clone(),
            path: cert.display().to_string(),
            message: e.to_string(),
        })?;
        builder = builder.identity(identity);
    }

    if let Some(ca) = &job.tls.ca {
        let certificate = Certificate::from_pem(&read_pem(job, ca)?).map_err(|e| BootstrapError::TlsMaterial {
            job: job.name.clone(),
            path: ca.display().to_string(),
            message: e.to_string(),
        })?;
        builder = builder.add_root_certificate(certificate);
    }

    builder.build().map_err(|source| BootstrapError::HttpClient {
        job: job.name.clone(),
        source,
    })
}

pub fn prepare_clients(jobs: &mut [Job], pipeline: &PipelineConfig) -> Result<(), BootstrapError> {
    for job in jobs.iter_mut() {
        let client = build_client(job, pipeline)?;
        if job.tls.is_configured() {
            debug!(job = %job.name, "Built HTTP client with TLS material");
        }
        job.source.set_http_client(client);
    }
    Ok(())
}

pub async fn connect_sources(jobs: &mut [Job]) -> Result<(), BootstrapError> {
    for job in jobs.iter_mut() {
        job.source
            .connect()
            .await
            .map_err(|source| BootstrapError::Connect {
                job: job.name.clone(),
                source,
            })?;
    }
    Ok(())
}

/// Steps 3 to 5, after which the jobs are shared with the pipeline
pub async fn prepare_jobs(
    mut jobs: Vec<Job>,
    store: &dyn ObjectStore,
    pipeline: &PipelineConfig,
) -> Result<Vec<Arc<Job>>, BootstrapError> {
    prepare_targets(store, &jobs).await?;
    prepare_clients(&mut jobs, pipeline)?;
    connect_sources(&mut jobs).await?;
    Ok(jobs.into_iter().map(Arc::new).collect())
}
