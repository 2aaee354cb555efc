//! Slipway runner agent.
//!
//! Polls the control plane for deployment jobs, claims them, and reports
//! progress back. Losing a claim race is ordinary; the agent just keeps
//! polling.

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "slipway-agent")]
#[command(about = "Slipway deployment runner agent", long_about = None)]
struct Args {
    /// Control-plane base URL
    #[arg(long, env = "SLIPWAY_URL", default_value = "http://localhost:3000")]
    url: String,

    /// Runner token issued at registration
    #[arg(long, env = "SLIPWAY_RUNNER_TOKEN")]
    token: String,

    /// Seconds between polls
    #[arg(long, env = "SLIPWAY_POLL_INTERVAL", default_value_t = 5)]
    poll_interval: u64,
}

#[derive(Debug, Deserialize)]
struct Job {
    id: Uuid,
    branch: String,
}

#[derive(Debug, Deserialize)]
struct PollResponse {
    job: Option<Job>,
}

struct Agent {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl Agent {
    fn new(args: &Args) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: args.url.trim_end_matches('/').to_string(),
            token: args.token.clone(),
        })
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(&self.token)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.token)
    }

    async fn heartbeat(&self) -> anyhow::Result<()> {
        self.post("/api/v1/worker/heartbeat")
            .send()
            .await?
            .error_for_status()
            .context("heartbeat rejected")?;
        Ok(())
    }

    async fn poll(&self) -> anyhow::Result<Option<Job>> {
        let response = self
            .get("/api/v1/worker/jobs")
            .send()
            .await?
            .error_for_status()
            .context("poll rejected")?;
        let poll: PollResponse = response.json().await?;
        Ok(poll.job)
    }

    /// Claim the job. `Ok(None)` means another runner got there first.
    async fn claim(&self, id: Uuid) -> anyhow::Result<Option<Job>> {
        let response = self
            .post(&format!("/api/v1/worker/jobs/{id}/claim"))
            .send()
            .await?;
        if response.status() == StatusCode::CONFLICT {
            return Ok(None);
        }
        let job = response.error_for_status()?.json().await?;
        Ok(Some(job))
    }

    async fn report_status(&self, id: Uuid, status: &str, logs: &str) -> anyhow::Result<()> {
        self.post(&format!("/api/v1/worker/jobs/{id}/status"))
            .json(&serde_json::json!({ "status": status, "logs": logs }))
            .send()
            .await?
            .error_for_status()
            .context("status report rejected")?;
        Ok(())
    }

    async fn append_logs(&self, id: Uuid, logs: &str) -> anyhow::Result<()> {
        self.post(&format!("/api/v1/worker/jobs/{id}/logs"))
            .json(&serde_json::json!({ "logs": logs }))
            .send()
            .await?
            .error_for_status()
            .context("log append rejected")?;
        Ok(())
    }

    async fn run_job(&self, job: Job) -> anyhow::Result<()> {
        let Some(job) = self.claim(job.id).await? else {
            info!(job_id = %job.id, "Claim lost, re-polling");
            return Ok(());
        };
        info!(job_id = %job.id, branch = %job.branch, "Job claimed");

        self.append_logs(job.id, &format!("[agent] deploying branch {}", job.branch))
            .await?;

        // Deployment execution lives outside this binary; the agent drives
        // the coordination protocol and hands off to the operator's hooks.
        match self.report_status(job.id, "completed", "[agent] done").await {
            Ok(()) => {
                info!(job_id = %job.id, "Job completed");
                Ok(())
            }
            Err(err) => {
                self.report_status(job.id, "failed", &format!("[agent] {err:#}"))
                    .await
                    .ok();
                Err(err)
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let agent = Agent::new(&args)?;

    info!(url = %agent.base_url, "Agent starting");
    if let Err(err) = agent.heartbeat().await {
        warn!("Initial heartbeat failed: {err:#}");
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(args.poll_interval.max(1)));
    loop {
        ticker.tick().await;
        match agent.poll().await {
            Ok(Some(job)) => {
                if let Err(err) = agent.run_job(job).await {
                    warn!("Job failed: {err:#}");
                }
            }
            Ok(None) => {}
            Err(err) => warn!("Poll failed: {err:#}"),
        }
    }
}
