use std::time::Duration;

use crate::config::env::{self, EnvKey};
use crate::modules::dispatch::scheduler::SchedulerSettings;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_port: u16,
    pub database_url: String,
    pub redis_url: String,
    pub amqp_url: String,
    pub job_queue_name: String,
    pub status_queue_name: String,
    pub max_concurrent_tasks: u32,
    pub dedup_window_secs: u64,
    pub poll_interval_secs: u64,
    pub receive_batch_size: u16,
    pub reconcile_interval_secs: u64,
    pub reconcile_grace_secs: u64,
    pub launch_timeout_secs: u64,
    pub launch_claim_ttl_secs: u64,
    pub stale_queued_secs: u64,
    pub callback_base_url: String,
    pub callback_secret: String,
    pub callback_token_ttl_secs: u64,
    pub aws_region: String,
    pub aws_access_key: String,
    pub aws_secret_key: String,
    pub s3_endpoint: Option<String>,
    pub ecs_cluster_arn: String,
    pub ecs_task_definition_arn: String,
    pub ecs_container_name: String,
    pub ecs_subnet_ids: Vec<String>,
    pub ecs_security_group_id: String,
    pub r2_bucket: String,
    pub r2_endpoint: String,
    pub r2_access_key: String,
    pub r2_secret_key: String,
    pub r2_cdn_endpoint: Option<String>,
}

impl AppConfig {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 3000),
            database_url: env::get(EnvKey::DatabaseUrl)?,
            redis_url: env::get(EnvKey::RedisUrl)?,
            amqp_url: env::get(EnvKey::AmqpUrl)?,
            job_queue_name: env::get_or(EnvKey::JobQueueName, "transcoding_jobs"),
            status_queue_name: env::get_or(EnvKey::StatusQueueName, "transcoding_status"),
            max_concurrent_tasks: env::get_parsed(EnvKey::MaxConcurrentTasks, 5),
            dedup_window_secs: env::get_parsed(EnvKey::DedupWindowSecs, 300),
            poll_interval_secs: env::get_parsed(EnvKey::PollIntervalSecs, 5),
            receive_batch_size: env::get_parsed(EnvKey::ReceiveBatchSize, 10),
            reconcile_interval_secs: env::get_parsed(EnvKey::ReconcileIntervalSecs, 15),
            reconcile_grace_secs: env::get_parsed(EnvKey::ReconcileGraceSecs, 30),
            launch_timeout_secs: env::get_parsed(EnvKey::LaunchTimeoutSecs, 30),
            launch_claim_ttl_secs: env::get_parsed(EnvKey::LaunchClaimTtlSecs, 120),
            stale_queued_secs: env::get_parsed(EnvKey::StaleQueuedSecs, 900),
            callback_base_url: env::get(EnvKey::CallbackBaseUrl)?,
            callback_secret: env::get(EnvKey::CallbackSecret)?,
            callback_token_ttl_secs: env::get_parsed(EnvKey::CallbackTokenTtlSecs, 6 * 60 * 60),
            aws_region: env::get_or(EnvKey::AwsRegion, "us-east-1"),
            aws_access_key: env::get(EnvKey::AwsAccessKey)?,
            aws_secret_key: env::get(EnvKey::AwsSecretKey)?,
            s3_endpoint: env::get_opt(EnvKey::S3Endpoint),
            ecs_cluster_arn: env::get(EnvKey::EcsClusterArn)?,
            ecs_task_definition_arn: env::get(EnvKey::EcsTaskDefinitionArn)?,
            ecs_container_name: env::get(EnvKey::EcsContainerName)?,
            ecs_subnet_ids: env::split_list(&env::get(EnvKey::EcsSubnetIds)?),
            ecs_security_group_id: env::get(EnvKey::EcsSecurityGroupId)?,
            r2_bucket: env::get(EnvKey::R2Bucket)?,
            r2_endpoint: env::get(EnvKey::R2Endpoint)?,
            r2_access_key: env::get(EnvKey::R2AccessKey)?,
            r2_secret_key: env::get(EnvKey::R2SecretKey)?,
            r2_cdn_endpoint: env::get_opt(EnvKey::R2CdnEndpoint),
        })
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            max_concurrent: self.max_concurrent_tasks,
            dedup_window: Duration::from_secs(self.dedup_window_secs),
            launch_timeout: Duration::from_secs(self.launch_timeout_secs),
            launch_claim_ttl: Duration::from_secs(self.launch_claim_ttl_secs),
            reconcile_grace: Duration::from_secs(self.reconcile_grace_secs),
            stale_queued_after: Duration::from_secs(self.stale_queued_secs),
            callback_base_url: self.callback_base_url.trim_end_matches('/').to_string(),
            callback_secret: self.callback_secret.clone(),
            callback_token_ttl: Duration::from_secs(self.callback_token_ttl_secs),
            status_queue_name: self.status_queue_name.clone(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs.max(1))
    }
}
