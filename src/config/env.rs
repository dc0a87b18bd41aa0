use anyhow::Context;
use std::env;
use std::str::FromStr;

pub enum EnvKey {
    ServerPort,
    DatabaseUrl,
    RedisUrl,
    AmqpUrl,
    JobQueueName,
    StatusQueueName,
    MaxConcurrentTasks,
    DedupWindowSecs,
    PollIntervalSecs,
    ReceiveBatchSize,
    ReconcileIntervalSecs,
    ReconcileGraceSecs,
    LaunchTimeoutSecs,
    LaunchClaimTtlSecs,
    StaleQueuedSecs,
    CallbackBaseUrl,
    CallbackSecret,
    CallbackTokenTtlSecs,
    AwsRegion,
    AwsAccessKey,
    AwsSecretKey,
    S3Endpoint,
    EcsClusterArn,
    EcsTaskDefinitionArn,
    EcsContainerName,
    EcsSubnetIds,
    EcsSecurityGroupId,
    R2Bucket,
    R2Endpoint,
    R2AccessKey,
    R2SecretKey,
    R2CdnEndpoint,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::DatabaseUrl => "DATABASE_URL",
            EnvKey::RedisUrl => "REDIS_URL",
            EnvKey::AmqpUrl => "AMQP_URL",
            EnvKey::JobQueueName => "JOB_QUEUE_NAME",
            EnvKey::StatusQueueName => "STATUS_QUEUE_NAME",
            EnvKey::MaxConcurrentTasks => "MAX_CONCURRENT_TASKS",
            EnvKey::DedupWindowSecs => "DEDUP_WINDOW_SECS",
            EnvKey::PollIntervalSecs => "POLL_INTERVAL_SECS",
            EnvKey::ReceiveBatchSize => "RECEIVE_BATCH_SIZE",
            EnvKey::ReconcileIntervalSecs => "RECONCILE_INTERVAL_SECS",
            EnvKey::ReconcileGraceSecs => "RECONCILE_GRACE_SECS",
            EnvKey::LaunchTimeoutSecs => "LAUNCH_TIMEOUT_SECS",
            EnvKey::LaunchClaimTtlSecs => "LAUNCH_CLAIM_TTL_SECS",
            EnvKey::StaleQueuedSecs => "STALE_QUEUED_SECS",
            EnvKey::CallbackBaseUrl => "CALLBACK_BASE_URL",
            EnvKey::CallbackSecret => "CALLBACK_SECRET",
            EnvKey::CallbackTokenTtlSecs => "CALLBACK_TOKEN_TTL_SECS",
            EnvKey::AwsRegion => "AWS_REGION",
            EnvKey::AwsAccessKey => "AWS_ACCESS_KEY_ID",
            EnvKey::AwsSecretKey => "AWS_SECRET_ACCESS_KEY",
            EnvKey::S3Endpoint => "S3_ENDPOINT",
            EnvKey::EcsClusterArn => "ECS_CLUSTER_ARN",
            EnvKey::EcsTaskDefinitionArn => "ECS_TASK_DEFINITION_ARN",
            EnvKey::EcsContainerName => "ECS_CONTAINER_NAME",
            EnvKey::EcsSubnetIds => "ECS_SUBNET_IDS",
            EnvKey::EcsSecurityGroupId => "ECS_SECURITY_GROUP_ID",
            EnvKey::R2Bucket => "R2_BUCKET",
            EnvKey::R2Endpoint => "R2_ENDPOINT",
            EnvKey::R2AccessKey => "R2_ACCESS_KEY_ID",
            EnvKey::R2SecretKey => "R2_SECRET_ACCESS_KEY",
            EnvKey::R2CdnEndpoint => "R2_CDN_ENDPOINT",
        }
    }
}

pub fn get(key: EnvKey) -> anyhow::Result<String> {
    env::var(key.as_str()).with_context(|| format!("{} must be set", key.as_str()))
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_opt(key: EnvKey) -> Option<String> {
    env::var(key.as_str())
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match env::var(key.as_str()) {
        Ok(val) => val.trim().parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Splits a comma separated value, dropping blanks.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_list_drops_blank_entries() {
        assert_eq!(
            split_list("subnet-a, subnet-b,,  ,subnet-c "),
            vec!["subnet-a", "subnet-b", "subnet-c"]
        );
        assert!(split_list("").is_empty());
    }

    #[test]
    fn missing_variable_error_names_it() {
        let err = get(EnvKey::EcsSecurityGroupId).unwrap_err();
        assert!(err.to_string().contains("ECS_SECURITY_GROUP_ID"));
    }
}
