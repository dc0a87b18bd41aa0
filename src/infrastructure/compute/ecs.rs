use async_trait::async_trait;
use aws_sdk_ecs::config::{BehaviorVersion, Builder, Credentials, Region};
use aws_sdk_ecs::error::DisplayErrorContext;
use aws_sdk_ecs::types::{
    AssignPublicIp, AwsVpcConfiguration, ContainerOverride, DesiredStatus, KeyValuePair,
    LaunchType, NetworkConfiguration, Task, TaskOverride,
};
use aws_sdk_ecs::Client;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::common::error::{DispatchError, DispatchResult};
use crate::config::settings::AppConfig;
use crate::modules::dispatch::ports::{ComputePlatform, TaskState, WorkerContext};
use crate::modules::jobs::model::JobId;

/// Credentials the worker uses to read the uploaded source.
#[derive(Debug, Clone)]
pub struct SourceStorage {
    pub access_key: String,
    pub secret_key: String,
}

/// Where the worker writes its renditions.
#[derive(Debug, Clone)]
pub struct DestinationStorage {
    pub bucket: String,
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub cdn_endpoint: Option<String>,
}

#[derive(Clone)]
pub struct EcsComputePlatform {
    client: Client,
    region: String,
    cluster: String,
    task_definition: String,
    container_name: String,
    subnets: Vec<String>,
    security_group: String,
    source: SourceStorage,
    destination: DestinationStorage,
}

impl EcsComputePlatform {
    pub fn new(config: &AppConfig) -> Self {
        let credentials = Credentials::new(
            &config.aws_access_key,
            &config.aws_secret_key,
            None,
            None,
            "static",
        );

        let ecs_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.aws_region.clone()))
            .credentials_provider(credentials)
            .build();

        info!("✅ ECS client ready for cluster {}", config.ecs_cluster_arn);

        Self {
            client: Client::from_conf(ecs_config),
            region: config.aws_region.clone(),
            cluster: config.ecs_cluster_arn.clone(),
            task_definition: config.ecs_task_definition_arn.clone(),
            container_name: config.ecs_container_name.clone(),
            subnets: config.ecs_subnet_ids.clone(),
            security_group: config.ecs_security_group_id.clone(),
            source: SourceStorage {
                access_key: config.aws_access_key.clone(),
                secret_key: config.aws_secret_key.clone(),
            },
            destination: DestinationStorage {
                bucket: config.r2_bucket.clone(),
                endpoint: config.r2_endpoint.clone(),
                access_key: config.r2_access_key.clone(),
                secret_key: config.r2_secret_key.clone(),
                cdn_endpoint: config.r2_cdn_endpoint.clone(),
            },
        }
    }

    fn environment(&self, context: &WorkerContext) -> Vec<(&'static str, String)> {
        worker_environment(&self.region, &self.source, &self.destination, context)
    }

    fn task_state(&self, task: &Task) -> TaskState {
        if task.last_status() != Some("STOPPED") {
            return TaskState::Running;
        }

        let containers = task.containers();
        let exit_code = containers
            .iter()
            .find(|c| c.name() == Some(self.container_name.as_str()))
            .or_else(|| containers.first())
            .and_then(|c| c.exit_code());

        TaskState::Stopped {
            exit_code,
            stopped_at: task
                .stopped_at()
                .and_then(|at| OffsetDateTime::from_unix_timestamp(at.secs()).ok()),
            reason: task.stopped_reason().map(str::to_owned),
        }
    }
}

/// Container environment handed to each worker.
pub fn worker_environment(
    region: &str,
    source: &SourceStorage,
    destination: &DestinationStorage,
    context: &WorkerContext,
) -> Vec<(&'static str, String)> {
    let mut env = vec![
        ("JOB_ID", context.job_id.to_string()),
        ("S3_BUCKET", context.source.bucket.clone()),
        ("S3_KEY", context.source.key.clone()),
        ("AWS_REGION", region.to_string()),
        ("AWS_ACCESS_KEY_ID", source.access_key.clone()),
        ("AWS_SECRET_ACCESS_KEY", source.secret_key.clone()),
        ("R2_BUCKET", destination.bucket.clone()),
        ("R2_ENDPOINT", destination.endpoint.clone()),
        ("R2_ACCESS_KEY_ID", destination.access_key.clone()),
        ("R2_SECRET_ACCESS_KEY", destination.secret_key.clone()),
        ("CALLBACK_URL", context.callback_url.clone()),
        ("CALLBACK_TOKEN", context.callback_token.clone()),
        ("STATUS_QUEUE", context.status_queue.clone()),
    ];
    if let Some(cdn) = &destination.cdn_endpoint {
        env.push(("R2_CDN_ENDPOINT", cdn.clone()));
    }
    env
}

#[async_trait]
impl ComputePlatform for EcsComputePlatform {
    async fn run_task(&self, context: &WorkerContext) -> DispatchResult<String> {
        let vpc = AwsVpcConfiguration::builder()
            .set_subnets(Some(self.subnets.clone()))
            .security_groups(&self.security_group)
            .assign_public_ip(AssignPublicIp::Enabled)
            .build()
            .map_err(|e| DispatchError::compute(format!("invalid network configuration: {e}")))?;

        let environment = self
            .environment(context)
            .into_iter()
            .map(|(name, value)| KeyValuePair::builder().name(name).value(value).build())
            .collect::<Vec<_>>();

        let overrides = TaskOverride::builder()
            .container_overrides(
                ContainerOverride::builder()
                    .name(&self.container_name)
                    .set_environment(Some(environment))
                    .build(),
            )
            .build();

        let output = self
            .client
            .run_task()
            .cluster(&self.cluster)
            .task_definition(&self.task_definition)
            .count(1)
            .launch_type(LaunchType::Fargate)
            .started_by(context.job_id.to_string())
            .network_configuration(NetworkConfiguration::builder().awsvpc_configuration(vpc).build())
            .overrides(overrides)
            .send()
            .await
            .map_err(|e| DispatchError::compute(format!("run_task failed: {}", DisplayErrorContext(&e))))?;

        if let Some(arn) = output.tasks().first().and_then(|t| t.task_arn()) {
            return Ok(arn.to_string());
        }

        let reason = output
            .failures()
            .iter()
            .filter_map(|f| f.reason())
            .collect::<Vec<_>>()
            .join(", ");
        Err(DispatchError::compute(format!("run_task started no task: {reason}")))
    }

    async fn describe_task(&self, worker_handle: &str) -> DispatchResult<TaskState> {
        let output = self
            .client
            .describe_tasks()
            .cluster(&self.cluster)
            .tasks(worker_handle)
            .send()
            .await
            .map_err(|e| DispatchError::compute(format!("describe_tasks failed: {}", DisplayErrorContext(&e))))?;

        match output.tasks().first() {
            Some(task) => Ok(self.task_state(task)),
            None => {
                debug!(worker_handle, failures = ?output.failures(), "Task not found");
                Ok(TaskState::Missing)
            }
        }
    }

    async fn find_active_task(&self, job_id: JobId) -> DispatchResult<Option<String>> {
        let output = self
            .client
            .list_tasks()
            .cluster(&self.cluster)
            .started_by(job_id.to_string())
            .desired_status(DesiredStatus::Running)
            .send()
            .await
            .map_err(|e| DispatchError::compute(format!("list_tasks failed: {}", DisplayErrorContext(&e))))?;

        Ok(output.task_arns().first().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::jobs::model::SourceRef;

    fn source_storage() -> SourceStorage {
        SourceStorage {
            access_key: "src-ak".into(),
            secret_key: "src-sk".into(),
        }
    }

    fn destination(cdn: Option<&str>) -> DestinationStorage {
        DestinationStorage {
            bucket: "renditions".into(),
            endpoint: "https://r2.example.com".into(),
            access_key: "ak".into(),
            secret_key: "sk".into(),
            cdn_endpoint: cdn.map(str::to_owned),
        }
    }

    #[test]
    fn worker_environment_carries_job_identity_and_callback() {
        let source = SourceRef::new("uploads", "videos/a.mp4");
        let context = WorkerContext {
            job_id: source.job_id(),
            source: source.clone(),
            callback_url: "http://dispatch/api/v1/jobs/x/status".into(),
            callback_token: "tok".into(),
            status_queue: "transcoding_status".into(),
        };

        let env = worker_environment("eu-west-1", &source_storage(), &destination(None), &context);
        let get = |name: &str| env.iter().find(|(k, _)| *k == name).map(|(_, v)| v.as_str());

        assert_eq!(get("JOB_ID"), Some(source.job_id().to_string().as_str()));
        assert_eq!(get("S3_BUCKET"), Some("uploads"));
        assert_eq!(get("S3_KEY"), Some("videos/a.mp4"));
        assert_eq!(get("AWS_REGION"), Some("eu-west-1"));
        assert_eq!(get("AWS_ACCESS_KEY_ID"), Some("src-ak"));
        assert_eq!(get("AWS_SECRET_ACCESS_KEY"), Some("src-sk"));
        assert_eq!(get("R2_ACCESS_KEY_ID"), Some("ak"));
        assert_eq!(get("CALLBACK_TOKEN"), Some("tok"));
        assert_eq!(get("R2_CDN_ENDPOINT"), None);
    }

    #[test]
    fn cdn_endpoint_is_passed_when_configured() {
        let source = SourceRef::new("uploads", "a.mp4");
        let context = WorkerContext {
            job_id: source.job_id(),
            source,
            callback_url: String::new(),
            callback_token: String::new(),
            status_queue: String::new(),
        };

        let env = worker_environment("us-east-1", &source_storage(), &destination(Some("https://cdn.example.com")), &context);
        assert!(env.contains(&("R2_CDN_ENDPOINT", "https://cdn.example.com".to_string())));
    }
}
