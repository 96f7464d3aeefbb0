//! Platform constants used throughout the compiler.
//!
//! Resource type tags, managed policy ARNs, fixed property values and numeric
//! defaults live here so the builders never carry magic strings.

/// Default minimum healthy percent during a rolling update.
pub const DEFAULT_MIN_PERCENT: u32 = 100;

/// Default maximum percent during a rolling update (one extra task at a time).
pub const DEFAULT_MAX_PERCENT: u32 = 200;

/// Desired count when `deploy.replicas` is not set.
pub const DEFAULT_DESIRED_COUNT: u32 = 1;

/// Fargate platform version pinned for managed launches.
///
/// `LATEST` still resolves to a version without EFS volume support.
pub const FARGATE_PLATFORM_VERSION: &str = "1.4.0";

/// TTL of the discovery DNS record, in seconds.
pub const DISCOVERY_RECORD_TTL: u32 = 60;

/// Failure threshold of the custom discovery health check.
pub const DISCOVERY_FAILURE_THRESHOLD: u32 = 1;

/// Scale-in and scale-out cooldown of target-tracking policies, in seconds.
pub const AUTOSCALING_COOLDOWN: u32 = 60;

/// Sentinel meaning "every protocol" in security group rules.
pub const ALL_PROTOCOLS: &str = "-1";

/// CIDR block used by public ingress rules.
pub const ANYWHERE_CIDR: &str = "0.0.0.0/0";

/// Network implicitly joined by services that declare none.
pub const DEFAULT_NETWORK: &str = "default";

/// Logical name of the project's ECS cluster.
pub const CLUSTER_RESOURCE: &str = "Cluster";

/// Logical name of the project's log group.
pub const LOG_GROUP_RESOURCE: &str = "LogGroup";

/// Logical name of the project's private DNS namespace.
pub const CLOUD_MAP_RESOURCE: &str = "CloudMap";

/// Logical name of the project's load balancer.
pub const LOAD_BALANCER_RESOURCE: &str = "LoadBalancer";

/// Template parameter holding the VPC id when none is configured.
pub const VPC_PARAMETER: &str = "ParameterVPCId";

/// Template parameters holding the subnet ids when none are configured.
pub const SUBNET_PARAMETERS: [&str; 2] = ["ParameterSubnet1Id", "ParameterSubnet2Id"];

/// Tag carrying the project name.
pub const PROJECT_TAG: &str = "com.docker.compose.project";

/// Tag carrying the service name.
pub const SERVICE_TAG: &str = "com.docker.compose.service";

/// Tag carrying the volume name.
pub const VOLUME_TAG: &str = "com.docker.compose.volume";

/// Managed policy attached to every task execution role.
pub const ECS_TASK_EXECUTION_POLICY: &str =
    "arn:aws:iam::aws:policy/service-role/AmazonECSTaskExecutionRolePolicy";

/// Read-only registry access attached to every task execution role.
pub const ECR_READ_ONLY_POLICY: &str = "arn:aws:iam::aws:policy/AmazonEC2ContainerRegistryReadOnly";

/// Managed policy attached to autoscaling roles.
pub const AUTOSCALING_POLICY: &str =
    "arn:aws:iam::aws:policy/service-role/AmazonEC2ContainerServiceAutoscaleRole";

/// Principal allowed to assume task roles.
pub const ECS_TASKS_PRINCIPAL: &str = "ecs-tasks.amazonaws.com";

/// Principal allowed to assume autoscaling roles.
pub const AUTOSCALING_PRINCIPAL: &str = "application-autoscaling.amazonaws.com";

/// Actions granted on secrets referenced by a service.
pub const SECRET_READ_ACTIONS: [&str; 3] =
    ["secretsmanager:GetSecretValue", "ssm:GetParameters", "kms:Decrypt"];

/// IAM policy language version.
pub const POLICY_VERSION: &str = "2012-10-17";

/// Supported Fargate task sizes: CPU units and the memory values (MiB) allowed with them.
pub const FARGATE_SIZES: [(u32, &[u32]); 5] = [
    (256, &[512, 1024, 2048]),
    (512, &[1024, 2048, 3072, 4096]),
    (1024, &[2048, 3072, 4096, 5120, 6144, 7168, 8192]),
    (
        2048,
        &[4096, 5120, 6144, 7168, 8192, 9216, 10240, 11264, 12288, 13312, 14336, 15360, 16384],
    ),
    (
        4096,
        &[
            8192, 9216, 10240, 11264, 12288, 13312, 14336, 15360, 16384, 17408, 18432, 19456,
            20480, 21504, 22528, 23552, 24576, 25600, 26624, 27648, 28672, 29696, 30720,
        ],
    ),
];

/// Resource type tags of the target platform.
pub mod resource_types {
    /// ECS cluster
    pub const CLUSTER: &str = "AWS::ECS::Cluster";
    /// ECS service
    pub const SERVICE: &str = "AWS::ECS::Service";
    /// ECS task definition
    pub const TASK_DEFINITION: &str = "AWS::ECS::TaskDefinition";
    /// IAM role
    pub const ROLE: &str = "AWS::IAM::Role";
    /// Security group
    pub const SECURITY_GROUP: &str = "AWS::EC2::SecurityGroup";
    /// Security group ingress rule
    pub const SECURITY_GROUP_INGRESS: &str = "AWS::EC2::SecurityGroupIngress";
    /// Load balancer
    pub const LOAD_BALANCER: &str = "AWS::ElasticLoadBalancingV2::LoadBalancer";
    /// Load balancer target group
    pub const TARGET_GROUP: &str = "AWS::ElasticLoadBalancingV2::TargetGroup";
    /// Load balancer listener
    pub const LISTENER: &str = "AWS::ElasticLoadBalancingV2::Listener";
    /// Private DNS namespace
    pub const PRIVATE_DNS_NAMESPACE: &str = "AWS::ServiceDiscovery::PrivateDnsNamespace";
    /// Service discovery entry
    pub const DISCOVERY_SERVICE: &str = "AWS::ServiceDiscovery::Service";
    /// Secrets Manager secret
    pub const SECRET: &str = "AWS::SecretsManager::Secret";
    /// Log group
    pub const LOG_GROUP: &str = "AWS::Logs::LogGroup";
    /// EFS mount target
    pub const MOUNT_TARGET: &str = "AWS::EFS::MountTarget";
    /// EFS access point
    pub const ACCESS_POINT: &str = "AWS::EFS::AccessPoint";
    /// Autoscaling scalable target
    pub const SCALABLE_TARGET: &str = "AWS::ApplicationAutoScaling::ScalableTarget";
    /// Autoscaling policy
    pub const SCALING_POLICY: &str = "AWS::ApplicationAutoScaling::ScalingPolicy";
}
