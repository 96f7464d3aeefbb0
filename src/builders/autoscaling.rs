//! Service autoscaling.
//!
//! A service whose extensions carry an `autoscaling` block gets a scalable
//! target bounding its desired count, a target-tracking policy on average CPU
//! or memory utilization, and the role the autoscaling service assumes to
//! adjust the count.

use serde::Serialize;
use serde_json::{Value, json};

use super::permissions::{Policy, PolicyDocument, PolicyStatement, RoleProperties};
use super::service_tags;
use crate::compiler::context::ResourceContext;
use crate::constants::{AUTOSCALING_COOLDOWN, AUTOSCALING_POLICY, AUTOSCALING_PRINCIPAL, resource_types};
use crate::core::EcsgraphError;
use crate::graph::intrinsics::{get_att, join, reference};
use crate::graph::{Resource, ResourceGraph};
use crate::naming::{LogicalName, normalize_resource_name};
use crate::project::{AutoscalingConfig, Project, ScalingMetric, Service};

/// Builds the scaling resources of a service.
pub trait AutoscalingPolicyBuilder: Send + Sync {
    /// Append the scaling resources of `service` to the graph. Called after
    /// the service resource itself was declared.
    fn build(
        &self,
        graph: &mut ResourceGraph,
        context: &ResourceContext,
        project: &Project,
        service: &Service,
        config: &AutoscalingConfig,
    ) -> Result<(), EcsgraphError>;
}

/// Target tracking on one utilization metric.
#[derive(Debug, Clone, Copy, Default)]
pub struct TargetTrackingAutoscaling;

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ScalableTargetProperties {
    max_capacity: u32,
    min_capacity: u32,
    resource_id: Value,
    #[serde(rename = "RoleARN")]
    role_arn: Value,
    scalable_dimension: &'static str,
    service_namespace: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ScalingPolicyProperties {
    policy_name: String,
    policy_type: &'static str,
    scaling_target_id: Value,
    target_tracking_scaling_policy_configuration: TargetTrackingConfiguration,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct TargetTrackingConfiguration {
    predefined_metric_specification: PredefinedMetric,
    scale_in_cooldown: u32,
    scale_out_cooldown: u32,
    target_value: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PredefinedMetric {
    predefined_metric_type: &'static str,
}

impl AutoscalingPolicyBuilder for TargetTrackingAutoscaling {
    fn build(
        &self,
        graph: &mut ResourceGraph,
        context: &ResourceContext,
        project: &Project,
        service: &Service,
        config: &AutoscalingConfig,
    ) -> Result<(), EcsgraphError> {
        let service_name = LogicalName::Service(&service.name).allocate();
        let role = LogicalName::AutoScalingRole(&service.name).allocate();
        let target = LogicalName::ScalableTarget(&service.name).allocate();
        let policy = LogicalName::ScalingPolicy(&service.name).allocate();

        let document = PolicyDocument::new(vec![PolicyStatement::allow(
            &["application-autoscaling:*", "ecs:DescribeServices", "ecs:UpdateService"],
            vec![reference(&service_name)],
        )]);
        let role_properties = RoleProperties {
            assume_role_policy_document: PolicyDocument::assume_role(AUTOSCALING_PRINCIPAL),
            managed_policy_arns: vec![AUTOSCALING_POLICY.to_string()],
            policies: vec![Policy {
                policy_name: format!("{}AutoScalingPolicy", normalize_resource_name(&service.name)),
                policy_document: serde_json::to_value(&document).map_err(|e| {
                    EcsgraphError::SerializationError {
                        name: role.clone(),
                        reason: e.to_string(),
                    }
                })?,
            }],
            tags: service_tags(&project.name, &service.name),
        };
        graph.insert(&role, Resource::new(resource_types::ROLE, &role_properties)?)?;

        let target_properties = ScalableTargetProperties {
            max_capacity: config.max,
            min_capacity: config.min,
            resource_id: join(
                "/",
                vec![json!("service"), context.cluster.clone(), get_att(&service_name, "Name")],
            ),
            role_arn: get_att(&role, "Arn"),
            scalable_dimension: "ecs:service:DesiredCount",
            service_namespace: "ecs",
        };
        graph.insert(
            &target,
            Resource::new(resource_types::SCALABLE_TARGET, &target_properties)?
                .depending_on([service_name.as_str()]),
        )?;

        let (metric_type, target_value) = match config.metric {
            ScalingMetric::Cpu(value) => ("ECSServiceAverageCPUUtilization", value),
            ScalingMetric::Memory(value) => ("ECSServiceAverageMemoryUtilization", value),
        };
        let policy_properties = ScalingPolicyProperties {
            policy_name: policy.clone(),
            policy_type: "TargetTrackingScaling",
            scaling_target_id: reference(&target),
            target_tracking_scaling_policy_configuration: TargetTrackingConfiguration {
                predefined_metric_specification: PredefinedMetric {
                    predefined_metric_type: metric_type,
                },
                scale_in_cooldown: AUTOSCALING_COOLDOWN,
                scale_out_cooldown: AUTOSCALING_COOLDOWN,
                target_value,
            },
        };
        graph.insert(&policy, Resource::new(resource_types::SCALING_POLICY, &policy_properties)?)?;

        tracing::debug!("Service {} scales between {} and {} tasks", service.name, config.min, config.max);
        Ok(())
    }
}
