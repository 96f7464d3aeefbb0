//! Property tests for compilation determinism and graph consistency.

use std::collections::{BTreeMap, BTreeSet};

use ecsgraph::compiler::Compiler;
use ecsgraph::constants::resource_types;
use ecsgraph::project::{DeployConfig, Project, Service, ServicePort, UpdateConfig};
use proptest::prelude::*;

#[derive(Debug, Clone)]
struct ServiceShape {
    ports: BTreeSet<u16>,
    replicas: u32,
    parallelism: Option<u32>,
}

fn service_shape() -> impl Strategy<Value = ServiceShape> {
    let ports = proptest::collection::btree_set(prop_oneof![Just(80u16), Just(443), Just(3000), Just(8080)], 0..3);
    (ports, 1u32..10)
        .prop_flat_map(|(ports, replicas)| {
            (Just(ports), Just(replicas), proptest::option::of(1..=replicas))
        })
        .prop_map(|(ports, replicas, parallelism)| ServiceShape {
            ports,
            replicas,
            parallelism,
        })
}

fn project_strategy() -> impl Strategy<Value = Project> {
    let name = proptest::string::string_regex("[a-z][a-z0-9]{0,7}").unwrap();
    proptest::collection::btree_map(name, service_shape(), 1..5).prop_map(|services| {
        services.into_iter().fold(Project::new("props"), |project, (name, shape)| {
            project.with_service(build_service(&name, &shape))
        })
    })
}

fn build_service(name: &str, shape: &ServiceShape) -> Service {
    let service = shape.ports.iter().fold(Service::new(name, "nginx"), |service, port| {
        service.with_port(ServicePort::new(*port, *port, "tcp"))
    });
    service.with_deploy(DeployConfig {
        replicas: Some(shape.replicas),
        update_config: shape.parallelism.map(|parallelism| UpdateConfig {
            parallelism: Some(parallelism),
            ..UpdateConfig::default()
        }),
        resources: None,
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    /// Compiling the same project twice yields identical output.
    #[test]
    fn property_compilation_is_deterministic(project in project_strategy()) {
        let first = Compiler::new().compile(&mut project.clone()).unwrap().to_json().unwrap();
        let second = Compiler::new().compile(&mut project.clone()).unwrap().to_json().unwrap();
        prop_assert_eq!(first, second);
    }

    /// Every reference resolves and the graph has a full deployment order.
    #[test]
    fn property_graph_is_closed_and_acyclic(project in project_strategy()) {
        let template = Compiler::new().compile(&mut project.clone()).unwrap();
        let resources = &template.resources;

        prop_assert!(resources.validate_closure().is_ok());
        let order = resources.deployment_order().unwrap();
        prop_assert_eq!(order.len(), resources.len());

        let services: Vec<&str> = resources.names_of_type(resource_types::SERVICE).collect();
        prop_assert_eq!(services.len(), project.services.len());
    }

    /// Each published port yields one target group and one listener per service.
    #[test]
    fn property_port_fan_out(project in project_strategy()) {
        let template = Compiler::new().compile(&mut project.clone()).unwrap();
        let resources = &template.resources;

        let expected: usize = project.services.values().map(|service| service.ports.len()).sum();
        prop_assert_eq!(resources.names_of_type(resource_types::TARGET_GROUP).count(), expected);
        prop_assert_eq!(resources.names_of_type(resource_types::LISTENER).count(), expected);

        let targets: BTreeSet<u16> = project.services.values().flat_map(|s| s.ports.iter().map(|p| p.target)).collect();
        prop_assert_eq!(resources.names_of_type(resource_types::SECURITY_GROUP_INGRESS).count(), targets.len() + 1);
    }

    /// Deployment bounds follow the replica and parallelism counts.
    #[test]
    fn property_rolling_update_bounds(project in project_strategy()) {
        let template = Compiler::new().compile(&mut project.clone()).unwrap();

        let expected: BTreeMap<String, (u64, u64)> = project
            .services
            .values()
            .map(|service| {
                let deploy = service.deploy.as_ref().unwrap();
                let replicas = u64::from(deploy.replicas.unwrap());
                let bounds = match deploy.update_config.as_ref().and_then(|u| u.parallelism) {
                    Some(parallelism) => {
                        let parallelism = u64::from(parallelism);
                        ((replicas - parallelism) * 100 / replicas, (replicas + parallelism) * 100 / replicas)
                    }
                    None => (100, 200),
                };
                (format!("{}Service", service.name), bounds)
            })
            .collect();

        for (name, (min, max)) in expected {
            let config = &template.resources.get(&name).unwrap().properties["DeploymentConfiguration"];
            prop_assert_eq!(config["MinimumHealthyPercent"].as_u64(), Some(min));
            prop_assert_eq!(config["MaximumPercent"].as_u64(), Some(max));
        }
    }
}
