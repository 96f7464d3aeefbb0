use ecsgraph::config::OutputFormat;
use ecsgraph::constants::resource_types;
use ecsgraph::convert::{Converter, render};
use ecsgraph::core::EcsgraphError;
use ecsgraph::project::{Project, SecretSpec};
use ecsgraph::storage::ConfiguredFilesystems;
use ecsgraph::test_utils::{RecordingResolver, fixtures, init_test_logging};
use serde_json::{Value, json};

async fn convert_file(content: &str) -> anyhow::Result<ecsgraph::template::Template> {
    let temp = tempfile::tempdir()?;
    let path = fixtures::write_project(temp.path(), content)?;
    let mut project = Project::load(&path)?;
    Converter::new(ConfiguredFilesystems::default()).convert(&mut project).await
}

#[tokio::test]
async fn test_shop_web_scenario() {
    init_test_logging(None);
    let template = convert_file(fixtures::SHOP_PROJECT).await.unwrap();
    let resources = &template.resources;

    for name in [
        "webService",
        "webTaskDefinition",
        "webTaskExecutionRole",
        "default80Ingress",
        "webTCP8080TargetGroup",
        "webTCP80Listener",
        "webServiceDiscoveryEntry",
        "Cluster",
        "LoadBalancer",
        "LogGroup",
        "CloudMap",
        "defaultNetwork",
    ] {
        assert!(resources.contains(name), "missing resource {name}");
    }
    assert!(!resources.contains("webTaskRole"));

    let service = resources.get("webService").unwrap();
    assert_eq!(service.resource_type, resource_types::SERVICE);
    assert_eq!(service.depends_on, vec!["webTCP80Listener"]);
    assert_eq!(service.properties["DesiredCount"], 4);
    assert_eq!(
        service.properties["DeploymentConfiguration"],
        json!({"MaximumPercent": 125, "MinimumHealthyPercent": 75})
    );
    assert_eq!(
        service.properties["LoadBalancers"],
        json!([{
            "ContainerName": "web",
            "ContainerPort": 80,
            "TargetGroupArn": {"Ref": "webTCP8080TargetGroup"}
        }])
    );
    assert_eq!(
        service.properties["ServiceRegistries"],
        json!([{"RegistryArn": {"Fn::GetAtt": ["webServiceDiscoveryEntry", "Arn"]}}])
    );

    let listener = resources.get("webTCP80Listener").unwrap();
    assert_eq!(listener.properties["Port"], 80);
    assert_eq!(listener.depends_on, vec!["webTCP8080TargetGroup"]);

    let target_group = resources.get("webTCP8080TargetGroup").unwrap();
    assert_eq!(target_group.properties["Port"], 80);
    assert_eq!(target_group.properties["TargetType"], "ip");

    let ingress = resources.get("default80Ingress").unwrap();
    assert_eq!(ingress.properties["FromPort"], 80);
    assert_eq!(ingress.properties["ToPort"], 80);
    assert_eq!(ingress.properties["GroupId"], json!({"Ref": "defaultNetwork"}));

    let order = resources.deployment_order().unwrap();
    let position = |name: &str| order.iter().position(|n| n == name).unwrap();
    assert!(position("webTCP8080TargetGroup") < position("webTCP80Listener"));
    assert!(position("webTCP80Listener") < position("webService"));
    assert!(position("webTaskDefinition") < position("webService"));
}

#[tokio::test]
async fn test_shop_renders_both_formats() {
    let template = convert_file(fixtures::SHOP_PROJECT).await.unwrap();

    let rendered = render(&template, OutputFormat::Json).unwrap();
    let parsed: Value = serde_json::from_str(&rendered).unwrap();
    assert_eq!(parsed["AWSTemplateFormatVersion"], "2010-09-09");
    assert_eq!(parsed["Description"], "Containerized application 'shop'");
    assert!(parsed["Parameters"]["ParameterVPCId"].is_object());

    let rendered = render(&template, OutputFormat::Yaml).unwrap();
    let parsed: Value = serde_yaml::from_str(&rendered).unwrap();
    assert_eq!(parsed["Resources"]["webService"]["Type"], resource_types::SERVICE);
}

#[tokio::test]
async fn test_store_project() {
    init_test_logging(None);
    let temp = tempfile::tempdir().unwrap();
    let path = fixtures::write_store_project(temp.path()).unwrap();
    let mut project = Project::load(&path).unwrap();

    let resolver = RecordingResolver::new().with_existing("uploads", "fs-uploads");
    let template = Converter::new(resolver).convert(&mut project).await.unwrap();
    let resources = &template.resources;

    // the secret file is materialized and the project rewritten to point at it
    let secret = resources.get("dbPasswordSecret").unwrap();
    assert_eq!(secret.properties["SecretString"], fixtures::STORE_SECRET);
    assert!(!project.secrets["db_password"].is_external());

    let db_task = resources.get("dbTaskDefinition").unwrap();
    let container = &db_task.properties["ContainerDefinitions"][0];
    assert_eq!(
        container["Secrets"],
        json!([{"Name": "POSTGRES_PASSWORD", "ValueFrom": {"Ref": "dbPasswordSecret"}}])
    );
    assert_eq!(db_task.properties["Cpu"], "1024");
    assert_eq!(db_task.properties["Memory"], "2048");

    // api: rolling update override, autoscaling, storage and ordering
    let api = resources.get("apiService").unwrap();
    assert_eq!(
        api.properties["DeploymentConfiguration"],
        json!({"MaximumPercent": 200, "MinimumHealthyPercent": 50})
    );
    assert!(api.depends_on.contains(&"dbService".to_string()));
    assert!(api.depends_on.contains(&"uploadsNFSMountTargetOnSubnet1".to_string()));
    assert_eq!(
        api.properties["NetworkConfiguration"]["AwsvpcConfiguration"]["SecurityGroups"],
        json!([{"Ref": "backNetwork"}, {"Ref": "frontNetwork"}])
    );
    assert!(resources.contains("apiScalableTarget"));
    assert!(resources.contains("apiScalingPolicy"));

    let uploads = resources.get("uploadsVolume").unwrap();
    assert_eq!(uploads.properties["FileSystemId"], "fs-uploads");

    let log_group = resources.get("LogGroup").unwrap();
    assert_eq!(log_group.properties["RetentionInDays"], 14);

    // both services read the secret through their execution roles
    for role in ["apiTaskExecutionRole", "dbTaskExecutionRole"] {
        let role = resources.get(role).unwrap();
        let policies = role.properties["Policies"].as_array().unwrap();
        assert_eq!(policies.len(), 1);
    }
}

#[tokio::test]
async fn test_external_secret_is_passed_through() {
    let content = r#"
name: shop
services:
  web:
    image: nginx
    secrets:
      - source: api_key
        target: API_KEY
secrets:
  api_key:
    external: true
    name: arn:aws:secretsmanager:eu-west-1:123456789012:secret:api-key
"#;
    let temp = tempfile::tempdir().unwrap();
    let path = fixtures::write_project(temp.path(), content).unwrap();
    let mut project = Project::load(&path).unwrap();
    let template = Converter::new(ConfiguredFilesystems::default()).convert(&mut project).await.unwrap();
    let resources = &template.resources;

    let arn = "arn:aws:secretsmanager:eu-west-1:123456789012:secret:api-key";
    assert!(!resources.contains("apiKeySecret"));
    assert_eq!(resources.names_of_type(resource_types::SECRET).count(), 0);
    assert_eq!(project.secrets["api_key"], SecretSpec::external(arn));

    let container = &resources.get("webTaskDefinition").unwrap().properties["ContainerDefinitions"][0];
    assert_eq!(container["Secrets"], json!([{"Name": "API_KEY", "ValueFrom": arn}]));
    let role = resources.get("webTaskExecutionRole").unwrap();
    assert_eq!(role.properties["Policies"][0]["PolicyDocument"]["Statement"][0]["Resource"], json!([arn]));
}

#[tokio::test]
async fn test_same_port_over_tcp_and_udp() {
    let content = r#"
name: shop
services:
  dns:
    image: coredns/coredns
    ports:
      - "53:53/tcp"
      - "53:53/UDP"
"#;
    let template = convert_file(content).await.unwrap();
    let ingress = template.resources.get("default53Ingress").unwrap();
    assert_eq!(ingress.properties["IpProtocol"], "-1");
    assert!(template.resources.contains("dnsTCP53Listener"));
    assert!(template.resources.contains("dnsUDP53Listener"));
}

#[tokio::test]
async fn test_invalid_rolling_update_produces_no_template() {
    let content = r#"
name: shop
services:
  web:
    image: nginx
    deploy:
      replicas: 1
      update_config:
        parallelism: 2
"#;
    let err = convert_file(content).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EcsgraphError>(),
        Some(EcsgraphError::ConfigurationError { service, .. }) if service == "web"
    ));
}

#[tokio::test]
async fn test_dangling_reference_is_reported_before_compilation() {
    let content = r#"
name: shop
services:
  web:
    image: nginx
    depends_on:
      - dbb
  db:
    image: postgres
"#;
    let err = convert_file(content).await.unwrap_err();
    match err.downcast_ref::<EcsgraphError>() {
        Some(EcsgraphError::ProjectValidationError {
            problems,
        }) => {
            assert_eq!(problems.len(), 1);
            assert!(problems[0].contains("dbb"));
            assert!(problems[0].contains("db"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_secret_file_is_reported() {
    let content = r#"
name: shop
services:
  web:
    image: nginx
    secrets:
      - token
secrets:
  token:
    file: ./token.txt
"#;
    let err = convert_file(content).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EcsgraphError>(),
        Some(EcsgraphError::SecretReadError { secret, .. }) if secret == "token"
    ));
}

#[tokio::test]
async fn test_external_infrastructure_is_reused() {
    let content = r#"
name: shop
services:
  web:
    image: nginx
    ports:
      - "80:80"
x-ecs:
  cluster: arn:aws:ecs:eu-west-1:123456789012:cluster/main
  vpc: vpc-123
  subnets: [subnet-a, subnet-b]
  loadbalancer: arn:aws:elasticloadbalancing:eu-west-1:123456789012:loadbalancer/app/main/1
"#;
    let template = convert_file(content).await.unwrap();
    assert!(!template.resources.contains("Cluster"));
    assert!(!template.resources.contains("LoadBalancer"));
    assert!(template.parameters.is_empty());

    let service = template.resources.get("webService").unwrap();
    assert_eq!(service.properties["Cluster"], "arn:aws:ecs:eu-west-1:123456789012:cluster/main");
    assert_eq!(
        service.properties["NetworkConfiguration"]["AwsvpcConfiguration"]["Subnets"],
        json!(["subnet-a", "subnet-b"])
    );
}
