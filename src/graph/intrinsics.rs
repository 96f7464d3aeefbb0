//! Template intrinsic functions.
//!
//! Property bags reference other resources and parameters through intrinsic
//! function objects resolved by the provisioning engine at deploy time.

use serde_json::{Value, json};

/// `{"Ref": name}`: the resource's primary identifier or a parameter value.
pub fn reference(name: &str) -> Value {
    json!({ "Ref": name })
}

/// `{"Fn::GetAtt": [name, attribute]}`
pub fn get_att(name: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [name, attribute] })
}

/// `{"Fn::Join": [delimiter, parts]}`
pub fn join(delimiter: &str, parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": [delimiter, parts] })
}

/// Logical names referenced by `Ref` or `Fn::GetAtt` anywhere inside `value`.
///
/// Pseudo parameters (`AWS::Region`, ...) are skipped.
pub fn referenced_names(value: &Value) -> Vec<String> {
    let mut names = Vec::new();
    collect_references(value, &mut names);
    names.sort();
    names.dedup();
    names
}

fn collect_references(value: &Value, names: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(name)) = map.get("Ref") {
                if !name.starts_with("AWS::") {
                    names.push(name.clone());
                }
            } else if let Some(Value::Array(args)) = map.get("Fn::GetAtt")
                && let Some(Value::String(name)) = args.first()
            {
                names.push(name.clone());
            }
            for nested in map.values() {
                collect_references(nested, names);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_references(item, names);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shapes() {
        assert_eq!(reference("Cluster"), json!({"Ref": "Cluster"}));
        assert_eq!(get_att("CloudMap", "Id"), json!({"Fn::GetAtt": ["CloudMap", "Id"]}));
        assert_eq!(
            join("/", vec![json!("service"), reference("Cluster")]),
            json!({"Fn::Join": ["/", ["service", {"Ref": "Cluster"}]]})
        );
    }

    #[test]
    fn test_referenced_names() {
        let properties = json!({
            "Cluster": reference("Cluster"),
            "Region": reference("AWS::Region"),
            "Registries": [{"RegistryArn": get_att("webServiceDiscoveryEntry", "Arn")}],
            "Again": reference("Cluster"),
        });
        assert_eq!(referenced_names(&properties), vec!["Cluster", "webServiceDiscoveryEntry"]);
    }
}
