// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::path::PathBuf;

fn describe_response() -> serde_json::Value {
    serde_json::json!({
        "Reservations": [{
            "Instances": [{
                "InstanceId": "i-0abc123def4567890",
                "InstanceType": "t4g.medium",
                "PublicIpAddress": "10.0.0.1",
                "Placement": { "AvailabilityZone": "us-east-1a" },
                "State": { "Code": 16, "Name": "running" },
            }]
        }]
    })
}

#[test]
fn parses_a_running_instance() {
    let v = describe_response();
    let info = parse_instance(first_instance(&v).unwrap(), "us-east-1").unwrap();
    assert_eq!(info.instance_id, "i-0abc123def4567890");
    assert_eq!(info.state, VmState::Running);
    assert_eq!(info.public_ip.as_deref(), Some("10.0.0.1"));
    assert_eq!(info.az.as_deref(), Some("us-east-1a"));
    assert_eq!(info.instance_type, "t4g.medium");
    assert_eq!(info.region, "us-east-1");
}

#[test]
fn stopped_instance_has_no_public_ip() {
    let mut v = describe_response();
    let inst = &mut v["Reservations"][0]["Instances"][0];
    inst["State"]["Name"] = "stopped".into();
    inst.as_object_mut().unwrap().remove("PublicIpAddress");

    let info = parse_instance(first_instance(&v).unwrap(), "us-east-1").unwrap();
    assert_eq!(info.state, VmState::Stopped);
    assert_eq!(info.public_ip, None);
}

#[test]
fn empty_reservations_yield_no_instance() {
    let v = serde_json::json!({ "Reservations": [] });
    assert!(first_instance(&v).is_none());
}

#[test]
fn unknown_state_is_rejected() {
    let mut v = describe_response();
    v["Reservations"][0]["Instances"][0]["State"]["Name"] = "hibernating".into();
    assert!(parse_instance(first_instance(&v).unwrap(), "us-east-1").is_none());
}

#[test]
fn tag_specifications_carry_project_identity() {
    let req = CreateVm {
        project_hash: "abc123def456".to_string(),
        project_path: PathBuf::from("/home/dev/my widget, v2"),
        instance_type: "t4g.large".to_string(),
        security_group_id: "sg-123".to_string(),
        user_data: "IyBjbG91ZC1pbml0".to_string(),
    };
    let spec: serde_json::Value = serde_json::from_str(&tag_specifications(&req)).unwrap();

    let tags = spec[0]["Tags"].as_array().unwrap();
    let get = |key: &str| {
        tags.iter()
            .find(|t| t["Key"] == key)
            .map(|t| t["Value"].as_str().unwrap().to_string())
    };
    assert_eq!(get("yeager:project-hash").as_deref(), Some("abc123def456"));
    assert_eq!(
        get("yeager:project-path").as_deref(),
        Some("/home/dev/my widget, v2")
    );
    assert_eq!(get("Name").as_deref(), Some("yeager-abc123def456"));
    assert!(get("yeager:created").is_some());
}
