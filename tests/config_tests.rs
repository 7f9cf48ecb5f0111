//! Integration tests for driver configuration, including the JSON
//! round-trip a host would use to load `DriverConfig` from its own config
//! file format (the opaque `option` string is this driver's only config
//! surface on the wire; everything else is host-side tuning).

use anyhow::Result;
use sheepdog_cluster_driver::DriverConfig;

#[test]
fn default_config_is_valid() -> Result<()> {
    let config = DriverConfig::default();
    assert_eq!(&config.group_name, b"sheepdog");
    config.validate()?;
    Ok(())
}

#[test]
fn builder_overrides_every_tunable() -> Result<()> {
    let config = DriverConfig::builder()
        .group_name(b"test-grp")
        .max_nodes(32)
        .init_retry_count(3)
        .option("transport=tcp")
        .build()?;

    assert_eq!(&config.group_name, b"test-grp");
    assert_eq!(config.max_nodes, 32);
    assert_eq!(config.init_retry_count, 3);
    assert_eq!(config.option.as_deref(), Some("transport=tcp"));
    Ok(())
}

#[test]
fn config_survives_a_json_round_trip() -> Result<()> {
    let config = DriverConfig::builder()
        .max_nodes(16)
        .option("zone=us-east")
        .build()?;

    let json = serde_json::to_string(&config)?;
    let decoded: DriverConfig = serde_json::from_str(&json)?;

    assert_eq!(decoded.max_nodes, config.max_nodes);
    assert_eq!(decoded.option, config.option);
    assert_eq!(decoded.group_name, config.group_name);
    Ok(())
}

#[test]
fn zero_max_nodes_is_rejected() {
    let result = DriverConfig::builder().max_nodes(0).build();
    assert!(result.is_err());
}
