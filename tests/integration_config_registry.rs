use anyhow::Result;
use netspel::{registry, Category, Config, ConfigError, ConfigOverrides, RegistryError};
use std::io::Write;

#[test]
fn builtins_register_once() -> Result<()> {
    registry::register_builtins()?;
    registry::register_builtins()?;

    assert_eq!(registry::schemes().names(), vec!["simple", "streaming"]);
    assert_eq!(registry::writers().names(), vec!["tcp", "udp"]);
    assert_eq!(registry::readers().names(), vec!["tcp", "udp"]);

    let scheme = registry::schemes().create("streaming")?;
    assert_eq!(scheme.name(), "streaming");
    let writer = registry::writers().create("tcp")?;
    assert_eq!(writer.name(), "tcp");

    match registry::readers().create("sse") {
        Err(RegistryError::UnknownType { category, name }) => {
            assert_eq!(category, Category::Reader);
            assert_eq!(name, "sse");
        }
        other => panic!("unexpected: {:?}", other.map(|r| r.name())),
    }
    Ok(())
}

#[test]
fn config_file_with_command_line_overrides() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    write!(
        file,
        r#"{{
            "scheme_type": "streaming",
            "writer_type": "tcp",
            "additional": {{
                "tcp.port": 9100,
                "tcp.host": "10.0.0.5",
                "streaming.window": 128
            }}
        }}"#
    )?;

    let overrides = ConfigOverrides {
        config_path: Some(file.path().to_path_buf()),
        writer_type: Some("udp".to_string()),
        strings: vec!["tcp.port=9200".to_string()],
        ints: vec!["tcp.port=9300".to_string()],
        ..Default::default()
    };
    let config = Config::resolve(&overrides)?;

    assert_eq!(config.scheme_type(), "streaming");
    assert_eq!(config.writer_type(), "udp");
    assert_eq!(config.reader_type(), "udp");
    // Integers are applied after strings, so the int wins.
    assert_eq!(config.get_int("tcp.port", 0)?, 9300);
    assert_eq!(config.get_string("tcp.host", "")?, "10.0.0.5");
    assert_eq!(config.get_int("streaming.window", 0)?, 128);
    assert!(matches!(
        config.get_string("streaming.window", ""),
        Err(ConfigError::Type { .. })
    ));
    Ok(())
}

#[test]
fn malformed_overrides_are_rejected() {
    for ints in [vec!["tcp.port"], vec!["a=b=c"], vec!["=1"], vec!["tcp.port=abc"]] {
        let overrides = ConfigOverrides {
            ints: ints.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };
        assert!(Config::resolve(&overrides).is_err(), "{:?} accepted", ints);
    }

    let missing = ConfigOverrides {
        config_path: Some("/nonexistent/netspel.json".into()),
        ..Default::default()
    };
    assert!(matches!(
        Config::resolve(&missing),
        Err(ConfigError::Io(_))
    ));
}
