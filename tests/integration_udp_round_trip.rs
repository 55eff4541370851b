use anyhow::Result;
use netspel::transport::{Reader, UdpReader, UdpWriter, Writer};
use netspel::{Config, Scheme, Shutdown, SimpleScheme, StreamingScheme};

async fn bound_reader(config: &Config) -> Result<(UdpReader, Config)> {
    let mut reader = UdpReader::new();
    reader.init(&config.clone().with_int("udp.port", 0)).await?;
    let port = reader.local_addr().map(|a| a.port()).unwrap_or_default();
    Ok((reader, config.clone().with_int("udp.port", port as i64)))
}

/// Paced sequence-numbered stream over loopback UDP.
#[tokio::test]
async fn udp_streaming_round_trip() -> Result<()> {
    let base = Config::default()
        .with_scheme_type("streaming")
        .with_int("streaming.messages_per_second", 1000)
        .with_int("streaming.message_count", 200)
        .with_int("streaming.duration_ms", 0)
        .with_int("streaming.idle_timeout_ms", 300);
    let (mut reader, config) = bound_reader(&base).await?;

    let mut reader_scheme = StreamingScheme::new();
    reader_scheme.init(&config)?;
    let reading =
        tokio::spawn(async move { reader_scheme.run_reader(&mut reader, Shutdown::never()).await });

    let mut writer = UdpWriter::new();
    writer.init(&config).await?;
    let mut writer_scheme = StreamingScheme::new();
    writer_scheme.init(&config)?;
    let written = writer_scheme.run_writer(&mut writer, Shutdown::never()).await;
    let read = reading.await?;

    assert_eq!(written.totals.sent, 200);
    assert_eq!(read.totals.received, 200);
    assert_eq!(read.totals.lost, 0);
    assert_eq!(read.totals.duplicates, 0);
    Ok(())
}

/// Fixed-count burst over loopback UDP. Datagrams may drop under a burst,
/// but the reader can never see more than was sent.
#[tokio::test]
async fn udp_simple_round_trip() -> Result<()> {
    let base = Config::default()
        .with_int("simple.message_count", 100)
        .with_int("simple.message_size", 256)
        .with_int("simple.timeout_ms", 300);
    let (mut reader, config) = bound_reader(&base).await?;

    let mut reader_scheme = SimpleScheme::new();
    reader_scheme.init(&config)?;
    let reading =
        tokio::spawn(async move { reader_scheme.run_reader(&mut reader, Shutdown::never()).await });

    let mut writer = UdpWriter::new();
    writer.init(&config).await?;
    let mut writer_scheme = SimpleScheme::new();
    writer_scheme.init(&config)?;
    let written = writer_scheme.run_writer(&mut writer, Shutdown::never()).await;
    let read = reading.await?;

    assert_eq!(written.totals.sent, 100);
    assert_eq!(written.totals.bytes, 100 * 256);
    assert!(read.totals.received > 0);
    assert!(read.totals.received <= 100);
    assert_eq!(read.totals.bytes, read.totals.received * 256);
    Ok(())
}
