//! Process wiring: configuration in, running access point out.

use crate::config::{AppConfig, DecisionKind, IndicatorLines, Mode, RelayKind};
use crate::signals::wait_for_shutdown_signal;
use crate::simulation::CardGenerator;
use anyhow::{Context, bail};
use labgate_core::{Channel, DoorRole};
use labgate_hardware::gpio::{GpioIndicator, GpioLine, GpioRelay};
use labgate_hardware::mock::{MockBus, MockNfcReader, MockNfcReaderHandle, SimulatedIndicator, SimulatedRelay};
use labgate_hardware::pn532::Pn532;
use labgate_hardware::{
    AnyActuator, AnyIndicator, AnyNfcReader, ChannelMux, DisplayBoard, I2cBus, MuxConfig, VirtualDisplay,
};
use labgate_network::{AnyDecisionService, HttpDecisionClient, MockDecisionService};
use labgate_reader::{AccessSettings, Collaborators, IdleDisplayRefresher, Orchestrator, ShutdownReport};
use labgate_storage::{AnyEventSink, Database, DatabaseConfig, FanoutSink, JsonlSink, SqliteSink, TracingSink};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Upper bound on a graceful stop.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything built from the configuration, not yet running.
#[derive(Debug)]
pub struct AccessPoint {
    pub orchestrator: Orchestrator,
    /// Only in simulated mode
    pub generator: Option<CardGenerator>,
    pub database: Option<Database>,
}

/// Build the device graph described by `config`.
///
/// # Errors
///
/// Fails when a device cannot be opened, the multiplexer does not answer,
/// or an event sink cannot be created.
pub async fn build(config: &AppConfig) -> anyhow::Result<AccessPoint> {
    let board = DisplayBoard::new();
    let hold = Duration::from_millis(config.display.hold_ms);

    let mux = Arc::new(ChannelMux::new(
        open_bus(config)?,
        MuxConfig {
            address: config.bus.mux_address,
            settle_delay: Duration::from_millis(config.bus.settle_delay_ms),
        },
    ));
    let control = mux
        .probe()
        .await
        .with_context(|| format!("Multiplexer at 0x{:02X} did not answer", config.bus.mux_address))?;
    info!(
        address = format_args!("0x{:02X}", config.bus.mux_address),
        control = format_args!("0x{control:02X}"),
        "Multiplexer found"
    );
    mux.reset().await.context("Failed to reset multiplexer")?;

    let (sink, database) = build_sinks(config).await?;
    let collaborators = Collaborators::new(build_decision(config)?, build_relay(config)?, sink).with_settings(
        AccessSettings {
            decision_timeout: Duration::from_millis(config.decision.timeout_ms),
            relay_duration: Duration::from_millis(config.relay.duration_ms),
        },
    );

    let mut orchestrator = Orchestrator::new(Arc::clone(&mux), config.retry_policy(), collaborators);
    let mut simulated: Vec<(DoorRole, MockNfcReaderHandle)> = Vec::new();
    for door in config.door_configs()? {
        let reader = match config.mode {
            Mode::Hardware => AnyNfcReader::Pn532(Pn532::new(door.reader_address)),
            Mode::Simulated => {
                let (reader, handle) = MockNfcReader::with_address(door.channel, door.reader_address);
                simulated.push((door.role, handle));
                AnyNfcReader::Mock(reader)
            }
        };
        orchestrator.add_session(door, reader);

        let indicator = match (config.mode, config.indicators.for_role(door.role)) {
            (Mode::Hardware, Some(lines)) => AnyIndicator::Gpio(gpio_indicator(lines).with_board(board.clone(), hold)),
            _ => {
                let (indicator, _) = SimulatedIndicator::new(door.role.as_str());
                AnyIndicator::Simulated(indicator.with_board(board.clone(), hold))
            }
        };
        orchestrator.add_indicator(door.role, indicator);
    }

    if config.display.enabled {
        let refresher = IdleDisplayRefresher::new(
            VirtualDisplay::new(config.display.rows, config.display.cols),
            Channel::new(config.display.channel)?,
            Arc::clone(&mux),
            board,
        )
        .with_site_name(config.site_name.clone())
        .with_interval(Duration::from_millis(config.display.refresh_ms));
        orchestrator = orchestrator.with_display(refresher);
    }

    let generator = (config.mode == Mode::Simulated).then(|| CardGenerator::new(simulated));

    Ok(AccessPoint {
        orchestrator,
        generator,
        database,
    })
}

/// Run until a termination signal, then stop within [`SHUTDOWN_TIMEOUT`].
pub async fn run(config: AppConfig) -> anyhow::Result<ShutdownReport> {
    info!(
        version = labgate_core::VERSION,
        mode = ?config.mode,
        site = %config.site_name,
        doors = config.doors.len(),
        "labgate starting"
    );

    let AccessPoint {
        orchestrator,
        generator,
        database,
    } = build(&config).await?;

    let handle = orchestrator.start();
    let generator_cancel = CancellationToken::new();
    let generator_task = generator.map(|generator| tokio::spawn(generator.run(generator_cancel.clone())));

    if let Err(e) = wait_for_shutdown_signal().await {
        warn!(error = %e, "Signal handling failed, shutting down");
    }

    generator_cancel.cancel();
    if let Some(task) = generator_task
        && let Ok(taps) = task.await
    {
        info!(taps, "Card generator stopped");
    }

    let report = handle.shutdown(SHUTDOWN_TIMEOUT).await;
    if let Some(database) = database {
        database.close().await;
    }

    info!(clean = report.is_clean(), "labgate stopped");
    Ok(report)
}

fn open_bus(config: &AppConfig) -> anyhow::Result<Box<dyn I2cBus>> {
    match config.mode {
        Mode::Simulated => {
            let (bus, _handle) = MockBus::with_mux_address(config.bus.mux_address);
            Ok(Box::new(bus))
        }
        Mode::Hardware => open_hardware_bus(config),
    }
}

#[cfg(all(feature = "hardware-i2c", target_os = "linux"))]
fn open_hardware_bus(config: &AppConfig) -> anyhow::Result<Box<dyn I2cBus>> {
    let bus = labgate_hardware::LinuxI2cBus::open(&config.bus.device)
        .with_context(|| format!("Failed to open I2C bus {}", config.bus.device.display()))?;
    Ok(Box::new(bus))
}

#[cfg(not(all(feature = "hardware-i2c", target_os = "linux")))]
fn open_hardware_bus(_config: &AppConfig) -> anyhow::Result<Box<dyn I2cBus>> {
    bail!("hardware mode needs a Linux build with the `hardware-i2c` feature")
}

fn build_decision(config: &AppConfig) -> anyhow::Result<AnyDecisionService> {
    Ok(match config.decision.kind {
        DecisionKind::Http => {
            let client = HttpDecisionClient::new(config.decision_config()).context("Failed to build HTTP client")?;
            info!(url = client.url(), "Using HTTP access decisions");
            AnyDecisionService::Http(client)
        }
        DecisionKind::Simulated => {
            warn!("Simulated access decisions: every card is granted");
            AnyDecisionService::Mock(MockDecisionService::granting().0)
        }
    })
}

fn build_relay(config: &AppConfig) -> anyhow::Result<AnyActuator> {
    Ok(match config.relay.kind {
        RelayKind::Gpio => {
            let Some(path) = &config.relay.line else {
                bail!("relay.line is required for a GPIO relay");
            };
            AnyActuator::Gpio(GpioRelay::new(GpioLine::new(path).active_low(config.relay.active_low)))
        }
        RelayKind::Usb => usb_relay()?,
        RelayKind::Simulated => AnyActuator::Simulated(SimulatedRelay::new().0),
    })
}

#[cfg(feature = "hardware-usb-relay")]
fn usb_relay() -> anyhow::Result<AnyActuator> {
    let relay = labgate_hardware::relay_usb::UsbHidRelay::new();
    if let Err(e) = relay.probe() {
        warn!(error = %e, "USB relay board not found, triggers will fail until it is attached");
    }
    Ok(AnyActuator::UsbHid(relay))
}

#[cfg(not(feature = "hardware-usb-relay"))]
fn usb_relay() -> anyhow::Result<AnyActuator> {
    bail!("relay kind `usb` needs the `hardware-usb-relay` feature")
}

fn gpio_indicator(lines: &IndicatorLines) -> GpioIndicator {
    let line = |path: Option<&PathBuf>| path.map(|p| GpioLine::new(p).active_low(lines.active_low));
    let indicator = GpioIndicator::new().with_rgb(
        line(lines.red.as_ref()),
        line(lines.green.as_ref()),
        line(lines.blue.as_ref()),
    );
    match line(lines.buzzer.as_ref()) {
        Some(buzzer) => indicator.with_buzzer(buzzer),
        None => indicator,
    }
}

async fn build_sinks(config: &AppConfig) -> anyhow::Result<(FanoutSink, Option<Database>)> {
    let mut sink = FanoutSink::new().with(AnyEventSink::Tracing(TracingSink));

    if let Some(path) = &config.log.events_file {
        let jsonl = JsonlSink::open(path)
            .await
            .with_context(|| format!("Failed to open event log {}", path.display()))?;
        sink.push(AnyEventSink::Jsonl(jsonl));
    }

    let database = match &config.log.database {
        Some(path) => {
            let database = Database::new(DatabaseConfig::new(path))
                .await
                .with_context(|| format!("Failed to open database {}", path.display()))?;
            sink.push(AnyEventSink::Sqlite(SqliteSink::new(&database)));
            Some(database)
        }
        None => None,
    };

    Ok((sink, database))
}
