//! USB CDC-ACM serial link
//!
//! The USB device and the CDC endpoints run in their own executor tasks and
//! only shuttle bytes between the endpoints and two static pipes. The
//! control loop talks to the pipes through [`PipeLink`], which never waits,
//! so all control state stays inside the control loop.
//!
//! # Example
//!
//! ```ignore
//! let mut link = start_usb_serial(p.USB, Irqs, &spawner, UsbSerialConfig::default())?;
//! link.wait_ready(Duration::from_millis(LINK_SETTLE_MS)).await;
//! ```

use embassy_executor::{Spawner, task};
use embassy_futures::join::join;
use embassy_rp::interrupt::typelevel::Binding;
use embassy_rp::peripherals::USB;
use embassy_rp::usb::Driver;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::pipe::Pipe;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer, with_timeout};
use embassy_usb::class::cdc_acm::{CdcAcmClass, Receiver, Sender, State};
use embassy_usb::driver::EndpointError;
use embassy_usb::{Builder, Config, Handler};
use static_cell::StaticCell;

use crate::config::BAUD_RATE;
use crate::protocol::SerialLink;

const MAX_PACKET_SIZE: u16 = 64;
const RX_PIPE_SIZE: usize = 64;
const TX_PIPE_SIZE: usize = 256;
const DTR_POLL_MS: u64 = 10;
const LINE_END: &[u8] = b"\r\n";

type UsbDriver = Driver<'static, USB>;

static RX_PIPE: Pipe<CriticalSectionRawMutex, RX_PIPE_SIZE> = Pipe::new();
static TX_PIPE: Pipe<CriticalSectionRawMutex, TX_PIPE_SIZE> = Pipe::new();
static HOST_OPENED: Signal<CriticalSectionRawMutex, ()> = Signal::new();

// ============================================================================
// ERROR HANDLING
// ============================================================================

/// USB serial link errors
#[derive(Debug, defmt::Format, thiserror::Error)]
pub enum UsbSerialError {
    #[error("Failed to spawn USB task")]
    TaskSpawnFailed,
}

// ============================================================================
// USB DEVICE HANDLER
// ============================================================================

/// Logs USB state transitions.
struct LinkStateHandler;

impl Handler for LinkStateHandler {
    fn enabled(&mut self, enabled: bool) {
        if enabled {
            info!("USB Device enabled");
        } else {
            info!("USB Device disabled");
        }
    }

    fn reset(&mut self) {
        info!("USB Bus reset");
    }

    fn addressed(&mut self, _addr: u8) {
        info!("USB Address set");
    }

    fn configured(&mut self, configured: bool) {
        if configured {
            info!("USB Device configured");
        } else {
            info!("USB Device deconfigured");
        }
    }
}

// ============================================================================
// USB TASKS
// ============================================================================

/// Runs the USB device state machine.
#[task]
async fn usb_task(mut usb_device: embassy_usb::UsbDevice<'static, UsbDriver>) {
    usb_device.run().await
}

/// Moves bytes between the CDC endpoints and the link pipes.
#[task]
async fn cdc_task(class: CdcAcmClass<'static, UsbDriver>) {
    let (mut sender, mut receiver) = class.split();
    join(rx_pump(&mut receiver), tx_pump(&mut sender)).await;
}

async fn rx_pump(receiver: &mut Receiver<'static, UsbDriver>) {
    let mut packet = [0u8; MAX_PACKET_SIZE as usize];
    loop {
        receiver.wait_connection().await;
        let data_rate = receiver.line_coding().data_rate();
        if data_rate != BAUD_RATE {
            warn!(
                "Host line coding is {} baud, expected {}; CDC ignores it",
                data_rate, BAUD_RATE
            );
        }

        loop {
            match receiver.read_packet(&mut packet).await {
                // Blocks while the control loop is behind, which NAKs the host.
                Ok(n) => RX_PIPE.write_all(&packet[..n]).await,
                Err(EndpointError::BufferOverflow) => warn!("USB serial packet overflow"),
                Err(EndpointError::Disabled) => {
                    info!("USB serial disconnected");
                    break;
                }
            }
        }
    }
}

async fn tx_pump(sender: &mut Sender<'static, UsbDriver>) {
    // Short packets only, so no zero-length packet is ever needed.
    let mut packet = [0u8; MAX_PACKET_SIZE as usize - 1];
    loop {
        sender.wait_connection().await;
        // Hold output until a terminal opens the port, or the banner is lost.
        while !sender.dtr() {
            Timer::after_millis(DTR_POLL_MS).await;
        }
        info!("Host opened the serial port");
        HOST_OPENED.signal(());

        loop {
            let n = TX_PIPE.read(&mut packet).await;
            if let Err(e) = sender.write_packet(&packet[..n]).await {
                warn!("USB serial write failed: {}", e);
                break;
            }
        }
    }
}

// ============================================================================
// USB SERIAL CONFIGURATION
// ============================================================================

/// Configuration for the USB serial device
///
/// Uses builder pattern via struct literal update syntax.
///
/// # Example
///
/// ```ignore
/// let config = UsbSerialConfig {
///     serial_number: Some("0002"),
///     ..Default::default()
/// };
/// ```
pub struct UsbSerialConfig {
    /// USB vendor ID
    pub vendor_id: u16,
    /// USB product ID
    pub product_id: u16,
    /// Manufacturer string
    pub manufacturer: Option<&'static str>,
    /// Product string
    pub product: Option<&'static str>,
    /// Serial number string
    pub serial_number: Option<&'static str>,
    /// Maximum power consumption in mA
    pub max_power: u16,
    /// Maximum packet size for endpoint 0
    pub max_packet_size: u8,
}

impl Default for UsbSerialConfig {
    fn default() -> Self {
        Self {
            vendor_id: 0xc0de,
            product_id: 0xcafe,
            manufacturer: Some("pantilt"),
            product: Some("Pan-tilt servo mount"),
            serial_number: Some("0001"),
            max_power: 100,
            max_packet_size: 64,
        }
    }
}

// ============================================================================
// USB SERIAL LINK
// ============================================================================

/// Bring up the USB CDC device and return the control loop's end of it.
pub fn start_usb_serial<I>(
    usb: embassy_rp::Peri<'static, USB>,
    irqs: I,
    spawner: &Spawner,
    config: UsbSerialConfig,
) -> Result<PipeLink, UsbSerialError>
where
    I: Binding<<USB as embassy_rp::usb::Instance>::Interrupt, embassy_rp::usb::InterruptHandler<USB>>,
{
    info!("Initializing USB serial device...");

    let driver = Driver::new(usb, irqs);

    let mut usb_config = Config::new(config.vendor_id, config.product_id);
    usb_config.manufacturer = config.manufacturer;
    usb_config.product = config.product;
    usb_config.serial_number = config.serial_number;
    usb_config.max_power = config.max_power;
    usb_config.max_packet_size_0 = config.max_packet_size;

    // Static buffers (StaticCell instead of static mut)
    static CONFIG_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
    static BOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
    static MSOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
    static CONTROL_BUF: StaticCell<[u8; 64]> = StaticCell::new();

    let mut builder = Builder::new(
        driver,
        usb_config,
        CONFIG_DESCRIPTOR.init([0; 256]),
        BOS_DESCRIPTOR.init([0; 256]),
        MSOS_DESCRIPTOR.init([0; 256]),
        CONTROL_BUF.init([0; 64]),
    );

    static HANDLER: StaticCell<LinkStateHandler> = StaticCell::new();
    builder.handler(HANDLER.init(LinkStateHandler));

    static CDC_STATE: StaticCell<State<'static>> = StaticCell::new();
    let class = CdcAcmClass::new(&mut builder, CDC_STATE.init(State::new()), MAX_PACKET_SIZE);

    let usb_device = builder.build();

    let usb_token = usb_task(usb_device).map_err(|_| UsbSerialError::TaskSpawnFailed)?;
    spawner.spawn(usb_token);
    let cdc_token = cdc_task(class).map_err(|_| UsbSerialError::TaskSpawnFailed)?;
    spawner.spawn(cdc_token);

    info!("USB serial device initialized");

    Ok(PipeLink::new())
}

/// Control-loop end of the serial link. Reads and writes never wait.
pub struct PipeLink {
    dropped_lines: u32,
}

impl PipeLink {
    /// A link over the static pipes. Without the USB tasks running it
    /// simply never receives anything.
    pub const fn new() -> Self {
        Self { dropped_lines: 0 }
    }

    /// Wait up to `timeout` for a host to open the port. Returns whether
    /// one did.
    pub async fn wait_ready(&self, timeout: Duration) -> bool {
        let opened = with_timeout(timeout, HOST_OPENED.wait()).await.is_ok();
        if !opened {
            warn!(
                "No host after {} ms, continuing",
                timeout.as_millis()
            );
        }
        opened
    }

    /// Diagnostic lines dropped because the outbound pipe was full.
    pub fn dropped_lines(&self) -> u32 {
        self.dropped_lines
    }

    fn enqueue(bytes: &[u8]) {
        let mut rest = bytes;
        while !rest.is_empty() {
            match TX_PIPE.try_write(rest) {
                Ok(n) => rest = &rest[n..],
                Err(_) => break,
            }
        }
    }
}

impl Default for PipeLink {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialLink for PipeLink {
    fn read_byte(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        match RX_PIPE.try_read(&mut byte) {
            Ok(1) => Some(byte[0]),
            _ => None,
        }
    }

    fn write_line(&mut self, line: &str) {
        let free = TX_PIPE.capacity() - TX_PIPE.len();
        if free < line.len() + LINE_END.len() {
            self.dropped_lines = self.dropped_lines.wrapping_add(1);
            debug!("TX pipe full, dropped line ({} so far)", self.dropped_lines);
            return;
        }
        Self::enqueue(line.as_bytes());
        Self::enqueue(LINE_END);
    }
}
