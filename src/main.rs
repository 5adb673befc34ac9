//! Pan-tilt firmware entry point (RP2040).
//!
//! Pitch servo on GP16 (PWM slice 0, channel A), yaw servo on GP18 (PWM
//! slice 1, channel A), host link over USB CDC-ACM.
#![no_std]
#![no_main]

use defmt::{error, info};
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::clocks::clk_sys_freq;
use embassy_rp::peripherals::USB;
use embassy_rp::pwm::Pwm;
use embassy_time::{Duration, Timer};
use pantilt::{
    AxisId, Controller, HOME_SETTLE_MS, LINK_SETTLE_MS, PITCH_LIMITS, PipeLink, Servo, ServoConfig,
    ServoSpec, Tuning, UsbSerialConfig, YAW_LIMITS, start_usb_serial,
};
use {defmt_rtt as _, panic_probe as _};

bind_interrupts!(struct Irqs {
    USBCTRL_IRQ => embassy_rp::usb::InterruptHandler<USB>;
});

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_rp::init(Default::default());
    info!("pantilt v{} booting", env!("CARGO_PKG_VERSION"));

    // A dead USB stack still leaves a working (silent) link.
    let mut link = match start_usb_serial(p.USB, Irqs, &spawner, UsbSerialConfig::default()) {
        Ok(link) => link,
        Err(e) => {
            error!("USB serial unavailable: {}", e);
            PipeLink::new()
        }
    };
    link.wait_ready(Duration::from_millis(LINK_SETTLE_MS)).await;

    let servo_config = ServoConfig::new_precomputed(clk_sys_freq(), ServoSpec::mg995());
    let pitch_pwm = Pwm::new_output_a(p.PWM_SLICE0, p.PIN_16, servo_config.pwm_config());
    let yaw_pwm = Pwm::new_output_a(p.PWM_SLICE1, p.PIN_18, servo_config.pwm_config());
    let pitch = Servo::attach(AxisId::Pitch, pitch_pwm, servo_config.clone(), PITCH_LIMITS);
    let yaw = Servo::attach(AxisId::Yaw, yaw_pwm, servo_config, YAW_LIMITS);

    let tuning = Tuning::default();
    let mut controller = Controller::new(pitch, PITCH_LIMITS, yaw, YAW_LIMITS, tuning);

    controller.home();
    Timer::after_millis(HOME_SETTLE_MS).await;
    controller.announce(&mut link);

    let tick = Duration::from_millis(tuning.tick_interval_ms());
    info!("Control loop running, tick {} ms", tuning.tick_interval_ms());
    loop {
        controller.step(&mut link);
        Timer::after(tick).await;
    }
}
