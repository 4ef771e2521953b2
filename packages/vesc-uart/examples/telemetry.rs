use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::sleep,
    time::Duration,
};

use log::{error, info};
use vesc_uart::{
    serial::{find_ports, SerialError, SerialTransport, VESC_DEFAULT_BAUDRATE},
    Vesc,
};

fn main() -> Result<(), SerialError> {
    simplelog::TermLogger::init(
        log::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Always,
    )
    .unwrap();

    // Use the port given on the command line, then a native USB VESC, then the usual adapter path.
    let path = match std::env::args().nth(1) {
        Some(path) => path,
        None => find_ports()?
            .into_iter()
            .next()
            .map(|port| port.port_name)
            .unwrap_or_else(|| "/dev/ttyUSB0".to_string()),
    };

    let mut vesc: Vesc<SerialTransport> = Vesc::new(SerialTransport::new(path));
    vesc.begin(VESC_DEFAULT_BAUDRATE)?;

    // Ask for the firmware version for up to 2 seconds, repeating every 500 ms.
    let mut waited = 0;
    while waited < 2000 && !vesc.fw_version().is_known() {
        if waited % 500 == 0 {
            vesc.ask_fw_version()?;
        }
        sleep(Duration::from_millis(10));
        waited += 10;
        vesc.poll()?;
    }

    if !vesc.fw_version().is_known() {
        error!("No answer from the controller");
        std::process::exit(1);
    }
    info!(
        "Answer after {} ms, firmware {}",
        waited,
        vesc.fw_version()
    );

    let got_values = Arc::new(AtomicBool::new(false));
    vesc.set_values_callback({
        let got_values = got_values.clone();
        move |_| got_values.store(true, Ordering::Relaxed)
    });

    vesc.ask_values()?;

    // Poll for 5 seconds.
    for _ in 0..50 {
        vesc.poll()?;

        if got_values.swap(false, Ordering::Relaxed) {
            let values = vesc.values();
            info!(
                "rpm: {}, voltage: {:.2} V, current: {:.2} A, duty: {:.3}, fault: {:?}",
                values.rpm as i32,
                values.input_voltage,
                values.avg_motor_current,
                values.duty_cycle,
                values.fault
            );
            vesc.ask_values()?;
        }

        // The controller stops the motor if no command arrives within its timeout.
        vesc.set_current(1234)?;

        sleep(Duration::from_millis(100));
    }

    info!("Stopping motor before exit");
    vesc.set_current(0)?;
    sleep(Duration::from_secs(1));

    Ok(())
}
