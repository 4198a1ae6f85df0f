use std::{
    env, thread,
    time::{Duration, Instant},
};

use lcdlink::{Intervals, Lcd, LinkConfig, Operation, Presence};

fn main() {
    env_logger::init();

    let path = env::args().nth(1).expect("no serial port supplied");
    let intervals = Intervals::default();
    let mut lcd = Lcd::new(LinkConfig::new(path));

    lcd.apply(Operation::UpdatePage {
        page: 0,
        data: b"lcdlink demo".to_vec(),
    })
    .expect("page fits");

    let mut next_device_check = Instant::now();
    let mut next_page_cycle = Instant::now() + intervals.page_cycle;
    let mut next_sensor_check = Instant::now() + intervals.sensor_check;
    loop {
        let now = Instant::now();

        if now >= next_device_check {
            match lcd.check_device() {
                Presence::Detected => log::info!("LCD detected"),
                Presence::Absent => log::info!("LCD is not plugged in"),
            }
            next_device_check = now + intervals.device_check;
        }

        if now >= next_page_cycle {
            if let Err(err) = lcd.apply(Operation::CyclePage) {
                eprintln!("{err}");
            }
            next_page_cycle = now + intervals.page_cycle;
        }

        if now >= next_sensor_check {
            match lcd.poll_sensors() {
                Ok(_) => {
                    for (id, sensor) in lcd.sensors().known() {
                        println!("sensor {id}: serial={} value={}", sensor.serial(), sensor.value);
                    }
                }
                Err(err) => eprintln!("{err}"),
            }
            next_sensor_check = now + intervals.sensor_check;
        }

        thread::sleep(Duration::from_millis(50));
    }
}
