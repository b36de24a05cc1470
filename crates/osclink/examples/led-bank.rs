//! A bank of LEDs controlled over OSC.
//!
//! Run with:
//!   cargo run --example led-bank
//!
//! In another terminal:
//!   cargo run --features cli -- send 127.0.0.1:10000 /led/*/brightness i:128
//!   cargo run --features cli -- send 127.0.0.1:10000 /led/{0,2}/brightness --wait

use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use osclink::router::{
    EngineConfig, IndexedIntHandler, IndexedIntProperties, OscEngine, OscError, Result,
};

struct Leds {
    brightness: Mutex<[i32; 4]>,
}

impl IndexedIntProperties for Leds {
    fn properties(&self) -> &[&str] {
        &["brightness"]
    }

    fn index_count(&self) -> i32 {
        4
    }

    fn get(&self, index: i32, _property: usize) -> Result<i32> {
        let leds = self
            .brightness
            .lock()
            .map_err(|_| OscError::subsystem("led", "state poisoned"))?;
        Ok(leds[index as usize])
    }

    fn set(&self, index: i32, _property: usize, value: i32) -> Result<()> {
        let mut leds = self
            .brightness
            .lock()
            .map_err(|_| OscError::subsystem("led", "state poisoned"))?;
        leds[index as usize] = value.clamp(0, 255);
        eprintln!("led {index} -> {}", leds[index as usize]);
        Ok(())
    }
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let engine = OscEngine::builder()
        .config(EngineConfig::default())
        .handler(IndexedIntHandler::new(
            "led",
            Leds {
                brightness: Mutex::new([0; 4]),
            },
        ))
        .start()?;

    if let Some(addr) = engine.udp_local_addr() {
        eprintln!("Listening on {addr}");
    }

    // Serve for a minute, then shut down cleanly.
    thread::sleep(Duration::from_secs(60));
    engine.stop()?;
    Ok(())
}
