//! Minimal walkthrough of provisioning a device's working/backup roots,
//! writing a factory item, and running a factory reset. Run with
//! `cargo run --example factory_provision`.

use esfscore::mode::ModeFlags;
use esfscore::file::lifecycle::Storage;
use esfscore::pal::{DeviceRoot, OsCsprng, SystemClock};
use esfscore::pal::fs::StdFileSystem;

fn main() {
    env_logger_like_init();

    let primary = tempfile::tempdir().expect("create primary mount");
    let secondary = tempfile::tempdir().expect("create secondary mount");

    let fs = StdFileSystem::new(primary.path().to_path_buf(), secondary.path().to_path_buf(), false);
    // A real board derives this from the provisioned root of trust;
    // this example stands in a fixed value instead.
    let root = DeviceRoot::new([0x11; 16]);
    let storage = Storage::new(fs, &root, OsCsprng);

    storage
        .factory()
        .init(&SystemClock::default())
        .expect("factory-reset init");
    log::info!("engine initialized over {:?} / {:?}", primary.path(), secondary.path());

    storage
        .create(b"factory_defaults", ModeFlags::USER_READ | ModeFlags::FACTORY_VAL, &[])
        .expect("create factory item")
        .write(b"shipped-configuration")
        .expect("write factory item");
    log::info!("wrote factory_defaults");

    storage
        .create(b"field_override", ModeFlags::USER_READ, &[])
        .expect("create field item")
        .write(b"set-during-provisioning")
        .expect("write field item");
    log::info!("wrote field_override");

    storage.factory().factory_reset().expect("factory reset");
    log::info!("factory reset complete; field_override is gone, factory_defaults survives");

    match storage.open(b"field_override") {
        Ok(_) => unreachable!("field_override should not survive a factory reset"),
        Err(err) => log::warn!("field_override no longer readable after reset: {err}"),
    }
}

fn env_logger_like_init() {
    // Stand-in for a board's real logging sink; this example only
    // needs `log`'s macros to compile and run against some subscriber.
    let _ = log::set_max_level(log::LevelFilter::Info);
}
