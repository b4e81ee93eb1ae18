//! End-to-end proof of the storage engine's core security properties,
//! driven over a real filesystem instead of the in-memory test double
//! the unit tests use.

use esfscore::factory::FactoryReset;
use esfscore::file::error::EsfsError;
use esfscore::file::lifecycle::Storage;
use esfscore::mode::ModeFlags;
use esfscore::pal::{DeviceRoot, FileSystem, OsCsprng, SystemClock};
use esfscore::pal::fs::StdFileSystem;

fn engine(primary: &std::path::Path, secondary: &std::path::Path) -> Storage<StdFileSystem, OsCsprng> {
    let fs = StdFileSystem::new(primary.to_path_buf(), secondary.to_path_buf(), false);
    let root = DeviceRoot::new([0x2A; 16]);
    let storage = Storage::new(fs, &root, OsCsprng);
    storage.factory().init(&SystemClock::default()).unwrap();
    storage
}

#[test]
fn prove_secure_core_lifecycle() {
    let primary = tempfile::tempdir().unwrap();
    let secondary = tempfile::tempdir().unwrap();
    let storage = engine(primary.path(), secondary.path());
    println!("[ESFS] engine initialized over real directories.");

    let plaintext = b"This is a top secret factory configuration blob.";

    let mut handle = storage
        .create(b"device_cert", ModeFlags::USER_READ | ModeFlags::ENCRYPTED, &[])
        .unwrap();
    handle.write(plaintext).unwrap();
    handle.close().unwrap();
    println!("[ESFS] wrote and closed an encrypted item.");

    let on_disk = storage
        .core()
        .working_root()
        .join(esfscore::filename::ShortFileName::derive(b"device_cert").as_string());
    let raw = std::fs::read(&on_disk).unwrap();
    assert!(
        !raw.windows(plaintext.len()).any(|w| w == plaintext.as_slice()),
        "plaintext must not appear anywhere in the on-disk bytes"
    );
    println!("[ESFS] on-disk bytes are opaque.");

    let (mut handle, mode) = storage.open(b"device_cert").unwrap();
    assert!(mode.is_encrypted());
    let mut decrypted = vec![0u8; plaintext.len()];
    let n = handle.read(&mut decrypted).unwrap();
    assert_eq!(n, plaintext.len());
    assert_eq!(&decrypted, plaintext);
    println!("[ESFS] decrypted and verified round trip.");
}

#[test]
fn prove_cmac_tamper_is_caught_before_any_read() {
    let primary = tempfile::tempdir().unwrap();
    let secondary = tempfile::tempdir().unwrap();
    let storage = engine(primary.path(), secondary.path());

    let mut handle = storage.create(b"manifest", ModeFlags::USER_READ, &[]).unwrap();
    handle.write(b"trusted contents").unwrap();
    handle.close().unwrap();

    let on_disk = storage
        .core()
        .working_root()
        .join(esfscore::filename::ShortFileName::derive(b"manifest").as_string());
    let mut bytes = std::fs::read(&on_disk).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    std::fs::write(&on_disk, &bytes).unwrap();

    assert_eq!(storage.open(b"manifest").unwrap_err(), EsfsError::CmacMismatch);
    storage.delete(b"manifest").unwrap();
    assert_eq!(storage.open(b"manifest").unwrap_err(), EsfsError::NotExists);
}

#[test]
fn prove_factory_reset_restores_only_factory_items_across_real_partitions() {
    let primary = tempfile::tempdir().unwrap();
    let secondary = tempfile::tempdir().unwrap();
    let storage = engine(primary.path(), secondary.path());

    storage
        .create(b"factory_default", ModeFlags::USER_READ | ModeFlags::FACTORY_VAL, &[])
        .unwrap()
        .write(b"ship-state")
        .unwrap();
    storage
        .create(b"field_provisioned", ModeFlags::USER_READ, &[])
        .unwrap()
        .write(b"set-in-the-field")
        .unwrap();

    let reset = FactoryReset::new(storage.core());
    reset.factory_reset().unwrap();

    let (mut handle, _mode) = storage.open(b"factory_default").unwrap();
    let mut buf = [0u8; 32];
    let n = handle.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"ship-state");

    assert_eq!(storage.open(b"field_provisioned").unwrap_err(), EsfsError::NotExists);

    let sentinel = storage
        .core()
        .backup_root()
        .join(esfscore::paths::FACTORY_RESET_DIR_NAME)
        .join(esfscore::paths::FACTORY_RESET_SENTINEL_NAME);
    assert!(!storage.core().fs().exists(&sentinel));
}
