mod common;

use base64ct::{Base64, Encoding as _};
use carmeleon_client::client::Client;
use carmeleon_client::ota::*;
use carmeleon_client::storage::MemoryStore;
use carmeleon_client::system::clock::ManualClock;
use common::{NOW, Script, ScriptedTransport};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Default)]
struct MockPlatform {
    image: Vec<u8>,
    chunks: usize,
    activated: bool,
    aborted: bool,
    fail_writes: bool,
}

impl Platform for MockPlatform {
    fn save_firmware_chunk(&mut self, chunk: &[u8]) -> Result<(), Error> {
        if self.fail_writes {
            return Err(Error::WriteError);
        }
        self.image.extend_from_slice(chunk);
        self.chunks += 1;
        Ok(())
    }

    fn activate_firmware(&mut self) -> Result<(), Error> {
        self.activated = true;
        Ok(())
    }

    fn abort(&mut self) {
        self.aborted = true;
    }
}

#[derive(Debug, Default)]
struct Recorder {
    log: Mutex<Vec<String>>,
}

impl OtaEvents for Recorder {
    fn on_connected(&self) {
        self.log.lock().push("connected".into());
    }

    fn on_writing(&self) {
        self.log.lock().push("writing".into());
    }

    fn on_success(&self) {
        self.log.lock().push("success".into());
    }

    fn on_fail(&self, message: &str) {
        self.log.lock().push(format!("fail: {message}"));
    }
}

fn updater(
    transport: &ScriptedTransport,
    platform: MockPlatform,
) -> (OtaUpdater<ScriptedTransport, MockPlatform>, Arc<Recorder>) {
    let client = Client::new(
        transport.clone(),
        Arc::new(MemoryStore::new()),
        Arc::new(ManualClock::new(NOW)),
    );
    let events = Arc::new(Recorder::default());
    (client.ota(platform, events.clone()), events)
}

fn image_reply(image: &[u8], declared: usize) -> Script {
    let mut bytes = format!("HTTP/1.1 200 OK\r\nContent-Length: {declared}\r\n\r\n").into_bytes();
    bytes.extend_from_slice(image);
    Script::Reply(bytes)
}

#[test]
fn test_ota_update() {
    let image: Vec<u8> = (0..2500u32).map(|i| i as u8).collect();
    let transport = ScriptedTransport::new();
    transport.script(image_reply(&image, image.len()));
    let (mut ota, events) = updater(&transport, MockPlatform::default());
    ota.set_firmware(Firmware { encoding: Encoding::Raw, checksum: Some(crc32fast::hash(&image)) });

    assert!(ota.begin("https://fw.example/device.bin"));
    assert_eq!(ota.state(), State::Done);
    assert_eq!(ota.platform().image, image);
    assert_eq!(ota.platform().chunks, 3);
    assert!(ota.platform().activated);
    assert_eq!(
        *events.log.lock(),
        ["connected", "writing", "writing", "writing", "success"]
    );
}

#[test]
fn test_base64_image() {
    let image = b"firmware bytes".to_vec();
    let encoded = Base64::encode_string(&image);
    let transport = ScriptedTransport::new();
    transport.script(image_reply(encoded.as_bytes(), encoded.len()));
    let (mut ota, _) = updater(&transport, MockPlatform::default());
    ota.set_firmware(Firmware { encoding: Encoding::Base64, checksum: None });

    assert!(ota.begin("http://fw.example/b64"));
    assert_eq!(ota.platform().image, image);
}

#[test]
fn test_partial_download_is_not_written() {
    let transport = ScriptedTransport::new();
    transport.script(image_reply(&[1, 2, 3], 10));
    let (mut ota, events) = updater(&transport, MockPlatform::default());

    assert!(!ota.begin("http://fw.example/cut"));
    assert_eq!(ota.state(), State::Failed);
    assert!(ota.platform().image.is_empty());
    assert!(!ota.platform().activated);
    assert_eq!(
        *events.log.lock(),
        ["connected", "fail: incomplete image: got 3 of 10 bytes"]
    );
}

#[test]
fn test_failures_report_reason() {
    let transport = ScriptedTransport::new();
    transport
        .script(Script::Refuse)
        .script(Script::reply("HTTP/1.1 404 Not Found\r\n\r\n"))
        .script(image_reply(b"abc", 3))
        .script(image_reply(b"abc", 3));

    let (mut ota, events) = updater(&transport, MockPlatform::default());
    assert!(!ota.begin("http://fw.example/a"));
    assert!(!ota.begin("http://fw.example/b"));
    ota.set_firmware(Firmware { encoding: Encoding::Raw, checksum: Some(0) });
    assert!(!ota.begin("http://fw.example/c"));
    ota.set_firmware(Firmware::default());
    ota.platform_mut().fail_writes = true;
    assert!(!ota.begin("http://fw.example/d"));
    assert!(ota.platform().aborted);

    let log = events.log.lock();
    let failures: Vec<&String> = log.iter().filter(|l| l.starts_with("fail")).collect();
    assert_eq!(failures.len(), 4);
    assert!(failures[0].starts_with("fail: download failed"));
    assert_eq!(failures[1], "fail: unexpected status 404");
    assert!(failures[2].starts_with("fail: checksum mismatch: expected 00000000"));
    assert_eq!(failures[3], "fail: writing the image failed");
}
