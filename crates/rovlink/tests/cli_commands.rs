#![cfg(all(unix, feature = "cli"))]

use std::os::unix::net::UnixListener;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use rovlink_frame::encode_frame;
use rovlink_records::{ForceReport, Ready};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/rovlink-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn rovlink() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_rovlink"));
    cmd.arg("--log-level").arg("error");
    cmd
}

fn spawn_simulator(sock_path: &Path) -> Child {
    let child = rovlink()
        .arg("simulate")
        .arg(sock_path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("simulate command should start");

    let deadline = Instant::now() + Duration::from_secs(3);
    while !sock_path.exists() {
        assert!(Instant::now() < deadline, "simulator socket never appeared");
        thread::sleep(Duration::from_millis(20));
    }
    child
}

fn stop(mut child: Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn stdout_lines(output: &Output) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("stdout line should be JSON"))
        .collect()
}

fn capture() -> BytesMut {
    let ready = Ready {
        time_ms: 1500,
        name: "rover6".into(),
    };
    let force = ForceReport {
        time_ms: 1520,
        left: 12,
        right: 640,
    };

    let mut wire = BytesMut::new();
    wire.extend_from_slice(b"rover6 firmware up\n");
    encode_frame(0, &ready.to_frame().unwrap(), &mut wire);
    encode_frame(1, &force.to_frame().unwrap(), &mut wire);
    wire
}

#[test]
fn version_prints_package_version() {
    let output = rovlink().arg("version").output().expect("version should run");
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        format!("rovlink {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn decode_prints_one_json_line_per_record() {
    let dir = unique_temp_dir("decode");
    let path = dir.join("capture.bin");
    std::fs::write(&path, capture()).expect("capture should be writable");

    let output = rovlink()
        .args(["--format", "json", "decode"])
        .arg(&path)
        .output()
        .expect("decode should run");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let lines = stdout_lines(&output);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["category"], "ready");
    assert_eq!(lines[1]["sequence"], 1);
    assert_eq!(lines[1]["record"]["kind"], "force");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn decode_exits_data_invalid_on_corrupt_frames() {
    let dir = unique_temp_dir("decode-corrupt");
    let path = dir.join("capture.bin");
    let mut wire = capture();
    let len = wire.len();
    wire[len - 3] ^= 0x01;
    std::fs::write(&path, &wire).expect("capture should be writable");

    let output = rovlink()
        .args(["--format", "json", "decode"])
        .arg(&path)
        .output()
        .expect("decode should run");

    assert_eq!(output.status.code(), Some(60));
    assert_eq!(stdout_lines(&output).len(), 1);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn bridge_streams_telemetry_from_simulator() {
    let dir = unique_temp_dir("bridge");
    let sock_path = dir.join("rover.sock");
    let simulator = spawn_simulator(&sock_path);

    let output = rovlink()
        .args(["--format", "json", "bridge"])
        .arg(&sock_path)
        .args(["--categories", "enc", "--count", "4"])
        .output()
        .expect("bridge should run");
    stop(simulator);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let lines = stdout_lines(&output);
    assert_eq!(lines.len(), 4);
    assert!(lines.iter().all(|line| line["category"] == "enc"));
    assert!(lines.iter().all(|line| line["host_time_ms"].is_u64()));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn send_waits_for_acknowledgement() {
    let dir = unique_temp_dir("send-ack");
    let sock_path = dir.join("rover.sock");
    let simulator = spawn_simulator(&sock_path);

    let accepted = rovlink()
        .args(["--format", "json", "send"])
        .arg(&sock_path)
        .args(["--wait-ack", "activate"])
        .output()
        .expect("send should run");

    let refused = rovlink()
        .args(["--format", "json", "send"])
        .arg(&sock_path)
        .args(["--wait-ack", "motors", "40", "40"])
        .output()
        .expect("send should run");
    stop(simulator);

    assert!(accepted.status.success(), "stderr: {}", String::from_utf8_lossy(&accepted.stderr));
    let ack = &stdout_lines(&accepted)[0];
    assert_eq!(ack["record"]["status"], "ok");

    // Every connection gets a fresh rover, so motors arrive while inactive.
    assert_eq!(refused.status.code(), Some(1));
    let ack = &stdout_lines(&refused)[0];
    assert_eq!(ack["record"]["status"], "inactive");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn send_times_out_against_silent_device() {
    let dir = unique_temp_dir("send-silent");
    let sock_path = dir.join("silent.sock");
    let listener = UnixListener::bind(&sock_path).expect("listener should bind");
    let holder = thread::spawn(move || listener.accept().map(|(stream, _)| stream));

    let started = Instant::now();
    let output = rovlink()
        .arg("send")
        .arg(&sock_path)
        .args(["--timeout", "300ms", "activate"])
        .output()
        .expect("send should run");

    assert_eq!(output.status.code(), Some(124));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(String::from_utf8_lossy(&output.stderr).contains("no ready reply"));
    drop(holder.join());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn send_to_missing_port_is_a_transport_error() {
    let dir = unique_temp_dir("send-missing");
    let output = rovlink()
        .arg("send")
        .arg(dir.join("ttyNOPE"))
        .arg("activate")
        .output()
        .expect("send should run");

    assert_eq!(output.status.code(), Some(3));
    let _ = std::fs::remove_dir_all(&dir);
}
