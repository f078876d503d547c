use std::fs::OpenOptions;
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::LinkStream;

/// Default line rate of the rover's data UART.
pub const DEFAULT_BAUD: u32 = 115_200;

/// Serial line settings.
#[derive(Debug, Clone)]
pub struct SerialOptions {
    /// Line rate in bits per second.
    pub baud: u32,
    /// Upper bound on how long a single read may wait once bytes were
    /// reported available. Rounded to tenths of a second, at most 25.5 s.
    pub read_timeout: Duration,
    /// Discard anything the device sent before the port was opened.
    pub flush_on_open: bool,
}

impl Default for SerialOptions {
    fn default() -> Self {
        Self {
            baud: DEFAULT_BAUD,
            read_timeout: Duration::from_secs(1),
            flush_on_open: true,
        }
    }
}

/// Open a serial TTY in raw 8N1 mode.
///
/// The device is opened non-blocking so a missing carrier cannot hang the
/// caller, then switched back to blocking writes once the line is configured.
pub fn open_serial(path: impl AsRef<Path>, options: &SerialOptions) -> Result<LinkStream> {
    let path = path.as_ref();
    let speed = baud_constant(options.baud)?;

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
        .open(path)
        .map_err(|source| TransportError::Open {
            path: path.to_path_buf(),
            source,
        })?;
    let fd = file.as_raw_fd();

    let configure_err = |source| TransportError::Configure {
        path: path.to_path_buf(),
        source,
    };

    // SAFETY: termios is plain old data; tcgetattr fully initializes it
    // before any field is read.
    let mut tty: libc::termios = unsafe { std::mem::zeroed() };
    // SAFETY: `fd` is the open TTY descriptor owned by `file`, and every
    // pointer handed to libc refers to the local `tty` value.
    unsafe {
        if libc::tcgetattr(fd, &mut tty) != 0 {
            return Err(configure_err(std::io::Error::last_os_error()));
        }
        libc::cfmakeraw(&mut tty);
        if libc::cfsetispeed(&mut tty, speed) != 0 || libc::cfsetospeed(&mut tty, speed) != 0 {
            return Err(configure_err(std::io::Error::last_os_error()));
        }
    }
    tty.c_cflag |= libc::CLOCAL | libc::CREAD;
    tty.c_cflag &= !(libc::CSTOPB | libc::PARENB);
    tty.c_cc[libc::VMIN] = 0;
    tty.c_cc[libc::VTIME] = deciseconds(options.read_timeout);

    // SAFETY: same descriptor and termios value as above.
    unsafe {
        if libc::tcsetattr(fd, libc::TCSANOW, &tty) != 0 {
            return Err(configure_err(std::io::Error::last_os_error()));
        }
        if options.flush_on_open && libc::tcflush(fd, libc::TCIOFLUSH) != 0 {
            return Err(configure_err(std::io::Error::last_os_error()));
        }
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 || libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) < 0 {
            return Err(configure_err(std::io::Error::last_os_error()));
        }
    }

    info!(?path, baud = options.baud, "serial device configured");
    Ok(LinkStream::from_serial(file))
}

fn deciseconds(timeout: Duration) -> libc::cc_t {
    let tenths = timeout.as_millis().div_ceil(100);
    tenths.min(u8::MAX as u128) as libc::cc_t
}

fn baud_constant(baud: u32) -> Result<libc::speed_t> {
    let speed = match baud {
        9_600 => libc::B9600,
        19_200 => libc::B19200,
        38_400 => libc::B38400,
        57_600 => libc::B57600,
        115_200 => libc::B115200,
        230_400 => libc::B230400,
        #[cfg(target_os = "linux")]
        460_800 => libc::B460800,
        #[cfg(target_os = "linux")]
        500_000 => libc::B500000,
        #[cfg(target_os = "linux")]
        921_600 => libc::B921600,
        #[cfg(target_os = "linux")]
        1_000_000 => libc::B1000000,
        other => {
            debug!(baud = other, "no termios constant for baud rate");
            return Err(TransportError::UnsupportedBaud(other));
        }
    };
    Ok(speed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_baud_rates_are_supported() {
        for baud in [9_600, 57_600, 115_200, 230_400] {
            assert!(baud_constant(baud).is_ok(), "baud {baud} should map");
        }
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn rover_fast_uart_rate_is_supported() {
        assert_eq!(baud_constant(500_000).unwrap(), libc::B500000);
    }

    #[test]
    fn odd_baud_rate_is_rejected() {
        assert!(matches!(
            baud_constant(12_345),
            Err(TransportError::UnsupportedBaud(12_345))
        ));
    }

    #[test]
    fn read_timeout_rounds_up_to_tenths_and_saturates() {
        assert_eq!(deciseconds(Duration::from_millis(0)), 0);
        assert_eq!(deciseconds(Duration::from_millis(1)), 1);
        assert_eq!(deciseconds(Duration::from_millis(1000)), 10);
        assert_eq!(deciseconds(Duration::from_secs(600)), u8::MAX);
    }

    #[test]
    fn missing_device_reports_open_error() {
        let result = open_serial("/dev/rovlink-does-not-exist", &SerialOptions::default());
        assert!(matches!(result, Err(TransportError::Open { .. })));
    }
}
