use std::net::TcpStream;
#[cfg(unix)]
use std::path::Path;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::DeviceStream;

/// TCP port the Wi-Fi adapter firmware listens on.
pub const DEFAULT_DEVICE_PORT: u16 = 8888;

/// Connect to a CAN adapter over TCP (blocking).
///
/// `address` is `host:port`; a bare host gets [`DEFAULT_DEVICE_PORT`].
pub fn connect_tcp(address: &str) -> Result<DeviceStream> {
    let endpoint = with_default_port(address);
    let stream = TcpStream::connect(endpoint.as_str()).map_err(|e| TransportError::Connect {
        endpoint: endpoint.clone(),
        source: e,
    })?;
    // Poll commands are a handful of bytes; do not let Nagle hold them back.
    stream.set_nodelay(true)?;
    debug!(%endpoint, "connected to tcp device");
    Ok(DeviceStream::from_tcp(stream))
}

/// Connect to a CAN adapter bridged onto a Unix domain socket (blocking).
#[cfg(unix)]
pub fn connect_unix(path: impl AsRef<Path>) -> Result<DeviceStream> {
    let path = path.as_ref();
    let stream =
        std::os::unix::net::UnixStream::connect(path).map_err(|e| TransportError::Connect {
            endpoint: path.display().to_string(),
            source: e,
        })?;
    debug!(?path, "connected to unix domain socket device");
    Ok(DeviceStream::from_unix(stream))
}

fn with_default_port(address: &str) -> String {
    let has_port = match address.rsplit_once(':') {
        // Bracketed IPv6 literal without a port, e.g. "[::1]".
        Some((host, _)) if address.ends_with(']') && host.starts_with('[') => false,
        Some((_, port)) => port.parse::<u16>().is_ok(),
        None => false,
    };
    if has_port {
        address.to_string()
    } else {
        format!("{address}:{DEFAULT_DEVICE_PORT}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    #[test]
    fn test_connect_tcp_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let handle = std::thread::spawn(move || {
            let (mut server, _) = listener.accept().unwrap();
            let mut cmd = [0u8; 4];
            server.read_exact(&mut cmd).unwrap();
            assert_eq!(&cmd, b"C02\r");
            server.write_all(b"AA,00000000340D0000\n").unwrap();
        });

        let mut client = connect_tcp(&addr).unwrap();
        assert_eq!(client.transport_name(), "tcp");
        client.write_all(b"C02\r").unwrap();

        let mut line = [0u8; 20];
        client.read_exact(&mut line).unwrap();
        assert_eq!(&line, b"AA,00000000340D0000\n");

        handle.join().unwrap();
    }

    #[test]
    fn test_connect_tcp_refused() {
        // Bind then drop to get a port nobody listens on.
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let result = connect_tcp(&format!("127.0.0.1:{port}"));
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }

    #[test]
    fn test_default_port_applied() {
        assert_eq!(with_default_port("192.168.4.1"), "192.168.4.1:8888");
        assert_eq!(with_default_port("192.168.4.1:9000"), "192.168.4.1:9000");
        assert_eq!(with_default_port("[::1]"), "[::1]:8888");
        assert_eq!(with_default_port("[::1]:7000"), "[::1]:7000");
    }

    #[test]
    #[cfg(unix)]
    fn test_connect_unix_roundtrip() {
        let dir = std::env::temp_dir().join(format!("dashcan-uds-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let sock_path = dir.join("device.sock");
        let _ = std::fs::remove_file(&sock_path);
        let listener = std::os::unix::net::UnixListener::bind(&sock_path).unwrap();

        let handle = std::thread::spawn(move || {
            let (mut server, _) = listener.accept().unwrap();
            server.write_all(b"1D6,C001\n").unwrap();
        });

        let mut client = connect_unix(&sock_path).unwrap();
        assert_eq!(client.transport_name(), "unix-domain-socket");
        let mut line = [0u8; 9];
        client.read_exact(&mut line).unwrap();
        assert_eq!(&line, b"1D6,C001\n");

        handle.join().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }
}
