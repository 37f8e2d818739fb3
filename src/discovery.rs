use std::fs;
use std::io;
use std::net::SocketAddr;
use std::path::Path;

/// Well-known path advertising the listen address to the upstream producer.
pub const DEFAULT_PATH: &str = "/tmp/rmotion";

/// Write the discovery file: the literal text `"<host> : <port>"`.
///
/// The upstream producer reads this to find us; the relay itself never
/// reads it back.
pub fn write(path: impl AsRef<Path>, addr: SocketAddr) -> io::Result<()> {
    fs::write(path, format!("{} : {}", addr.ip(), addr.port()))
}

/// Remove the discovery file. A missing file is not an error.
pub fn remove(path: impl AsRef<Path>) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("tuple-relay-{}-{}", name, std::process::id()))
    }

    #[test]
    fn writes_host_and_port_with_separator() {
        let path = scratch_path("write");
        let addr: SocketAddr = "127.0.0.1:6000".parse().unwrap();

        write(&path, addr).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "127.0.0.1 : 6000");

        remove(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn removing_a_missing_file_is_fine() {
        let path = scratch_path("missing");
        assert!(remove(&path).is_ok());
    }
}
