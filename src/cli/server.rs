use crate::config::{find_proofs_path, ProofsConfig};
use crate::server::Server;
use crate::store::{SocketStore, SqliteStore};
use std::fs;
use std::process::{Command, Stdio};
use std::time::Duration;

fn project_config() -> Result<ProofsConfig, String> {
    let proofs_path =
        find_proofs_path().ok_or("No .proofs directory found. Run 'proofs init' first.")?;
    Ok(ProofsConfig::new(proofs_path))
}

/// Run server start command
pub fn run_start(foreground: bool) -> Result<(), String> {
    let config = project_config()?;
    let socket = config.socket_path();

    if SocketStore::is_running(&socket) {
        println!("Server already running on {}", socket.display());
        return Ok(());
    }

    if foreground {
        let store = SqliteStore::open(&config.db_path())
            .map_err(|e| format!("Failed to open store: {}", e))?;
        let server = Server::bind(&socket, store).map_err(|e| e.to_string())?;
        println!("Serving {} on {}", config.db_path().display(), socket.display());
        return server.serve().map_err(|e| e.to_string());
    }

    // Background mode - re-run ourselves in the foreground, detached
    let exe = std::env::current_exe().map_err(|e| format!("Failed to locate executable: {}", e))?;
    let log_path = config.proofs_path().join("server.log");
    let log = fs::File::create(&log_path)
        .map_err(|e| format!("Failed to create {}: {}", log_path.display(), e))?;
    let log_err = log
        .try_clone()
        .map_err(|e| format!("Failed to create {}: {}", log_path.display(), e))?;

    Command::new(exe)
        .args(["server", "start", "--foreground"])
        .stdin(Stdio::null())
        .stdout(log)
        .stderr(log_err)
        .spawn()
        .map_err(|e| format!("Failed to start server: {}", e))?;

    // Poll until the socket answers
    for _ in 0..50 {
        std::thread::sleep(Duration::from_millis(100));
        if SocketStore::is_running(&socket) {
            println!("Server started on {}", socket.display());
            return Ok(());
        }
    }

    Err(format!(
        "Server failed to start. Check {} for details.",
        log_path.display()
    ))
}

/// Run server stop command
pub fn run_stop() -> Result<(), String> {
    let config = project_config()?;
    let socket = config.socket_path();

    if !SocketStore::is_running(&socket) {
        println!("Server not running.");
        return Ok(());
    }

    SocketStore::stop(&socket).map_err(|e| e.to_string())?;
    println!("Server stopped.");
    Ok(())
}

/// Run server status command
pub fn run_status() -> Result<(), String> {
    let config = project_config()?;
    let socket = config.socket_path();

    match SocketStore::ping(&socket) {
        Ok(version) => {
            println!("Server:  running");
            println!("Version: {}", version);
            println!("Socket:  {}", socket.display());
        }
        Err(_) => {
            println!("Server: not running");
            println!("Socket: {}", socket.display());
            println!("\nStart with: proofs server start");
        }
    }

    println!("Backend: {}", config.backend());

    Ok(())
}
