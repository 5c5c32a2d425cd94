use crate::config::{find_proofs_path, ProofsConfig, KNOWN_KEYS};
use crate::store::Backend;

/// Run the config command
pub fn run_config(key: Option<&str>, value: Option<&str>) -> Result<(), String> {
    let proofs_path =
        find_proofs_path().ok_or("No .proofs directory found. Run 'proofs init' first.")?;
    let mut config = ProofsConfig::new(proofs_path);

    match (key, value) {
        (None, None) => {
            // Show current config
            println!("Current configuration:\n");
            println!("  backend: {}", config.backend());
            println!("  socket:  {}", config.socket_path().display());
            println!("  db:      {}", config.db_path().display());

            println!("\n{:10} {:16} {}", "Key", "Env", "Description");
            println!("{}", "-".repeat(60));
            for k in KNOWN_KEYS {
                println!("{:10} {:16} {}", k.key, k.env, k.description);
            }
        }
        (Some(k), None) => {
            // Show specific key
            match k {
                "backend" => println!("backend: {}", config.backend()),
                "socket" => println!("socket: {}", config.socket_path().display()),
                _ => match config.get(k) {
                    Some(v) => println!("{}: {}", k, v),
                    None => println!("{}: (not set)", k),
                },
            }
        }
        (Some(k), Some(v)) => {
            // Set key=value
            if k == "backend" {
                let backend: Backend = v.parse()?;
                if backend == Backend::Remote {
                    println!("Note: start the server before using the remote backend:");
                    println!("  proofs server start");
                }
            } else if !KNOWN_KEYS.iter().any(|info| info.key == k) {
                let defaults: Vec<String> = KNOWN_KEYS
                    .iter()
                    .map(|info| format!("{} (default {})", info.key, info.default))
                    .collect();
                return Err(format!(
                    "Unknown key: {}. Known keys: {}",
                    k,
                    defaults.join(", ")
                ));
            }

            config.set(k, v).map_err(|e| format!("Failed to save: {}", e))?;
            println!("Set {} = {}", k, v);
        }
        (None, Some(_)) => {
            return Err("Key required when setting a value".to_string());
        }
    }

    Ok(())
}
